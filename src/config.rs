use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Tuning for a [`Registry`](crate::Registry).
///
/// ```json
/// { "pool_capacity": 20, "memory_pressure_threshold": 10000, "sweep_interval_ms": 1000 }
/// ```
///
/// Missing fields take their defaults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
    /// Soft cap on pooled nodes per component kind.
    pub pool_capacity: usize,
    /// Live arena nodes above which a sweep empties pools and reclaims weak nodes.
    pub memory_pressure_threshold: usize,
    #[serde(rename = "sweep_interval_ms", with = "millis")]
    pub sweep_interval: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        RegistryConfig {
            pool_capacity: 20,
            memory_pressure_threshold: 10_000,
            sweep_interval: Duration::from_secs(1),
        }
    }
}

impl RegistryConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: RegistryConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sweep_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "sweep_interval_ms must be positive".into(),
            ));
        }
        if self.memory_pressure_threshold == 0 {
            return Err(ConfigError::Invalid(
                "memory_pressure_threshold must be positive".into(),
            ));
        }
        Ok(())
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
