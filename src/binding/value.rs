use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConvertError;

/// A value travelling through a binding, between the source read and the target setter.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Unit => "unit",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
        }
    }

    /// Numeric view of the value. Integers widen to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => Ok(()),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(v) => f.write_str(v),
        }
    }
}

macro_rules! from_impl {
    ($variant:ident: $($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value.into())
                }
            }
        )*
    };
}

from_impl!(Bool: bool);
from_impl!(Int: i64, i32, u32, i16, u16, i8, u8);
from_impl!(Float: f64, f32);
from_impl!(Text: String, &str);

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Unit
    }
}

/// Conversion from a [`Value`] into a typed setter argument.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, ConvertError>;
}

fn mismatch(expected: &'static str, found: &Value) -> ConvertError {
    ConvertError::Type {
        expected,
        found: found.type_name(),
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self, ConvertError> {
        Ok(value)
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self, ConvertError> {
        Ok(match value {
            Value::Text(text) => text,
            other => other.to_string(),
        })
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self, ConvertError> {
        match value {
            Value::Float(v) => Ok(v),
            Value::Int(v) => Ok(v as f64),
            Value::Text(text) => text.trim().parse().map_err(|_| ConvertError::Parse {
                text,
                expected: "f64",
            }),
            other => Err(mismatch("f64", &other)),
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: Value) -> Result<Self, ConvertError> {
        f64::from_value(value).map(|v| v as f32)
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> Result<Self, ConvertError> {
        match value {
            Value::Int(v) => Ok(v),
            Value::Float(v) if v.fract() == 0.0 => Ok(v as i64),
            Value::Bool(v) => Ok(v as i64),
            Value::Text(text) => text.trim().parse().map_err(|_| ConvertError::Parse {
                text,
                expected: "i64",
            }),
            other => Err(mismatch("i64", &other)),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: Value) -> Result<Self, ConvertError> {
        let wide = i64::from_value(value)?;
        i32::try_from(wide).map_err(|_| ConvertError::Parse {
            text: wide.to_string(),
            expected: "i32",
        })
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self, ConvertError> {
        match value {
            Value::Bool(v) => Ok(v),
            Value::Int(v) => Ok(v != 0),
            Value::Text(text) => match text.trim() {
                "true" | "True" => Ok(true),
                "false" | "False" => Ok(false),
                _ => Err(ConvertError::Parse {
                    text,
                    expected: "bool",
                }),
            },
            other => Err(mismatch("bool", &other)),
        }
    }
}
