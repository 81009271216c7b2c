//! Converters applied between a binding's source read and its target setter.

use std::{fmt, fmt::Write, sync::Arc};

use tracing::warn;

use super::Value;
use crate::error::ConvertError;

pub type MapFn = dyn Fn(Value) -> Result<Value, ConvertError> + Send + Sync;

/// Largest precision a format specifier accepts, as in `{0:F99}`.
const MAX_PRECISION: usize = 99;
/// Largest alignment width, as in `{0,-1024}`.
const MAX_ALIGNMENT: u32 = 1024;

#[derive(Clone)]
pub enum Converter {
    /// Composite format pattern such as `"Health: {0:F0}"`.
    Format(Arc<str>),
    Map(Arc<MapFn>),
}

impl fmt::Debug for Converter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Converter::Format(pattern) => f.debug_tuple("Format").field(pattern).finish(),
            Converter::Map(_) => f.write_str("Map(..)"),
        }
    }
}

impl Converter {
    pub fn format(pattern: impl Into<Arc<str>>) -> Self {
        Converter::Format(pattern.into())
    }

    pub fn map(f: impl Fn(Value) -> Result<Value, ConvertError> + Send + Sync + 'static) -> Self {
        Converter::Map(Arc::new(f))
    }

    /// Convert `value`, never failing.
    ///
    /// A format failure yields the raw text of the value; a failed map passes
    /// the value through unchanged. Either way the error is logged.
    pub fn convert(&self, value: Value) -> Value {
        match self {
            Converter::Format(pattern) => match format_value(pattern, &value) {
                Ok(text) => Value::Text(text),
                Err(err) => {
                    warn!(%pattern, error = %err, "format failed; using the raw value");
                    Value::Text(value.to_string())
                }
            },
            Converter::Map(map) => match map(value.clone()) {
                Ok(converted) => converted,
                Err(err) => {
                    warn!(error = %err, "converter failed; passing the value through");
                    value
                }
            },
        }
    }
}

/// Expand a composite format pattern with `value` as argument `{0}`.
///
/// Supports `{0}`, an optional alignment (`{0,8}`, `{0,-8}`) and the format
/// specifiers `F`, `N`, `P`, `D`, `X`/`x` and `G`, each with an optional
/// precision. `{{` and `}}` produce literal braces.
pub fn format_value(pattern: &str, value: &Value) -> Result<String, ConvertError> {
    let malformed = |reason: &str| ConvertError::Pattern {
        pattern: pattern.to_string(),
        reason: reason.to_string(),
    };

    let mut out = String::with_capacity(pattern.len() + 8);
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '}' => return Err(malformed("unmatched `}`")),
            '{' => {
                let mut item = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(c) => item.push(c),
                        None => return Err(malformed("unterminated format item")),
                    }
                }
                let (head, spec) = match item.split_once(':') {
                    Some((head, spec)) => (head, spec),
                    None => (item.as_str(), ""),
                };
                let (index, width) = match head.split_once(',') {
                    Some((index, width)) => {
                        let width: i32 = width
                            .trim()
                            .parse()
                            .map_err(|_| malformed("invalid alignment"))?;
                        if width.unsigned_abs() > MAX_ALIGNMENT {
                            return Err(malformed("alignment out of range"));
                        }
                        (index, width)
                    }
                    None => (head, 0),
                };
                if index.trim() != "0" {
                    return Err(malformed("only argument 0 is available"));
                }
                let text = format_spec(spec, value)?;
                pad(&mut out, &text, width);
            }
            c => out.push(c),
        }
    }
    Ok(out)
}

fn pad(out: &mut String, text: &str, width: i32) {
    let len = text.chars().count();
    let fill = (width.unsigned_abs() as usize).saturating_sub(len);
    if width > 0 {
        out.extend(std::iter::repeat_n(' ', fill));
        out.push_str(text);
    } else {
        out.push_str(text);
        out.extend(std::iter::repeat_n(' ', fill));
    }
}

fn format_spec(spec: &str, value: &Value) -> Result<String, ConvertError> {
    let spec = spec.trim();
    let mut chars = spec.chars();
    let Some(letter) = chars.next() else {
        return Ok(value.to_string());
    };
    let digits = chars.as_str();
    let precision = if digits.is_empty() {
        None
    } else {
        let precision = digits
            .parse::<usize>()
            .map_err(|_| unsupported(spec, value))?;
        if precision > MAX_PRECISION {
            return Err(unsupported(spec, value));
        }
        Some(precision)
    };

    let number = || value.as_f64().ok_or_else(|| unsupported(spec, value));
    let integer = || match value {
        Value::Int(v) => Ok(*v),
        _ => Err(unsupported(spec, value)),
    };

    match letter {
        'G' | 'g' => Ok(value.to_string()),
        'F' | 'f' => Ok(format!("{:.*}", precision.unwrap_or(2), number()?)),
        'N' | 'n' => Ok(grouped(number()?, precision.unwrap_or(2))),
        'P' | 'p' => Ok(format!("{:.*}%", precision.unwrap_or(2), number()? * 100.0)),
        'D' | 'd' => {
            let v = integer()?;
            let width = precision.unwrap_or(0);
            let sign = if v < 0 { "-" } else { "" };
            Ok(format!("{sign}{:0width$}", v.unsigned_abs()))
        }
        'X' => Ok(format!("{:0width$X}", integer()?, width = precision.unwrap_or(0))),
        'x' => Ok(format!("{:0width$x}", integer()?, width = precision.unwrap_or(0))),
        _ => Err(unsupported(spec, value)),
    }
}

fn unsupported(spec: &str, value: &Value) -> ConvertError {
    ConvertError::Format {
        spec: spec.to_string(),
        found: value.type_name(),
    }
}

fn grouped(number: f64, precision: usize) -> String {
    let fixed = format!("{:.*}", precision, number.abs());
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (fixed.as_str(), None),
    };
    let mut out = String::new();
    if number.is_sign_negative() && fixed.bytes().any(|b| b.is_ascii_digit() && b != b'0') {
        out.push('-');
    }
    for (i, digit) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(digit);
    }
    if let Some(frac_part) = frac_part {
        let _ = write!(out, ".{frac_part}");
    }
    out
}
