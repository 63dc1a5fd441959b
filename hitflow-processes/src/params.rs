//! Process configuration records and unit-aware parameter lookup.
//!
//! Parameter values are JSON values. Numbers are taken to be in the base
//! unit of their quantity (mm, rad, keV, us). Strings may carry a unit
//! suffix, e.g. `"2.5cm"` or `"30 deg"`. Vectors are either JSON arrays or
//! strings like `"(1, 0, 0) cm"`.

use std::f64::consts::PI;

use hitflow_core::Vec3;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, Result};

/// Configuration of one process instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessConfig {
    /// Registry key, e.g. `"hitsReduction"`.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Instance name; defaults to the type name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Parameter values by name.
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

impl ProcessConfig {
    /// Creates a configuration with no parameters.
    #[must_use]
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            ..Self::default()
        }
    }

    /// Sets the instance name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets a parameter.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// The instance name, falling back to the type name.
    #[must_use]
    pub fn instance_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.type_name)
    }

    /// Parameter view used by [`crate::Process::configure`].
    #[must_use]
    pub fn parameters(&self) -> Parameters<'_> {
        Parameters::new(self.instance_name(), &self.parameters)
    }
}

/// Physical quantity of a parameter, selecting its unit table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    /// Plain number, no unit accepted.
    Dimensionless,
    /// Millimetres.
    Length,
    /// Radians.
    Angle,
    /// Kiloelectronvolts.
    Energy,
    /// Microseconds.
    Time,
    /// Millimetres per microsecond.
    Velocity,
}

impl Quantity {
    fn factor(self, unit: &str) -> Option<f64> {
        match self {
            Self::Dimensionless => None,
            Self::Length => length_factor(unit),
            Self::Angle => match unit {
                "rad" => Some(1.0),
                "mrad" => Some(1e-3),
                "deg" => Some(PI / 180.0),
                _ => None,
            },
            Self::Energy => match unit {
                "eV" => Some(1e-3),
                "keV" => Some(1.0),
                "MeV" => Some(1e3),
                _ => None,
            },
            Self::Time => time_factor(unit),
            Self::Velocity => {
                let (length, time) = unit.split_once('/')?;
                Some(length_factor(length)? / time_factor(time)?)
            }
        }
    }
}

fn length_factor(unit: &str) -> Option<f64> {
    match unit {
        "um" | "µm" => Some(1e-3),
        "mm" => Some(1.0),
        "cm" => Some(10.0),
        "m" => Some(1e3),
        _ => None,
    }
}

fn time_factor(unit: &str) -> Option<f64> {
    match unit {
        "ns" => Some(1e-3),
        "us" | "µs" => Some(1.0),
        "ms" => Some(1e3),
        "s" => Some(1e6),
        _ => None,
    }
}

/// Splits `"12.5 mm"` into `("12.5", "mm")`.
fn split_unit(text: &str) -> (&str, &str) {
    let text = text.trim();
    let start = text
        .char_indices()
        .rev()
        .take_while(|&(_, c)| c.is_alphabetic() || c == '/')
        .last()
        .map_or(text.len(), |(i, _)| i);
    (text[..start].trim_end(), &text[start..])
}

/// Parses a number with an optional unit suffix into base units.
///
/// # Errors
/// Returns a message describing the malformed number or unknown unit.
pub fn parse_quantity(text: &str, quantity: Quantity) -> std::result::Result<f64, String> {
    let (number, unit) = split_unit(text);
    let value: f64 = number
        .parse()
        .map_err(|_| format!("'{text}' is not a number"))?;
    scale(value, unit, quantity)
}

/// Parses `"(x, y, z) unit"` into base units.
///
/// # Errors
/// Returns a message describing the malformed vector or unknown unit.
pub fn parse_vector(text: &str, quantity: Quantity) -> std::result::Result<Vec3, String> {
    let (body, unit) = split_unit(text);
    let inner = body
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| format!("'{text}' is not a vector, expected (x, y, z)"))?;
    let components = inner
        .split(',')
        .map(|c| c.trim().parse::<f64>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|_| format!("'{text}' has a non-numeric component"))?;
    let &[x, y, z] = &components[..] else {
        return Err(format!("'{text}' needs three components"));
    };
    Ok(Vec3::new(
        scale(x, unit, quantity)?,
        scale(y, unit, quantity)?,
        scale(z, unit, quantity)?,
    ))
}

fn scale(value: f64, unit: &str, quantity: Quantity) -> std::result::Result<f64, String> {
    if unit.is_empty() {
        return Ok(value);
    }
    quantity
        .factor(unit)
        .map(|factor| value * factor)
        .ok_or_else(|| format!("unknown unit '{unit}' for {quantity:?}"))
}

/// Read-only view of a stage's parameters.
#[derive(Debug, Clone, Copy)]
pub struct Parameters<'a> {
    stage: &'a str,
    values: &'a Map<String, Value>,
}

impl<'a> Parameters<'a> {
    /// Wraps a parameter map; `stage` names the owner in error messages.
    #[must_use]
    pub fn new(stage: &'a str, values: &'a Map<String, Value>) -> Self {
        Self { stage, values }
    }

    /// Stage name used in errors.
    #[must_use]
    pub fn stage(&self) -> &'a str {
        self.stage
    }

    /// Raw value lookup.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.values.get(key)
    }

    /// Builds a configuration error for `key`.
    pub fn invalid(&self, key: &str, reason: impl Into<String>) -> Error {
        Error::configuration(self.stage, key, reason)
    }

    /// A scalar in base units of `quantity`.
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] for a malformed value.
    pub fn quantity(&self, key: &str, quantity: Quantity, default: f64) -> Result<f64> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(default),
            Some(Value::Number(n)) => n
                .as_f64()
                .ok_or_else(|| self.invalid(key, "number out of range")),
            Some(Value::String(s)) => {
                parse_quantity(s, quantity).map_err(|reason| self.invalid(key, reason))
            }
            Some(other) => Err(self.invalid(key, format!("expected a number, got {other}"))),
        }
    }

    /// A dimensionless number.
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] for a malformed value.
    pub fn number(&self, key: &str, default: f64) -> Result<f64> {
        self.quantity(key, Quantity::Dimensionless, default)
    }

    /// A non-negative integer.
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] for a negative or fractional value.
    pub fn count(&self, key: &str, default: usize) -> Result<usize> {
        let value = self.integer(key, default as u64)?;
        usize::try_from(value).map_err(|_| self.invalid(key, "value too large"))
    }

    /// A 64-bit seed or other unsigned integer.
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] for a negative or fractional value.
    pub fn integer(&self, key: &str, default: u64) -> Result<u64> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(default),
            Some(Value::Number(n)) => n
                .as_u64()
                .ok_or_else(|| self.invalid(key, format!("expected a non-negative integer, got {n}"))),
            Some(Value::String(s)) => s
                .trim()
                .parse()
                .map_err(|_| self.invalid(key, format!("'{s}' is not a non-negative integer"))),
            Some(other) => Err(self.invalid(key, format!("expected an integer, got {other}"))),
        }
    }

    /// A boolean; accepts `true`/`false` and `"on"`/`"off"` strings.
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] for anything else.
    pub fn flag(&self, key: &str, default: bool) -> Result<bool> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(default),
            Some(Value::Bool(b)) => Ok(*b),
            Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "on" | "yes" => Ok(true),
                "false" | "off" | "no" => Ok(false),
                _ => Err(self.invalid(key, format!("'{s}' is not a boolean"))),
            },
            Some(other) => Err(self.invalid(key, format!("expected a boolean, got {other}"))),
        }
    }

    /// A string.
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] for a non-string value.
    pub fn text(&self, key: &str, default: &str) -> Result<String> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(default.to_string()),
            Some(Value::String(s)) => Ok(s.clone()),
            Some(other) => Err(self.invalid(key, format!("expected a string, got {other}"))),
        }
    }

    /// A 3-vector in base units of `quantity`.
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] for a malformed vector.
    pub fn vector(&self, key: &str, quantity: Quantity, default: Vec3) -> Result<Vec3> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(default),
            Some(Value::String(s)) => {
                parse_vector(s, quantity).map_err(|reason| self.invalid(key, reason))
            }
            Some(Value::Array(items)) => {
                let components = items
                    .iter()
                    .map(Value::as_f64)
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| self.invalid(key, "vector components must be numbers"))?;
                match &components[..] {
                    &[x, y, z] => Ok(Vec3::new(x, y, z)),
                    _ => Err(self.invalid(key, "vector needs three components")),
                }
            }
            Some(other) => Err(self.invalid(key, format!("expected a vector, got {other}"))),
        }
    }

    /// A list of strings, `None` when absent.
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] if an element is not a string.
    pub fn string_list(&self, key: &str) -> Result<Option<Vec<String>>> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| v.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .map(Some)
                .ok_or_else(|| self.invalid(key, "expected a list of strings")),
            // "a, b, c" shorthand
            Some(Value::String(s)) => Ok(Some(
                s.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect(),
            )),
            Some(other) => Err(self.invalid(key, format!("expected a list, got {other}"))),
        }
    }

    /// A list of named sub-records, each viewed as its own parameter set.
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] if an element is not an object.
    pub fn records(&self, key: &str) -> Result<Vec<Parameters<'a>>> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_object()
                        .map(|values| Parameters::new(self.stage, values))
                        .ok_or_else(|| self.invalid(key, "expected a list of objects"))
                })
                .collect(),
            Some(other) => Err(self.invalid(key, format!("expected a list, got {other}"))),
        }
    }
}
