//! Environment variable overrides with type safety.
//!
//! Every problem is collected so the operator sees all bad variables at once
//! instead of fixing them one run at a time.

use std::env;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during environment variable parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvError {
    /// Invalid value for a variable.
    #[error("Invalid value for {var}: expected {expected}, got '{value}'")]
    InvalidValue {
        var: String,
        expected: String,
        value: String,
    },

    /// Value out of valid range.
    #[error("Value out of range for {var}: {value} (valid: {min}..={max})")]
    OutOfRange {
        var: String,
        value: String,
        min: String,
        max: String,
    },
}

/// Type-safe environment variable parser.
///
/// Getters return `None` when the variable is unset (or unusable), leaving
/// the file or default value in place.
pub struct EnvParser {
    prefix: &'static str,
    errors: Vec<EnvError>,
}

impl EnvParser {
    /// Create a new parser with the VPCLAB_ prefix.
    pub fn new() -> Self {
        Self::with_prefix("VPCLAB_")
    }

    pub fn with_prefix(prefix: &'static str) -> Self {
        Self {
            prefix,
            errors: Vec::new(),
        }
    }

    pub fn errors(&self) -> &[EnvError] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Take ownership of errors.
    pub fn take_errors(&mut self) -> Vec<EnvError> {
        std::mem::take(&mut self.errors)
    }

    /// Get the full variable name with prefix.
    pub fn var_name(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    /// Non-empty string value.
    pub fn get_string(&mut self, name: &str) -> Option<String> {
        env::var(self.var_name(name)).ok().filter(|v| !v.is_empty())
    }

    /// Boolean value.
    ///
    /// Accepts: 1, true, yes, on (for true)
    ///          0, false, no, off (for false)
    pub fn get_bool(&mut self, name: &str) -> Option<bool> {
        let var_name = self.var_name(name);
        let value = env::var(&var_name).ok().filter(|v| !v.is_empty())?;
        match value.to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => {
                self.errors.push(EnvError::InvalidValue {
                    var: var_name,
                    expected: "boolean (true/false/1/0/yes/no)".to_string(),
                    value,
                });
                None
            }
        }
    }

    /// Unsigned integer value within `min..=max`.
    pub fn get_u64_range(&mut self, name: &str, min: u64, max: u64) -> Option<u64> {
        let var_name = self.var_name(name);
        let value = env::var(&var_name).ok().filter(|v| !v.is_empty())?;
        match value.trim().parse::<u64>() {
            Ok(n) if n >= min && n <= max => Some(n),
            Ok(n) => {
                self.errors.push(EnvError::OutOfRange {
                    var: var_name,
                    value: n.to_string(),
                    min: min.to_string(),
                    max: max.to_string(),
                });
                None
            }
            Err(_) => {
                self.errors.push(EnvError::InvalidValue {
                    var: var_name,
                    expected: "unsigned integer".to_string(),
                    value,
                });
                None
            }
        }
    }

    /// Any `FromStr` value; `expected` describes the accepted forms.
    pub fn get_parsed<T: FromStr>(&mut self, name: &str, expected: &str) -> Option<T> {
        let var_name = self.var_name(name);
        let value = env::var(&var_name).ok().filter(|v| !v.is_empty())?;
        match value.parse::<T>() {
            Ok(parsed) => Some(parsed),
            Err(_) => {
                self.errors.push(EnvError::InvalidValue {
                    var: var_name,
                    expected: expected.to_string(),
                    value,
                });
                None
            }
        }
    }
}

impl Default for EnvParser {
    fn default() -> Self {
        Self::new()
    }
}
