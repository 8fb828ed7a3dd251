//! Environment variable lookup with prefix support.
//!
//! # Responsibilities
//! - Resolve `{prefix}{NAME}` first, then the bare `NAME`
//! - Coerce values to integers and booleans with clear errors
//!
//! # Design Decisions
//! - The variable set is captured once; lookups never touch the live
//!   process environment afterwards
//! - An empty value counts as set

use std::collections::HashMap;
use std::str::FromStr;

use crate::config::ConfigError;

/// Snapshot of environment variables with an optional name prefix.
#[derive(Debug, Clone, Default)]
pub struct EnvResolver {
    prefix: String,
    vars: HashMap<String, String>,
}

impl EnvResolver {
    /// Capture the current process environment.
    pub fn from_process(prefix: impl Into<String>) -> Self {
        Self::from_map(prefix, std::env::vars().collect())
    }

    /// Build a resolver over an explicit variable map.
    pub fn from_map(prefix: impl Into<String>, vars: HashMap<String, String>) -> Self {
        Self {
            prefix: prefix.into(),
            vars,
        }
    }

    /// Same variables, different prefix.
    pub fn with_prefix(&self, prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            vars: self.vars.clone(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The captured variables, handed to the renderer's `init`.
    pub fn vars(&self) -> &HashMap<String, String> {
        &self.vars
    }

    /// Look up a variable, preferring the prefixed name.
    pub fn get(&self, name: &str) -> Option<String> {
        if !self.prefix.is_empty() {
            if let Some(value) = self.vars.get(&format!("{}{}", self.prefix, name)) {
                return Some(value.clone());
            }
        }
        self.vars.get(name).cloned()
    }

    /// String value or the given default.
    pub fn string(&self, name: &str, default: &str) -> String {
        self.get(name).unwrap_or_else(|| default.to_string())
    }

    /// Parse a variable as an integer, falling back to `default` when unset.
    pub fn int<T>(&self, name: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
    {
        match self.get(name) {
            None => Ok(default),
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidInteger {
                name: self.display_name(name),
                value: raw,
            }),
        }
    }

    /// Parse an optional integer; unset stays `None`.
    pub fn opt_int<T>(&self, name: &str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
    {
        match self.get(name) {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| ConfigError::InvalidInteger {
                    name: self.display_name(name),
                    value: raw,
                }),
        }
    }

    /// Interpret a variable as a boolean.
    ///
    /// `true`, `1`, `yes` and `on` (any case) are true; every other set value
    /// is false.
    pub fn bool(&self, name: &str, default: bool) -> bool {
        match self.get(name) {
            None => default,
            Some(raw) => matches!(
                raw.trim().to_ascii_lowercase().as_str(),
                "true" | "1" | "yes" | "on"
            ),
        }
    }

    fn display_name(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}{} (or {})", self.prefix, name, name)
        }
    }
}
