//! Registry configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// What a table build does with a declared combination no case accepts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingCasePolicy {
    /// Fail the build with `DispatchError::MissingCase`.
    #[default]
    Reject,
    /// Leave the combination out of the table; dispatching it reports an
    /// unhandled type.
    Skip,
}

impl MissingCasePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MissingCasePolicy::Reject => "reject",
            MissingCasePolicy::Skip => "skip",
        }
    }
}

impl fmt::Display for MissingCasePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MissingCasePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(MissingCasePolicy::Reject),
            "skip" => Ok(MissingCasePolicy::Skip),
            _ => Err(ConfigError::UnknownPolicy {
                value: s.to_string(),
            }),
        }
    }
}

/// Errors while loading a [`RegistryConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unknown missing-case policy '{value}' (expected 'reject' or 'skip')")]
    UnknownPolicy { value: String },

    #[error("invalid registry configuration: {message}")]
    InvalidToml { message: String },
}

/// Settings applied to every table a registry builds.
///
/// ```
/// use hierarchy_dispatch::{MissingCasePolicy, RegistryConfig};
///
/// let config = RegistryConfig::from_toml("missing_case = \"skip\"").unwrap();
/// assert_eq!(config.missing_case, MissingCasePolicy::Skip);
/// assert_eq!(RegistryConfig::from_toml("").unwrap(), RegistryConfig::default());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
    pub missing_case: MissingCasePolicy,
}

impl RegistryConfig {
    /// Environment variable read by [`RegistryConfig::from_env`].
    pub const MISSING_CASE_ENV: &'static str = "HIERARCHY_DISPATCH_MISSING_CASE";

    pub fn new(missing_case: MissingCasePolicy) -> Self {
        Self { missing_case }
    }

    /// Configuration from the process environment. Unset variables keep
    /// their defaults; unparsable values are logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Parse a TOML document such as `missing_case = "skip"`.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::InvalidToml {
            message: e.to_string(),
        })
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(value) = lookup(Self::MISSING_CASE_ENV) {
            match value.parse() {
                Ok(policy) => config.missing_case = policy,
                Err(err) => warn!(
                    variable = Self::MISSING_CASE_ENV,
                    "{err}; using '{}'",
                    config.missing_case
                ),
            }
        }
        config
    }
}
