#![forbid(unsafe_code)]

//! Declarative binding configuration.
//!
//! A [`BindingConfig`] names the triggers and debounce timeout of a binding
//! in data rather than code, so views can be tuned without recompiling:
//!
//! ```json
//! { "triggers": ["strict", "subtree"], "timeout": { "read": 0, "write": 300 } }
//! ```
//!
//! JSON loading is always available. TOML loading requires the
//! `policy-config` feature.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;

use crate::reactive::debounce::Timeout;
use crate::reactive::trigger::{Trigger, Triggers};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    /// The JSON document could not be parsed.
    Json(serde_json::Error),
    /// The TOML document could not be parsed.
    #[cfg(feature = "policy-config")]
    Toml(toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(err) => write!(f, "invalid binding config (json): {err}"),
            #[cfg(feature = "policy-config")]
            Self::Toml(err) => write!(f, "invalid binding config (toml): {err}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Json(err) => Some(err),
            #[cfg(feature = "policy-config")]
            Self::Toml(err) => Some(err),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}

#[cfg(feature = "policy-config")]
impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        Self::Toml(err)
    }
}

/// Timeout as written in config: milliseconds, or separate read/write.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum TimeoutConfig {
    /// Same delay for reads and writes, in milliseconds.
    Uniform(u64),
    /// Independent delays, in milliseconds.
    Split {
        #[serde(default)]
        read: u64,
        #[serde(default)]
        write: u64,
    },
}

impl From<TimeoutConfig> for Timeout {
    fn from(config: TimeoutConfig) -> Self {
        match config {
            TimeoutConfig::Uniform(ms) => Timeout::uniform(Duration::from_millis(ms)),
            TimeoutConfig::Split { read, write } => {
                Timeout::split(Duration::from_millis(read), Duration::from_millis(write))
            }
        }
    }
}

/// Triggers and timeout for one binding.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BindingConfig {
    /// Directive names. Empty means `strict`.
    pub triggers: Vec<String>,
    /// Debounce timeout; absent means the binding is not debounced.
    pub timeout: Option<TimeoutConfig>,
    /// Combine triggers by first verdict instead of union.
    pub priority: bool,
}

impl BindingConfig {
    /// Parse a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Json`] if the document is malformed.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Parse a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] if the document is malformed.
    #[cfg(feature = "policy-config")]
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Resolve directive names. Unknown names warn and never match.
    #[must_use]
    pub fn triggers(&self) -> Triggers {
        let list = self.triggers.iter().map(|name| Trigger::named(name));
        if self.priority {
            Triggers::priority(list)
        } else {
            Triggers::union(list)
        }
    }

    /// Debounce timeout, if configured.
    #[must_use]
    pub fn timeout(&self) -> Option<Timeout> {
        self.timeout.map(Timeout::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::trigger::{Directive, MatchMode};

    #[test]
    fn parses_uniform_timeout() {
        let config = BindingConfig::from_json_str(r#"{ "triggers": ["tree"], "timeout": 250 }"#)
            .expect("valid config");
        assert_eq!(config.timeout(), Some(Timeout::uniform(Duration::from_millis(250))));
        assert_eq!(config.triggers(), Triggers::from(Directive::Subtree));
    }

    #[test]
    fn parses_split_timeout() {
        let config = BindingConfig::from_json_str(r#"{ "timeout": { "write": 300 } }"#)
            .expect("valid config");
        assert_eq!(
            config.timeout(),
            Some(Timeout::split(Duration::ZERO, Duration::from_millis(300)))
        );
        assert!(config.triggers().is_empty());
    }

    #[test]
    fn unknown_directive_resolves_to_unrecognized() {
        let config =
            BindingConfig::from_json_str(r#"{ "triggers": ["bogus"] }"#).expect("valid config");
        let triggers = config.triggers();
        assert!(matches!(triggers.as_slice(), [Trigger::Unrecognized(_)]));
    }

    #[test]
    fn priority_flag_sets_mode() {
        let config = BindingConfig::from_json_str(r#"{ "triggers": ["path"], "priority": true }"#)
            .expect("valid config");
        assert_eq!(config.triggers().mode(), MatchMode::Priority);
    }

    #[test]
    fn malformed_json_is_an_error() {
        let err = BindingConfig::from_json_str("{ triggers: ").unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
        assert!(err.to_string().starts_with("invalid binding config (json)"));
    }

    #[test]
    fn unknown_field_is_rejected() {
        assert!(BindingConfig::from_json_str(r#"{ "trigger": [] }"#).is_err());
    }

    #[cfg(feature = "policy-config")]
    #[test]
    fn parses_toml() {
        let config = BindingConfig::from_toml_str(
            "triggers = [\"strict\", \"deep\"]\n[timeout]\nread = 10\nwrite = 20\n",
        )
        .expect("valid config");
        assert_eq!(config.triggers().as_slice().len(), 2);
        assert_eq!(config.timeout(), Some(Timeout::from((10_u64, 20_u64))));
    }
}
