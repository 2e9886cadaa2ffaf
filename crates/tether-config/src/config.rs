//! Configuration model and layered loading.

use std::ffi::OsString;
use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::defaults::{default_log_filter, default_log_format};
use crate::logging::LogFormat;

/// Environment variable overriding [`Config::log_filter`].
pub const LOG_FILTER_ENV: &str = "TETHER_LOG_FILTER";

/// Environment variable overriding [`Config::log_format`].
pub const LOG_FORMAT_ENV: &str = "TETHER_LOG_FORMAT";

/// Settings shared by everything embedding a tether session.
///
/// Values merge from defaults, an optional configuration file, `TETHER_*`
/// environment variables, and command-line flags, in increasing precedence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "TETHER")]
pub struct Config {
    /// `tracing` filter directive applied to emitted events.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    /// Output format for emitted events.
    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Loads every layer from `args` and the process environment, then
    /// validates the merged result.
    ///
    /// The first element of `args` is the program name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] when a layer cannot be read or merged and
    /// [`ConfigError::EmptyLogFilter`] when the merged filter is blank.
    pub fn load_validated<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let config = Self::load_from_iter(args).map_err(|source| ConfigError::Load { source })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks invariants the loader cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyLogFilter`] when the filter is blank.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.log_filter.trim().is_empty() {
            return Err(ConfigError::EmptyLogFilter);
        }
        Ok(())
    }

    /// Filter directive used to build the subscriber's `EnvFilter`.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Output format selected for telemetry.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }
}

/// Errors raised while assembling a [`Config`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration layer failed to load or merge.
    #[error("failed to load configuration: {source}")]
    Load {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// The merged log filter was blank.
    #[error("log filter must not be empty")]
    EmptyLogFilter,
}
