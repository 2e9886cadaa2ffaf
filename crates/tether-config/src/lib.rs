//! Shared configuration for tether embedders.
//!
//! The configuration carries the logging
//! filter and output format consumed by the telemetry bootstrap in the
//! `tether` crate. Values start from [`Config::default`] and are layered
//! through `ortho_config`: a configuration file, `TETHER_*` environment
//! variables, then command-line flags.

mod config;
mod defaults;
mod logging;

pub use config::{Config, ConfigError, LOG_FILTER_ENV, LOG_FORMAT_ENV};
pub use defaults::{DEFAULT_LOG_FILTER, default_log_filter, default_log_format};
pub use logging::{LogFormat, LogFormatParseError};
