//! Default configuration values.

use crate::logging::LogFormat;

/// Default log filter expression.
///
/// Dispatch and operation events from this library at `info`, everything else
/// at `warn`.
pub const DEFAULT_LOG_FILTER: &str = "warn,tether::dispatch=info,tether::operation=info";

/// Owned default log filter, used by serde when the field is absent.
#[must_use]
pub fn default_log_filter() -> String {
    String::from(DEFAULT_LOG_FILTER)
}

/// Default logging format.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}
