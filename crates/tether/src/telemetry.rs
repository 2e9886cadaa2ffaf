//! Process-wide `tracing` output for programs embedding tether sessions.
//!
//! Dispatch and operation events are emitted under the `tether::dispatch`
//! and `tether::operation` targets. Nothing is printed until the embedder
//! installs a subscriber, either its own or the one built here from a
//! [`Config`].

use std::ffi::OsString;
use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tether_config::{Config, ConfigError, LogFormat};
use thiserror::Error;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

/// Format of the subscriber installed by the first successful call.
static INSTALLED: OnceCell<LogFormat> = OnceCell::new();

/// Proof that the tether subscriber is installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Telemetry {
    format: LogFormat,
}

impl Telemetry {
    /// Output format of the installed subscriber.
    #[must_use]
    pub const fn format(self) -> LogFormat {
        self.format
    }
}

/// Errors encountered while setting up telemetry.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The filter directive did not parse.
    #[error("invalid log filter '{directive}': {source}")]
    Filter {
        /// Directive as configured.
        directive: String,
        /// Parser failure.
        #[source]
        source: ParseError,
    },
    /// Another global subscriber was already installed.
    #[error("failed to install telemetry subscriber: {0}")]
    Install(#[source] TryInitError),
}

/// Installs the tether subscriber once per process.
///
/// Only the first successful call installs anything. Later calls return the
/// handle of the existing subscriber, whose format may differ from `config`.
///
/// # Examples
///
/// ```rust
/// use tether::telemetry;
/// use tether_config::{Config, LogFormat};
///
/// # fn main() -> Result<(), tether::telemetry::TelemetryError> {
/// let first = telemetry::initialise(&Config::default())?;
/// let compact = Config {
///     log_format: LogFormat::Compact,
///     ..Config::default()
/// };
/// let second = telemetry::initialise(&compact)?;
///
/// assert_eq!(second.format(), first.format());
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns [`TelemetryError::Filter`] for a malformed filter and
/// [`TelemetryError::Install`] when the embedder already installed its own
/// global subscriber.
pub fn initialise(config: &Config) -> Result<Telemetry, TelemetryError> {
    let format = INSTALLED.get_or_try_init(|| install(config))?;
    Ok(Telemetry { format: *format })
}

/// Loads [`Config`] from `args` and the `TETHER_*` environment, then
/// installs the subscriber.
///
/// # Errors
///
/// Returns [`TelemetryError::Config`] when loading fails, otherwise the
/// errors of [`initialise`].
pub fn bootstrap<I, T>(args: I) -> Result<Telemetry, TelemetryError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let config = Config::load_validated(args)?;
    initialise(&config)
}

/// Parses a filter directive without installing anything.
///
/// # Errors
///
/// Returns [`TelemetryError::Filter`] when `directive` does not parse.
pub fn build_filter(directive: &str) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(directive).map_err(|source| TelemetryError::Filter {
        directive: directive.to_owned(),
        source,
    })
}

fn install(config: &Config) -> Result<LogFormat, TelemetryError> {
    let filter = build_filter(config.log_filter())?;
    let format = config.log_format();

    let output: Box<dyn Layer<Registry> + Send + Sync> = match format {
        LogFormat::Json => fmt::layer()
            .json()
            .flatten_event(true)
            .with_ansi(false)
            .with_writer(io::stderr)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_ansi(io::stderr().is_terminal())
            .with_writer(io::stderr)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(output)
        .with(filter)
        .try_init()
        .map_err(TelemetryError::Install)?;
    Ok(format)
}
