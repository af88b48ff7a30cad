//! Shared tracing setup for the polyacc workspace.
//!
//! Backends emit `tracing` events and [`perf_span!`] timers; binaries, tests
//! and benches decide where those go by installing a subscriber through this
//! crate. Keeping the builder logic here means every entry point filters and
//! formats the same way.
//!
//! ```rust
//! use polyacc_tracing::{build_subscriber, TracingConfig};
//!
//! let config = TracingConfig::for_ci();
//! let subscriber = build_subscriber(&config).expect("valid default directives");
//! tracing::subscriber::with_default(subscriber, || {
//!     tracing::info!(device = "cpu0", "device_opened");
//! });
//! ```

pub mod performance;

#[macro_use]
pub mod macros;

use std::env;

pub use tracing::{debug, error, info, trace, warn};

use tracing::Subscriber;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt as tracing_fmt, EnvFilter, Registry};

/// Environment variable selecting the preset (`local`, `ci`, `performance`)
pub const ENV_PROFILE: &str = "POLYACC_TRACING_PROFILE";
/// Environment variable overriding the filter directives
pub const ENV_DIRECTIVES: &str = "POLYACC_TRACING_DIRECTIVES";
/// Environment variable selecting the output format
pub const ENV_FORMAT: &str = "POLYACC_TRACING_FORMAT";
/// Environment variable toggling performance spans
pub const ENV_PERF_TRACING: &str = "POLYACC_PERF_TRACING";
/// Environment variable setting the performance span threshold in microseconds
pub const ENV_PERF_THRESHOLD_US: &str = "POLYACC_PERF_THRESHOLD_US";

/// Configuration describing how the shared tracing subscriber should behave.
#[derive(Clone, Debug)]
pub struct TracingConfig {
    /// Optional tracing directives (e.g. `polyacc_backends=debug,info`). When
    /// absent the crate falls back to `RUST_LOG` and finally to
    /// [`TracingConfig::default_directive`].
    pub directives: Option<String>,
    /// Fallback directive used when neither `directives` nor `RUST_LOG`
    /// resolve to a valid filter.
    pub default_directive: String,
    /// Controls whether event targets (module paths) appear in output.
    pub include_targets: bool,
    /// Controls ANSI formatting. Disable for CI logs that strip colour codes.
    pub ansi: bool,
    /// Span lifecycle events to emit.
    pub span_events: FmtSpan,
    /// Output format for the formatter layer.
    pub output: TracingOutput,
    /// When false, performance spans are still created but never report.
    pub enable_performance_tracing: bool,
    /// Minimum duration in microseconds for a performance span to report.
    pub performance_threshold_us: Option<u64>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self::for_local()
    }
}

impl TracingConfig {
    /// Pretty, ANSI-enabled output for local development.
    pub fn for_local() -> Self {
        Self {
            directives: None,
            default_directive: "info".to_string(),
            include_targets: true,
            ansi: true,
            span_events: FmtSpan::NONE,
            output: TracingOutput::Pretty,
            enable_performance_tracing: cfg!(debug_assertions),
            performance_threshold_us: None,
        }
    }

    /// JSON without ANSI codes for CI and log collectors.
    pub fn for_ci() -> Self {
        Self {
            directives: None,
            default_directive: "info".to_string(),
            include_targets: true,
            ansi: false,
            span_events: FmtSpan::NONE,
            output: TracingOutput::Json,
            enable_performance_tracing: false,
            performance_threshold_us: None,
        }
    }

    /// JSON with span close events and debug-level backend output, for
    /// profiling launches and transfers.
    pub fn for_performance() -> Self {
        Self {
            directives: Some("polyacc_backends=debug,polyacc_tracing=debug,info".to_string()),
            default_directive: "info".to_string(),
            include_targets: true,
            ansi: false,
            span_events: FmtSpan::CLOSE,
            output: TracingOutput::Json,
            enable_performance_tracing: true,
            performance_threshold_us: None,
        }
    }

    /// Build a configuration from `POLYACC_*` environment variables.
    ///
    /// - `POLYACC_TRACING_PROFILE`: `local` (default), `ci` or `performance`
    /// - `POLYACC_TRACING_DIRECTIVES`: filter directives
    /// - `POLYACC_TRACING_FORMAT`: `pretty`, `compact` or `json`
    /// - `POLYACC_PERF_TRACING`: `true`/`1`/`yes` enables performance spans
    /// - `POLYACC_PERF_THRESHOLD_US`: minimum reported span duration
    ///
    /// Unparseable values are ignored and the preset value is kept.
    pub fn from_env() -> Self {
        let profile = env::var(ENV_PROFILE)
            .unwrap_or_else(|_| "local".to_string())
            .to_ascii_lowercase();

        let mut config = match profile.as_str() {
            "ci" => Self::for_ci(),
            "performance" => Self::for_performance(),
            _ => Self::for_local(),
        };

        if let Ok(directives) = env::var(ENV_DIRECTIVES) {
            if !directives.trim().is_empty() {
                config.directives = Some(directives);
            }
        }

        if let Some(output) = env::var(ENV_FORMAT).ok().and_then(|v| TracingOutput::from_env_value(&v)) {
            config.output = output;
            if output == TracingOutput::Json {
                config.ansi = false;
            }
        }

        if let Ok(flag) = env::var(ENV_PERF_TRACING) {
            config.enable_performance_tracing =
                matches!(flag.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes");
        }

        if let Some(threshold_us) = env::var(ENV_PERF_THRESHOLD_US).ok().and_then(|v| v.trim().parse().ok()) {
            config.performance_threshold_us = Some(threshold_us);
        }

        config
    }

    fn resolve_filter(&self) -> Result<EnvFilter, TracingSetupError> {
        match &self.directives {
            Some(directives) => {
                EnvFilter::try_new(directives).map_err(|err| TracingSetupError::InvalidFilter(err.to_string()))
            }
            None => Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.default_directive))),
        }
    }
}

/// Output format choices for the tracing formatter layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TracingOutput {
    Compact,
    Pretty,
    Json,
}

impl TracingOutput {
    fn from_env_value(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Some(Self::Compact),
            "pretty" => Some(Self::Pretty),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Subscriber setup failure
#[derive(Debug, thiserror::Error)]
pub enum TracingSetupError {
    #[error("invalid tracing directive: {0}")]
    InvalidFilter(String),
    /// A global subscriber is already installed
    #[error("failed to install global tracing subscriber: {0}")]
    SubscriberInit(#[source] tracing_subscriber::util::TryInitError),
}

/// Build a `tracing` subscriber using the provided configuration.
pub fn build_subscriber(config: &TracingConfig) -> Result<impl Subscriber + Send + Sync, TracingSetupError> {
    let (filter, fmt_layer) = subscriber_layers(config)?;
    Ok(Registry::default().with(fmt_layer).with(filter))
}

/// Build the filter and formatting layers for external composition.
pub fn subscriber_layers(
    config: &TracingConfig,
) -> Result<(EnvFilter, Box<dyn Layer<Registry> + Send + Sync>), TracingSetupError> {
    let filter = config.resolve_filter()?;
    let span_events = config.span_events.clone();

    let layer: Box<dyn Layer<Registry> + Send + Sync> = match config.output {
        TracingOutput::Compact => Box::new(
            tracing_fmt::layer()
                .compact()
                .with_target(config.include_targets)
                .with_ansi(config.ansi)
                .with_span_events(span_events),
        ),
        TracingOutput::Pretty => Box::new(
            tracing_fmt::layer()
                .pretty()
                .with_target(config.include_targets)
                .with_ansi(config.ansi)
                .with_span_events(span_events),
        ),
        TracingOutput::Json => Box::new(
            tracing_fmt::layer()
                .json()
                .with_target(config.include_targets)
                .with_span_events(span_events)
                .with_ansi(false),
        ),
    };

    Ok((filter, layer))
}

/// Install the configured subscriber as the process-wide default and apply
/// the performance span settings.
pub fn init_global_tracing(config: &TracingConfig) -> Result<(), TracingSetupError> {
    performance::configure(config.enable_performance_tracing, config.performance_threshold_us);
    build_subscriber(config)?
        .try_init()
        .map_err(TracingSetupError::SubscriberInit)
}
