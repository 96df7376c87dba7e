//! Logger builder

use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, Format};
use crate::error::{LogError, LogResult};

/// Text layer (`pretty` or `compact`) with the common display options
macro_rules! create_fmt_layer {
    ($format:ident, $display:expr) => {
        tracing_subscriber::fmt::layer()
            .$format()
            .with_writer(std::io::stderr)
            .with_ansi($display.colors)
            .with_target($display.target)
            .with_file($display.source)
            .with_line_number($display.source)
            .with_thread_ids($display.thread_ids)
    };
}

/// JSON layer with the common display options
macro_rules! create_json_layer {
    ($display:expr) => {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .with_span_list($display.span_list)
            .flatten_event($display.flatten)
            .with_ansi(false)
            .with_target($display.target)
            .with_file($display.source)
            .with_line_number($display.source)
            .with_thread_ids($display.thread_ids)
    };
}

/// Builds and installs the global subscriber
#[derive(Debug)]
pub struct LoggerBuilder {
    config: Config,
}

/// Keeps the root span alive. Drop it at process exit.
#[derive(Debug)]
pub struct LoggerGuard {
    root: Option<tracing::Span>,
    #[allow(dead_code)]
    entered: Option<tracing::span::EnteredSpan>,
}

impl LoggerBuilder {
    /// Create a builder from config
    #[must_use]
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    /// Install the subscriber.
    ///
    /// # Errors
    ///
    /// - the filter directives do not parse
    /// - a global subscriber is already set
    pub fn build(self) -> LogResult<LoggerGuard> {
        let filter = EnvFilter::try_new(&self.config.level).map_err(|e| LogError::Filter {
            filter: self.config.level.clone(),
            reason: e.to_string(),
        })?;

        let display = &self.config.display;
        let registry = Registry::default().with(filter);
        let installed = match self.config.format {
            Format::Pretty => registry.with(create_fmt_layer!(pretty, display)).try_init(),
            Format::Compact => registry.with(create_fmt_layer!(compact, display)).try_init(),
            Format::Json => registry.with(create_json_layer!(display)).try_init(),
        };
        installed.map_err(|e| LogError::Init(e.to_string()))?;

        let fields = &self.config.fields;
        let root = (!fields.is_empty()).then(|| {
            tracing::info_span!(
                "keycycle",
                service = fields.service.as_deref().unwrap_or(""),
                env = fields.env.as_deref().unwrap_or(""),
                version = fields.version.as_deref().unwrap_or(""),
                region = fields.region.as_deref().unwrap_or("")
            )
        });
        let entered = root.clone().map(tracing::Span::entered);

        Ok(LoggerGuard { root, entered })
    }
}

impl LoggerGuard {
    /// Guard that installed nothing
    pub fn noop() -> Self {
        Self {
            root: None,
            entered: None,
        }
    }

    /// Root span carrying the global fields.
    ///
    /// Entered on the thread that built the logger; futures spawned onto
    /// other threads should be instrumented with it explicitly.
    pub fn root_span(&self) -> tracing::Span {
        self.root.clone().unwrap_or_else(tracing::Span::none)
    }
}
