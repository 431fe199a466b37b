use slog::{crit, debug, error, info, o, trace, warn, Drain};
use sloggers::{
    file::FileLoggerBuilder,
    terminal::{Destination, TerminalLoggerBuilder},
    types::{Severity, SourceLocation},
    Build,
};

use crate::{
    config::{Config, LogDestination},
    error::{Error, Result},
};

/// Sink for the diagnostics emitted by the log core and its storage.
///
/// `fatal` is reserved for broken invariants: it reports the message at
/// critical level and then panics, so a replica never keeps running on a
/// corrupted log.
pub trait Logger: Send + Sync {
    fn trace(&self, s: &str);
    fn debug(&self, s: &str);
    fn info(&self, s: &str);
    fn warn(&self, s: &str);
    fn error(&self, s: &str);
    fn crit(&self, s: &str);

    fn fatal(&self, s: &str) -> ! {
        self.crit(s);
        panic!("{}", s)
    }
}

#[derive(Clone, Debug)]
pub struct Slogger {
    pub slog: slog::Logger,
}

impl Slogger {
    pub fn new(slog: slog::Logger) -> Self {
        Self { slog }
    }

    pub fn discard() -> Self {
        Self {
            slog: slog::Logger::root(slog::Discard, o!()),
        }
    }
}

impl Logger for Slogger {
    fn trace(&self, s: &str) {
        trace!(self.slog, "{}", s);
    }

    fn debug(&self, s: &str) {
        debug!(self.slog, "{}", s);
    }

    fn info(&self, s: &str) {
        info!(self.slog, "{}", s);
    }

    fn warn(&self, s: &str) {
        warn!(self.slog, "{}", s);
    }

    fn error(&self, s: &str) {
        error!(self.slog, "{}", s);
    }

    fn crit(&self, s: &str) {
        crit!(self.slog, "{}", s);
    }
}

pub(crate) fn parse_severity(level: &str) -> Option<Severity> {
    match level.to_ascii_lowercase().as_str() {
        "trace" => Some(Severity::Trace),
        "debug" => Some(Severity::Debug),
        "info" => Some(Severity::Info),
        "warn" | "warning" => Some(Severity::Warning),
        "error" => Some(Severity::Error),
        "crit" | "critical" => Some(Severity::Critical),
        _ => None,
    }
}

fn to_slog_level(severity: Severity) -> slog::Level {
    match severity {
        Severity::Trace => slog::Level::Trace,
        Severity::Debug => slog::Level::Debug,
        Severity::Info => slog::Level::Info,
        Severity::Warning => slog::Level::Warning,
        Severity::Error => slog::Level::Error,
        Severity::Critical => slog::Level::Critical,
    }
}

/// Builds the slog root described by `config`.
pub fn build_logger(config: &Config) -> Result<slog::Logger> {
    let severity = parse_severity(&config.log_level)
        .ok_or_else(|| Error::ConfigInvalid(format!("unknown log level {}", config.log_level)))?;

    let logger = match &config.log_destination {
        LogDestination::Stderr => TerminalLoggerBuilder::new()
            .level(severity)
            .destination(Destination::Stderr)
            .source_location(SourceLocation::LocalFileAndLine)
            .build()
            .map_err(|e| Error::LoggerInit(e.to_string()))?,
        LogDestination::File { path } => FileLoggerBuilder::new(path)
            .level(severity)
            .source_location(SourceLocation::LocalFileAndLine)
            .build()
            .map_err(|e| Error::LoggerInit(e.to_string()))?,
        LogDestination::StdLog => {
            let drain = slog_stdlog::StdLog
                .filter_level(to_slog_level(severity))
                .ignore_res();
            slog::Logger::root(drain, o!())
        }
        LogDestination::Discard => slog::Logger::root(slog::Discard, o!()),
    };

    Ok(logger)
}
