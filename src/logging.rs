//! Per-instance log verbosity on top of `tracing`
//!
//! The crate never installs a subscriber. Events go to whatever subscriber the
//! application configured, under the `netrias_client` target, and are dropped
//! up front when they are more verbose than the owning client's [`LogLevel`].
//! Two clients in one process can therefore log at different levels.

use crate::config::LogLevel;
use tracing::Level;
use tracing::level_filters::LevelFilter;

/// Verbosity gate for one client instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Logger {
    filter: LevelFilter,
}

impl Logger {
    /// Logger admitting events at `level` or more severe
    pub fn new(level: LogLevel) -> Self {
        Self {
            filter: level.level_filter(),
        }
    }

    /// Whether an event at `level` should be emitted
    pub fn enabled(&self, level: Level) -> bool {
        level <= self.filter
    }
}

/// Emit a `tracing` event if the given [`Logger`] admits its level
///
/// ```ignore
/// log_event!(ctx.logger(), INFO, job_id = %id, "job submitted");
/// ```
macro_rules! log_event {
    ($logger:expr, $level:ident, $($arg:tt)+) => {
        if $logger.enabled(::tracing::Level::$level) {
            ::tracing::event!(target: "netrias_client", ::tracing::Level::$level, $($arg)+);
        }
    };
}

pub(crate) use log_event;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn info_logger_drops_debug() {
        let logger = Logger::new(LogLevel::Info);
        assert!(logger.enabled(Level::ERROR));
        assert!(logger.enabled(Level::INFO));
        assert!(!logger.enabled(Level::DEBUG));
    }

    #[test]
    fn critical_logger_only_admits_errors() {
        let logger = Logger::new(LogLevel::Critical);
        assert!(logger.enabled(Level::ERROR));
        assert!(!logger.enabled(Level::WARN));
    }

    #[test]
    fn debug_logger_admits_debug_but_not_trace() {
        let logger = Logger::new(LogLevel::Debug);
        assert!(logger.enabled(Level::DEBUG));
        assert!(!logger.enabled(Level::TRACE));
    }
}
