//! Operation context: the settings and logger pinned for one call

use crate::config::Settings;
use crate::logging::Logger;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Cap applied to deadlines whose timeout overflows the clock (about 30 years)
pub const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// The (settings, logger) pair captured once at the start of a public call
///
/// Everything the call does reads from here, including after suspension points,
/// so a concurrent reconfigure of the client cannot change an in-flight call.
#[derive(Debug, Clone)]
pub struct OperationContext {
    settings: Arc<Settings>,
    logger: Logger,
    started: Instant,
}

impl OperationContext {
    /// Pin `settings` and `logger`, starting the clock now
    pub fn new(settings: Arc<Settings>, logger: Logger) -> Self {
        Self {
            settings,
            logger,
            started: Instant::now(),
        }
    }

    /// Pinned settings
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Pinned logger
    pub fn logger(&self) -> Logger {
        self.logger
    }

    /// When the call started
    pub fn started(&self) -> Instant {
        self.started
    }

    /// Absolute deadline for the whole job: start + configured timeout
    ///
    /// A timeout too large to represent saturates to a deadline
    /// [`FAR_FUTURE`] after the start.
    pub fn deadline(&self) -> Instant {
        self.started
            .checked_add(self.settings.timeout)
            .unwrap_or_else(|| self.started + FAR_FUTURE)
    }

    /// Time since the call started
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Time left before the deadline (zero once it has passed)
    pub fn remaining(&self) -> Duration {
        self.deadline().saturating_duration_since(Instant::now())
    }
}
