//! Bounded polling for asynchronous deletions.
//!
//! GitLab can acknowledge a group deletion while an immediate read still
//! returns the group untouched. Callers re-issue a probe until it reports
//! the resource gone or marked for deletion, or until a wall-clock deadline
//! elapses.

use crate::error::{Error, Result};
use std::thread;
use std::time::{Duration, Instant};

/// Default time to wait for a deletion to become visible.
pub const DEFAULT_DELETION_TIMEOUT: Duration = Duration::from_secs(15);

/// What a single probe observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// The lookup returned 404.
    Gone,
    /// The resource is still readable but carries a deletion marker.
    MarkedForDeletion,
    /// The resource is still fully live.
    Present,
}

impl Observation {
    /// Whether polling can stop.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Present)
    }
}

/// Polling configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Deadline measured from the first probe.
    pub timeout: Duration,
    /// Pause between probes. Zero re-issues immediately.
    pub interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_DELETION_TIMEOUT,
            interval: Duration::ZERO,
        }
    }
}

impl PollConfig {
    /// Create a config with the given deadline and no pause between probes.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Default::default()
        }
    }

    /// Set the pause between probes.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// Callback trait for poll progress notifications.
pub trait PollCallback {
    /// Called after a probe that saw the resource still present.
    fn on_still_present(&self, attempt: u32, elapsed: Duration);
}

/// Callback that logs at debug level.
pub struct LogCallback;

impl PollCallback for LogCallback {
    fn on_still_present(&self, attempt: u32, elapsed: Duration) {
        log::debug!(
            "probe {} after {}ms: resource still present, polling again",
            attempt,
            elapsed.as_millis()
        );
    }
}

/// Re-issue `probe` until it observes a terminal condition.
///
/// Returns the terminal observation, the first probe error unchanged, or
/// [`Error::DeadlineExceeded`] when the deadline elapses with the resource
/// still present. The probe always runs at least once.
pub fn wait_for_deletion<F>(
    config: &PollConfig,
    what: &str,
    callback: Option<&dyn PollCallback>,
    mut probe: F,
) -> Result<Observation>
where
    F: FnMut() -> Result<Observation>,
{
    let start = Instant::now();
    let mut attempt: u32 = 0;

    loop {
        attempt = attempt.saturating_add(1);

        let observation = probe()?;
        if observation.is_terminal() {
            log::debug!("{what}: {observation:?} after {attempt} probe(s)");
            return Ok(observation);
        }

        let elapsed = start.elapsed();
        if elapsed >= config.timeout {
            return Err(Error::DeadlineExceeded {
                what: what.to_string(),
                waited: elapsed,
            });
        }

        if let Some(cb) = callback {
            cb.on_still_present(attempt, elapsed);
        }

        if !config.interval.is_zero() {
            thread::sleep(config.interval.min(config.timeout - elapsed));
        }
    }
}
