//! Scoped timing for the detection and mosaic stages.
//!
//! A [`TimingGuard`] measures one stage and logs the elapsed time under the
//! `anonymizer::telemetry` target when dropped. Guards stay silent unless
//! telemetry has been switched on through [`configure`] and the logger accepts
//! the requested level.

use std::{
    borrow::Cow,
    sync::atomic::{AtomicU8, Ordering},
    time::{Duration, Instant},
};

use log::{Level, LevelFilter, log, log_enabled};

/// Log target used for every telemetry record.
pub const TELEMETRY_TARGET: &str = "anonymizer::telemetry";

// 0 = disabled, otherwise the numeric `LevelFilter` ceiling.
static TELEMETRY_CEILING: AtomicU8 = AtomicU8::new(0);

/// Logs how long a stage took when it goes out of scope.
pub struct TimingGuard {
    label: Cow<'static, str>,
    level: Level,
    start: Instant,
    active: bool,
}

impl TimingGuard {
    /// Whether the guard will log on drop.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Time spent since the guard was created.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the guard without logging and return the measured time.
    pub fn finish(mut self) -> Duration {
        self.active = false;
        self.start.elapsed()
    }
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        if self.active {
            log!(
                target: TELEMETRY_TARGET,
                self.level,
                "{} took {:.2?}",
                self.label,
                self.start.elapsed()
            );
        }
    }
}

/// Start timing a stage. The guard is only active when telemetry allows `level`.
pub fn timing_guard(label: impl Into<Cow<'static, str>>, level: Level) -> TimingGuard {
    let active = telemetry_allows(level) && log_enabled!(target: TELEMETRY_TARGET, level);
    TimingGuard {
        label: label.into(),
        level,
        start: Instant::now(),
        active,
    }
}

/// Switch telemetry on or off and set the most verbose level it may emit.
pub fn configure(enabled: bool, level: LevelFilter) {
    let ceiling = if enabled { level as usize as u8 } else { 0 };
    TELEMETRY_CEILING.store(ceiling, Ordering::Relaxed);
}

/// Returns whether telemetry is currently switched on.
pub fn telemetry_enabled() -> bool {
    TELEMETRY_CEILING.load(Ordering::Relaxed) > 0
}

/// Returns `true` when telemetry is on and `level` is within the configured ceiling.
pub fn telemetry_allows(level: Level) -> bool {
    let ceiling = TELEMETRY_CEILING.load(Ordering::Relaxed);
    ceiling > 0 && (level as usize as u8) <= ceiling
}
