//! Fixed-interval tick scheduler for Twotter.
//!
//! Drives periodic work (the server's status broadcast and expiry sweep)
//! on a steady cadence, with overrun detection and a few counters for
//! diagnostics. A tick that fires late forgets the intervals it missed and
//! schedules the next one a full interval out, so a stalled runtime never
//! produces a burst of catch-up ticks.
//!
//! # Disabled mode
//!
//! When `interval` is `None`, [`TickScheduler::wait_for_tick`] pends
//! forever. That lets a caller keep the scheduler in a `tokio::select!`
//! loop unconditionally and switch maintenance off through configuration.
//!
//! # Integration
//!
//! ```ignore
//! loop {
//!     let info = scheduler.wait_for_tick().await;
//!     run_maintenance(&state).await;
//!     scheduler.record_tick_end();
//! }
//! ```

use std::time::Duration;

use rand::Rng;
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Stand-in deadline for intervals too large to add to the clock.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `now + delay`, saturating at a deadline decades away instead of
/// panicking on overflow.
pub fn deadline_after(now: Instant, delay: Duration) -> Instant {
    now.checked_add(delay).unwrap_or_else(|| now + FAR_FUTURE)
}

/// Full configuration for the tick scheduler.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Time between ticks. `None` disables ticking.
    pub interval: Option<Duration>,
    /// Fraction of the interval (0.0–1.0) a tick's work may take before a
    /// warning is logged. Default: 0.5.
    pub budget_warn_threshold: f64,
    /// Upper bound of random delay added to the first tick only, so several
    /// servers started together do not broadcast in lockstep.
    pub initial_jitter: Duration,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            interval: None,
            budget_warn_threshold: 0.5,
            initial_jitter: Duration::ZERO,
        }
    }
}

impl TickConfig {
    /// A config ticking every `interval` with default settings.
    pub fn every(interval: Duration) -> Self {
        Self {
            interval: Some(interval),
            ..Default::default()
        }
    }

    /// Fix out-of-range values. Called by [`TickScheduler::new`].
    ///
    /// - A zero interval would spin; it is treated as disabled.
    /// - `budget_warn_threshold` is clamped to `0.0..=1.0`.
    pub fn validated(mut self) -> Self {
        if self.interval == Some(Duration::ZERO) {
            warn!("tick interval of zero disables ticking");
            self.interval = None;
        }
        self.budget_warn_threshold = self.budget_warn_threshold.clamp(0.0, 1.0);
        self
    }
}

// ---------------------------------------------------------------------------
// Tick info
// ---------------------------------------------------------------------------

/// Information about a tick, returned by [`TickScheduler::wait_for_tick`].
#[derive(Debug, Clone)]
pub struct TickInfo {
    /// Monotonically increasing tick number (starts at 1).
    pub tick: u64,
    /// `true` if this tick fired more than 10% of an interval late.
    pub overrun: bool,
    /// Whole intervals that passed without a tick.
    pub ticks_skipped: u64,
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Counters updated as the scheduler runs.
#[derive(Debug, Clone, Default)]
pub struct TickMetrics {
    pub total_ticks: u64,
    pub total_overruns: u64,
    pub total_skipped: u64,
    /// Longest work time reported through
    /// [`TickScheduler::record_tick_end`].
    pub max_tick_time: Duration,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Fixed-interval tick scheduler.
pub struct TickScheduler {
    config: TickConfig,
    tick_count: u64,
    next_tick: Option<Instant>,
    /// Set by `wait_for_tick`, consumed by `record_tick_end`.
    tick_start: Option<Instant>,
    metrics: TickMetrics,
}

impl TickScheduler {
    /// Create a new scheduler. The first tick is one interval (plus jitter)
    /// from now.
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();

        let next_tick = config.interval.map(|interval| {
            let jitter = if config.initial_jitter.is_zero() {
                Duration::ZERO
            } else {
                let max_us = config.initial_jitter.as_micros() as u64;
                Duration::from_micros(rand::rng().random_range(0..max_us.max(1)))
            };
            deadline_after(Instant::now(), interval.saturating_add(jitter))
        });

        match config.interval {
            None => debug!("tick scheduler created disabled"),
            Some(interval) => debug!(
                interval_ms = interval.as_millis() as u64,
                "tick scheduler created"
            ),
        }

        Self {
            config,
            tick_count: 0,
            next_tick,
            tick_start: None,
            metrics: TickMetrics::default(),
        }
    }

    /// A scheduler ticking every `interval` with default settings.
    pub fn every(interval: Duration) -> Self {
        Self::new(TickConfig::every(interval))
    }

    /// Wait until the next tick is due.
    ///
    /// Pends forever when disabled.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let (next, interval) = match (self.next_tick, self.config.interval) {
            (Some(next), Some(interval)) => (next, interval),
            _ => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        };

        time::sleep_until(next).await;

        let now = Instant::now();
        self.tick_count += 1;
        self.tick_start = Some(now);

        let late_by = now.saturating_duration_since(next);
        let overrun = late_by > interval / 10;
        let mut ticks_skipped = 0u64;

        if overrun {
            ticks_skipped = (late_by.as_nanos() / interval.as_nanos()) as u64;
            if ticks_skipped > 0 {
                warn!(
                    tick = self.tick_count,
                    skipped = ticks_skipped,
                    late_ms = late_by.as_millis() as u64,
                    "tick overrun, skipping ahead"
                );
            }
        }
        self.next_tick = Some(deadline_after(now, interval));

        if overrun {
            self.metrics.total_overruns += 1;
        }
        self.metrics.total_skipped += ticks_skipped;
        self.metrics.total_ticks += 1;

        trace!(tick = self.tick_count, overrun, "tick fired");

        TickInfo {
            tick: self.tick_count,
            overrun,
            ticks_skipped,
        }
    }

    /// Record that the work for the current tick has finished.
    ///
    /// Updates timing metrics and warns when the work took more than
    /// `budget_warn_threshold` of the interval. A call without a preceding
    /// tick is ignored.
    pub fn record_tick_end(&mut self) {
        let Some(start) = self.tick_start.take() else {
            return;
        };
        let elapsed = start.elapsed();

        if elapsed > self.metrics.max_tick_time {
            self.metrics.max_tick_time = elapsed;
        }

        if let Some(interval) = self.config.interval {
            let utilization = elapsed.as_secs_f64() / interval.as_secs_f64();
            if utilization >= self.config.budget_warn_threshold {
                warn!(
                    tick = self.tick_count,
                    elapsed_ms = elapsed.as_millis() as u64,
                    interval_ms = interval.as_millis() as u64,
                    "tick work is taking a large share of the interval"
                );
            }
        }
    }

    /// Whether ticking is switched off (`interval` is `None`).
    pub fn is_disabled(&self) -> bool {
        self.config.interval.is_none()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn metrics(&self) -> &TickMetrics {
        &self.metrics
    }

    pub fn interval(&self) -> Option<Duration> {
        self.config.interval
    }
}
