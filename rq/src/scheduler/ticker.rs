//! Rate ticker and run-state lifecycle

use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tracing::debug;

/// Longest tick period we arm; slower rates are clamped to it
const MAX_PERIOD: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Dispatch rate
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rate {
    /// No timer; dispatch as fast as the concurrency limit allows
    Unbounded,

    /// Target dispatches per second
    PerSecond(f64),
}

impl Rate {
    /// Build a rate from requests per second. `f64::INFINITY` is unbounded;
    /// NaN and non-positive values are rejected.
    pub fn new(requests_per_second: f64) -> Option<Self> {
        if requests_per_second.is_nan() || requests_per_second <= 0.0 {
            return None;
        }
        if requests_per_second.is_infinite() {
            return Some(Rate::Unbounded);
        }
        Some(Rate::PerSecond(requests_per_second))
    }

    /// Tick period, or `None` when dispatch should happen eagerly
    pub fn period(&self) -> Option<Duration> {
        match self {
            Rate::Unbounded => None,
            Rate::PerSecond(rps) => {
                let period = Duration::try_from_secs_f64(1.0 / rps)
                    .map(|p| p.min(MAX_PERIOD))
                    .unwrap_or(MAX_PERIOD);
                // Rates too fast for the clock resolution behave as unbounded
                (!period.is_zero()).then_some(period)
            }
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            Rate::Unbounded => f64::INFINITY,
            Rate::PerSecond(rps) => *rps,
        }
    }
}

/// Owns the repeating timer and the running flag.
///
/// At most one `Interval` exists at a time: every rebuild drops the previous
/// one before arming the next, so there is never more than one tick stream.
#[derive(Debug)]
pub struct RateTicker {
    rate: Rate,
    interval: Option<Interval>,
    running: bool,
}

impl RateTicker {
    pub fn new(rate: Rate) -> Self {
        Self {
            rate,
            interval: None,
            running: false,
        }
    }

    pub fn rate(&self) -> Rate {
        self.rate
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// True when there is no timer and dispatch should follow every event
    pub fn is_eager(&self) -> bool {
        self.rate.period().is_none()
    }

    /// Begin ticking at the current rate. Returns false if already running.
    pub fn start(&mut self) -> bool {
        if self.running {
            debug!("RateTicker::start: already running");
            return false;
        }
        self.arm();
        self.running = true;
        debug!(rate = ?self.rate, "RateTicker::start: started");
        true
    }

    /// Halt ticking. Returns false if already stopped.
    pub fn stop(&mut self) -> bool {
        if !self.running {
            return false;
        }
        self.interval = None;
        self.running = false;
        debug!("RateTicker::stop: stopped");
        true
    }

    /// Change the rate; a running ticker is rebuilt at the new period immediately
    pub fn set_rate(&mut self, rate: Rate) {
        debug!(old = ?self.rate, new = ?rate, running = self.running, "RateTicker::set_rate: called");
        self.rate = rate;
        if self.running {
            self.interval = None;
            self.arm();
        }
    }

    /// Wait for the next tick. Pends forever while stopped or eager.
    pub async fn tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }

    fn arm(&mut self) {
        self.interval = self.rate.period().map(|period| {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    #[test]
    fn test_rate_new() {
        assert_eq!(Rate::new(f64::INFINITY), Some(Rate::Unbounded));
        assert_eq!(Rate::new(2.5), Some(Rate::PerSecond(2.5)));
        assert_eq!(Rate::new(0.0), None);
        assert_eq!(Rate::new(-3.0), None);
        assert_eq!(Rate::new(f64::NAN), None);
    }

    #[test]
    fn test_rate_period() {
        assert_eq!(Rate::Unbounded.period(), None);
        assert_eq!(Rate::PerSecond(4.0).period(), Some(Duration::from_millis(250)));
        assert_eq!(Rate::PerSecond(0.5).period(), Some(Duration::from_secs(2)));
        assert_eq!(Rate::PerSecond(1e-300).period(), Some(MAX_PERIOD));
        assert_eq!(Rate::PerSecond(1e300).period(), None);
    }

    #[test]
    fn test_rate_as_f64() {
        assert_eq!(Rate::Unbounded.as_f64(), f64::INFINITY);
        assert_eq!(Rate::PerSecond(20.0).as_f64(), 20.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_after_one_period() {
        let mut ticker = RateTicker::new(Rate::PerSecond(10.0));
        assert!(ticker.start());
        assert!(ticker.is_running());

        assert!(timeout(Duration::from_millis(99), ticker.tick()).await.is_err());
        assert!(timeout(Duration::from_millis(2), ticker.tick()).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent() {
        let mut ticker = RateTicker::new(Rate::PerSecond(1.0));
        assert!(ticker.start());
        assert!(!ticker.start());
        assert!(ticker.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_ticker_never_fires() {
        let mut ticker = RateTicker::new(Rate::PerSecond(100.0));
        ticker.start();
        assert!(ticker.stop());
        assert!(!ticker.stop());
        assert!(!ticker.is_running());

        assert!(timeout(Duration::from_secs(60), ticker.tick()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_rate_rebuilds_running_ticker() {
        let mut ticker = RateTicker::new(Rate::PerSecond(1.0));
        ticker.start();

        ticker.set_rate(Rate::PerSecond(10.0));
        assert!(ticker.is_running());
        assert!(timeout(Duration::from_millis(101), ticker.tick()).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_rate_while_stopped_only_stores() {
        let mut ticker = RateTicker::new(Rate::PerSecond(1.0));
        ticker.set_rate(Rate::PerSecond(30.0));
        assert!(!ticker.is_running());
        assert_eq!(ticker.rate(), Rate::PerSecond(30.0));
        assert!(timeout(Duration::from_secs(5), ticker.tick()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_is_eager_without_timer() {
        let mut ticker = RateTicker::new(Rate::Unbounded);
        assert!(ticker.is_eager());
        ticker.start();
        assert!(ticker.is_running());
        assert!(timeout(Duration::from_secs(5), ticker.tick()).await.is_err());
    }
}
