//! Channel congestion estimation
//!
//! The shared channel has no central scheduler, so the only congestion
//! signal available is how much traffic we overhear. The monitor counts
//! processed activity records between measurement ticks and converts the
//! count to a records-per-hour rate. The outbound query queue uses the
//! published value to space its transmissions, and the renderer can show
//! it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::debug;

const MILLIS_PER_HOUR: u64 = 3_600_000;

/// Rolling channel activity estimate
#[derive(Debug)]
pub struct CongestionMonitor {
    /// Activity records seen since the last measurement tick
    count: AtomicU64,
    /// Last published estimate, in records per hour
    congestion: AtomicU64,
    measurement_interval: Duration,
}

impl CongestionMonitor {
    /// Create a monitor measuring over the given interval
    pub fn new(measurement_interval: Duration) -> Self {
        Self {
            count: AtomicU64::new(0),
            congestion: AtomicU64::new(0),
            measurement_interval,
        }
    }

    /// Count one processed activity record
    ///
    /// Own transmissions count too - they occupy the channel just the
    /// same.
    pub fn record_activity(&self) {
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// The measurement period this monitor was configured with
    pub fn measurement_interval(&self) -> Duration {
        self.measurement_interval
    }

    /// Take a measurement: publish the hourly rate and reset the counter
    ///
    /// Called once per measurement interval by the scheduler.
    pub fn measure(&self) -> u64 {
        let count = self.count.swap(0, Ordering::Relaxed);
        let interval_ms = (self.measurement_interval.as_millis() as u64).max(1);
        let congestion = count * MILLIS_PER_HOUR / interval_ms;
        self.congestion.store(congestion, Ordering::Relaxed);
        debug!(count, congestion, "congestion measured");
        congestion
    }

    /// The most recently published estimate, in records per hour
    pub fn congestion(&self) -> u64 {
        self.congestion.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measurement_arithmetic() {
        // 36 records over a 10 minute window is 216 per hour
        let monitor = CongestionMonitor::new(Duration::from_millis(600_000));
        for _ in 0..36 {
            monitor.record_activity();
        }
        assert_eq!(monitor.measure(), 216);
        assert_eq!(monitor.congestion(), 216);
    }

    #[test]
    fn test_measure_resets_counter() {
        let monitor = CongestionMonitor::new(Duration::from_millis(600_000));
        monitor.record_activity();
        monitor.measure();
        assert_eq!(monitor.measure(), 0);
    }

    #[test]
    fn test_quiet_channel() {
        let monitor = CongestionMonitor::new(Duration::from_millis(600_000));
        assert_eq!(monitor.measure(), 0);
        assert_eq!(monitor.congestion(), 0);
    }
}
