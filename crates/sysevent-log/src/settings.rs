//! Tunables for one system log queue and its flush worker.

use std::time::Duration;

/// Default queue bound. Large enough that producers never hit it in normal
/// operation.
pub const DEFAULT_CAPACITY: usize = 1_048_576;

/// Default period between opportunistic flushes.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(7_500);

/// Queue capacity and worker wake thresholds, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogSettings {
    capacity: usize,
    flush_interval: Duration,
    flush_threshold: usize,
}

impl LogSettings {
    /// Builds settings with the proactive flush threshold at half capacity.
    ///
    /// A zero capacity is raised to one so the queue can always hold at least
    /// the record that triggers a flush.
    pub fn new(capacity: usize, flush_interval: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            flush_interval,
            flush_threshold: default_threshold(capacity),
        }
    }

    /// Overrides the buffered count at which `add` requests a flush on its
    /// own. Zero restores the default (half capacity); values above capacity
    /// are clamped.
    pub fn with_flush_threshold(mut self, threshold: usize) -> Self {
        self.flush_threshold = if threshold == 0 {
            default_threshold(self.capacity)
        } else {
            threshold.min(self.capacity)
        };
        self
    }

    /// Maximum number of buffered records.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// How long the idle worker sleeps before persisting whatever is buffered.
    pub fn flush_interval(&self) -> Duration {
        self.flush_interval
    }

    /// Buffered count that triggers a proactive flush request.
    pub fn flush_threshold(&self) -> usize {
        self.flush_threshold
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_FLUSH_INTERVAL)
    }
}

fn default_threshold(capacity: usize) -> usize {
    (capacity / 2).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_defaults_to_half_capacity() {
        let settings = LogSettings::new(10, Duration::from_secs(1));
        assert_eq!(settings.flush_threshold(), 5);

        let tiny = LogSettings::new(1, Duration::from_secs(1));
        assert_eq!(tiny.flush_threshold(), 1);
    }

    #[test]
    fn zero_capacity_is_raised() {
        let settings = LogSettings::new(0, Duration::from_secs(1));
        assert_eq!(settings.capacity(), 1);
    }

    #[test]
    fn threshold_override_is_clamped() {
        let settings = LogSettings::new(8, Duration::from_secs(1)).with_flush_threshold(100);
        assert_eq!(settings.flush_threshold(), 8);

        let reset = settings.with_flush_threshold(0);
        assert_eq!(reset.flush_threshold(), 4);
    }
}
