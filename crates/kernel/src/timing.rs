use serde::Serialize;
use std::time::Duration;

/// Per-tick statistics. Excluded from the snapshot digest: timings vary
/// between runs even when state does not.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TickStats {
    pub preamble: Duration,
    pub parallel: Duration,
    pub postamble: Duration,
    pub units: usize,
    pub mutations_applied: usize,
    pub mutations_failed: usize,
    pub actions_applied: usize,
    pub actions_failed: usize,
    /// Work units each worker thread claimed, indexed by thread.
    pub units_per_thread: Vec<usize>,
}

impl TickStats {
    pub fn total(&self) -> Duration {
        self.preamble + self.parallel + self.postamble
    }
}

/// Rolling window of tick durations.
pub struct TickTimer {
    history: Vec<Duration>,
    capacity: usize,
    index: usize,
    filled: bool,
}

impl TickTimer {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be positive");
        Self {
            history: vec![Duration::ZERO; capacity],
            capacity,
            index: 0,
            filled: false,
        }
    }

    pub fn record(&mut self, duration: Duration) {
        self.history[self.index] = duration;
        self.index = (self.index + 1) % self.capacity;
        if self.index == 0 {
            self.filled = true;
        }
    }

    fn recorded(&self) -> &[Duration] {
        let count = if self.filled { self.capacity } else { self.index };
        &self.history[..count]
    }

    pub fn count(&self) -> usize {
        self.recorded().len()
    }

    pub fn average(&self) -> Duration {
        let recorded = self.recorded();
        if recorded.is_empty() {
            return Duration::ZERO;
        }
        recorded.iter().sum::<Duration>() / recorded.len() as u32
    }

    pub fn max(&self) -> Duration {
        self.recorded().iter().copied().max().unwrap_or_default()
    }

    /// Share of the tick budget the average tick uses.
    pub fn utilization(&self, millis_per_tick: u64) -> f64 {
        if millis_per_tick == 0 {
            return 0.0;
        }
        self.average().as_secs_f64() * 1000.0 / millis_per_tick as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer_averages_window() {
        let mut timer = TickTimer::new(3);
        timer.record(Duration::from_millis(10));
        timer.record(Duration::from_millis(20));
        timer.record(Duration::from_millis(30));
        assert_eq!(timer.count(), 3);
        assert_eq!(timer.average(), Duration::from_millis(20));
        assert_eq!(timer.max(), Duration::from_millis(30));
    }

    #[test]
    fn timer_overwrites_oldest() {
        let mut timer = TickTimer::new(2);
        timer.record(Duration::from_millis(10));
        timer.record(Duration::from_millis(20));
        timer.record(Duration::from_millis(30));
        assert_eq!(timer.count(), 2);
        assert_eq!(timer.average(), Duration::from_millis(25));
    }

    #[test]
    fn utilization_against_budget() {
        let mut timer = TickTimer::new(4);
        timer.record(Duration::from_millis(25));
        assert!((timer.utilization(50) - 0.5).abs() < 1e-9);
        assert_eq!(TickTimer::new(1).average(), Duration::ZERO);
    }
}
