//! Rolling tick-cost measurement.

use std::time::Duration;

/// Ring buffer of the last `capacity` tick durations.
#[derive(Debug, Clone)]
pub struct TickTimer {
    history: Vec<Duration>,
    index: usize,
    filled: bool,
}

impl TickTimer {
    pub fn new(capacity: usize) -> Self {
        Self {
            history: vec![Duration::ZERO; capacity.max(1)],
            index: 0,
            filled: false,
        }
    }

    pub fn record(&mut self, dt: Duration) {
        self.history[self.index] = dt;
        self.index = (self.index + 1) % self.history.len();
        if self.index == 0 {
            self.filled = true;
        }
    }

    fn samples(&self) -> &[Duration] {
        if self.filled { &self.history } else { &self.history[..self.index] }
    }

    pub fn len(&self) -> usize {
        self.samples().len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples().is_empty()
    }

    pub fn average(&self) -> Duration {
        let samples = self.samples();
        if samples.is_empty() {
            return Duration::ZERO;
        }
        samples.iter().sum::<Duration>() / samples.len() as u32
    }

    pub fn max(&self) -> Duration {
        self.samples().iter().copied().max().unwrap_or(Duration::ZERO)
    }

    /// Whether the average cost exceeds the tick length.
    pub fn is_overrunning(&self, tick: Duration) -> bool {
        self.average() > tick
    }
}

impl Default for TickTimer {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_timer_reports_zero() {
        let t = TickTimer::new(4);
        assert!(t.is_empty());
        assert_eq!(t.average(), Duration::ZERO);
        assert_eq!(t.max(), Duration::ZERO);
    }

    #[test]
    fn old_samples_roll_out() {
        let mut t = TickTimer::new(2);
        t.record(Duration::from_millis(90));
        t.record(Duration::from_millis(10));
        t.record(Duration::from_millis(30));
        assert_eq!(t.len(), 2);
        assert_eq!(t.average(), Duration::from_millis(20));
        assert_eq!(t.max(), Duration::from_millis(30));
        assert!(!t.is_overrunning(Duration::from_millis(100)));
        assert!(t.is_overrunning(Duration::from_millis(15)));
    }
}
