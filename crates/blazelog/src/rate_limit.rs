use std::thread;
use std::time::{Duration, Instant};

/// Paces a processing loop to a minimum iteration period.
///
/// `sleep` blocks for the remainder of the current period against a
/// monotonic deadline. When an iteration overruns its period the deadline
/// resets to now + period instead of accumulating debt.
#[derive(Debug)]
pub struct LoopRateLimit {
    period: Duration,
    deadline: Instant,
}

impl LoopRateLimit {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            deadline: Instant::now() + period,
        }
    }

    /// Sleeps until the current period elapses, then advances the deadline.
    pub fn sleep(&mut self) {
        let now = Instant::now();
        if now < self.deadline {
            thread::sleep(self.deadline - now);
            self.deadline += self.period;
        } else {
            self.deadline = now + self.period;
        }
    }

    /// Makes the next `sleep` return immediately.
    pub fn reset(&mut self) {
        self.deadline = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paces_iterations() {
        const PERIOD: Duration = Duration::from_millis(20);
        const ITERATIONS: u32 = 5;

        let mut limit = LoopRateLimit::new(PERIOD);
        let start = Instant::now();
        for _ in 0..ITERATIONS {
            limit.sleep();
        }

        // N sleeps cover at least N-1 full periods, scheduler jitter aside.
        assert!(start.elapsed() >= PERIOD * (ITERATIONS - 1));
    }

    #[test]
    fn overrun_resets_deadline() {
        let mut limit = LoopRateLimit::new(Duration::from_millis(5));
        thread::sleep(Duration::from_millis(20));

        // The missed periods are forgiven, not replayed.
        let start = Instant::now();
        limit.sleep();
        limit.sleep();
        assert!(start.elapsed() < Duration::from_millis(15));
    }

    #[test]
    fn reset_skips_the_wait() {
        let mut limit = LoopRateLimit::new(Duration::from_millis(50));
        limit.reset();

        let start = Instant::now();
        limit.sleep();
        assert!(start.elapsed() < Duration::from_millis(20));
    }
}
