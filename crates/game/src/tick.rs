use std::time::{Duration, Instant};

/// Fixed-rate tick clock for the synchronisation loop.
pub struct TickClock {
    tick_rate: u32,
    interval: Duration,
    accumulator: Duration,
    last: Instant,
}

impl TickClock {
    pub fn new(tick_rate: u32) -> Self {
        let tick_rate = tick_rate.max(1);
        Self {
            tick_rate,
            interval: Duration::from_secs(1) / tick_rate,
            accumulator: Duration::ZERO,
            last: Instant::now(),
        }
    }

    pub fn tick_rate(&self) -> u32 {
        self.tick_rate
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Adds elapsed wall time, capped so a long stall does not cause a burst
    /// of catch-up ticks.
    pub fn accumulate(&mut self, delta: Duration) {
        self.accumulator += delta.min(Duration::from_millis(250));
    }

    /// Accumulates the time since the previous call.
    pub fn update(&mut self) {
        let now = Instant::now();
        self.accumulate(now - self.last);
        self.last = now;
    }

    pub fn consume_tick(&mut self) -> bool {
        if self.accumulator >= self.interval {
            self.accumulator -= self.interval;
            true
        } else {
            false
        }
    }

    /// Time left until the next tick is due.
    pub fn until_next(&self) -> Duration {
        self.interval.saturating_sub(self.accumulator)
    }

    pub fn reset(&mut self) {
        self.accumulator = Duration::ZERO;
        self.last = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_clock_accumulation() {
        let mut clock = TickClock::new(20);

        clock.accumulate(Duration::from_millis(100));
        assert!(clock.consume_tick());
        assert!(clock.consume_tick());
        assert!(!clock.consume_tick());
    }

    #[test]
    fn tick_clock_caps_stalls() {
        let mut clock = TickClock::new(20);
        clock.accumulate(Duration::from_secs(5));

        let mut ticks = 0;
        while clock.consume_tick() {
            ticks += 1;
        }
        assert_eq!(ticks, 5);
    }

    #[test]
    fn tick_clock_until_next() {
        let mut clock = TickClock::new(10);
        clock.accumulate(Duration::from_millis(40));
        assert_eq!(clock.until_next(), Duration::from_millis(60));
    }
}
