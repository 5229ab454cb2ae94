use chrono::Utc;
use kairos_core::Timestamp;
use kairos_ports::Clock;

/// Real system clock for production use: returns current wall-clock time.
#[derive(Debug, Default)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }

    fn name(&self) -> &str {
        "SystemClock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::thread;

    #[test]
    fn system_clock_advances() {
        let clock = SystemClock::new();
        let t1 = clock.now();
        thread::sleep(std::time::Duration::from_millis(10));
        let t2 = clock.now();
        assert!(t2 - t1 >= Duration::milliseconds(9));
    }
}
