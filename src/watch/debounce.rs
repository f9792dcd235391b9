use std::time::{Duration, Instant};

/// Trailing-edge debounce timer.
///
/// Every `schedule` pushes the deadline out to `now + window` and cancels the
/// run scheduled before it, so a burst produces exactly one firing.
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    deadline: Option<Instant>,
    canceled: u64,
    fired: u64,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
            canceled: 0,
            fired: 0,
        }
    }

    pub fn schedule(&mut self, now: Instant) {
        if self.deadline.is_some() {
            self.canceled += 1;
        }
        self.deadline = Some(now + self.window);
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Fire if the deadline has passed.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                self.fired += 1;
                true
            }
            _ => false,
        }
    }

    /// Drop the pending run without firing it.
    pub fn cancel(&mut self) {
        if self.deadline.take().is_some() {
            self.canceled += 1;
        }
    }

    /// Runs superseded or dropped before they fired.
    pub fn canceled(&self) -> u64 {
        self.canceled
    }

    pub fn fired(&self) -> u64 {
        self.fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_fires_once() {
        let mut d = Debouncer::new(Duration::from_millis(200));
        let t0 = Instant::now();

        d.schedule(t0);
        d.schedule(t0 + Duration::from_millis(100));
        d.schedule(t0 + Duration::from_millis(150));
        assert!(!d.poll(t0 + Duration::from_millis(300)));
        assert!(d.poll(t0 + Duration::from_millis(350)));
        assert!(!d.poll(t0 + Duration::from_millis(900)));

        assert_eq!(d.fired(), 1);
        assert_eq!(d.canceled(), 2);
    }

    #[test]
    fn test_cancel() {
        let mut d = Debouncer::new(Duration::from_millis(10));
        let t0 = Instant::now();
        d.cancel();
        assert_eq!(d.canceled(), 0);

        d.schedule(t0);
        d.cancel();
        assert!(!d.is_pending());
        assert!(!d.poll(t0 + Duration::from_secs(1)));
        assert_eq!(d.canceled(), 1);
    }
}
