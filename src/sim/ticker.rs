//! Frame clock
//!
//! The host calls `tick()` once per display frame; the callback fires every
//! `interval` frames while `playing` is set. The host owns `playing`.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticker {
    pub interval: u32,
    pub playing: bool,
    counter: u64,
}

impl Ticker {
    pub fn new(interval: u32) -> Self {
        Self {
            interval: interval.max(1),
            playing: false,
            counter: 0,
        }
    }

    /// Frames counted while playing
    pub fn frames(&self) -> u64 {
        self.counter
    }

    /// Advance one display frame, returning whether the callback fired
    pub fn tick<F: FnOnce()>(&mut self, callback: F) -> bool {
        if !self.playing {
            return false;
        }
        self.counter += 1;
        if self.counter % u64::from(self.interval.max(1)) == 0 {
            callback();
            return true;
        }
        false
    }
}

impl Default for Ticker {
    fn default() -> Self {
        Self::new(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paused_ticker_never_fires() {
        let mut ticker = Ticker::new(1);
        let mut fired = 0;
        for _ in 0..5 {
            ticker.tick(|| fired += 1);
        }
        assert_eq!(fired, 0);
        assert_eq!(ticker.frames(), 0);
    }

    #[test]
    fn test_fires_every_interval() {
        let mut ticker = Ticker::new(3);
        ticker.playing = true;
        let mut fired = 0;
        for _ in 0..9 {
            ticker.tick(|| fired += 1);
        }
        assert_eq!(fired, 3);
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let mut ticker = Ticker::new(0);
        ticker.playing = true;
        assert!(ticker.tick(|| {}));
        ticker.interval = 0;
        assert!(ticker.tick(|| {}));
    }
}
