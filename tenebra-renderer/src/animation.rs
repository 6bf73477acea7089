use std::time::Duration;

/// The single authoritative animation time of a frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AnimationClock {
    time: Duration,
    paused: bool,
}

impl AnimationClock {
    pub fn time(&self) -> Duration {
        self.time
    }

    pub fn paused(&self) -> bool {
        self.paused
    }

    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }

    /// Advances by `dt * speed`, restarting from zero once past `duration`.
    pub fn advance(&mut self, dt: Duration, speed: f32, duration: Duration) {
        if self.paused {
            return;
        }

        self.time += dt.mul_f32(speed.max(0.0));

        if duration.is_zero() || self.time > duration {
            self.time = Duration::ZERO;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advances_and_wraps() {
        let mut clock = AnimationClock::default();
        let duration = Duration::from_secs(2);

        clock.advance(Duration::from_millis(1500), 1.0, duration);
        assert_eq!(clock.time(), Duration::from_millis(1500));

        clock.advance(Duration::from_millis(250), 2.0, duration);
        assert_eq!(clock.time(), Duration::from_millis(2000));

        clock.advance(Duration::from_millis(100), 1.0, duration);
        assert_eq!(clock.time(), Duration::ZERO);
    }

    #[test]
    fn paused_clock_stands_still() {
        let mut clock = AnimationClock::default();
        clock.toggle_pause();
        clock.advance(Duration::from_secs(1), 1.0, Duration::from_secs(10));

        assert!(clock.paused());
        assert_eq!(clock.time(), Duration::ZERO);
    }

    #[test]
    fn static_scenes_stay_at_zero() {
        let mut clock = AnimationClock::default();
        clock.advance(Duration::from_secs(1), 1.0, Duration::ZERO);
        assert_eq!(clock.time(), Duration::ZERO);
    }
}
