//! In-game clock.

/// Tick counter with day boundaries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GameDate {
    ticks_elapsed: u64,
    ticks_per_day: u32,
}

impl GameDate {
    /// Creates a clock at tick zero. A zero day length is treated as one.
    #[must_use]
    pub fn new(ticks_per_day: u32) -> Self {
        Self {
            ticks_elapsed: 0,
            ticks_per_day: ticks_per_day.max(1),
        }
    }

    /// Total ticks since the park opened. Never resets.
    #[must_use]
    pub const fn ticks_elapsed(&self) -> u64 {
        self.ticks_elapsed
    }

    /// Whole days since the park opened.
    #[must_use]
    pub const fn days_elapsed(&self) -> u64 {
        self.ticks_elapsed / self.ticks_per_day as u64
    }

    /// Number of ticks in one day.
    #[must_use]
    pub const fn ticks_per_day(&self) -> u32 {
        self.ticks_per_day
    }

    /// Advances one tick, returning the new day count when a day boundary is crossed.
    pub(crate) fn advance(&mut self) -> Option<u64> {
        self.ticks_elapsed += 1;
        (self.ticks_elapsed % u64::from(self.ticks_per_day) == 0).then(|| self.days_elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::GameDate;

    #[test]
    fn day_boundary_is_reported_once_per_day() {
        let mut date = GameDate::new(3);
        let boundaries: Vec<Option<u64>> = (0..7).map(|_| date.advance()).collect();
        assert_eq!(
            boundaries,
            vec![None, None, Some(1), None, None, Some(2), None]
        );
        assert_eq!(date.ticks_elapsed(), 7);
        assert_eq!(date.days_elapsed(), 2);
    }

    #[test]
    fn zero_day_length_is_clamped() {
        let mut date = GameDate::new(0);
        assert_eq!(date.ticks_per_day(), 1);
        assert_eq!(date.advance(), Some(1));
    }
}
