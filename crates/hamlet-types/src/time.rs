//! Game time representation.
//!
//! Real wall-clock time and game time are distinct scales. At the default
//! cadence one real second advances the game clock by one game minute, so
//! 60 real seconds make one game hour and 1440 real seconds make one game
//! day. [`GameTime`] is the in-world timestamp stamped onto memories,
//! plans, and transactions; conversions to and from flat minute counts
//! use checked arithmetic.

use serde::{Deserialize, Serialize};

/// Number of game minutes in a game hour.
pub const MINUTES_PER_HOUR: u32 = 60;

/// Number of game hours in a game day.
pub const HOURS_PER_DAY: u32 = 24;

/// Number of game minutes in a game day.
pub const MINUTES_PER_DAY: u32 = MINUTES_PER_HOUR * HOURS_PER_DAY;

/// A point in game time: day counter plus hour and minute of day.
///
/// Days are 1-indexed (the simulation starts on day 1). Hours run 0..24
/// and minutes 0..60. Ordering is chronological.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct GameTime {
    /// Day counter, starting at 1.
    pub day: u32,
    /// Hour of day, 0..24.
    pub hour: u32,
    /// Minute of hour, 0..60.
    pub minute: u32,
}

impl GameTime {
    /// The first instant of the simulation: day 1, 06:00.
    ///
    /// Agents wake at 06:00, so new runs begin at the start of the first
    /// waking block rather than at midnight.
    pub const START: Self = Self {
        day: 1,
        hour: 6,
        minute: 0,
    };

    /// Construct a game time, normalising overflowing hours and minutes.
    pub fn new(day: u32, hour: u32, minute: u32) -> Self {
        let extra_hours = minute / MINUTES_PER_HOUR;
        let minute = minute % MINUTES_PER_HOUR;
        let hour = hour.saturating_add(extra_hours);
        let extra_days = hour / HOURS_PER_DAY;
        let hour = hour % HOURS_PER_DAY;
        Self {
            day: day.saturating_add(extra_days),
            hour,
            minute,
        }
    }

    /// Total game minutes since day 1, 00:00.
    pub fn total_minutes(self) -> u64 {
        let day_minutes =
            u64::from(self.day.saturating_sub(1)).saturating_mul(u64::from(MINUTES_PER_DAY));
        let hour_minutes = u64::from(self.hour).saturating_mul(u64::from(MINUTES_PER_HOUR));
        day_minutes
            .saturating_add(hour_minutes)
            .saturating_add(u64::from(self.minute))
    }

    /// Construct from a flat minute count since day 1, 00:00.
    pub fn from_total_minutes(total: u64) -> Self {
        let day = total / u64::from(MINUTES_PER_DAY);
        let rem = total % u64::from(MINUTES_PER_DAY);
        let hour = rem / u64::from(MINUTES_PER_HOUR);
        let minute = rem % u64::from(MINUTES_PER_HOUR);
        // Values are bounded by the modulo arithmetic above; day is capped
        // at u32::MAX which is ~8000 simulated years.
        Self {
            day: u32::try_from(day.saturating_add(1)).unwrap_or(u32::MAX),
            hour: u32::try_from(hour).unwrap_or(0),
            minute: u32::try_from(minute).unwrap_or(0),
        }
    }

    /// Advance by one game minute, rolling hours and days as needed.
    pub fn advance_minute(self) -> Self {
        Self::from_total_minutes(self.total_minutes().saturating_add(1))
    }

    /// Game minutes elapsed from `earlier` to `self` (saturating at zero).
    pub fn minutes_since(self, earlier: Self) -> u64 {
        self.total_minutes().saturating_sub(earlier.total_minutes())
    }

    /// Game hours elapsed from `earlier` to `self`, as a fraction.
    pub fn hours_since(self, earlier: Self) -> f64 {
        self.minutes_since(earlier) as f64 / f64::from(MINUTES_PER_HOUR)
    }

    /// Whether this time falls in the night window (22:00–06:00).
    pub const fn is_night(self) -> bool {
        self.hour >= 22 || self.hour < 6
    }

    /// Minute-of-day (0..1440), used by plan resolution.
    pub const fn minute_of_day(self) -> u32 {
        self.hour
            .saturating_mul(MINUTES_PER_HOUR)
            .saturating_add(self.minute)
    }

    /// Format as `HH:MM` for plan entries and dialogue context.
    pub fn clock_label(self) -> String {
        format!("{:02}:{:02}", self.hour, self.minute)
    }
}

impl Default for GameTime {
    fn default() -> Self {
        Self::START
    }
}

impl core::fmt::Display for GameTime {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "day {} {:02}:{:02}", self.day, self.hour, self.minute)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn normalises_overflow() {
        let t = GameTime::new(1, 23, 125);
        assert_eq!(t.day, 2);
        assert_eq!(t.hour, 1);
        assert_eq!(t.minute, 5);
    }

    #[test]
    fn round_trips_through_total_minutes() {
        let t = GameTime::new(3, 14, 37);
        assert_eq!(GameTime::from_total_minutes(t.total_minutes()), t);
    }

    #[test]
    fn advance_rolls_over_midnight() {
        let t = GameTime::new(1, 23, 59).advance_minute();
        assert_eq!(t, GameTime::new(2, 0, 0));
    }

    #[test]
    fn hours_since_is_fractional() {
        let earlier = GameTime::new(1, 6, 0);
        let later = GameTime::new(1, 7, 30);
        assert!((later.hours_since(earlier) - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn night_window_wraps_midnight() {
        assert!(GameTime::new(1, 23, 0).is_night());
        assert!(GameTime::new(2, 3, 0).is_night());
        assert!(!GameTime::new(1, 12, 0).is_night());
        assert!(GameTime::new(1, 22, 0).is_night());
        assert!(!GameTime::new(1, 6, 0).is_night());
    }

    #[test]
    fn ordering_is_chronological() {
        assert!(GameTime::new(1, 22, 0) < GameTime::new(2, 6, 0));
        assert!(GameTime::new(2, 5, 0) < GameTime::new(2, 5, 1));
    }
}
