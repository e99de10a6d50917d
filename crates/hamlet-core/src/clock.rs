//! The game clock and the cooperative accumulators.
//!
//! The clock is the single source of truth for game time. The host
//! feeds it real elapsed seconds every frame; the clock converts them
//! into whole game minutes which the ticker consumes strictly in order,
//! one invocation per minute, never overlapping. A second accumulator
//! paces the adaptive cognitive tick.

use hamlet_types::GameTime;

/// The simulation clock.
#[derive(Debug, Clone)]
pub struct GameClock {
    time: GameTime,
    seconds_per_game_minute: f64,
    sim_accumulator: f64,
    cognitive_accumulator: f64,
}

impl GameClock {
    /// Create a clock at the start of day 1, 06:00.
    ///
    /// A non-positive cadence falls back to one real second per game
    /// minute.
    pub fn new(seconds_per_game_minute: f64) -> Self {
        Self {
            time: GameTime::START,
            seconds_per_game_minute: if seconds_per_game_minute > 0.0 {
                seconds_per_game_minute
            } else {
                1.0
            },
            sim_accumulator: 0.0,
            cognitive_accumulator: 0.0,
        }
    }

    /// Current game time.
    pub const fn time(&self) -> GameTime {
        self.time
    }

    /// The configured cadence.
    pub const fn seconds_per_game_minute(&self) -> f64 {
        self.seconds_per_game_minute
    }

    /// Feed real elapsed seconds into both accumulators.
    pub fn accumulate(&mut self, real_dt_secs: f64) {
        if real_dt_secs > 0.0 {
            self.sim_accumulator += real_dt_secs;
            self.cognitive_accumulator += real_dt_secs;
        }
    }

    /// Whole game minutes waiting to be ticked.
    pub fn pending_minutes(&self) -> u32 {
        let pending = self.sim_accumulator / self.seconds_per_game_minute;
        if pending <= 0.0 {
            return 0;
        }
        u32::try_from(pending.floor() as i64).unwrap_or(u32::MAX)
    }

    /// Consume one pending minute, advancing game time.
    ///
    /// Returns the new time and whether a new day began. Returns `None`
    /// when no whole minute has accumulated, which keeps ticks strictly
    /// paced even if the caller polls eagerly.
    pub fn consume_minute(&mut self) -> Option<(GameTime, bool)> {
        if self.pending_minutes() == 0 {
            return None;
        }
        self.sim_accumulator -= self.seconds_per_game_minute;
        let previous_day = self.time.day;
        self.time = self.time.advance_minute();
        Some((self.time, self.time.day != previous_day))
    }

    /// Whether the cognitive accumulator has crossed `interval_secs`.
    /// Consumes the interval when it fires.
    pub fn cognitive_due(&mut self, interval_secs: f64) -> bool {
        if self.cognitive_accumulator >= interval_secs {
            self.cognitive_accumulator = 0.0;
            return true;
        }
        false
    }
}
