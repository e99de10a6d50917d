//! Three-level plan hierarchy: day, hour, and detailed actions.
//!
//! Each level is a cache keyed by the "latest entry whose start is at or
//! before now" of its parent. Regeneration after a reaction preserves
//! entries already begun, replaces the remainder, and invalidates both
//! sub-level caches. When the oracle is out of reach a fixed ten-slot
//! default plan keyed by occupation stands in.

use serde::{Deserialize, Serialize};

use hamlet_types::GameTime;

/// One plan entry at any level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanEntry {
    /// When the entry begins.
    pub start: GameTime,
    /// Duration in game minutes.
    pub duration_minutes: u32,
    /// Free-text activity.
    pub activity: String,
    /// Building name, or `"outdoors"`.
    pub location: String,
    /// Object touched by a detailed action, if any.
    pub object: Option<String>,
}

impl PlanEntry {
    /// Build an entry without an object reference.
    pub fn new(
        start: GameTime,
        duration_minutes: u32,
        activity: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            start,
            duration_minutes,
            activity: activity.into(),
            location: location.into(),
            object: None,
        }
    }
}

/// A cached sub-level decomposition, keyed by the parent entry's start.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct SubLevel {
    /// Minute-of-day key of the parent entry this cache decomposes.
    parent_key: Option<u32>,
    /// The decomposed entries.
    entries: Vec<PlanEntry>,
}

impl SubLevel {
    fn clear(&mut self) {
        self.parent_key = None;
        self.entries.clear();
    }
}

/// The full plan state for one agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanHierarchy {
    /// Daily plan entries (5-8 blocks from 06:00 to 22:00).
    daily: Vec<PlanEntry>,
    /// The day the daily plan was generated for.
    daily_day: Option<u32>,
    /// Hourly decomposition of the active daily block.
    hourly: SubLevel,
    /// Detailed decomposition of the active hourly block.
    detailed: SubLevel,
}

impl PlanHierarchy {
    /// Create an empty hierarchy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the daily plan needs (re)generation for `day`.
    pub fn is_daily_stale(&self, day: u32) -> bool {
        self.daily.is_empty() || self.daily_day != Some(day)
    }

    /// Install a fresh daily plan, clearing both sub-level caches.
    pub fn set_daily(&mut self, entries: Vec<PlanEntry>, day: u32) {
        self.daily = entries;
        self.daily
            .sort_by_key(|e| e.start.total_minutes());
        self.daily_day = Some(day);
        self.hourly.clear();
        self.detailed.clear();
    }

    /// The daily plan, in start order.
    pub fn daily(&self) -> &[PlanEntry] {
        &self.daily
    }

    /// The active daily block: latest entry whose start is at or before
    /// `now`.
    pub fn current_daily(&self, now: GameTime) -> Option<&PlanEntry> {
        latest_started(&self.daily, now)
    }

    /// Whether the hourly cache decomposes the currently-active daily
    /// block.
    pub fn hourly_fresh(&self, now: GameTime) -> bool {
        match self.current_daily(now) {
            Some(parent) => self.hourly.parent_key == Some(parent.start.minute_of_day()),
            None => false,
        }
    }

    /// Install an hourly decomposition for the active daily block.
    ///
    /// A stale parent (no longer active) is ignored.
    pub fn set_hourly(&mut self, entries: Vec<PlanEntry>, now: GameTime) {
        if let Some(parent) = self.current_daily(now) {
            let key = parent.start.minute_of_day();
            self.hourly.parent_key = Some(key);
            self.hourly.entries = entries;
            self.hourly
                .entries
                .sort_by_key(|e| e.start.total_minutes());
            self.detailed.clear();
        }
    }

    /// The active hourly block, when its cache is fresh.
    pub fn current_hourly(&self, now: GameTime) -> Option<&PlanEntry> {
        if !self.hourly_fresh(now) {
            return None;
        }
        latest_started(&self.hourly.entries, now)
    }

    /// Whether the detailed cache decomposes the active hourly block.
    pub fn detailed_fresh(&self, now: GameTime) -> bool {
        match self.current_hourly(now) {
            Some(parent) => self.detailed.parent_key == Some(parent.start.minute_of_day()),
            None => false,
        }
    }

    /// Install a detailed decomposition for the active hourly block.
    pub fn set_detailed(&mut self, entries: Vec<PlanEntry>, now: GameTime) {
        if let Some(parent) = self.current_hourly(now) {
            let key = parent.start.minute_of_day();
            self.detailed.parent_key = Some(key);
            self.detailed.entries = entries;
            self.detailed
                .entries
                .sort_by_key(|e| e.start.total_minutes());
        }
    }

    /// The active detailed action, when its cache is fresh.
    pub fn current_detailed(&self, now: GameTime) -> Option<&PlanEntry> {
        if !self.detailed_fresh(now) {
            return None;
        }
        latest_started(&self.detailed.entries, now)
    }

    /// The finest available plan entry for `now`: detailed, then hourly,
    /// then daily.
    pub fn finest(&self, now: GameTime) -> Option<&PlanEntry> {
        self.current_detailed(now)
            .or_else(|| self.current_hourly(now))
            .or_else(|| self.current_daily(now))
    }

    /// Replace the rest of the day after a reaction.
    ///
    /// Entries already begun (start before `now`) survive; the remainder
    /// is replaced by `tail`. Both sub-level caches are invalidated.
    pub fn regenerate_after_reaction(&mut self, now: GameTime, tail: Vec<PlanEntry>) {
        self.daily
            .retain(|e| e.start.total_minutes() < now.total_minutes());
        self.daily.extend(tail);
        self.daily.sort_by_key(|e| e.start.total_minutes());
        self.hourly.clear();
        self.detailed.clear();
    }
}

/// Latest entry whose start is at or before `now`.
fn latest_started(entries: &[PlanEntry], now: GameTime) -> Option<&PlanEntry> {
    entries
        .iter()
        .filter(|e| e.start.total_minutes() <= now.total_minutes())
        .max_by_key(|e| e.start.total_minutes())
}

// ---------------------------------------------------------------------------
// Offline default plan
// ---------------------------------------------------------------------------

/// The fixed ten-slot default day, keyed by occupation.
///
/// Used whenever plan generation has no oracle to lean on.
pub fn default_daily_plan(day: u32, occupation: Option<&str>) -> Vec<PlanEntry> {
    let workplace = occupation_workplace(occupation);
    let work = occupation.map_or_else(
        || "keeping busy around the village".to_owned(),
        |o| format!("working as {o}"),
    );

    let slot = |hour: u32, minutes: u32, activity: &str, location: &str| {
        PlanEntry::new(GameTime::new(day, hour, 0), minutes, activity, location)
    };

    vec![
        slot(6, 60, "waking up and having breakfast", "home"),
        slot(7, 120, &work, workplace),
        slot(9, 180, &work, workplace),
        slot(12, 60, "having lunch", "home"),
        slot(13, 120, &work, workplace),
        slot(15, 120, "running errands at the market", "market"),
        slot(17, 120, "visiting friends", "outdoors"),
        slot(19, 60, "having dinner", "home"),
        slot(20, 120, "relaxing by the fire", "home"),
        slot(22, 480, "sleeping", "home"),
    ]
}

/// Workplace building for an occupation.
fn occupation_workplace(occupation: Option<&str>) -> &'static str {
    match occupation {
        Some("farmer") => "farm",
        Some("baker") => "bakery",
        Some("merchant") => "market",
        Some("scholar" | "scientist" | "scribe") => "library",
        Some("healer") => "clinic",
        Some("blacksmith") => "forge",
        _ => "outdoors",
    }
}
