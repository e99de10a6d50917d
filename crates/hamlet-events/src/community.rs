//! Community events: phase-sequenced happenings that pre-empt cognition.
//!
//! A community event is a finite sequence of phases, each with a
//! wall-clock duration. While any event is active the cognitive cycle
//! processes zero agents; the host delegates to the event's per-phase
//! hooks instead. When the final phase elapses the event is destroyed
//! and normal cognition resumes.
//!
//! Phase lists come from a fixed library per event kind, or from the
//! oracle for dynamic kinds (weddings, funerals, trials...). Oracle
//! lists are normalised: a leading announce phase and a concluding phase
//! are enforced.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use hamlet_types::{CommunityEventId, CommunityEventKind, TilePos};

/// One phase of a community event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPhase {
    /// Stable phase id (`announce`, `gather`, ...).
    pub id: String,
    /// Human-readable label.
    pub label: String,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

impl EventPhase {
    /// Build a phase.
    pub fn new(id: &str, label: &str, duration_ms: u64) -> Self {
        Self {
            id: id.to_owned(),
            label: label.to_owned(),
            duration_ms,
        }
    }
}

/// What happened when the event clock was advanced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseStep {
    /// The current phase is still running.
    Running,
    /// The event advanced into a new phase.
    Advanced {
        /// The phase just entered.
        phase: EventPhase,
    },
    /// The final phase elapsed; the event is over.
    Finished,
}

/// A live community event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityEvent {
    /// Stable identifier.
    pub id: CommunityEventId,
    /// Event kind.
    pub kind: CommunityEventKind,
    /// Agent (or `"user"`) who called the event.
    pub caller: String,
    /// Free-form details from the goal or command.
    pub details: Option<String>,
    /// Where the event takes place, when known. Dangerous events with a
    /// venue repel nearby agents during the decide-and-act ladder.
    #[serde(default)]
    pub venue: Option<TilePos>,
    /// The phase sequence.
    pub phases: Vec<EventPhase>,
    /// Index of the running phase.
    current: usize,
    /// When the running phase started.
    phase_started: DateTime<Utc>,
}

impl CommunityEvent {
    /// Create an event with the library phases for its kind.
    pub fn new(kind: CommunityEventKind, caller: &str, details: Option<String>) -> Self {
        let phases = library_phases(&kind);
        Self::with_phases(kind, caller, details, phases)
    }

    /// Create an event with an explicit phase list (oracle-generated).
    ///
    /// The list is normalised: a mandatory `announce` first phase and a
    /// concluding phase are inserted when missing, and empty lists fall
    /// back to the library.
    pub fn with_phases(
        kind: CommunityEventKind,
        caller: &str,
        details: Option<String>,
        phases: Vec<EventPhase>,
    ) -> Self {
        let mut phases = if phases.is_empty() {
            library_phases(&kind)
        } else {
            phases
        };
        if phases.first().is_none_or(|p| p.id != "announce") {
            phases.insert(0, EventPhase::new("announce", "The event is announced", 10_000));
        }
        if phases.last().is_none_or(|p| p.id != "conclude") {
            phases.push(EventPhase::new("conclude", "The gathering breaks up", 15_000));
        }
        info!(kind = kind.label(), caller, phases = phases.len(), "community event starting");
        Self {
            id: CommunityEventId::new(),
            kind,
            caller: caller.to_owned(),
            details,
            venue: None,
            phases,
            current: 0,
            phase_started: Utc::now(),
        }
    }

    /// Pin the event to a venue tile.
    pub const fn with_venue(mut self, venue: TilePos) -> Self {
        self.venue = Some(venue);
        self
    }

    /// The running phase.
    pub fn current_phase(&self) -> Option<&EventPhase> {
        self.phases.get(self.current)
    }

    /// Advance the event clock. Call with the current wall time.
    pub fn step(&mut self, now: DateTime<Utc>) -> PhaseStep {
        let Some(phase) = self.phases.get(self.current) else {
            return PhaseStep::Finished;
        };
        let elapsed = now.signed_duration_since(self.phase_started);
        let duration = Duration::milliseconds(i64::try_from(phase.duration_ms).unwrap_or(i64::MAX));
        if elapsed < duration {
            return PhaseStep::Running;
        }
        self.current = self.current.saturating_add(1);
        self.phase_started = now;
        match self.phases.get(self.current) {
            Some(next) => PhaseStep::Advanced {
                phase: next.clone(),
            },
            None => PhaseStep::Finished,
        }
    }
}

/// The fixed phase library per event kind.
fn library_phases(kind: &CommunityEventKind) -> Vec<EventPhase> {
    match kind {
        CommunityEventKind::Election => vec![
            EventPhase::new("announce", "An election is called", 10_000),
            EventPhase::new("campaign", "Candidates make their case", 40_000),
            EventPhase::new("vote", "The community votes", 30_000),
            EventPhase::new("conclude", "The result is declared", 15_000),
        ],
        CommunityEventKind::Festival => vec![
            EventPhase::new("announce", "A festival is announced", 10_000),
            EventPhase::new("gather", "Everyone gathers in the square", 20_000),
            EventPhase::new("feast", "Food, music, and dancing", 60_000),
            EventPhase::new("conclude", "The festival winds down", 15_000),
        ],
        CommunityEventKind::Meeting => vec![
            EventPhase::new("announce", "A town meeting is called", 10_000),
            EventPhase::new("discuss", "Concerns are raised and debated", 45_000),
            EventPhase::new("conclude", "The meeting adjourns", 15_000),
        ],
        CommunityEventKind::Rally => vec![
            EventPhase::new("announce", "A rally is called", 10_000),
            EventPhase::new("speeches", "Speakers fire up the crowd", 40_000),
            EventPhase::new("conclude", "The crowd disperses", 15_000),
        ],
        CommunityEventKind::Protest => vec![
            EventPhase::new("announce", "A protest forms", 10_000),
            EventPhase::new("march", "The crowd marches and chants", 50_000),
            EventPhase::new("conclude", "The protest breaks up", 15_000),
        ],
        CommunityEventKind::Trial => vec![
            EventPhase::new("announce", "A trial is convened", 10_000),
            EventPhase::new("testimony", "Witnesses testify", 40_000),
            EventPhase::new("verdict", "The verdict is read", 20_000),
            EventPhase::new("conclude", "The court empties", 15_000),
        ],
        CommunityEventKind::Debate => vec![
            EventPhase::new("announce", "A public debate is set", 10_000),
            EventPhase::new("argue", "Both sides make their arguments", 45_000),
            EventPhase::new("conclude", "The audience drifts home", 15_000),
        ],
        CommunityEventKind::Gathering | CommunityEventKind::Dynamic(_) => vec![
            EventPhase::new("announce", "A gathering is announced", 10_000),
            EventPhase::new("mingle", "People talk and linger", 40_000),
            EventPhase::new("conclude", "The gathering breaks up", 15_000),
        ],
    }
}

// ---------------------------------------------------------------------------
// EventManager
// ---------------------------------------------------------------------------

/// Holds the active community events.
///
/// While any event is active, ordinary cognition is pre-empted; the host
/// checks [`is_preempting`](Self::is_preempting) before scheduling a
/// cognitive batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventManager {
    active: Vec<CommunityEvent>,
}

impl EventManager {
    /// Create a manager with no active events.
    pub const fn new() -> Self {
        Self { active: Vec::new() }
    }

    /// Start an event.
    pub fn start(&mut self, event: CommunityEvent) {
        self.active.push(event);
    }

    /// Stop and discard every active event.
    pub fn stop_all(&mut self) -> usize {
        let stopped = self.active.len();
        self.active.clear();
        stopped
    }

    /// Whether ordinary cognition is pre-empted.
    pub fn is_preempting(&self) -> bool {
        !self.active.is_empty()
    }

    /// The active events.
    pub fn active(&self) -> &[CommunityEvent] {
        &self.active
    }

    /// Advance all event clocks, destroying finished events.
    ///
    /// Returns the phase transitions that happened, for announcement.
    pub fn step(&mut self, now: DateTime<Utc>) -> Vec<(CommunityEventKind, PhaseStep)> {
        let mut transitions = Vec::new();
        self.active.retain_mut(|event| {
            let step = event.step(now);
            let finished = matches!(step, PhaseStep::Finished);
            if !matches!(step, PhaseStep::Running) {
                transitions.push((event.kind.clone(), step));
            }
            !finished
        });
        transitions
    }
}
