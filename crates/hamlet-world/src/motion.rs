//! The agent-motion collaborator surface.
//!
//! Cognition decides *where* an agent should go or *what* it says, but
//! never mutates pixel positions or renders speech bubbles itself. The
//! host's movement system implements [`Motion`]; the [`RecordedMotion`]
//! implementation captures commands for the headless host and tests.

use serde::{Deserialize, Serialize};

/// One motion command issued by cognition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum MotionCommand {
    /// Walk the agent to a building's door tile.
    GoToBuilding {
        /// The agent to move.
        agent: String,
        /// Target building name.
        building: String,
    },
    /// Start following another agent.
    StartFollowing {
        /// The follower.
        agent: String,
        /// The agent being followed.
        target: String,
    },
    /// Flee from a position or agent.
    FleeFrom {
        /// The fleeing agent.
        agent: String,
        /// What to flee from (agent or building name).
        threat: String,
    },
    /// Walk to a specific tile.
    WalkTo {
        /// The agent to move.
        agent: String,
        /// Target column.
        x: i32,
        /// Target row.
        y: i32,
    },
    /// Show a speech bubble.
    Say {
        /// The speaking agent.
        agent: String,
        /// The spoken text.
        text: String,
        /// Bubble duration in milliseconds (presentational only).
        duration_ms: u64,
    },
}

/// The motion surface consumed by cognition.
pub trait Motion {
    /// Walk an agent to a building's door tile.
    fn go_to_building(&mut self, agent: &str, building: &str);

    /// Start following another agent.
    fn start_following(&mut self, agent: &str, target: &str);

    /// Flee from a threat.
    fn flee_from(&mut self, agent: &str, threat: &str);

    /// Walk to a specific tile (wander targets).
    fn walk_to(&mut self, agent: &str, x: i32, y: i32);

    /// Show a speech bubble. Delays are presentational and never reorder
    /// the canonical conversation transcript.
    fn say(&mut self, agent: &str, text: &str, duration_ms: u64);
}

/// Motion implementation that records commands for later draining.
#[derive(Debug, Default)]
pub struct RecordedMotion {
    commands: Vec<MotionCommand>,
}

impl RecordedMotion {
    /// Create an empty recorder.
    pub const fn new() -> Self {
        Self {
            commands: Vec::new(),
        }
    }

    /// Commands recorded so far.
    pub fn commands(&self) -> &[MotionCommand] {
        &self.commands
    }

    /// Take all recorded commands, leaving the recorder empty.
    pub fn drain(&mut self) -> Vec<MotionCommand> {
        std::mem::take(&mut self.commands)
    }
}

impl Motion for RecordedMotion {
    fn go_to_building(&mut self, agent: &str, building: &str) {
        self.commands.push(MotionCommand::GoToBuilding {
            agent: agent.to_owned(),
            building: building.to_owned(),
        });
    }

    fn start_following(&mut self, agent: &str, target: &str) {
        self.commands.push(MotionCommand::StartFollowing {
            agent: agent.to_owned(),
            target: target.to_owned(),
        });
    }

    fn flee_from(&mut self, agent: &str, threat: &str) {
        self.commands.push(MotionCommand::FleeFrom {
            agent: agent.to_owned(),
            threat: threat.to_owned(),
        });
    }

    fn walk_to(&mut self, agent: &str, x: i32, y: i32) {
        self.commands.push(MotionCommand::WalkTo {
            agent: agent.to_owned(),
            x,
            y,
        });
    }

    fn say(&mut self, agent: &str, text: &str, duration_ms: u64) {
        self.commands.push(MotionCommand::Say {
            agent: agent.to_owned(),
            text: text.to_owned(),
            duration_ms,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorder_captures_in_order() {
        let mut motion = RecordedMotion::new();
        motion.go_to_building("Elena", "bakery");
        motion.say("Elena", "good morning", 1500);
        let drained = motion.drain();
        assert_eq!(drained.len(), 2);
        assert!(matches!(
            drained.first(),
            Some(MotionCommand::GoToBuilding { .. })
        ));
        assert!(motion.commands().is_empty());
    }

    #[test]
    fn flee_and_walk_record_their_targets() {
        let mut motion = RecordedMotion::new();
        motion.flee_from("Elena", "protest");
        motion.walk_to("Elena", 7, 3);
        let drained = motion.drain();
        assert!(matches!(
            drained.first(),
            Some(MotionCommand::FleeFrom { agent, threat })
                if agent == "Elena" && threat == "protest"
        ));
        assert!(matches!(
            drained.get(1),
            Some(MotionCommand::WalkTo { x: 7, y: 3, .. })
        ));
    }
}
