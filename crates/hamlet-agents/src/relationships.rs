//! Directed relationship records and the paired-edit primitive.
//!
//! Relationships are bidirectional by construction but stored twice, one
//! record per direction, inside each agent. There is no global edge set.
//! The only supported mutation is the paired edit: trust and familiarity
//! (the symmetric dimensions) receive the same clamped delta on both
//! records in one call, while attraction, respect, fear, and rivalry may
//! differ per direction. Labels are recomputed from the numerics by a
//! fixed ladder after every edit.

use serde::{Deserialize, Serialize};

/// Familiarity lost per tick to drift.
const DRIFT_FAMILIARITY: f64 = 0.0005;

/// Trust lost per tick to drift, applied only above the floor.
const DRIFT_TRUST: f64 = 0.0002;

/// Trust floor below which drift stops eroding.
const DRIFT_TRUST_FLOOR: f64 = 0.3;

/// One direction of a relationship between two agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    /// Trust in the other agent. Symmetric.
    pub trust: f64,
    /// Romantic attraction toward the other agent. Asymmetric.
    pub attraction: f64,
    /// Respect for the other agent.
    pub respect: f64,
    /// How well the agents know each other. Symmetric.
    pub familiarity: f64,
    /// Fear of the other agent.
    pub fear: f64,
    /// Rivalry with the other agent.
    pub rivalry: f64,
    /// Number of recorded interactions.
    pub interactions: u64,
    /// Human-readable label derived from the numerics.
    pub label: String,
}

impl Default for Relationship {
    fn default() -> Self {
        let mut rel = Self {
            trust: 0.3,
            attraction: 0.0,
            respect: 0.3,
            familiarity: 0.0,
            fear: 0.0,
            rivalry: 0.0,
            interactions: 0,
            label: String::new(),
        };
        rel.relabel();
        rel
    }
}

impl Relationship {
    /// Recompute the label from the numeric dimensions.
    ///
    /// The ladder is fixed and order-sensitive: hostile readings win over
    /// warm ones, romance over plain friendship.
    pub fn relabel(&mut self) {
        self.label = derive_label(self).to_owned();
    }

    /// Apply per-tick drift: familiarity fades, and trust erodes slowly
    /// while it is above the floor.
    pub fn drift(&mut self) {
        self.familiarity = (self.familiarity - DRIFT_FAMILIARITY).clamp(0.0, 1.0);
        if self.trust > DRIFT_TRUST_FLOOR {
            self.trust = (self.trust - DRIFT_TRUST).clamp(0.0, 1.0);
        }
        self.relabel();
    }
}

/// The fixed label ladder.
fn derive_label(rel: &Relationship) -> &'static str {
    if rel.rivalry > 0.6 {
        "rival"
    } else if rel.fear > 0.6 {
        "feared"
    } else if rel.attraction > 0.7 && rel.trust > 0.6 {
        "romantic interest"
    } else if rel.trust > 0.7 && rel.familiarity > 0.6 {
        "close friend"
    } else if rel.trust > 0.45 && rel.familiarity > 0.3 {
        "friend"
    } else if rel.familiarity > 0.15 {
        "acquaintance"
    } else {
        "stranger"
    }
}

/// Per-direction deltas for the asymmetric dimensions.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DirectedDelta {
    /// Attraction delta for this direction.
    pub attraction: f64,
    /// Respect delta for this direction.
    pub respect: f64,
    /// Fear delta for this direction.
    pub fear: f64,
    /// Rivalry delta for this direction.
    pub rivalry: f64,
}

/// A complete paired edit.
///
/// `trust` and `familiarity` apply identically to both directions;
/// `forward` applies to the initiator's record of the target and
/// `reverse` to the target's record of the initiator.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RelationshipEdit {
    /// Symmetric trust delta.
    pub trust: f64,
    /// Symmetric familiarity delta.
    pub familiarity: f64,
    /// Asymmetric deltas on the initiator's record.
    pub forward: DirectedDelta,
    /// Asymmetric deltas on the target's record.
    pub reverse: DirectedDelta,
    /// Whether to count an interaction on both records.
    pub count_interaction: bool,
}

impl RelationshipEdit {
    /// A social touch: small familiarity gain plus an interaction count.
    pub fn touch(familiarity: f64) -> Self {
        Self {
            familiarity,
            count_interaction: true,
            ..Self::default()
        }
    }
}

/// Apply a paired edit atomically to both directions of an edge.
///
/// Never observe only one side: callers resolve both records first, so
/// the edit either happens to both or to neither. Every dimension is
/// clamped into [0,1] and both labels are recomputed.
pub fn apply_pair(forward: &mut Relationship, reverse: &mut Relationship, edit: &RelationshipEdit) {
    for rel in [&mut *forward, &mut *reverse] {
        rel.trust = (rel.trust + edit.trust).clamp(0.0, 1.0);
        rel.familiarity = (rel.familiarity + edit.familiarity).clamp(0.0, 1.0);
        if edit.count_interaction {
            rel.interactions = rel.interactions.saturating_add(1);
        }
    }
    apply_directed(forward, edit.forward);
    apply_directed(reverse, edit.reverse);
    forward.relabel();
    reverse.relabel();
}

/// Apply one direction's asymmetric deltas.
fn apply_directed(rel: &mut Relationship, delta: DirectedDelta) {
    rel.attraction = (rel.attraction + delta.attraction).clamp(0.0, 1.0);
    rel.respect = (rel.respect + delta.respect).clamp(0.0, 1.0);
    rel.fear = (rel.fear + delta.fear).clamp(0.0, 1.0);
    rel.rivalry = (rel.rivalry + delta.rivalry).clamp(0.0, 1.0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_relationship_is_a_stranger() {
        let rel = Relationship::default();
        assert_eq!(rel.label, "stranger");
    }

    #[test]
    fn paired_edit_keeps_symmetric_dimensions_equal() {
        let mut forward = Relationship::default();
        let mut reverse = Relationship::default();
        let edit = RelationshipEdit {
            trust: 0.2,
            familiarity: 0.4,
            forward: DirectedDelta {
                attraction: 0.5,
                ..DirectedDelta::default()
            },
            reverse: DirectedDelta::default(),
            count_interaction: true,
        };
        apply_pair(&mut forward, &mut reverse, &edit);
        assert!((forward.trust - reverse.trust).abs() < f64::EPSILON);
        assert!((forward.familiarity - reverse.familiarity).abs() < f64::EPSILON);
        assert!(forward.attraction > reverse.attraction);
        assert_eq!(forward.interactions, 1);
        assert_eq!(reverse.interactions, 1);
    }

    #[test]
    fn edits_clamp_into_unit_range() {
        let mut forward = Relationship::default();
        let mut reverse = Relationship::default();
        let edit = RelationshipEdit {
            trust: 5.0,
            familiarity: -5.0,
            ..RelationshipEdit::default()
        };
        apply_pair(&mut forward, &mut reverse, &edit);
        assert!((forward.trust - 1.0).abs() < f64::EPSILON);
        assert!(forward.familiarity.abs() < f64::EPSILON);
    }

    #[test]
    fn label_ladder_order() {
        let mut rel = Relationship {
            rivalry: 0.7,
            attraction: 0.9,
            trust: 0.9,
            familiarity: 0.9,
            ..Relationship::default()
        };
        rel.relabel();
        assert_eq!(rel.label, "rival");

        rel.rivalry = 0.0;
        rel.relabel();
        assert_eq!(rel.label, "romantic interest");

        rel.attraction = 0.0;
        rel.relabel();
        assert_eq!(rel.label, "close friend");
    }

    #[test]
    fn drift_stops_eroding_trust_at_floor() {
        let mut rel = Relationship {
            trust: 0.3,
            familiarity: 0.5,
            ..Relationship::default()
        };
        rel.drift();
        assert!((rel.trust - 0.3).abs() < f64::EPSILON);
        assert!(rel.familiarity < 0.5);
    }
}
