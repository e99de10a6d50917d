//! Property tests over the simulation's universal invariants.
//!
//! These pin the clamping guarantees: needs in [0,1], status in [0,100]
//! with wealth bounded and non-negative, skills in [0,10], symmetric
//! relationship dimensions mirrored across the pair, memory streams
//! bounded with reflections retained, inventories capped, and taxes
//! conserved into the treasury.

#![allow(clippy::unwrap_used)]

use proptest::prelude::*;

use hamlet_agents::{
    Agent, DirectedDelta, INVENTORY_CAP, Inventory, MemoryStream, RelationshipEdit, apply_pair,
    relationships::Relationship,
};
use hamlet_core::{SimConfig, Simulation, cadence, ticker};
use hamlet_types::{GameTime, MemoryKind, TilePos};

fn test_agent(name: &str) -> Agent {
    Agent::new(
        name,
        "a plain villager",
        Some("farmer".to_owned()),
        30,
        TilePos::new(0, 0),
        None,
        GameTime::START,
    )
}

proptest! {
    /// Needs stay in [0,1] under arbitrary delta sequences.
    #[test]
    fn needs_stay_clamped(deltas in proptest::collection::vec(-2.0f64..2.0, 1..50)) {
        let mut agent = test_agent("Ada");
        for delta in deltas {
            agent.state.add_need("hunger", delta);
            let value = agent.state.need("hunger");
            prop_assert!((0.0..=1.0).contains(&value));
        }
    }

    /// Status values stay in [0,100]; wealth stays non-negative and
    /// below its ceiling.
    #[test]
    fn status_stays_clamped(deltas in proptest::collection::vec(-500.0f64..500.0, 1..50)) {
        let mut agent = test_agent("Ada");
        for delta in &deltas {
            agent.state.add_status("happiness", *delta);
            agent.state.add_status("wealth", *delta);
            let happiness = agent.state.status_value("happiness");
            let wealth = agent.state.wealth();
            prop_assert!((0.0..=100.0).contains(&happiness));
            prop_assert!(wealth >= 0.0);
            prop_assert!(wealth <= hamlet_agents::WEALTH_CEILING);
        }
    }

    /// Skills stay in [0,10].
    #[test]
    fn skills_stay_clamped(deltas in proptest::collection::vec(-20.0f64..20.0, 1..50)) {
        let mut agent = test_agent("Ada");
        for delta in deltas {
            agent.state.add_skill("farming", delta);
            let value = agent.state.skill("farming");
            prop_assert!((0.0..=10.0).contains(&value));
        }
    }

    /// Paired edits keep the symmetric dimensions identical on both
    /// directed records, whatever the deltas.
    #[test]
    fn paired_edits_stay_symmetric(
        trust in -1.0f64..1.0,
        familiarity in -1.0f64..1.0,
        fwd_attraction in -1.0f64..1.0,
        rev_attraction in -1.0f64..1.0,
        edits in 1usize..20,
    ) {
        let mut forward = Relationship::default();
        let mut reverse = Relationship::default();
        let edit = RelationshipEdit {
            trust,
            familiarity,
            forward: DirectedDelta { attraction: fwd_attraction, ..DirectedDelta::default() },
            reverse: DirectedDelta { attraction: rev_attraction, ..DirectedDelta::default() },
            count_interaction: true,
        };
        for _ in 0..edits {
            apply_pair(&mut forward, &mut reverse, &edit);
            prop_assert!((forward.trust - reverse.trust).abs() < f64::EPSILON);
            prop_assert!((forward.familiarity - reverse.familiarity).abs() < f64::EPSILON);
            for value in [
                forward.trust, forward.familiarity, forward.attraction,
                reverse.trust, reverse.familiarity, reverse.attraction,
            ] {
                prop_assert!((0.0..=1.0).contains(&value));
            }
        }
        prop_assert_eq!(forward.interactions, reverse.interactions);
    }

    /// The memory stream never exceeds its cap and never drops a
    /// reflection during pruning; retrieval scores stay in [0,1].
    #[test]
    fn memory_stream_respects_cap_and_reflections(
        descriptions in proptest::collection::vec("[a-z]{3,12} [a-z]{3,12} [a-z]{3,12}", 30..80),
        reflections in 1usize..8,
        k in 1usize..10,
    ) {
        let mut stream = MemoryStream::with_capacity(40, 1.0);
        for i in 0..reflections {
            stream.add_related(
                format!("insight number {i}"),
                MemoryKind::Reflection,
                5.0,
                GameTime::START,
                Vec::new(),
            );
        }
        for description in &descriptions {
            stream.add(description.clone(), MemoryKind::Observation, 2.0, GameTime::START);
        }
        prop_assert!(stream.count() <= 40);
        prop_assert_eq!(stream.count_by_kind(MemoryKind::Reflection), reflections);

        let results = stream.retrieve("number insight", k, None);
        prop_assert_eq!(results.len(), k.min(stream.count()));
        for scored in &results {
            prop_assert!((0.0..=1.0).contains(&scored.recency));
            prop_assert!((0.0..=1.0).contains(&scored.importance));
            prop_assert!((0.0..=1.0).contains(&scored.relevance));
        }
    }

    /// Inventory total quantity never exceeds the cap.
    #[test]
    fn inventory_total_stays_capped(
        ops in proptest::collection::vec((0u32..30, proptest::bool::ANY), 1..40),
    ) {
        let mut inventory = Inventory::new();
        for (quantity, is_add) in ops {
            if is_add {
                inventory.add("bread", "food", quantity);
            } else {
                inventory.remove("bread", quantity);
            }
            prop_assert!(inventory.total() <= INVENTORY_CAP);
        }
    }

    /// Tax day conserves total wealth plus treasury.
    #[test]
    fn taxes_conserve_wealth(wealths in proptest::collection::vec(0.0f64..500.0, 1..10)) {
        let mut sim = Simulation::new(SimConfig::default(), None);
        for (i, wealth) in wealths.iter().enumerate() {
            let name = format!("agent{i}");
            sim.add_character(&name, "a villager", None, 30, TilePos::new(0, 0)).unwrap();
            sim.agent_mut(&name).unwrap().state.set_status("wealth", *wealth);
        }
        let before: f64 = sim.agents.values().map(|a| a.state.wealth()).sum::<f64>()
            + sim.world.economy.treasury;
        ticker::collect_taxes(&mut sim, GameTime::START);
        let after: f64 = sim.agents.values().map(|a| a.state.wealth()).sum::<f64>()
            + sim.world.economy.treasury;
        prop_assert!((before - after).abs() < 1e-6);
    }

    /// Rate limiting forces single-agent batches at any failure count.
    #[test]
    fn rate_limited_batches_are_singular(failures in 0u32..100) {
        prop_assert_eq!(cadence::batch_size(failures, true), 1);
        let unlimited = cadence::batch_size(failures, false);
        prop_assert!((1..=3).contains(&unlimited));
    }
}
