//! The research export: a JSON dump of the run for offline analysis.
//!
//! The export is an output artefact, not an input contract. It bundles
//! simulation metadata, per-agent state, the conversation log, the
//! relationship network as nodes and edges, emergent phenomena, the
//! information-flow log, and the world state.

use serde_json::{Value, json};

use hamlet_core::Simulation;
use hamlet_oracle::Oracle;

/// Build the export structure from the live simulation.
pub fn build_export(sim: &Simulation, oracle: &Oracle) -> Value {
    let cost = oracle.cost_summary();

    let agents: Vec<Value> = sim
        .agents
        .values()
        .map(|agent| {
            json!({
                "name": agent.state.name,
                "personality": agent.state.personality,
                "occupation": agent.state.occupation,
                "age": agent.state.age,
                "life_stage": agent.state.life_stage(),
                "pos": agent.state.pos,
                "needs": agent.state.needs,
                "traits": agent.state.traits,
                "skills": agent.state.skills,
                "status": agent.state.status,
                "partner": agent.state.partner,
                "children": agent.state.children,
                "inventory": agent.state.inventory.items(),
                "memory_count": agent.memory.count(),
                "hot_topics": agent.state.knowledge.topics(),
                "knowledge": agent.state.knowledge.facts(),
                "current_activity": agent.state.current_activity,
            })
        })
        .collect();

    let nodes: Vec<Value> = sim
        .agents
        .keys()
        .map(|name| json!({"id": name}))
        .collect();
    let edges: Vec<Value> = sim
        .agents
        .iter()
        .flat_map(|(name, agent)| {
            agent.state.relationships.iter().map(move |(other, rel)| {
                json!({
                    "from": name,
                    "to": other,
                    "label": rel.label,
                    "trust": rel.trust,
                    "attraction": rel.attraction,
                    "respect": rel.respect,
                    "familiarity": rel.familiarity,
                    "fear": rel.fear,
                    "rivalry": rel.rivalry,
                    "interactions": rel.interactions,
                })
            })
        })
        .collect();

    json!({
        "simulation": {
            "game_time": sim.game_time().to_string(),
            "day": sim.world.day,
            "population": sim.world.population,
            "oracle_calls": cost.total_calls,
            "oracle_cost": cost.total_estimated_cost.to_string(),
        },
        "agents": agents,
        "conversation_log": sim.log.conversations,
        "relationship_network": {"nodes": nodes, "edges": edges},
        "emergent_phenomena": sim.log.phenomena,
        "information_flow": sim.log.info_flows,
        "world_state": {
            "resources": sim.world.resources,
            "technology": sim.world.technology,
            "economy": sim.world.economy,
            "governance": sim.world.governance,
            "environment": sim.world.environment,
            "cultural_beliefs": sim.world.cultural_beliefs,
            "building_condition": sim.world.building_condition,
        },
    })
}
