//! End-to-end scenario tests for the simulation core.
//!
//! Each test stages a small world, drives the relevant subsystem the
//! way the host would, and checks the externally visible outcome.

#![allow(clippy::unwrap_used)]

use chrono::{Duration as ChronoDuration, Utc};

use hamlet_core::{CognitiveCycle, SimConfig, Simulation, consequence, cycle, ticker};
use hamlet_events::{CommunityEvent, EventPhase};
use hamlet_oracle::{Backend, Oracle, ScriptedBackend};
use hamlet_types::{CommunityEventKind, GameTime, MemoryKind, TilePos};
use hamlet_world::{GridWorld, RecordedMotion};

fn offline_oracle() -> Oracle {
    Oracle::with_backend(Backend::Offline).unwrap()
}

fn seeded_sim(names: &[(&str, &str, i32, i32)]) -> Simulation {
    let mut sim = Simulation::new(SimConfig::default(), None);
    for (name, personality, x, y) in names {
        sim.add_character(name, personality, Some("farmer".to_owned()), 30, TilePos::new(*x, *y))
            .unwrap();
    }
    sim
}

// ---------------------------------------------------------------------------
// Scenario: starvation resolves through the eat goal
// ---------------------------------------------------------------------------

#[tokio::test]
async fn starving_agent_eats_within_one_cycle() {
    let mut sim = seeded_sim(&[("Elena", "a quiet baker", 5, 5)]);
    sim.world.resources.insert("food".to_owned(), 50.0);
    {
        let elena = sim.agent_mut("Elena").unwrap();
        elena.state.set_need("hunger", 0.95);
        elena.state.set_status("wealth", 10.0);
    }

    let oracle = offline_oracle();
    let map = GridWorld::new(40, 40);
    let mut motion = RecordedMotion::new();
    let mut cognition = CognitiveCycle::new();
    cognition
        .run_agent(&mut sim, "Elena", &oracle, &map, &mut motion)
        .await;

    let elena = sim.agent("Elena").unwrap();
    assert!(elena.state.need("hunger") <= 0.25);
    assert!(elena.state.wealth() <= 7.5);
    assert!((sim.world.resource("food") - 49.0).abs() < 1e-9);
}

// ---------------------------------------------------------------------------
// Scenario: mutual flirting forms a partnership the whole village hears
// ---------------------------------------------------------------------------

#[test]
fn mutual_flirting_broadcasts_a_partnership() {
    let mut sim = seeded_sim(&[
        ("Ada", "a warm, romantic weaver", 5, 5),
        ("Bram", "a passionate, romantic farmer", 6, 5),
        ("Mira", "a curious bystander", 20, 20),
    ]);
    let time = sim.game_time();
    let mut world = std::mem::take(&mut sim.world);
    {
        let (ada, bram) = sim.two_agents_mut("Ada", "Bram").unwrap();
        ada.state.relationship_mut("Bram").attraction = 0.65;
        ada.state.relationship_mut("Bram").trust = 0.65;
        bram.state.relationship_mut("Ada").attraction = 0.65;
        bram.state.relationship_mut("Ada").trust = 0.65;

        consequence::apply_builtin("flirt", ada, Some(bram), &mut world, time).unwrap();
        assert!(ada.state.partner.is_none());
        let outcome =
            consequence::apply_builtin("flirt", bram, Some(ada), &mut world, time).unwrap();
        assert_eq!(ada.state.partner.as_deref(), Some("Bram"));
        assert_eq!(bram.state.partner.as_deref(), Some("Ada"));
        for change in outcome.world_changes {
            sim.pending_world_changes.push_back(change);
        }
    }
    sim.world = world;
    sim.drain_world_changes();

    // Every agent's knowledge set records the pairing.
    for agent in sim.agents.values() {
        assert!(
            agent
                .state
                .knowledge
                .facts()
                .iter()
                .any(|f| f.contains("Ada") && f.contains("Bram") && f.contains("partners")),
            "{} did not hear the news",
            agent.state.name
        );
    }
}

// ---------------------------------------------------------------------------
// Scenario: the reflection trigger fires and writes cited insights
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reflection_fires_after_twenty_weighty_observations() {
    let mut sim = seeded_sim(&[("Elena", "a quiet baker", 5, 5)]);
    {
        let elena = sim.agent_mut("Elena").unwrap();
        for i in 0..20u32 {
            let hour = 6 + (i / 10);
            elena.memory.add(
                format!("observation {i} from the market square"),
                MemoryKind::Observation,
                6.0,
                GameTime::new(1, hour, (i % 10) * 6),
            );
        }
        assert!(elena.reflection.should_reflect(&elena.memory));
    }

    let questions = r#"{"questions": ["What drives Elena?", "Who matters to her?", "What changed?"]}"#;
    let insights = r#"{"insights": [
        {"text": "Elena's days orbit the market", "memory_indices": [1], "importance": 6},
        {"text": "She notices everything", "memory_indices": [2, 3], "importance": 5},
        {"text": "Routine anchors her", "memory_indices": [4], "importance": 5}
    ]}"#;
    // One questions response, then one insights response per question.
    let oracle = Oracle::with_backend(Backend::Scripted(ScriptedBackend::new(vec![
        questions, insights, insights, insights,
    ])))
    .unwrap();

    let elena = sim.agent_mut("Elena").unwrap();
    let hamlet_agents::Agent {
        reflection, memory, state, ..
    } = elena;
    let written = reflection
        .reflect(&state.name, memory, &oracle, GameTime::new(1, 8, 0))
        .await;
    assert!(written >= 3);
    assert!(memory.count_by_kind(MemoryKind::Reflection) >= 3);
    for entry in memory.entries().iter().filter(|e| e.kind == MemoryKind::Reflection) {
        assert!(!entry.related_ids.is_empty());
    }
    assert!(!reflection.should_reflect(memory));
}

// ---------------------------------------------------------------------------
// Scenario: gossip diffuses through a conversation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn gossip_reaches_the_listener_with_reduced_importance() {
    let mut sim = seeded_sim(&[
        ("Ada", "a warm weaver", 5, 5),
        ("Bram", "a friendly farmer", 6, 5),
    ]);
    let time = sim.game_time();
    sim.agent_mut("Ada")
        .unwrap()
        .state
        .knowledge
        .add_hot_topic("fire at the bakery", 7.0, time);

    let turn = |text: &str, end: bool| {
        serde_json::json!({"text": text, "topic": "the fire", "bond": "neutral", "end": end})
            .to_string()
    };
    let oracle = Oracle::with_backend(Backend::Scripted(ScriptedBackend::new(vec![
        turn("Did you hear about the bakery fire?", false),
        turn("No! When did this happen?", true),
    ])))
    .unwrap();

    let mut engine = hamlet_core::ConversationEngine::new();
    let (ada, bram) = sim.two_agents_mut("Ada", "Bram").unwrap();
    let outcome = engine.run(ada, bram, &oracle, time).await;

    let received = bram
        .state
        .knowledge
        .topics()
        .iter()
        .find(|t| t.text == "fire at the bakery")
        .expect("topic did not diffuse");
    assert!((received.importance - 6.0).abs() < f64::EPSILON);
    assert!(
        ada.state
            .knowledge
            .topics()
            .iter()
            .find(|t| t.text == "fire at the bakery")
            .unwrap()
            .spread_to
            .contains("Bram")
    );
    assert!(
        outcome
            .info_flows
            .iter()
            .any(|f| f.from == "Ada" && f.to == "Bram" && f.topic == "fire at the bakery")
    );
}

// ---------------------------------------------------------------------------
// Scenario: community events pre-empt cognition, then release it
// ---------------------------------------------------------------------------

#[test]
fn community_event_preempts_and_releases_the_cycle() {
    let mut sim = seeded_sim(&[
        ("Ada", "a weaver", 5, 5),
        ("Bram", "a farmer", 6, 5),
        ("Mira", "a scholar", 7, 5),
        ("Otto", "a merchant", 8, 5),
    ]);
    let oracle = offline_oracle();
    let mut cognition = CognitiveCycle::new();

    assert_eq!(cognition.select_batch(&sim, &oracle).len(), 3);

    sim.events.start(CommunityEvent::with_phases(
        CommunityEventKind::Festival,
        "user",
        None,
        vec![
            EventPhase::new("announce", "a festival!", 0),
            EventPhase::new("conclude", "all done", 0),
        ],
    ));
    assert!(cognition.select_batch(&sim, &oracle).is_empty());

    // Let both zero-length phases elapse.
    let later = Utc::now() + ChronoDuration::seconds(1);
    sim.events.step(later);
    sim.events.step(later + ChronoDuration::seconds(1));
    assert!(!sim.events.is_preempting());
    assert_eq!(cognition.select_batch(&sim, &oracle).len(), 3);
}

// ---------------------------------------------------------------------------
// Scenario: a frozen world field resists the ticker until expiry
// ---------------------------------------------------------------------------

#[test]
fn frozen_food_pin_expires_into_normal_updates() {
    let mut sim = seeded_sim(&[
        ("Ada", "a weaver", 5, 5),
        ("Bram", "a farmer", 6, 5),
    ]);
    // No production: only the population drain moves food.
    sim.world.technology.insert("farming".to_owned(), 0.0);
    sim.pin_world_resource("food", 500.0);

    for _ in 0..10 {
        ticker::run_one_tick(&mut sim, GameTime::new(1, 7, 0));
    }
    assert!((sim.world.resource("food") - 500.0).abs() < f64::EPSILON);

    // Force the freeze to expire, then tick once more.
    sim.world
        .frozen
        .freeze_until("resources.food", Utc::now() - ChronoDuration::seconds(1));
    ticker::run_one_tick(&mut sim, GameTime::new(1, 7, 11));
    let expected = 500.0 - 0.025 * f64::from(sim.world.population);
    assert!((sim.world.resource("food") - expected).abs() < 1e-9);
}

// ---------------------------------------------------------------------------
// Scenario: awareness events land in memory before the next cycle
// ---------------------------------------------------------------------------

#[test]
fn ticker_events_route_before_the_next_borrow() {
    let mut sim = seeded_sim(&[("Ada", "a weaver", 5, 5)]);
    {
        let ada = sim.agent_mut("Ada").unwrap();
        ada.state.set_need("hunger", 0.9);
        ada.state.frozen.freeze_for("needs.hunger", 3600);
    }
    let events = ticker::run_one_tick(&mut sim, GameTime::new(1, 7, 0));
    sim.pending_events.extend(events);
    cycle::route_events(&mut sim);

    let ada = sim.agent("Ada").unwrap();
    assert!(
        ada.memory
            .entries()
            .iter()
            .any(|e| e.description.contains("stomach aches"))
    );
}

// ---------------------------------------------------------------------------
// Scenario: leadership flows through the deferred change queue
// ---------------------------------------------------------------------------

#[test]
fn become_leader_installs_governance_via_the_queue() {
    let mut sim = seeded_sim(&[
        ("Ada", "an ambitious weaver", 5, 5),
        ("Bram", "a farmer", 6, 5),
    ]);
    let time = sim.game_time();
    let mut world = std::mem::take(&mut sim.world);
    {
        let ada = sim.agent_mut("Ada").unwrap();
        let outcome =
            consequence::apply_builtin("become_leader", ada, None, &mut world, time).unwrap();
        for change in outcome.world_changes {
            sim.pending_world_changes.push_back(change);
        }
    }
    sim.world = world;
    sim.drain_world_changes();

    assert_eq!(sim.world.governance.leader.as_deref(), Some("Ada"));
    assert!(
        sim.agent("Bram")
            .unwrap()
            .state
            .knowledge
            .facts()
            .iter()
            .any(|f| f.contains("Ada") && f.contains("leads"))
    );
    assert!(sim.pending_world_changes.is_empty());
}
