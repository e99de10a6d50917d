//! Turn-by-turn conversations between two agents.
//!
//! A conversation briefly owns both participants (their mode is set to
//! talking), alternates oracle-generated lines under an adaptive turn
//! budget, then settles the aftermath: transcripts into both memory
//! streams, a bond-driven relationship edit, hot-topic diffusion with
//! info-flow records, and cooldowns so the same pair does not chat in a
//! loop. With no oracle a small library of context-shaped templates
//! produces the lines instead; everything downstream is identical.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::{debug, warn};

use hamlet_agents::{Agent, AgentMode, DirectedDelta, RelationshipEdit, apply_pair};
use hamlet_events::{ConversationLine, ConversationRecord};
use hamlet_oracle::{GenerateOptions, Oracle, field_bool, field_str};
use hamlet_types::{BondShift, GameTime, InfoFlow, MemoryKind};

/// Per-agent cooldown on initiating conversations, in seconds.
const INITIATOR_COOLDOWN_SECS: i64 = 10;

/// Per-pair cooldown, in seconds.
const PAIR_COOLDOWN_SECS: i64 = 60;

/// Base probability of initiating.
const BASE_PROBABILITY: f64 = 0.3;

/// Probability when the pair already knows each other well.
const FAMILIAR_PROBABILITY: f64 = 0.5;

/// Interaction count above which the pair counts as familiar.
const FAMILIAR_INTERACTIONS: u64 = 3;

/// Bonus probability when the initiator holds undiscussed hot topics.
const HOT_TOPIC_BONUS: f64 = 0.3;

/// Default turn budget.
const TURNS_DEFAULT: usize = 8;

/// Turn budget after 1-3 recent oracle failures.
const TURNS_DEGRADED: usize = 4;

/// Turn budget after more than 3 recent oracle failures.
const TURNS_MINIMAL: usize = 2;

/// Conversation aborts after this many in-conversation failures.
const ABORT_FAILURES: u32 = 2;

/// Topics diffused per side per conversation.
const TOPICS_PER_SIDE: usize = 2;

/// Memories retrieved per side for context.
const CONTEXT_MEMORIES: usize = 5;

/// Words marking hunger/rest chatter that is filtered from context to
/// keep conversations off the monothematic survival loop.
const FILTERED_WORDS: &[&str] = &["hunger", "hungry", "starving", "tired", "sleep", "rest"];

/// The result of one conversation.
#[derive(Debug, Clone)]
pub struct ConversationOutcome {
    /// Lines in speech order.
    pub lines: Vec<ConversationLine>,
    /// The dominant topic tag.
    pub topic: String,
    /// How the bond shifted.
    pub bond: BondShift,
    /// Whether the offline template library produced the lines.
    pub offline: bool,
    /// Topic diffusion edges recorded.
    pub info_flows: Vec<InfoFlow>,
}

impl ConversationOutcome {
    /// Package the outcome as a research-log record.
    pub fn into_record(
        self,
        initiator: &str,
        partner: &str,
        game_time: GameTime,
    ) -> (ConversationRecord, Vec<InfoFlow>) {
        (
            ConversationRecord {
                initiator: initiator.to_owned(),
                partner: partner.to_owned(),
                lines: self.lines,
                topic: self.topic,
                bond: self.bond,
                offline: self.offline,
                game_time,
            },
            self.info_flows,
        )
    }
}

/// The conversation engine with its pair cooldowns.
#[derive(Debug, Default)]
pub struct ConversationEngine {
    pair_cooldowns: BTreeMap<(String, String), DateTime<Utc>>,
}

impl ConversationEngine {
    /// Create an engine with no cooldown history.
    pub const fn new() -> Self {
        Self {
            pair_cooldowns: BTreeMap::new(),
        }
    }

    /// Whether `initiator` should start a conversation with `partner`.
    ///
    /// Applies both cooldowns, then rolls against the context-dependent
    /// probability (base 0.3, 0.5 for familiar pairs, +0.3 with
    /// undiscussed hot topics).
    pub fn should_converse(&self, initiator: &Agent, partner_name: &str) -> bool {
        let now = Utc::now();
        if initiator.state.last_conversation.is_some_and(|last| {
            now.signed_duration_since(last).num_seconds() < INITIATOR_COOLDOWN_SECS
        }) {
            return false;
        }
        if self
            .pair_cooldowns
            .get(&pair_key(&initiator.state.name, partner_name))
            .is_some_and(|last| {
                now.signed_duration_since(*last).num_seconds() < PAIR_COOLDOWN_SECS
            })
        {
            return false;
        }

        let familiar = initiator
            .state
            .relationship(partner_name)
            .is_some_and(|rel| rel.interactions > FAMILIAR_INTERACTIONS);
        let mut probability = if familiar {
            FAMILIAR_PROBABILITY
        } else {
            BASE_PROBABILITY
        };
        if !initiator.state.knowledge.undiscussed_topics(partner_name).is_empty() {
            probability += HOT_TOPIC_BONUS;
        }
        rand::rng().random::<f64>() < probability
    }

    /// Run a full conversation between two agents.
    ///
    /// Both agents must already be resolved as disjoint borrows; the
    /// engine owns them for the duration (mode = talking) and releases
    /// them before returning.
    pub async fn run(
        &mut self,
        initiator: &mut Agent,
        partner: &mut Agent,
        oracle: &Oracle,
        time: GameTime,
    ) -> ConversationOutcome {
        initiator.state.mode = AgentMode::Talking;
        partner.state.mode = AgentMode::Talking;

        let mut lines: Vec<ConversationLine> = Vec::new();
        let mut topics: Vec<String> = Vec::new();
        let mut bond_votes: Vec<BondShift> = Vec::new();
        let mut offline = false;

        if oracle.has_any_key() {
            let budget = turn_budget(oracle.failure_count());
            let mut failures = 0u32;
            let mut initiator_turn = true;

            while lines.len() < budget {
                let (speaker, listener) = if initiator_turn {
                    (&mut *initiator, &mut *partner)
                } else {
                    (&mut *partner, &mut *initiator)
                };
                match speak_turn(speaker, listener, oracle, &lines, time).await {
                    Ok(turn) => {
                        lines.push(ConversationLine {
                            speaker: speaker.state.name.clone(),
                            text: turn.text,
                        });
                        if let Some(topic) = turn.topic {
                            topics.push(topic);
                        }
                        bond_votes.push(turn.bond);
                        if turn.end && lines.len() >= 2 {
                            break;
                        }
                    }
                    Err(err) => {
                        failures = failures.saturating_add(1);
                        warn!(error = %err, failures, "conversation turn failed");
                        if failures >= ABORT_FAILURES {
                            break;
                        }
                    }
                }
                initiator_turn = !initiator_turn;
            }
        }

        if lines.is_empty() {
            offline = true;
            let (template_lines, topic) = offline_conversation(initiator, partner, time);
            lines = template_lines;
            topics.push(topic);
            bond_votes.push(BondShift::Closer);
        }

        let bond = settle_bond(&bond_votes);
        let topic = topics
            .into_iter()
            .next()
            .unwrap_or_else(|| "small talk".to_owned());

        // Canonical transcript into both memory streams, speech order.
        for line in &lines {
            let text = format!("{} said: {}", line.speaker, line.text);
            initiator.memory.add(text.clone(), MemoryKind::Dialogue, 3.0, time);
            partner.memory.add(text, MemoryKind::Dialogue, 3.0, time);
        }

        apply_bond(initiator, partner, bond);

        // Hot-topic diffusion, both directions, with info-flow records.
        let mut info_flows = Vec::new();
        diffuse_topics(initiator, partner, time, &mut info_flows);
        diffuse_topics(partner, initiator, time, &mut info_flows);

        // Cooldowns.
        let now = Utc::now();
        initiator.state.last_conversation = Some(now);
        self.pair_cooldowns
            .insert(pair_key(&initiator.state.name, &partner.state.name), now);

        initiator.state.mode = AgentMode::Idle;
        partner.state.mode = AgentMode::Idle;
        if initiator.state.pending_conversation.as_deref() == Some(partner.state.name.as_str()) {
            initiator.state.pending_conversation = None;
        }
        if partner.state.pending_conversation.as_deref() == Some(initiator.state.name.as_str()) {
            partner.state.pending_conversation = None;
        }
        if initiator.state.follow_target.as_deref() == Some(partner.state.name.as_str()) {
            initiator.state.follow_target = None;
        }
        if partner.state.follow_target.as_deref() == Some(initiator.state.name.as_str()) {
            partner.state.follow_target = None;
        }

        debug!(
            initiator = %initiator.state.name,
            partner = %partner.state.name,
            lines = lines.len(),
            offline,
            "conversation complete"
        );

        ConversationOutcome {
            lines,
            topic,
            bond,
            offline,
            info_flows,
        }
    }
}

/// Canonical ordering-independent pair key.
fn pair_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_owned(), b.to_owned())
    } else {
        (b.to_owned(), a.to_owned())
    }
}

/// Turn budget from the oracle's recent failure count.
const fn turn_budget(failures: u32) -> usize {
    if failures > 3 {
        TURNS_MINIMAL
    } else if failures >= 1 {
        TURNS_DEGRADED
    } else {
        TURNS_DEFAULT
    }
}

/// One parsed conversation turn.
struct Turn {
    text: String,
    topic: Option<String>,
    bond: BondShift,
    end: bool,
}

/// Generate one turn for `speaker`.
async fn speak_turn(
    speaker: &mut Agent,
    listener: &Agent,
    oracle: &Oracle,
    transcript: &[ConversationLine],
    time: GameTime,
) -> Result<Turn, hamlet_oracle::OracleError> {
    let listener_name = listener.state.name.clone();
    let query = format!(
        "{listener_name} {} {}",
        speaker.state.current_activity,
        speaker.memory.summarize(2)
    );
    let context: Vec<String> = speaker
        .memory
        .retrieve(&query, CONTEXT_MEMORIES, None)
        .into_iter()
        .filter(|scored| {
            let lowered = scored.entry.description.to_lowercase();
            !(scored.entry.kind == MemoryKind::Observation
                && FILTERED_WORDS.iter().any(|w| lowered.contains(w)))
        })
        .map(|scored| scored.entry.description)
        .collect();

    let hot_topics: Vec<String> = speaker
        .state
        .knowledge
        .undiscussed_topics(&listener_name)
        .iter()
        .take(TOPICS_PER_SIDE)
        .map(|t| t.text.clone())
        .collect();
    let transcript_lines: Vec<String> = transcript
        .iter()
        .map(|l| format!("{}: {}", l.speaker, l.text))
        .collect();
    let relationship = speaker.state.relationship(&listener_name);

    let ctx = serde_json::json!({
        "agent_name": speaker.state.name,
        "personality": speaker.state.personality,
        "partner_name": listener_name,
        "relationship_label": relationship.map_or("stranger", |r| r.label.as_str()),
        "familiarity": format!("{:.2}", relationship.map_or(0.0, |r| r.familiarity)),
        "current_activity": speaker.state.current_activity,
        "time_of_day": time.clock_label(),
        "memories": context,
        "hot_topics": hot_topics,
        "transcript": transcript_lines,
    });
    let prompt = oracle.prompts().render("converse", &ctx)?;
    let value = oracle.generate_json(&prompt, GenerateOptions::default()).await?;

    let text = field_str(&value, "text").ok_or_else(|| {
        hamlet_oracle::OracleError::Parse("turn missing text field".to_owned())
    })?;
    Ok(Turn {
        text,
        topic: field_str(&value, "topic"),
        bond: field_str(&value, "bond")
            .map_or(BondShift::Neutral, |tag| BondShift::parse(&tag)),
        end: field_bool(&value, "end").unwrap_or(false),
    })
}

/// Majority bond across the reported votes (ties lean neutral).
fn settle_bond(votes: &[BondShift]) -> BondShift {
    let closer = votes.iter().filter(|b| **b == BondShift::Closer).count();
    let tension = votes.iter().filter(|b| **b == BondShift::Tension).count();
    if closer > tension {
        BondShift::Closer
    } else if tension > closer {
        BondShift::Tension
    } else {
        BondShift::Neutral
    }
}

/// Apply the bond shift as a paired relationship edit.
fn apply_bond(initiator: &mut Agent, partner: &mut Agent, bond: BondShift) {
    let edit = match bond {
        BondShift::Closer => RelationshipEdit {
            trust: 0.05,
            familiarity: 0.08,
            forward: DirectedDelta {
                attraction: 0.02,
                ..DirectedDelta::default()
            },
            reverse: DirectedDelta {
                attraction: 0.02,
                ..DirectedDelta::default()
            },
            count_interaction: true,
        },
        BondShift::Neutral => RelationshipEdit {
            familiarity: 0.04,
            count_interaction: true,
            ..RelationshipEdit::default()
        },
        BondShift::Tension => RelationshipEdit {
            trust: -0.06,
            familiarity: 0.02,
            forward: DirectedDelta {
                rivalry: 0.05,
                ..DirectedDelta::default()
            },
            reverse: DirectedDelta {
                rivalry: 0.05,
                ..DirectedDelta::default()
            },
            count_interaction: true,
        },
    };
    let partner_name = partner.state.name.clone();
    let initiator_name = initiator.state.name.clone();
    let forward = initiator.state.relationship_mut(&partner_name);
    let reverse = partner.state.relationship_mut(&initiator_name);
    apply_pair(forward, reverse, &edit);

    initiator.state.add_need("social", -0.4);
    partner.state.add_need("social", -0.4);
}

/// Diffuse the speaker's undiscussed topics to the listener.
fn diffuse_topics(
    speaker: &mut Agent,
    listener: &mut Agent,
    time: GameTime,
    info_flows: &mut Vec<InfoFlow>,
) {
    let to_spread: Vec<(String, f64)> = speaker
        .state
        .knowledge
        .undiscussed_topics(&listener.state.name)
        .iter()
        .take(TOPICS_PER_SIDE)
        .map(|t| (t.text.clone(), t.importance))
        .collect();
    for (text, importance) in to_spread {
        listener
            .state
            .knowledge
            .receive_topic(&text, importance, time);
        speaker
            .state
            .knowledge
            .mark_spread(&text, &listener.state.name);
        info_flows.push(InfoFlow {
            from: speaker.state.name.clone(),
            to: listener.state.name.clone(),
            topic: text,
            game_time: time,
        });
    }
}

// ---------------------------------------------------------------------------
// Offline template library
// ---------------------------------------------------------------------------

/// Produce an offline conversation shaped by context.
///
/// The library is checked in priority order: gossip first, then urgent
/// needs, familiarity, activity, and finally time-of-day small talk.
fn offline_conversation(
    initiator: &Agent,
    partner: &Agent,
    time: GameTime,
) -> (Vec<ConversationLine>, String) {
    let a = initiator.state.name.clone();
    let b = partner.state.name.clone();
    let line = |speaker: &str, text: String| ConversationLine {
        speaker: speaker.to_owned(),
        text,
    };

    // Gossip-leading: the initiator has news to share.
    if let Some(topic) = initiator
        .state
        .knowledge
        .undiscussed_topics(&b)
        .first()
        .map(|t| t.text.clone())
    {
        return (
            vec![
                line(&a, format!("Have you heard? {topic}")),
                line(&b, "No! Tell me everything.".to_owned()),
                line(&a, "That is all I know, but keep your ears open.".to_owned()),
            ],
            "gossip".to_owned(),
        );
    }

    // Needs-based: hunger dominates the mind.
    if initiator.state.need("hunger") > 0.7 {
        return (
            vec![
                line(&a, "I could eat a whole harvest right now.".to_owned()),
                line(&b, "The bakery should still have bread this hour.".to_owned()),
            ],
            "food".to_owned(),
        );
    }

    // Familiarity-gated: old friends vs strangers.
    let interactions = initiator
        .state
        .relationship(&b)
        .map_or(0, |r| r.interactions);
    if interactions > 5 {
        return (
            vec![
                line(&a, format!("Good to see you again, {b}.")),
                line(&b, "Always a pleasure. How is the family?".to_owned()),
                line(&a, "Keeping me busy, as ever.".to_owned()),
            ],
            "catching up".to_owned(),
        );
    }
    if interactions == 0 {
        return (
            vec![
                line(&a, format!("I do not think we have met. I am {a}.")),
                line(&b, format!("{b}. Welcome to the square.")),
            ],
            "introductions".to_owned(),
        );
    }

    // Activity-based.
    if !initiator.state.current_activity.is_empty() {
        return (
            vec![
                line(
                    &a,
                    format!("I was just {}.", initiator.state.current_activity),
                ),
                line(&b, "It never ends, does it?".to_owned()),
            ],
            "work".to_owned(),
        );
    }

    // Time-of-day small talk.
    let text = if time.is_night() {
        "Late to be out, isn't it?"
    } else if time.hour < 12 {
        "Fine morning, isn't it?"
    } else {
        "The afternoon drags on."
    };
    (
        vec![
            line(&a, text.to_owned()),
            line(&b, "That it is.".to_owned()),
        ],
        "weather".to_owned(),
    )
}
