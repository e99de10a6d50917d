//! Threshold-triggered reflection: synthesising insights from memories.
//!
//! Reflection fires when the cumulative importance of entries since the
//! last reflection crosses a threshold (default 100). The oracle is asked
//! for three salient questions over the recent past, each question pulls
//! a focused retrieval, and the resulting insights are written back into
//! the stream as `reflection` entries citing their evidence.
//!
//! The watermark advances whenever reflection fires, success or not, so
//! a failing oracle cannot wedge the trigger into firing every cycle.
//! Offline, a one-line summary of recent social contact stands in.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use hamlet_oracle::{GenerateOptions, Oracle, field_f64, field_str};
use hamlet_types::{GameTime, MemoryId, MemoryKind};

use crate::memory::MemoryStream;

/// Default cumulative-importance threshold.
pub const DEFAULT_THRESHOLD: f64 = 100.0;

/// Recent memories shown to the question prompt.
const QUESTION_CONTEXT: usize = 15;

/// Memories retrieved per question.
const RETRIEVAL_PER_QUESTION: usize = 10;

/// Minimum retrieval size for a question to be pursued.
const MIN_EVIDENCE: usize = 2;

/// Insight importance clamp range.
const INSIGHT_IMPORTANCE: (f64, f64) = (1.0, 9.0);

/// Per-agent reflection trigger and pipeline.
#[derive(Debug, Clone)]
pub struct ReflectionSystem {
    threshold: f64,
    watermark: DateTime<Utc>,
}

impl ReflectionSystem {
    /// Create a system with the default threshold, watermarked now.
    pub fn new() -> Self {
        Self::with_threshold(DEFAULT_THRESHOLD)
    }

    /// Create a system with an explicit threshold.
    pub fn with_threshold(threshold: f64) -> Self {
        Self {
            threshold,
            watermark: Utc::now(),
        }
    }

    /// Whether accumulated importance since the watermark has crossed
    /// the threshold.
    pub fn should_reflect(&self, stream: &MemoryStream) -> bool {
        stream.importance_sum_since(self.watermark) >= self.threshold
    }

    /// Run one reflection pass, writing insights back into the stream.
    ///
    /// The watermark moves to now before anything else, regardless of
    /// what the oracle does. Returns the number of reflection entries
    /// written.
    pub async fn reflect(
        &mut self,
        agent_name: &str,
        stream: &mut MemoryStream,
        oracle: &Oracle,
        game_time: GameTime,
    ) -> usize {
        self.watermark = Utc::now();

        if oracle.has_any_key() {
            match self.reflect_with_oracle(agent_name, stream, oracle, game_time).await {
                Ok(written) if written > 0 => return written,
                Ok(_) => {}
                Err(err) => {
                    warn!(agent = agent_name, error = %err, "oracle reflection failed");
                }
            }
        }
        self.reflect_offline(agent_name, stream, game_time)
    }

    /// The oracle-driven path: questions, focused retrieval, insights.
    async fn reflect_with_oracle(
        &self,
        agent_name: &str,
        stream: &mut MemoryStream,
        oracle: &Oracle,
        game_time: GameTime,
    ) -> Result<usize, hamlet_oracle::OracleError> {
        let recent: Vec<String> = stream
            .recent(QUESTION_CONTEXT)
            .iter()
            .map(|e| e.description.clone())
            .collect();
        if recent.is_empty() {
            return Ok(0);
        }

        let ctx = serde_json::json!({
            "agent_name": agent_name,
            "memories": recent,
        });
        let prompt = oracle.prompts().render("reflect_questions", &ctx)?;
        let response = oracle
            .generate_json(&prompt, GenerateOptions::default())
            .await?;
        let questions: Vec<String> = response
            .get("questions")
            .and_then(|q| q.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(str::to_owned))
                    .take(3)
                    .collect()
            })
            .unwrap_or_default();

        let mut written = 0usize;
        for question in &questions {
            let embedding = if oracle.can_embed() {
                oracle.embed(question).await.ok()
            } else {
                None
            };
            let evidence =
                stream.retrieve(question, RETRIEVAL_PER_QUESTION, embedding.as_deref());
            if evidence.len() < MIN_EVIDENCE {
                continue;
            }

            let evidence_texts: Vec<String> = evidence
                .iter()
                .map(|s| s.entry.description.clone())
                .collect();
            let evidence_ids: Vec<MemoryId> = evidence.iter().map(|s| s.entry.id).collect();

            let ctx = serde_json::json!({
                "agent_name": agent_name,
                "question": question,
                "memories": evidence_texts,
            });
            let prompt = oracle.prompts().render("reflect_insights", &ctx)?;
            let response = match oracle
                .generate_json(&prompt, GenerateOptions::default())
                .await
            {
                Ok(value) => value,
                Err(err) => {
                    warn!(agent = agent_name, error = %err, "insight generation failed");
                    continue;
                }
            };

            let Some(insights) = response.get("insights").and_then(|i| i.as_array()) else {
                continue;
            };
            for insight in insights.iter().take(3) {
                let Some(text) = field_str(insight, "text") else {
                    continue;
                };
                let importance = field_f64(insight, "importance")
                    .unwrap_or(5.0)
                    .clamp(INSIGHT_IMPORTANCE.0, INSIGHT_IMPORTANCE.1);
                let related: Vec<MemoryId> = insight
                    .get("memory_indices")
                    .and_then(|v| v.as_array())
                    .map(|arr| {
                        arr.iter()
                            .filter_map(serde_json::Value::as_u64)
                            .filter_map(|one_based| {
                                usize::try_from(one_based).ok().and_then(|i| {
                                    i.checked_sub(1).and_then(|idx| evidence_ids.get(idx))
                                })
                            })
                            .copied()
                            .collect()
                    })
                    .unwrap_or_default();
                // An insight must cite something; fall back to all the
                // question's evidence when indices were unusable.
                let related = if related.is_empty() {
                    evidence_ids.clone()
                } else {
                    related
                };
                stream.add_related(text, MemoryKind::Reflection, importance, game_time, related);
                written = written.saturating_add(1);
            }
        }

        debug!(agent = agent_name, insights = written, "reflection pass complete");
        Ok(written)
    }

    /// Offline fallback: one summary line from recent social contact.
    fn reflect_offline(
        &self,
        agent_name: &str,
        stream: &mut MemoryStream,
        game_time: GameTime,
    ) -> usize {
        let dialogues = stream.by_kind(MemoryKind::Dialogue, 5);
        let events = stream.count_by_kind(MemoryKind::Event);

        let partners: Vec<String> = dialogues
            .iter()
            .filter_map(|e| partner_from_dialogue(&e.description, agent_name))
            .collect();
        let related: Vec<MemoryId> = dialogues.iter().map(|e| e.id).collect();

        let text = if partners.is_empty() {
            format!("Life has been quiet lately; {events} notable events come to mind")
        } else {
            let mut unique = partners;
            unique.dedup();
            format!("Lately I have mostly been talking with {}", unique.join(", "))
        };
        stream.add_related(text, MemoryKind::Reflection, 4.0, game_time, related);
        1
    }
}

impl Default for ReflectionSystem {
    fn default() -> Self {
        Self::new()
    }
}

/// Pull the partner's name out of a dialogue memory description.
///
/// Dialogue entries are written as `"<speaker> said: <line>"`; anything
/// not matching that shape (or spoken by the agent) yields nothing.
fn partner_from_dialogue(description: &str, agent_name: &str) -> Option<String> {
    let speaker = description.split(" said").next()?.trim();
    if speaker.is_empty() || speaker == agent_name || speaker.contains(' ') {
        return None;
    }
    Some(speaker.to_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use hamlet_oracle::{Backend, ScriptedBackend};

    fn fill_stream(stream: &mut MemoryStream, count: usize, importance: f64) {
        for i in 0..count {
            stream.add(
                format!("observation number {i} about the market"),
                MemoryKind::Observation,
                importance,
                GameTime::START,
            );
        }
    }

    #[test]
    fn trigger_fires_at_threshold() {
        let mut stream = MemoryStream::new();
        let system = ReflectionSystem::new();
        fill_stream(&mut stream, 16, 6.0);
        assert!(!system.should_reflect(&stream));
        fill_stream(&mut stream, 4, 6.0);
        // 20 entries at importance 6 = 120 >= 100.
        assert!(system.should_reflect(&stream));
    }

    #[tokio::test]
    async fn oracle_insights_are_written_with_citations() {
        let mut stream = MemoryStream::new();
        fill_stream(&mut stream, 20, 6.0);

        let questions = r#"{"questions": ["What does Elena think of the market?"]}"#;
        let insights = r#"{"insights": [
            {"text": "The market is central to Elena's days", "memory_indices": [1, 2], "importance": 12},
            {"text": "Elena watches people closely", "memory_indices": [3], "importance": 6},
            {"text": "Routine steadies her", "memory_indices": [], "importance": 5}
        ]}"#;
        let oracle = Oracle::with_backend(Backend::Scripted(ScriptedBackend::new(vec![
            questions, insights,
        ])))
        .unwrap();

        let mut system = ReflectionSystem::new();
        let written = system
            .reflect("Elena", &mut stream, &oracle, GameTime::START)
            .await;
        assert_eq!(written, 3);
        assert_eq!(stream.count_by_kind(MemoryKind::Reflection), 3);
        for entry in stream.entries().iter().filter(|e| e.kind == MemoryKind::Reflection) {
            assert!(!entry.related_ids.is_empty());
            assert!(entry.importance <= 9.0);
        }
    }

    #[tokio::test]
    async fn watermark_advances_even_on_failure() {
        let mut stream = MemoryStream::new();
        fill_stream(&mut stream, 20, 6.0);
        // Empty queue: first call errors as unavailable.
        let oracle =
            Oracle::with_backend(Backend::Scripted(ScriptedBackend::new(Vec::<String>::new())))
                .unwrap();
        let mut system = ReflectionSystem::new();
        assert!(system.should_reflect(&stream));
        system
            .reflect("Elena", &mut stream, &oracle, GameTime::START)
            .await;
        assert!(!system.should_reflect(&stream));
    }

    #[tokio::test]
    async fn offline_fallback_writes_a_summary() {
        let mut stream = MemoryStream::new();
        stream.add(
            "Bram said: the harvest looks thin this year",
            MemoryKind::Dialogue,
            5.0,
            GameTime::START,
        );
        let oracle = Oracle::with_backend(Backend::Offline).unwrap();
        let mut system = ReflectionSystem::new();
        let written = system
            .reflect("Elena", &mut stream, &oracle, GameTime::START)
            .await;
        assert_eq!(written, 1);
        let reflection = stream.by_kind(MemoryKind::Reflection, 1);
        assert!(reflection.first().unwrap().description.contains("Bram"));
    }
}
