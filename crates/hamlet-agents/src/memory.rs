//! The agent memory stream: append-only log with three-score retrieval.
//!
//! Every subsystem that touches an agent writes timestamped entries into
//! that agent's [`MemoryStream`]. Retrieval combines three signals:
//!
//! - **Recency**: exponential decay over game-hours since the entry was
//!   last accessed (`0.995 ^ hours`)
//! - **Importance**: the stored importance scaled to [0,1]
//! - **Relevance**: cosine similarity when both the query and the entry
//!   carry embeddings, otherwise weighted keyword overlap with partial
//!   prefix matching
//!
//! Each signal is min-max normalised across the candidate set before the
//! equal-weight sum, so one dominant dimension cannot drown the others.
//!
//! The stream is bounded (default 500 entries). Pruning retains all
//! reflections, the top half by importance, and the most recent 40%,
//! merged as a union and re-sorted by creation time.
//!
//! Entries with importance >= 3 queue for asynchronous embedding; a
//! missing embedding is never an error, retrieval just falls back to
//! keyword relevance.

use std::collections::{BTreeSet, VecDeque};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use hamlet_oracle::Oracle;
use hamlet_types::{GameTime, MemoryId, MemoryKind};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default maximum number of entries in a stream.
pub const DEFAULT_MAX_ENTRIES: usize = 500;

/// Hourly recency decay factor.
const RECENCY_DECAY: f64 = 0.995;

/// Minimum importance for an entry to queue for embedding.
const EMBED_MIN_IMPORTANCE: f64 = 3.0;

/// Maximum entries embedded per queue drain.
const EMBED_BATCH_LIMIT: usize = 20;

/// Weight of a length-4 prefix match in keyword relevance.
const PREFIX_MATCH_WEIGHT: f64 = 0.5;

/// Length of the prefix considered for partial keyword matches.
const PREFIX_LEN: usize = 4;

/// Tokens excluded from keyword sets regardless of length.
const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "with", "that", "this", "from", "have", "has", "was", "were", "are",
    "is", "be", "been", "they", "them", "their", "she", "her", "his", "him", "its", "our",
    "your", "you", "not", "but", "all", "any", "can", "had", "out", "into", "about", "over",
    "after", "before", "when", "then", "than", "what", "who", "how", "why", "where", "will",
    "would", "could", "should", "there", "here", "just", "very", "some", "more", "most",
    "other", "such", "only", "own", "same", "too", "also", "did", "does", "doing", "while",
    "during", "because", "until", "being", "now",
];

// ---------------------------------------------------------------------------
// MemoryEntry
// ---------------------------------------------------------------------------

/// A single entry in an agent's memory stream.
///
/// Immutable once created except for `last_accessed` (bumped by
/// retrieval) and `embedding` (filled in by the async embedding drain).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MemoryEntry {
    /// Stable unique id.
    pub id: MemoryId,
    /// Free-text description of what happened.
    pub description: String,
    /// Entry kind.
    pub kind: MemoryKind,
    /// Importance in [1,10], clamped at construction.
    pub importance: f64,
    /// Keyword index over the description.
    pub keywords: BTreeSet<String>,
    /// Dense embedding, filled asynchronously.
    pub embedding: Option<Vec<f32>>,
    /// Entries this one was synthesised from (reflections only).
    pub related_ids: Vec<MemoryId>,
    /// Real timestamp of creation.
    pub created_at: DateTime<Utc>,
    /// Game time of creation.
    pub game_time: GameTime,
    /// Real timestamp of the last retrieval that returned this entry.
    pub last_accessed: DateTime<Utc>,
}

/// Tokenise a description into its keyword set.
///
/// Lowercases, splits on non-alphanumeric boundaries, and drops stop
/// words and tokens of length <= 2.
pub fn tokenize_keywords(description: &str) -> BTreeSet<String> {
    description
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.len() > 2)
        .filter(|token| !STOP_WORDS.contains(token))
        .map(str::to_owned)
        .collect()
}

/// Cosine similarity between two embedding vectors.
///
/// Returns 0 for mismatched dimensions or zero-norm inputs.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += f64::from(*x) * f64::from(*y);
        norm_a += f64::from(*x) * f64::from(*x);
        norm_b += f64::from(*y) * f64::from(*y);
    }
    if norm_a <= 0.0 || norm_b <= 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Weighted keyword overlap between a query set and an entry set.
///
/// Exact matches weigh 1.0; length-4 prefix matches weigh 0.5. The sum
/// is normalised by the geometric mean of the two set sizes.
fn keyword_relevance(query: &BTreeSet<String>, entry: &BTreeSet<String>) -> f64 {
    if query.is_empty() || entry.is_empty() {
        return 0.0;
    }
    let mut overlap = 0.0f64;
    for q in query {
        if entry.contains(q) {
            overlap += 1.0;
            continue;
        }
        if q.len() >= PREFIX_LEN {
            let prefix: &str = q.get(..PREFIX_LEN).unwrap_or(q);
            if entry.iter().any(|e| e.starts_with(prefix)) {
                overlap += PREFIX_MATCH_WEIGHT;
            }
        }
    }
    let geo_mean = ((query.len() as f64) * (entry.len() as f64)).sqrt();
    if geo_mean <= 0.0 { 0.0 } else { overlap / geo_mean }
}

// ---------------------------------------------------------------------------
// Retrieval result
// ---------------------------------------------------------------------------

/// A retrieved entry with its score breakdown.
///
/// All three components are min-max normalised into [0,1]; `score` is
/// their equal-weight sum.
#[derive(Debug, Clone)]
pub struct ScoredMemory {
    /// The retrieved entry (cloned; the stream keeps ownership).
    pub entry: MemoryEntry,
    /// Combined score.
    pub score: f64,
    /// Normalised recency component.
    pub recency: f64,
    /// Normalised importance component.
    pub importance: f64,
    /// Normalised relevance component.
    pub relevance: f64,
}

// ---------------------------------------------------------------------------
// MemoryStream
// ---------------------------------------------------------------------------

/// Bounded, ordered memory log owned by exactly one agent.
#[derive(Debug, Clone)]
pub struct MemoryStream {
    /// Entries ordered by creation time.
    entries: Vec<MemoryEntry>,
    /// Capacity; exceeding it triggers a prune.
    max_entries: usize,
    /// Entry ids awaiting asynchronous embedding.
    embed_queue: VecDeque<MemoryId>,
    /// Real seconds per game minute (the ticker's cadence), used to
    /// convert real elapsed time into game-hours for recency.
    seconds_per_game_minute: f64,
}

impl MemoryStream {
    /// Create a stream with the default capacity and cadence.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_ENTRIES, 1.0)
    }

    /// Create a stream with explicit capacity and cadence.
    pub const fn with_capacity(max_entries: usize, seconds_per_game_minute: f64) -> Self {
        Self {
            entries: Vec::new(),
            max_entries,
            embed_queue: VecDeque::new(),
            seconds_per_game_minute,
        }
    }

    /// Align the recency conversion with the ticker's cadence.
    ///
    /// Recency is measured in game hours, so the stream must share the
    /// host's real-seconds-per-game-minute setting.
    pub fn set_cadence(&mut self, seconds_per_game_minute: f64) {
        if seconds_per_game_minute > 0.0 {
            self.seconds_per_game_minute = seconds_per_game_minute;
        }
    }

    /// Append a new entry.
    ///
    /// Importance is clamped into [1,10]; keywords are tokenised from the
    /// description; entries important enough queue for embedding. When
    /// the new length exceeds capacity the stream prunes itself.
    pub fn add(
        &mut self,
        description: impl Into<String>,
        kind: MemoryKind,
        importance: f64,
        game_time: GameTime,
    ) -> MemoryId {
        self.add_related(description, kind, importance, game_time, Vec::new())
    }

    /// Append a new entry citing the entries it was synthesised from.
    pub fn add_related(
        &mut self,
        description: impl Into<String>,
        kind: MemoryKind,
        importance: f64,
        game_time: GameTime,
        related_ids: Vec<MemoryId>,
    ) -> MemoryId {
        let description = description.into();
        let now = Utc::now();
        let entry = MemoryEntry {
            id: MemoryId::new(),
            keywords: tokenize_keywords(&description),
            description,
            kind,
            importance: importance.clamp(1.0, 10.0),
            embedding: None,
            related_ids,
            created_at: now,
            game_time,
            last_accessed: now,
        };
        let id = entry.id;
        if entry.importance >= EMBED_MIN_IMPORTANCE {
            self.embed_queue.push_back(id);
        }
        self.entries.push(entry);
        if self.entries.len() > self.max_entries {
            self.prune();
        }
        id
    }

    /// Number of stored entries.
    pub const fn count(&self) -> usize {
        self.entries.len()
    }

    /// Number of stored entries of a given kind.
    pub fn count_by_kind(&self, kind: MemoryKind) -> usize {
        self.entries.iter().filter(|e| e.kind == kind).count()
    }

    /// All entries, oldest first.
    pub fn entries(&self) -> &[MemoryEntry] {
        &self.entries
    }

    /// The `k` most recent entries, newest first.
    pub fn recent(&self, k: usize) -> Vec<&MemoryEntry> {
        self.entries.iter().rev().take(k).collect()
    }

    /// The `k` most recent entries of a given kind, newest first.
    pub fn by_kind(&self, kind: MemoryKind, k: usize) -> Vec<&MemoryEntry> {
        self.entries
            .iter()
            .rev()
            .filter(|e| e.kind == kind)
            .take(k)
            .collect()
    }

    /// Sum of importance over entries created at or after `since`.
    pub fn importance_sum_since(&self, since: DateTime<Utc>) -> f64 {
        self.entries
            .iter()
            .filter(|e| e.created_at >= since)
            .map(|e| e.importance)
            .sum()
    }

    /// One-line summary of the `k` most recent entries.
    pub fn summarize(&self, k: usize) -> String {
        let parts: Vec<&str> = self
            .entries
            .iter()
            .rev()
            .take(k)
            .map(|e| e.description.as_str())
            .collect();
        parts.join("; ")
    }

    /// Look up an entry by id.
    pub fn get(&self, id: MemoryId) -> Option<&MemoryEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    // -----------------------------------------------------------------------
    // Retrieval
    // -----------------------------------------------------------------------

    /// Retrieve the top-`k` entries for a query.
    ///
    /// When `query_embedding` is given and an entry carries its own
    /// embedding, relevance is cosine similarity; otherwise it falls back
    /// to weighted keyword overlap. Returned entries get their
    /// `last_accessed` bumped to now.
    pub fn retrieve(
        &mut self,
        query: &str,
        k: usize,
        query_embedding: Option<&[f32]>,
    ) -> Vec<ScoredMemory> {
        if self.entries.is_empty() || k == 0 {
            return Vec::new();
        }
        let now = Utc::now();
        let query_keywords = tokenize_keywords(query);

        let mut recency_raw = Vec::with_capacity(self.entries.len());
        let mut importance_raw = Vec::with_capacity(self.entries.len());
        let mut relevance_raw = Vec::with_capacity(self.entries.len());

        for entry in &self.entries {
            recency_raw.push(self.raw_recency(entry, now));
            importance_raw.push(entry.importance / 10.0);
            let relevance = match (query_embedding, entry.embedding.as_deref()) {
                (Some(q), Some(e)) => cosine_similarity(q, e),
                _ => keyword_relevance(&query_keywords, &entry.keywords),
            };
            relevance_raw.push(relevance);
        }

        let recency = min_max_normalise(&recency_raw);
        let importance = min_max_normalise(&importance_raw);
        let relevance = min_max_normalise(&relevance_raw);

        let mut scored: Vec<(usize, f64)> = (0..self.entries.len())
            .map(|i| {
                let total = component(&recency, i)
                    + component(&importance, i)
                    + component(&relevance, i);
                (i, total)
            })
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        let mut results = Vec::with_capacity(scored.len());
        for (index, score) in scored {
            if let Some(entry) = self.entries.get_mut(index) {
                entry.last_accessed = now;
                results.push(ScoredMemory {
                    entry: entry.clone(),
                    score,
                    recency: component(&recency, index),
                    importance: component(&importance, index),
                    relevance: component(&relevance, index),
                });
            }
        }
        results
    }

    /// Raw recency: decay over game-hours since last access.
    fn raw_recency(&self, entry: &MemoryEntry, now: DateTime<Utc>) -> f64 {
        let elapsed_secs = now
            .signed_duration_since(entry.last_accessed)
            .num_seconds()
            .max(0) as f64;
        let game_minutes = if self.seconds_per_game_minute > 0.0 {
            elapsed_secs / self.seconds_per_game_minute
        } else {
            elapsed_secs
        };
        let game_hours = game_minutes / 60.0;
        RECENCY_DECAY.powf(game_hours)
    }

    // -----------------------------------------------------------------------
    // Pruning
    // -----------------------------------------------------------------------

    /// Prune down after exceeding capacity.
    ///
    /// Retains the union of three bands, in priority order: all
    /// reflections, the top half by importance, and the most recent 40%.
    /// Band overlap merges naturally through the id union; the survivors
    /// are re-sorted by creation time.
    fn prune(&mut self) {
        let before = self.entries.len();
        let mut keep: BTreeSet<MemoryId> = BTreeSet::new();

        for entry in &self.entries {
            if entry.kind == MemoryKind::Reflection {
                keep.insert(entry.id);
            }
        }

        let mut by_importance: Vec<&MemoryEntry> = self.entries.iter().collect();
        by_importance.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        for entry in by_importance.iter().take(before / 2) {
            keep.insert(entry.id);
        }

        let recent_cut = (before.saturating_mul(2)) / 5;
        let mut by_creation: Vec<&MemoryEntry> = self.entries.iter().collect();
        by_creation.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        for entry in by_creation.iter().take(recent_cut) {
            keep.insert(entry.id);
        }

        self.entries.retain(|e| keep.contains(&e.id));
        self.entries
            .sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        self.embed_queue.retain(|id| keep.contains(id));

        debug!(
            before,
            after = self.entries.len(),
            "memory stream pruned"
        );
    }

    // -----------------------------------------------------------------------
    // Embedding queue
    // -----------------------------------------------------------------------

    /// Entries currently waiting for embedding.
    pub fn embed_queue_len(&self) -> usize {
        self.embed_queue.len()
    }

    /// Drain up to one batch of the embedding queue through the oracle.
    ///
    /// Oracle failures are swallowed and logged; failed entries stay in
    /// the queue and are retried on the next call. Missing embeddings
    /// are not an error anywhere in the stream.
    pub async fn process_embeddings(&mut self, oracle: &Oracle) {
        if self.embed_queue.is_empty() || !oracle.can_embed() {
            return;
        }
        let queued: Vec<MemoryId> = self
            .embed_queue
            .iter()
            .take(EMBED_BATCH_LIMIT)
            .copied()
            .collect();
        // Pair each still-present id with its text; drop pruned ids.
        let mut batch_ids = Vec::with_capacity(queued.len());
        let mut texts = Vec::with_capacity(queued.len());
        for id in queued {
            if let Some(entry) = self.get(id) {
                texts.push(entry.description.clone());
                batch_ids.push(id);
            } else {
                self.embed_queue.retain(|q| *q != id);
            }
        }
        if texts.is_empty() {
            return;
        }

        match oracle.embed_batch(&texts).await {
            Ok(vectors) => {
                for (id, vector) in batch_ids.iter().zip(vectors.into_iter()) {
                    if let Some(vector) = vector {
                        if let Some(entry) = self.entries.iter_mut().find(|e| e.id == *id) {
                            entry.embedding = Some(vector);
                        }
                        self.embed_queue.retain(|q| q != id);
                    }
                    // None slots stay queued for retry.
                }
            }
            Err(err) => {
                warn!(error = %err, "embedding batch failed; will retry");
            }
        }
    }
}

impl Default for MemoryStream {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Score normalisation helpers
// ---------------------------------------------------------------------------

/// Min-max normalise a score array into [0,1].
///
/// A zero range maps every element to 1.0 so that a dimension with no
/// spread neither rewards nor punishes any entry.
fn min_max_normalise(raw: &[f64]) -> Vec<f64> {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in raw {
        min = min.min(*v);
        max = max.max(*v);
    }
    let range = max - min;
    if !range.is_finite() || range <= f64::EPSILON {
        return vec![1.0; raw.len()];
    }
    raw.iter().map(|v| (v - min) / range).collect()
}

/// Indexed read with a safe default.
fn component(values: &[f64], index: usize) -> f64 {
    values.get(index).copied().unwrap_or(0.0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn stream() -> MemoryStream {
        MemoryStream::with_capacity(DEFAULT_MAX_ENTRIES, 1.0)
    }

    #[test]
    fn importance_is_clamped_at_construction() {
        let mut s = stream();
        s.add("a wild number", MemoryKind::Observation, 42.0, GameTime::START);
        s.add("a timid number", MemoryKind::Observation, -3.0, GameTime::START);
        let all = s.entries();
        assert!((all.first().unwrap().importance - 10.0).abs() < f64::EPSILON);
        assert!((all.get(1).unwrap().importance - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn keywords_exclude_stop_words_and_short_tokens() {
        let keywords = tokenize_keywords("The fire at the old bakery was not an accident");
        assert!(keywords.contains("fire"));
        assert!(keywords.contains("bakery"));
        assert!(keywords.contains("accident"));
        assert!(!keywords.contains("the"));
        assert!(!keywords.contains("at"));
        assert!(!keywords.contains("was"));
    }

    #[test]
    fn retrieve_returns_at_most_k_and_bumps_access() {
        let mut s = stream();
        for i in 0..10 {
            s.add(format!("event number {i}"), MemoryKind::Observation, 5.0, GameTime::START);
        }
        let before = s.entries().first().unwrap().last_accessed;
        let results = s.retrieve("event", 3, None);
        assert_eq!(results.len(), 3);
        for r in &results {
            assert!(r.recency >= 0.0 && r.recency <= 1.0);
            assert!(r.importance >= 0.0 && r.importance <= 1.0);
            assert!(r.relevance >= 0.0 && r.relevance <= 1.0);
        }
        let bumped = results
            .iter()
            .any(|r| s.get(r.entry.id).unwrap().last_accessed > before);
        assert!(bumped || results.is_empty());
    }

    #[test]
    fn retrieve_prefers_keyword_matches() {
        let mut s = stream();
        s.add("the well ran dry this morning", MemoryKind::Observation, 5.0, GameTime::START);
        s.add("fire broke out at the bakery", MemoryKind::Observation, 5.0, GameTime::START);
        s.add("a quiet walk in the orchard", MemoryKind::Observation, 5.0, GameTime::START);
        let results = s.retrieve("smoke and fire near the bakery ovens", 1, None);
        assert_eq!(results.len(), 1);
        assert!(results.first().unwrap().entry.description.contains("fire"));
    }

    #[test]
    fn prefix_matching_catches_word_forms() {
        let query = tokenize_keywords("farming");
        let entry = tokenize_keywords("farmer tends crops");
        assert!(keyword_relevance(&query, &entry) > 0.0);
    }

    #[test]
    fn zero_range_normalises_to_one() {
        let normalised = min_max_normalise(&[0.5, 0.5, 0.5]);
        assert!(normalised.iter().all(|v| (*v - 1.0).abs() < f64::EPSILON));
    }

    #[test]
    fn prune_triggers_only_past_capacity() {
        let mut s = MemoryStream::with_capacity(10, 1.0);
        for i in 0..9 {
            s.add(format!("filler {i}"), MemoryKind::Observation, 2.0, GameTime::START);
        }
        assert_eq!(s.count(), 9);
        s.add("the tenth", MemoryKind::Observation, 2.0, GameTime::START);
        // At capacity, not over: no prune yet.
        assert_eq!(s.count(), 10);
        s.add("the eleventh", MemoryKind::Observation, 2.0, GameTime::START);
        assert!(s.count() <= 10);
    }

    #[test]
    fn prune_keeps_every_reflection() {
        let mut s = MemoryStream::with_capacity(20, 1.0);
        for i in 0..5 {
            s.add_related(
                format!("insight {i}"),
                MemoryKind::Reflection,
                4.0,
                GameTime::START,
                Vec::new(),
            );
        }
        for i in 0..25 {
            s.add(format!("noise {i}"), MemoryKind::Observation, 1.0, GameTime::START);
        }
        assert_eq!(s.count_by_kind(MemoryKind::Reflection), 5);
    }

    #[test]
    fn prune_resorts_by_creation_time() {
        let mut s = MemoryStream::with_capacity(10, 1.0);
        for i in 0..15 {
            s.add(
                format!("entry {i}"),
                MemoryKind::Observation,
                f64::from(i % 10),
                GameTime::START,
            );
        }
        let times: Vec<DateTime<Utc>> = s.entries().iter().map(|e| e.created_at).collect();
        let mut sorted = times.clone();
        sorted.sort();
        assert_eq!(times, sorted);
    }

    #[test]
    fn importance_sum_counts_from_watermark() {
        let mut s = stream();
        s.add("before", MemoryKind::Observation, 6.0, GameTime::START);
        let watermark = Utc::now();
        s.add("after one", MemoryKind::Observation, 6.0, GameTime::START);
        s.add("after two", MemoryKind::Observation, 6.0, GameTime::START);
        assert!(s.importance_sum_since(watermark) >= 12.0);
    }

    #[test]
    fn embedding_queue_only_takes_important_entries() {
        let mut s = stream();
        s.add("trivial", MemoryKind::Observation, 2.0, GameTime::START);
        s.add("notable", MemoryKind::Observation, 3.0, GameTime::START);
        assert_eq!(s.embed_queue_len(), 1);
    }

    #[test]
    fn cosine_handles_degenerate_inputs() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-9);
        assert!(cosine_similarity(&[1.0], &[1.0, 0.0]).abs() < f64::EPSILON);
        assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).abs() < f64::EPSILON);
    }
}
