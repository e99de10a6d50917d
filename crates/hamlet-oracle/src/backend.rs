//! Oracle backends and the unified [`Oracle`] handle.
//!
//! Uses enum dispatch instead of trait objects because async methods are
//! not dyn-compatible. Concrete backends exist for OpenAI-compatible
//! APIs and the Anthropic Messages API, plus a [`ScriptedBackend`] that
//! replays canned responses for tests and demos, and an `Offline` marker
//! that fails fast so every caller exercises its fallback path.
//!
//! The [`Oracle`] wraps a backend with a call deadline, the rolling
//! failure counter, a rate-limit latch, and cost accounting. Cognition
//! code only ever sees the `Oracle`.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::cost::{CostSummary, CostTracker};
use crate::error::OracleError;
use crate::failure::FailureTracker;
use crate::parse;
use crate::prompt::{PromptEngine, RenderedPrompt};

/// Default per-call deadline in seconds.
const DEFAULT_DEADLINE_SECS: u64 = 30;

/// How long the rate-limit latch stays set after an HTTP 429.
const RATE_LIMIT_LATCH_SECS: u64 = 30;

/// Dimension of the deterministic pseudo-embeddings produced by the
/// scripted backend.
const SCRIPTED_EMBED_DIM: usize = 16;

// ---------------------------------------------------------------------------
// Options and configuration
// ---------------------------------------------------------------------------

/// Options for a single generation call.
#[derive(Debug, Clone, Copy)]
pub struct GenerateOptions {
    /// Ask the backend for a JSON object response.
    pub json: bool,
    /// Sampling temperature.
    pub temperature: f64,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            json: true,
            temperature: 0.7,
            max_tokens: 512,
        }
    }
}

/// Which backend flavour to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// OpenAI-compatible chat completions API (OpenAI, DeepSeek, Ollama).
    OpenAi,
    /// Anthropic Messages API.
    Anthropic,
    /// No backend; every call falls through to the offline path.
    #[default]
    Offline,
}

/// Oracle configuration, loaded by the host from layered config files.
#[derive(Debug, Clone, Deserialize)]
pub struct OracleConfig {
    /// Which backend to construct.
    #[serde(default)]
    pub backend: BackendKind,
    /// Base API URL (e.g. `https://api.openai.com/v1`).
    #[serde(default)]
    pub api_url: String,
    /// API key. Empty means no key: the oracle reports unavailable.
    #[serde(default)]
    pub api_key: String,
    /// Generation model name.
    #[serde(default)]
    pub model: String,
    /// Embedding model name (OpenAI-compatible backends only).
    #[serde(default)]
    pub embed_model: String,
    /// Per-call deadline in seconds (clamped to at most 30).
    #[serde(default = "default_deadline")]
    pub deadline_secs: u64,
    /// Price per million input tokens, as a decimal string.
    #[serde(default)]
    pub input_rate: Option<Decimal>,
    /// Price per million output tokens, as a decimal string.
    #[serde(default)]
    pub output_rate: Option<Decimal>,
    /// Optional directory of prompt template overrides.
    #[serde(default)]
    pub templates_dir: Option<String>,
}

fn default_deadline() -> u64 {
    DEFAULT_DEADLINE_SECS
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Offline,
            api_url: String::new(),
            api_key: String::new(),
            model: String::new(),
            embed_model: String::new(),
            deadline_secs: DEFAULT_DEADLINE_SECS,
            input_rate: None,
            output_rate: None,
            templates_dir: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Token usage plumbing
// ---------------------------------------------------------------------------

/// Raw completion result from a backend: text plus token usage.
#[derive(Debug, Clone)]
struct Completion {
    text: String,
    input_tokens: u64,
    output_tokens: u64,
}

// ---------------------------------------------------------------------------
// OpenAI-compatible backend
// ---------------------------------------------------------------------------

/// Backend for OpenAI-compatible chat completions APIs.
///
/// Works with OpenAI, DeepSeek, and Ollama endpoints. Also provides
/// embeddings via `{api_url}/embeddings`.
pub struct OpenAiBackend {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    embed_model: String,
}

impl OpenAiBackend {
    /// Create a backend from configuration.
    pub fn new(config: &OracleConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            embed_model: config.embed_model.clone(),
        }
    }

    async fn complete(
        &self,
        system: &str,
        messages: &[serde_json::Value],
        opts: GenerateOptions,
    ) -> Result<Completion, OracleError> {
        let url = format!("{}/chat/completions", self.api_url);

        let mut all_messages = vec![serde_json::json!({"role": "system", "content": system})];
        all_messages.extend_from_slice(messages);

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": all_messages,
            "temperature": opts.temperature,
            "max_tokens": opts.max_tokens,
        });
        if opts.json
            && let Some(map) = body.as_object_mut()
        {
            map.insert(
                "response_format".to_owned(),
                serde_json::json!({"type": "json_object"}),
            );
        }

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| OracleError::Backend(format!("request failed: {e}")))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(OracleError::RateLimited);
        }
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".to_owned());
            return Err(OracleError::Backend(format!(
                "backend returned {status}: {error_body}"
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| OracleError::Backend(format!("response parse failed: {e}")))?;

        let text = json
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .ok_or_else(|| OracleError::Backend("missing message content".to_owned()))?
            .to_owned();

        let usage = json.get("usage");
        Ok(Completion {
            text,
            input_tokens: usage
                .and_then(|u| u.get("prompt_tokens"))
                .and_then(serde_json::Value::as_u64)
                .unwrap_or(0),
            output_tokens: usage
                .and_then(|u| u.get("completion_tokens"))
                .and_then(serde_json::Value::as_u64)
                .unwrap_or(0),
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Option<Vec<f32>>>, OracleError> {
        let url = format!("{}/embeddings", self.api_url);

        let body = serde_json::json!({
            "model": self.embed_model,
            "input": texts,
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| OracleError::Backend(format!("embedding request failed: {e}")))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(OracleError::RateLimited);
        }
        if !status.is_success() {
            return Err(OracleError::Backend(format!(
                "embedding backend returned {status}"
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| OracleError::Backend(format!("embedding parse failed: {e}")))?;

        let mut out: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        if let Some(data) = json.get("data").and_then(|d| d.as_array()) {
            for item in data {
                let index = item
                    .get("index")
                    .and_then(serde_json::Value::as_u64)
                    .and_then(|i| usize::try_from(i).ok());
                let vector = item.get("embedding").and_then(|e| e.as_array()).map(|arr| {
                    arr.iter()
                        .filter_map(serde_json::Value::as_f64)
                        .map(|v| v as f32)
                        .collect::<Vec<f32>>()
                });
                if let (Some(index), Some(vector)) = (index, vector)
                    && let Some(slot) = out.get_mut(index)
                {
                    *slot = Some(vector);
                }
            }
        }
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Anthropic backend
// ---------------------------------------------------------------------------

/// Backend for the Anthropic Messages API. Generation only; embedding
/// requests report the capability as absent.
pub struct AnthropicBackend {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl AnthropicBackend {
    /// Create a backend from configuration.
    pub fn new(config: &OracleConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }

    async fn complete(
        &self,
        system: &str,
        messages: &[serde_json::Value],
        opts: GenerateOptions,
    ) -> Result<Completion, OracleError> {
        let url = format!("{}/v1/messages", self.api_url);

        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": opts.max_tokens,
            "temperature": opts.temperature,
            "system": system,
            "messages": messages,
        });

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| OracleError::Backend(format!("request failed: {e}")))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(OracleError::RateLimited);
        }
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".to_owned());
            return Err(OracleError::Backend(format!(
                "backend returned {status}: {error_body}"
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| OracleError::Backend(format!("response parse failed: {e}")))?;

        let text = json
            .get("content")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("text"))
            .and_then(|t| t.as_str())
            .ok_or_else(|| OracleError::Backend("missing content text".to_owned()))?
            .to_owned();

        let usage = json.get("usage");
        Ok(Completion {
            text,
            input_tokens: usage
                .and_then(|u| u.get("input_tokens"))
                .and_then(serde_json::Value::as_u64)
                .unwrap_or(0),
            output_tokens: usage
                .and_then(|u| u.get("output_tokens"))
                .and_then(serde_json::Value::as_u64)
                .unwrap_or(0),
        })
    }
}

// ---------------------------------------------------------------------------
// Scripted backend (tests and demos)
// ---------------------------------------------------------------------------

/// A backend that replays queued responses in order.
///
/// When the queue is empty the backend reports itself unavailable, which
/// exercises every caller's offline fallback. Embeddings, when enabled,
/// are deterministic hashes of the input tokens so that retrieval tests
/// see stable cosine similarities.
pub struct ScriptedBackend {
    responses: Mutex<VecDeque<String>>,
    embeddings_enabled: bool,
    calls: Mutex<u64>,
}

impl ScriptedBackend {
    /// Create a scripted backend with queued responses.
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            embeddings_enabled: false,
            calls: Mutex::new(0),
        }
    }

    /// Enable deterministic pseudo-embeddings.
    pub const fn with_embeddings(mut self) -> Self {
        self.embeddings_enabled = true;
        self
    }

    /// Number of generation calls served so far.
    pub fn calls(&self) -> u64 {
        self.calls.lock().map_or(0, |c| *c)
    }

    /// Push another response onto the back of the queue.
    pub fn push(&self, response: impl Into<String>) {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(response.into());
        }
    }

    fn next_response(&self) -> Result<Completion, OracleError> {
        if let Ok(mut calls) = self.calls.lock() {
            *calls = calls.saturating_add(1);
        }
        let popped = self
            .responses
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front());
        popped.map_or_else(
            || {
                Err(OracleError::Unavailable {
                    reason: "scripted queue exhausted".to_owned(),
                })
            },
            |text| {
                Ok(Completion {
                    text,
                    input_tokens: 0,
                    output_tokens: 0,
                })
            },
        )
    }

    /// Deterministic pseudo-embedding: tokens hashed into a fixed-size
    /// bag-of-words vector, L2-normalised.
    fn pseudo_embed(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; SCRIPTED_EMBED_DIM];
        for token in text.split_whitespace() {
            // FNV-1a over the lowercased token.
            let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
            for byte in token.to_lowercase().bytes() {
                hash ^= u64::from(byte);
                hash = hash.wrapping_mul(0x0000_0100_0000_01B3);
            }
            let slot = usize::try_from(hash % SCRIPTED_EMBED_DIM as u64).unwrap_or(0);
            if let Some(v) = vector.get_mut(slot) {
                *v += 1.0;
            }
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

// ---------------------------------------------------------------------------
// Unified backend enum
// ---------------------------------------------------------------------------

/// An oracle backend, dispatched by enum instead of trait object.
pub enum Backend {
    /// OpenAI-compatible chat completions API.
    OpenAi(OpenAiBackend),
    /// Anthropic Messages API.
    Anthropic(AnthropicBackend),
    /// Canned responses for tests and demos.
    Scripted(ScriptedBackend),
    /// No backend configured.
    Offline,
}

impl Backend {
    /// Human-readable name for logging.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::OpenAi(_) => "openai-compatible",
            Self::Anthropic(_) => "anthropic",
            Self::Scripted(_) => "scripted",
            Self::Offline => "offline",
        }
    }

    /// Whether any credential or canned source is present.
    pub const fn has_any_key(&self) -> bool {
        !matches!(self, Self::Offline)
    }

    /// Whether the backend can produce embeddings.
    pub fn can_embed(&self) -> bool {
        match self {
            Self::OpenAi(backend) => !backend.embed_model.is_empty(),
            Self::Scripted(backend) => backend.embeddings_enabled,
            Self::Anthropic(_) | Self::Offline => false,
        }
    }

    async fn complete(
        &self,
        system: &str,
        messages: &[serde_json::Value],
        opts: GenerateOptions,
    ) -> Result<Completion, OracleError> {
        match self {
            Self::OpenAi(backend) => backend.complete(system, messages, opts).await,
            Self::Anthropic(backend) => backend.complete(system, messages, opts).await,
            Self::Scripted(backend) => backend.next_response(),
            Self::Offline => Err(OracleError::Unavailable {
                reason: "no backend configured".to_owned(),
            }),
        }
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Option<Vec<f32>>>, OracleError> {
        match self {
            Self::OpenAi(backend) => backend.embed_batch(texts).await,
            Self::Scripted(backend) if backend.embeddings_enabled => Ok(texts
                .iter()
                .map(|t| Some(ScriptedBackend::pseudo_embed(t)))
                .collect()),
            _ => Err(OracleError::Unavailable {
                reason: "backend cannot embed".to_owned(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Oracle
// ---------------------------------------------------------------------------

/// The oracle handle consumed by cognition.
///
/// Wraps a backend with deadline enforcement, the rolling failure
/// counter, the rate-limit latch, cost accounting, and the prompt
/// template engine.
pub struct Oracle {
    backend: Backend,
    prompts: PromptEngine,
    failures: Mutex<FailureTracker>,
    cost: CostTracker,
    deadline: Duration,
    rate_limited_until: Mutex<Option<Instant>>,
}

impl Oracle {
    /// Construct an oracle from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError::Template`] if prompt templates fail to load.
    pub fn from_config(config: &OracleConfig) -> Result<Self, OracleError> {
        let backend = match config.backend {
            BackendKind::OpenAi if !config.api_key.is_empty() => {
                Backend::OpenAi(OpenAiBackend::new(config))
            }
            BackendKind::Anthropic if !config.api_key.is_empty() => {
                Backend::Anthropic(AnthropicBackend::new(config))
            }
            _ => Backend::Offline,
        };
        let prompts = match &config.templates_dir {
            Some(dir) => PromptEngine::with_overrides(dir)?,
            None => PromptEngine::new()?,
        };
        let cost = match (config.input_rate, config.output_rate) {
            (Some(input), Some(output)) => CostTracker::new(input, output),
            _ => CostTracker::free(),
        };
        Ok(Self {
            backend,
            prompts,
            failures: Mutex::new(FailureTracker::new()),
            cost,
            deadline: Duration::from_secs(config.deadline_secs.clamp(1, DEFAULT_DEADLINE_SECS)),
            rate_limited_until: Mutex::new(None),
        })
    }

    /// Construct an oracle around an explicit backend (tests, demos).
    ///
    /// # Errors
    ///
    /// Returns [`OracleError::Template`] if prompt templates fail to load.
    pub fn with_backend(backend: Backend) -> Result<Self, OracleError> {
        Ok(Self {
            backend,
            prompts: PromptEngine::new()?,
            failures: Mutex::new(FailureTracker::new()),
            cost: CostTracker::free(),
            deadline: Duration::from_secs(DEFAULT_DEADLINE_SECS),
            rate_limited_until: Mutex::new(None),
        })
    }

    /// The shared prompt template engine.
    pub const fn prompts(&self) -> &PromptEngine {
        &self.prompts
    }

    /// Whether any backend credential is configured.
    pub const fn has_any_key(&self) -> bool {
        self.backend.has_any_key()
    }

    /// Whether the backend can produce embeddings.
    pub fn can_embed(&self) -> bool {
        self.backend.can_embed()
    }

    /// Best-effort rate-limit signal. Latched for a cool-down window
    /// after an HTTP 429; callers must still handle per-call failures.
    pub fn is_rate_limited(&self) -> bool {
        self.rate_limited_until
            .lock()
            .ok()
            .and_then(|until| *until)
            .is_some_and(|until| Instant::now() < until)
    }

    /// Current decayed failure count.
    pub fn failure_count(&self) -> u32 {
        self.failures.lock().map_or(0, |mut f| f.count())
    }

    /// Accumulated cost totals.
    pub fn cost_summary(&self) -> CostSummary {
        self.cost.summary()
    }

    /// Generate raw text from a rendered prompt.
    ///
    /// Enforces the call deadline, records failures into the adaptive
    /// counter, latches the rate-limit flag on 429, and records token
    /// usage on success.
    ///
    /// # Errors
    ///
    /// Returns the [`OracleError`] taxonomy; see [`crate::error`].
    pub async fn generate(
        &self,
        prompt: &RenderedPrompt,
        opts: GenerateOptions,
    ) -> Result<String, OracleError> {
        let messages = vec![serde_json::json!({"role": "user", "content": prompt.user})];
        self.call(&prompt.system, &messages, opts).await
    }

    /// Generate and parse a JSON object, applying the recovery ladder.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError::Parse`] when recovery fails; transport
    /// errors pass through from [`generate`](Self::generate).
    pub async fn generate_json(
        &self,
        prompt: &RenderedPrompt,
        opts: GenerateOptions,
    ) -> Result<serde_json::Value, OracleError> {
        let text = self.generate(prompt, opts).await?;
        parse::recover_json(&text)
    }

    /// Multi-turn chat completion. Used by the player-chat surface only;
    /// cognition never calls this.
    ///
    /// `history` is a list of `(role, content)` pairs with roles `user`
    /// or `assistant`.
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`generate`](Self::generate).
    pub async fn chat(
        &self,
        system: &str,
        history: &[(String, String)],
        opts: GenerateOptions,
    ) -> Result<String, OracleError> {
        let messages: Vec<serde_json::Value> = history
            .iter()
            .map(|(role, content)| serde_json::json!({"role": role, "content": content}))
            .collect();
        self.call(system, &messages, opts).await
    }

    /// Embed a single text.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError::Unavailable`] when the backend cannot
    /// embed, otherwise the transport taxonomy.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, OracleError> {
        let batch = self.embed_batch(&[text.to_owned()]).await?;
        batch
            .into_iter()
            .next()
            .flatten()
            .ok_or_else(|| OracleError::Backend("empty embedding batch".to_owned()))
    }

    /// Embed a batch of texts. Slots that fail individually come back as
    /// `None`; a wholesale transport failure is an error.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError::Unavailable`] when the backend cannot
    /// embed, otherwise the transport taxonomy.
    pub async fn embed_batch(
        &self,
        texts: &[String],
    ) -> Result<Vec<Option<Vec<f32>>>, OracleError> {
        if !self.backend.can_embed() {
            return Err(OracleError::Unavailable {
                reason: "backend cannot embed".to_owned(),
            });
        }
        let result = tokio::time::timeout(self.deadline, self.backend.embed_batch(texts))
            .await
            .map_err(|_| OracleError::Timeout {
                deadline_ms: u64::try_from(self.deadline.as_millis()).unwrap_or(u64::MAX),
            })
            .and_then(|inner| inner);
        self.bookkeep(&result.as_ref().map(|_| ()).map_err(clone_error));
        result
    }

    /// Shared call path: deadline, bookkeeping, cost.
    async fn call(
        &self,
        system: &str,
        messages: &[serde_json::Value],
        opts: GenerateOptions,
    ) -> Result<String, OracleError> {
        if !self.backend.has_any_key() {
            return Err(OracleError::Unavailable {
                reason: "no backend configured".to_owned(),
            });
        }

        let started = Instant::now();
        let result = tokio::time::timeout(
            self.deadline,
            self.backend.complete(system, messages, opts),
        )
        .await
        .map_err(|_| OracleError::Timeout {
            deadline_ms: u64::try_from(self.deadline.as_millis()).unwrap_or(u64::MAX),
        })
        .and_then(|inner| inner);

        match result {
            Ok(completion) => {
                self.cost
                    .record_call(completion.input_tokens, completion.output_tokens);
                debug!(
                    backend = self.backend.name(),
                    latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                    "oracle call succeeded"
                );
                self.bookkeep(&Ok(()));
                Ok(completion.text)
            }
            Err(err) => {
                warn!(backend = self.backend.name(), error = %err, "oracle call failed");
                self.bookkeep(&Err(clone_error(&err)));
                Err(err)
            }
        }
    }

    /// Update the failure counter and rate-limit latch from an outcome.
    fn bookkeep(&self, outcome: &Result<(), OracleError>) {
        if let Err(err) = outcome {
            if err.counts_as_failure()
                && let Ok(mut failures) = self.failures.lock()
            {
                failures.record_failure();
            }
            if matches!(err, OracleError::RateLimited)
                && let Ok(mut until) = self.rate_limited_until.lock()
            {
                *until = Instant::now().checked_add(Duration::from_secs(RATE_LIMIT_LATCH_SECS));
            }
        }
    }
}

/// Clone an error's identity for bookkeeping without moving the original.
fn clone_error(err: &OracleError) -> OracleError {
    match err {
        OracleError::Unavailable { reason } => OracleError::Unavailable {
            reason: reason.clone(),
        },
        OracleError::RateLimited => OracleError::RateLimited,
        OracleError::Timeout { deadline_ms } => OracleError::Timeout {
            deadline_ms: *deadline_ms,
        },
        OracleError::Backend(msg) => OracleError::Backend(msg.clone()),
        OracleError::Template(msg) => OracleError::Template(msg.clone()),
        OracleError::Parse(msg) => OracleError::Parse(msg.clone()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn scripted(responses: Vec<&str>) -> Oracle {
        Oracle::with_backend(Backend::Scripted(ScriptedBackend::new(responses))).unwrap()
    }

    #[tokio::test]
    async fn scripted_backend_replays_in_order() {
        let oracle = scripted(vec![r#"{"a": 1}"#, r#"{"a": 2}"#]);
        let prompt = RenderedPrompt {
            system: "s".to_owned(),
            user: "u".to_owned(),
        };
        let first = oracle
            .generate_json(&prompt, GenerateOptions::default())
            .await
            .unwrap();
        let second = oracle
            .generate_json(&prompt, GenerateOptions::default())
            .await
            .unwrap();
        assert_eq!(first.get("a").and_then(serde_json::Value::as_u64), Some(1));
        assert_eq!(second.get("a").and_then(serde_json::Value::as_u64), Some(2));
    }

    #[tokio::test]
    async fn exhausted_scripted_queue_is_unavailable_not_failure() {
        let oracle = scripted(vec![]);
        let prompt = RenderedPrompt {
            system: "s".to_owned(),
            user: "u".to_owned(),
        };
        let err = oracle
            .generate(&prompt, GenerateOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, OracleError::Unavailable { .. }));
        assert_eq!(oracle.failure_count(), 0);
    }

    #[tokio::test]
    async fn offline_backend_reports_no_key() {
        let oracle = Oracle::with_backend(Backend::Offline).unwrap();
        assert!(!oracle.has_any_key());
        assert!(!oracle.can_embed());
        assert!(!oracle.is_rate_limited());
    }

    #[tokio::test]
    async fn scripted_embeddings_are_deterministic() {
        let backend = ScriptedBackend::new(Vec::<String>::new()).with_embeddings();
        let oracle = Oracle::with_backend(Backend::Scripted(backend)).unwrap();
        assert!(oracle.can_embed());
        let a = oracle.embed("fire at the bakery").await.unwrap();
        let b = oracle.embed("fire at the bakery").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), SCRIPTED_EMBED_DIM);
    }

    #[test]
    fn config_defaults_to_offline() {
        let config = OracleConfig::default();
        let oracle = Oracle::from_config(&config).unwrap();
        assert!(!oracle.has_any_key());
    }
}
