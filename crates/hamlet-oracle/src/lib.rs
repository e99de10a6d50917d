//! LLM oracle abstraction for the Hamlet simulation.
//!
//! The cognition core treats the language model as a fallible,
//! rate-limited external service. This crate provides:
//!
//! - [`backend`] -- enum-dispatched backends (OpenAI-compatible,
//!   Anthropic, scripted, offline) behind the unified [`Oracle`] handle
//! - [`prompt`] -- `minijinja` template engine with compiled-in defaults
//! - [`parse`] -- JSON recovery ladder and lenient field accessors
//! - [`failure`] -- the rolling failure counter with time decay
//! - [`cost`] -- `Decimal`-precise token cost accounting
//! - [`error`] -- the oracle error taxonomy
//!
//! Everything numeric that comes back from the oracle is validated and
//! clamped by the consumer; nothing in this crate throws on a malformed
//! model response.

pub mod backend;
pub mod cost;
pub mod error;
pub mod failure;
pub mod parse;
pub mod prompt;

pub use backend::{
    AnthropicBackend, Backend, BackendKind, GenerateOptions, OpenAiBackend, Oracle, OracleConfig,
    ScriptedBackend,
};
pub use cost::{CostSummary, CostTracker};
pub use error::OracleError;
pub use failure::{DECAY_INTERVAL_SECS, FailureTracker, decayed_count};
pub use parse::{field_bool, field_f64, field_str, recover_json};
pub use prompt::{PromptEngine, RenderedPrompt};
