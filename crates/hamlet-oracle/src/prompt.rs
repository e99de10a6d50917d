//! Prompt template loading and rendering via `minijinja`.
//!
//! Every oracle-facing subsystem renders its prompts through one shared
//! [`PromptEngine`]. Default templates are compiled into the binary; an
//! optional on-disk directory overrides them per deployment so operators
//! can tune agent behaviour without recompiling.

use minijinja::Environment;
use serde::Serialize;

use crate::error::OracleError;

/// Template names known to the engine, with their compiled-in defaults.
const BUILTIN_TEMPLATES: &[(&str, &str)] = &[
    ("system", include_str!("../templates/system.j2")),
    ("react", include_str!("../templates/react.j2")),
    ("plan_day", include_str!("../templates/plan_day.j2")),
    ("plan_hour", include_str!("../templates/plan_hour.j2")),
    ("plan_detail", include_str!("../templates/plan_detail.j2")),
    ("converse", include_str!("../templates/converse.j2")),
    ("consequence", include_str!("../templates/consequence.j2")),
    ("goals", include_str!("../templates/goals.j2")),
    (
        "reflect_questions",
        include_str!("../templates/reflect_questions.j2"),
    ),
    (
        "reflect_insights",
        include_str!("../templates/reflect_insights.j2"),
    ),
    ("object_states", include_str!("../templates/object_states.j2")),
    ("event_phases", include_str!("../templates/event_phases.j2")),
];

/// The complete rendered prompt ready to send to a backend.
#[derive(Debug, Clone)]
pub struct RenderedPrompt {
    /// System message establishing the agent's reality.
    pub system: String,
    /// User message with the task-specific context.
    pub user: String,
}

/// Manages prompt template loading and rendering.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    /// Create an engine with the compiled-in default templates.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError::Template`] if a built-in template fails to
    /// compile (a build-time defect surfaced at startup).
    pub fn new() -> Result<Self, OracleError> {
        let mut env = Environment::new();
        for (name, source) in BUILTIN_TEMPLATES {
            env.add_template_owned((*name).to_owned(), (*source).to_owned())
                .map_err(|e| {
                    OracleError::Template(format!("failed to add template {name}: {e}"))
                })?;
        }
        Ok(Self { env })
    }

    /// Create an engine overlaying templates from a directory.
    ///
    /// Files named `<template>.j2` in `dir` replace the built-in template
    /// of the same name; anything missing keeps its default.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError::Template`] if an override file exists but
    /// cannot be read or compiled.
    pub fn with_overrides(dir: &str) -> Result<Self, OracleError> {
        let mut env = Environment::new();
        for (name, source) in BUILTIN_TEMPLATES {
            let path = std::path::Path::new(dir).join(format!("{name}.j2"));
            let body = if path.is_file() {
                std::fs::read_to_string(&path).map_err(|e| {
                    OracleError::Template(format!("failed to read {}: {e}", path.display()))
                })?
            } else {
                (*source).to_owned()
            };
            env.add_template_owned((*name).to_owned(), body)
                .map_err(|e| {
                    OracleError::Template(format!("failed to add template {name}: {e}"))
                })?;
        }
        Ok(Self { env })
    }

    /// Render the shared system template plus a named user template.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError::Template`] if the named template is unknown
    /// or rendering fails.
    pub fn render<C: Serialize>(
        &self,
        template: &str,
        context: &C,
    ) -> Result<RenderedPrompt, OracleError> {
        let system = self.render_one("system", context)?;
        let user = self.render_one(template, context)?;
        Ok(RenderedPrompt { system, user })
    }

    /// Render a single named template.
    fn render_one<C: Serialize>(&self, name: &str, context: &C) -> Result<String, OracleError> {
        self.env
            .get_template(name)
            .map_err(|e| OracleError::Template(format!("missing template {name}: {e}")))?
            .render(context)
            .map_err(|e| OracleError::Template(format!("{name} render failed: {e}")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn builtin_templates_compile() {
        assert!(PromptEngine::new().is_ok());
    }

    #[test]
    fn react_template_renders_context() {
        let engine = PromptEngine::new().unwrap();
        let ctx = serde_json::json!({
            "agent_name": "Elena",
            "personality": "a curious baker",
            "observation": "smoke rising from the mill",
            "importance": 8,
            "current_activity": "kneading dough",
        });
        let prompt = engine.render("react", &ctx).unwrap();
        assert!(prompt.user.contains("Elena"));
        assert!(prompt.user.contains("smoke rising from the mill"));
        assert!(!prompt.system.is_empty());
    }

    #[test]
    fn unknown_template_is_an_error() {
        let engine = PromptEngine::new().unwrap();
        let err = engine.render("nonexistent", &serde_json::json!({}));
        assert!(err.is_err());
    }
}
