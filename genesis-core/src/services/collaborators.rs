//! services/collaborators.rs
//!
//! Boundaries the pipeline calls out to but does not own: acting on a
//! decision, asking for user feedback, and pulling external text.

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

use crate::services::reasoning::{Decision, Label};

pub trait ActionExecutor: Send + Sync {
    fn execute(&self, decision: &Decision) -> String;
}

/// Reports the action it would have taken.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedAction;

impl ActionExecutor for SimulatedAction {
    fn execute(&self, decision: &Decision) -> String {
        let outcome = match decision.label {
            Label::Positive => "Positive action executed: Affirmative tasks initiated.",
            Label::Negative => "Negative action executed: Caution tasks initiated.",
        };
        tracing::info!(label = %decision.label, "{outcome}");
        outcome.to_string()
    }
}

pub trait FeedbackSource: Send + Sync {
    fn feedback(&self) -> Result<String>;
}

/// Unattended runs: nobody to ask.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFeedback;

impl FeedbackSource for NoFeedback {
    fn feedback(&self) -> Result<String> {
        Ok(String::new())
    }
}

/// Canned feedback, e.g. supplied on the command line.
#[derive(Debug, Clone, Default)]
pub struct FixedFeedback(pub String);

impl FeedbackSource for FixedFeedback {
    fn feedback(&self) -> Result<String> {
        Ok(normalize_feedback(&self.0))
    }
}

/// `none` (any case, surrounding whitespace ignored) means no feedback.
pub fn normalize_feedback(raw: &str) -> String {
    let t = raw.trim();
    if t.eq_ignore_ascii_case("none") {
        String::new()
    } else {
        t.to_string()
    }
}

pub trait ExternalTextSource: Send + Sync {
    fn fetch(&self) -> Result<Vec<String>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoExternalText;

impl ExternalTextSource for NoExternalText {
    fn fetch(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

/// One item per non-blank line of a local file.
#[derive(Debug, Clone)]
pub struct LineFileSource {
    path: PathBuf,
}

impl LineFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ExternalTextSource for LineFileSource {
    fn fetch(&self) -> Result<Vec<String>> {
        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("reading external text from {}", self.path.display()))?;
        let items: Vec<String> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        tracing::debug!(path = %self.path.display(), items = items.len(), "external text fetched");
        Ok(items)
    }
}

/// External items and feedback folded into one opaque training string.
pub fn training_input(external: &[String], feedback: &str) -> String {
    format!("{} {}", external.join(" "), feedback)
}
