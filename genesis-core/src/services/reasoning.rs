//! services/reasoning.rs
//!
//! Signal → label → enriched decision → reward → analysis.
//! Everything here is pure: no I/O, no clocks, no shared state.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{InputError, PipelineError};

/// Scalar summary of an embedding. Always finite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Signal {
    mean: f64,
    std: f64,
}

impl Signal {
    /// A bare signal value, as if it were the mean of a constant embedding.
    pub fn new(value: f64) -> Result<Self, InputError> {
        if !value.is_finite() {
            return Err(InputError::NonFinite { index: 0 });
        }
        Ok(Self {
            mean: value,
            std: 0.0,
        })
    }

    /// Population mean and standard deviation over the embedding.
    pub fn from_embedding(values: &[f32]) -> Result<Self, InputError> {
        if values.is_empty() {
            return Err(InputError::EmptyEmbedding);
        }
        if let Some(index) = values.iter().position(|v| !v.is_finite()) {
            return Err(InputError::NonFinite { index });
        }
        let n = values.len() as f64;
        let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;
        let var = values
            .iter()
            .map(|&v| {
                let d = v as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / n;
        Ok(Self { mean, std: var.sqrt() })
    }

    pub fn value(&self) -> f64 {
        self.mean
    }

    pub fn std(&self) -> f64 {
        self.std
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    Positive,
    Negative,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Positive => "Positive",
            Label::Negative => "Negative",
        }
    }

    fn lowercase(&self) -> &'static str {
        match self {
            Label::Positive => "positive",
            Label::Negative => "negative",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `+1` for a positive decision, `-1` otherwise. Stored as a bare integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i64", try_from = "i64")]
pub enum Reward {
    Positive,
    Negative,
}

impl Reward {
    pub fn value(self) -> i64 {
        match self {
            Reward::Positive => 1,
            Reward::Negative => -1,
        }
    }
}

impl From<Reward> for i64 {
    fn from(r: Reward) -> i64 {
        r.value()
    }
}

impl TryFrom<i64> for Reward {
    type Error = String;

    fn try_from(v: i64) -> Result<Self, Self::Error> {
        match v {
            1 => Ok(Reward::Positive),
            -1 => Ok(Reward::Negative),
            other => Err(format!("reward must be 1 or -1, got {other}")),
        }
    }
}

impl fmt::Display for Reward {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// A labeled decision with its graph context. Renders to the stored decision text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub label: Label,
    pub concept: String,
    pub related: Vec<String>,
}

impl Decision {
    pub fn text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} inference: The input context is interpreted as {}. \
             Additionally, related concepts for {} are: {}.",
            self.label.as_str(),
            self.label.lowercase(),
            quote(&self.concept),
            list_literal(&self.related),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub average_signal_value: f64,
    pub improvement_needed: bool,
}

pub const IMPROVEMENT_EXECUTED: &str = "Self-improvement executed: System parameters updated.";
pub const NO_IMPROVEMENT_REQUIRED: &str =
    "System is performing optimally. No self-improvement required.";

#[derive(Debug, Clone, Copy, Default)]
pub struct DecisionEngine;

impl DecisionEngine {
    pub fn new() -> Self {
        Self
    }

    /// Positive iff the signal is strictly above zero.
    pub fn base_decision(&self, signal: &Signal) -> Label {
        if signal.value() > 0.0 {
            Label::Positive
        } else {
            Label::Negative
        }
    }

    pub fn enrich(&self, label: Label, concept: &str, related: Vec<String>) -> Decision {
        Decision {
            label,
            concept: concept.to_string(),
            related,
        }
    }

    pub fn evaluate(&self, decision: &Decision) -> Reward {
        match decision.label {
            Label::Positive => Reward::Positive,
            Label::Negative => Reward::Negative,
        }
    }

    /// Recover the reward from persisted decision text.
    pub fn evaluate_text(&self, text: &str) -> Result<Reward, PipelineError> {
        let head = text.trim_start();
        if head.starts_with("Positive inference") {
            Ok(Reward::Positive)
        } else if head.starts_with("Negative inference") {
            Ok(Reward::Negative)
        } else {
            Err(PipelineError::UnrecognizedDecision(text.to_string()))
        }
    }

    pub fn analyze(&self, signal: &Signal, _decision: &Decision, reward: Reward) -> AnalysisReport {
        AnalysisReport {
            average_signal_value: signal.value(),
            improvement_needed: reward.value() < 0,
        }
    }

    pub fn summarize_improvement(&self, report: &AnalysisReport) -> &'static str {
        if report.improvement_needed {
            IMPROVEMENT_EXECUTED
        } else {
            NO_IMPROVEMENT_REQUIRED
        }
    }
}

// Renders strings the way the stored decision text has always quoted them:
// single quotes unless the value itself contains one.
fn quote(s: &str) -> String {
    if s.contains('\'') && !s.contains('"') {
        format!("\"{s}\"")
    } else {
        format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
    }
}

fn list_literal(items: &[String]) -> String {
    let inner: Vec<String> = items.iter().map(|s| quote(s)).collect();
    format!("[{}]", inner.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(v: f64) -> Signal {
        Signal::new(v).unwrap()
    }

    #[test]
    fn boundary_at_zero_is_negative() {
        let engine = DecisionEngine::new();
        assert_eq!(engine.base_decision(&sig(0.0)), Label::Negative);
        assert_eq!(engine.base_decision(&sig(-0.0)), Label::Negative);
        assert_eq!(engine.base_decision(&sig(1e-12)), Label::Positive);
        assert_eq!(engine.base_decision(&sig(-3.5)), Label::Negative);
    }

    #[test]
    fn non_finite_signals_are_rejected() {
        assert!(matches!(Signal::new(f64::NAN), Err(InputError::NonFinite { .. })));
        assert!(matches!(
            Signal::from_embedding(&[0.1, f32::INFINITY]),
            Err(InputError::NonFinite { index: 1 })
        ));
        assert!(matches!(Signal::from_embedding(&[]), Err(InputError::EmptyEmbedding)));
    }

    #[test]
    fn embedding_stats_use_population_std() {
        let s = Signal::from_embedding(&[1.0, 3.0]).unwrap();
        assert_eq!(s.value(), 2.0);
        assert_eq!(s.std(), 1.0);
    }

    #[test]
    fn decision_text_is_deterministic() {
        let engine = DecisionEngine::new();
        let related = vec![
            "Artificial Intelligence".to_string(),
            "Neural Networks".to_string(),
        ];
        let d = engine.enrich(Label::Positive, "Machine Learning", related.clone());
        assert_eq!(
            d.text(),
            "Positive inference: The input context is interpreted as positive. \
             Additionally, related concepts for 'Machine Learning' are: \
             ['Artificial Intelligence', 'Neural Networks']."
        );
        assert_eq!(d.text(), engine.enrich(Label::Positive, "Machine Learning", related).text());

        let miss = engine.enrich(Label::Negative, "Quantum", Vec::new());
        assert_eq!(
            miss.text(),
            "Negative inference: The input context is interpreted as negative. \
             Additionally, related concepts for 'Quantum' are: []."
        );
    }

    #[test]
    fn reward_matches_label_and_text() {
        let engine = DecisionEngine::new();
        for label in [Label::Positive, Label::Negative] {
            let d = engine.enrich(label, "Machine Learning", vec!["Neural Networks".into()]);
            let reward = engine.evaluate(&d);
            assert_eq!(reward.value() == 1, label == Label::Positive);
            assert_eq!(engine.evaluate_text(&d.text()).unwrap(), reward);
        }
        assert!(matches!(
            engine.evaluate_text("Undecided inference"),
            Err(PipelineError::UnrecognizedDecision(_))
        ));
    }

    #[test]
    fn analysis_flags_negative_reward() {
        let engine = DecisionEngine::new();
        let d = engine.enrich(Label::Negative, "Machine Learning", Vec::new());
        let report = engine.analyze(&sig(-0.25), &d, Reward::Negative);
        assert_eq!(report.average_signal_value, -0.25);
        assert!(report.improvement_needed);
        assert_eq!(engine.summarize_improvement(&report), IMPROVEMENT_EXECUTED);

        let ok = AnalysisReport {
            average_signal_value: 0.5,
            improvement_needed: false,
        };
        assert_eq!(engine.summarize_improvement(&ok), NO_IMPROVEMENT_REQUIRED);
    }

    #[test]
    fn reward_serializes_as_bare_integer() {
        assert_eq!(serde_json::to_string(&Reward::Negative).unwrap(), "-1");
        assert_eq!(serde_json::from_str::<Reward>("1").unwrap(), Reward::Positive);
        assert!(serde_json::from_str::<Reward>("0").is_err());
    }
}
