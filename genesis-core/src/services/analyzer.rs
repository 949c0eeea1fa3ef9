//! services/analyzer.rs
//!
//! Reviews the short-term history after each persisted run and proposes
//! improvements. The default analyzer is a fixed heuristic; nothing is rewritten.

use serde::{Deserialize, Serialize};

use crate::services::memory::EventRecord;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    /// `None` when there was no history to average.
    pub average_reward: Option<f64>,
    pub improvement_needed: bool,
    pub suggestions: Vec<String>,
}

pub trait CodeAnalyzer: Send + Sync {
    fn analyze(&self, history: &[EventRecord]) -> PerformanceReport;

    /// Standing proposal, independent of any prompt.
    fn propose(&self) -> String;

    /// Suggestion for a specific bottleneck description.
    fn suggest(&self, prompt: &str) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicAnalyzer;

impl CodeAnalyzer for HeuristicAnalyzer {
    fn analyze(&self, history: &[EventRecord]) -> PerformanceReport {
        if history.is_empty() {
            return PerformanceReport {
                average_reward: None,
                improvement_needed: true,
                suggestions: vec!["No log data available.".to_string()],
            };
        }
        let total: i64 = history.iter().map(|r| r.reward.value()).sum();
        let average = total as f64 / history.len() as f64;
        let improvement_needed = average < 0.0;
        let suggestion = if improvement_needed {
            "Review reasoning algorithms; negative average reward suggests suboptimal decision-making."
        } else {
            "System performance is satisfactory."
        };
        PerformanceReport {
            average_reward: Some(average),
            improvement_needed,
            suggestions: vec![suggestion.to_string()],
        }
    }

    fn propose(&self) -> String {
        "Consider optimizing tokenization in the Perception Module to reduce processing time."
            .to_string()
    }

    fn suggest(&self, prompt: &str) -> String {
        let p = prompt.to_lowercase();
        if p.contains("tokenization") {
            "Suggestion: Optimize the tokenization process by caching results and reducing redundant computations."
        } else if p.contains("reasoning") {
            "Suggestion: Enhance the reasoning module by integrating a probabilistic inference layer."
        } else {
            "Suggestion: Review the module for potential optimizations and refactor redundant code."
        }
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::memory::EmbeddingStats;
    use crate::services::reasoning::{AnalysisReport, Reward};
    use chrono::Utc;

    fn rec(reward: Reward) -> EventRecord {
        EventRecord {
            timestamp: Utc::now(),
            input_summary: "s".into(),
            embedding_stats: EmbeddingStats {
                mean: 0.0,
                std: 0.0,
            },
            decision: String::new(),
            reward,
            analysis: AnalysisReport {
                average_signal_value: 0.0,
                improvement_needed: false,
            },
            improvement_outcome: String::new(),
        }
    }

    #[test]
    fn empty_history_asks_for_data() {
        let r = HeuristicAnalyzer.analyze(&[]);
        assert_eq!(r.average_reward, None);
        assert!(r.improvement_needed);
        assert_eq!(r.suggestions, vec!["No log data available."]);
    }

    #[test]
    fn averages_rewards() {
        let a = HeuristicAnalyzer;
        let r = a.analyze(&[
            rec(Reward::Positive),
            rec(Reward::Positive),
            rec(Reward::Negative),
            rec(Reward::Positive),
        ]);
        assert_eq!(r.average_reward, Some(0.5));
        assert!(!r.improvement_needed);

        let r = a.analyze(&[
            rec(Reward::Negative),
            rec(Reward::Negative),
            rec(Reward::Positive),
            rec(Reward::Positive),
        ]);
        assert_eq!(r.average_reward, Some(0.0));
        assert!(!r.improvement_needed);

        let r = a.analyze(&[rec(Reward::Negative)]);
        assert!(r.improvement_needed);
        assert!(r.suggestions[0].starts_with("Review reasoning algorithms"));
    }

    #[test]
    fn suggestions_follow_prompt_topic() {
        let a = HeuristicAnalyzer;
        assert!(a.suggest("The Tokenization step is slow").contains("caching results"));
        assert!(a.suggest("reasoning accuracy").contains("probabilistic inference"));
        assert!(a.suggest("memory usage").contains("refactor redundant code"));
    }
}
