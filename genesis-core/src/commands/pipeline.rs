// genesis-core/src/commands/pipeline.rs
//
// One pass: ingest → embed → reason → enrich → evaluate → analyze → act →
// persist (short-term) → review → persist (long-term) → query.

use anyhow::Result;
use chrono::Utc;
use crossbeam_channel::{bounded, unbounded};
use serde::Serialize;
use serde_json::json;
use std::fmt;
use std::path::{Path, PathBuf};
use std::thread;

use crate::commands::init::ensure_initialized;
use crate::config::CoreConfig;
use crate::error::{PipelineError, RunError};
use crate::services::analyzer::{CodeAnalyzer, HeuristicAnalyzer, PerformanceReport};
use crate::services::audit::Logbook;
use crate::services::collaborators::{
    self, ActionExecutor, ExternalTextSource, FeedbackSource, NoExternalText, NoFeedback,
    SimulatedAction,
};
use crate::services::graph::ConceptGraph;
use crate::services::memory::{
    EmbeddingStats, EventRecord, LongTermEvent, LongTermStore, MultiModal, ShortTermStore,
};
use crate::services::perception::{self, Embedder, HashingEmbedder};
use crate::services::reasoning::{AnalysisReport, Decision, DecisionEngine, Reward, Signal};

/// Prompt handed to the analyzer for its targeted suggestion on every run.
const BOTTLENECK_PROMPT: &str = "The system's tokenization process is identified as a bottleneck.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Step {
    Ingest,
    Embed,
    Reason,
    Enrich,
    Evaluate,
    Analyze,
    Act,
    PersistShortTerm,
    ReviewShortTerm,
    PersistLongTerm,
    QueryLongTerm,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Step::Ingest => "ingest",
            Step::Embed => "embed",
            Step::Reason => "reason",
            Step::Enrich => "enrich",
            Step::Evaluate => "evaluate",
            Step::Analyze => "analyze",
            Step::Act => "act",
            Step::PersistShortTerm => "persist_short_term",
            Step::ReviewShortTerm => "review_short_term",
            Step::PersistLongTerm => "persist_long_term",
            Step::QueryLongTerm => "query_long_term",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub enum InputSource {
    File(PathBuf),
    Inline(String),
}

#[derive(Debug, Clone)]
pub struct RunRequest {
    pub input: InputSource,
    pub multi_modal: MultiModal,
    /// Overrides `reasoning.query_term` for this run.
    pub query_term: Option<String>,
}

impl RunRequest {
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self {
            input: InputSource::File(path.into()),
            multi_modal: MultiModal::default(),
            query_term: None,
        }
    }

    pub fn inline(text: impl Into<String>) -> Self {
        Self {
            input: InputSource::Inline(text.into()),
            multi_modal: MultiModal::default(),
            query_term: None,
        }
    }

    pub fn with_image_shape(mut self, shape: Vec<usize>) -> Self {
        self.multi_modal.image_embedding_shape = Some(shape);
        self
    }

    pub fn with_numerical_shape(mut self, shape: Vec<usize>) -> Self {
        self.multi_modal.numerical_data_shape = Some(shape);
        self
    }

    pub fn with_query(mut self, term: impl Into<String>) -> Self {
        self.query_term = Some(term.into());
        self
    }
}

/// Everything one pass produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub decision: Decision,
    pub reward: Reward,
    pub analysis: AnalysisReport,
    pub improvement_outcome: String,
    pub action_outcome: String,
    pub record: EventRecord,
    pub performance: PerformanceReport,
    pub code_suggestion: String,
    pub auto_code_suggestion: String,
    pub external_text: String,
    pub feedback: String,
    /// External text and feedback joined; carried as-is, nothing is trained on it.
    pub training_input: String,
    pub long_term_event: Option<LongTermEvent>,
    pub query_term: String,
    pub long_term_matches: Vec<LongTermEvent>,
}

pub struct Orchestrator {
    config: CoreConfig,
    graph: ConceptGraph,
    engine: DecisionEngine,
    short_term: ShortTermStore,
    long_term: LongTermStore,
    logbook: Logbook,
    embedder: Box<dyn Embedder>,
    action: Box<dyn ActionExecutor>,
    feedback: Box<dyn FeedbackSource>,
    external: Box<dyn ExternalTextSource>,
    analyzer: Box<dyn CodeAnalyzer>,
}

impl Orchestrator {
    /// Orchestrator with the default collaborators, over already-resolved config.
    pub fn new(config: CoreConfig) -> Self {
        let graph = ConceptGraph::from_config(&config.graph);
        let short_term = ShortTermStore::short_term(&config);
        let long_term = LongTermStore::long_term(&config);
        let logbook = Logbook::from_config(&config);
        let embedder = HashingEmbedder::new(config.ingestion.embedding_dim);
        Self {
            graph,
            engine: DecisionEngine::new(),
            short_term,
            long_term,
            logbook,
            embedder: Box::new(embedder),
            action: Box::new(SimulatedAction),
            feedback: Box::new(NoFeedback),
            external: Box::new(NoExternalText),
            analyzer: Box::new(HeuristicAnalyzer),
            config,
        }
    }

    /// Initialize the workspace at `root` and load its config.
    pub fn open(root: &Path) -> Result<Self> {
        let report = ensure_initialized(root)?;
        Ok(Self::new(report.config))
    }

    pub fn with_embedder(mut self, embedder: impl Embedder + 'static) -> Self {
        self.embedder = Box::new(embedder);
        self
    }

    pub fn with_action(mut self, action: impl ActionExecutor + 'static) -> Self {
        self.action = Box::new(action);
        self
    }

    pub fn with_feedback(mut self, feedback: impl FeedbackSource + 'static) -> Self {
        self.feedback = Box::new(feedback);
        self
    }

    pub fn with_external(mut self, external: impl ExternalTextSource + 'static) -> Self {
        self.external = Box::new(external);
        self
    }

    pub fn with_analyzer(mut self, analyzer: impl CodeAnalyzer + 'static) -> Self {
        self.analyzer = Box::new(analyzer);
        self
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn graph(&self) -> &ConceptGraph {
        &self.graph
    }

    pub fn short_term(&self) -> &ShortTermStore {
        &self.short_term
    }

    pub fn long_term(&self) -> &LongTermStore {
        &self.long_term
    }

    /// Exactly one pass. Nothing is persisted before `PersistShortTerm`, and
    /// nothing after a failed persist runs.
    pub fn run(&self, req: &RunRequest) -> Result<RunReport, RunError> {
        match self.run_steps(req) {
            Ok(report) => {
                self.logbook.record_action(
                    "orchestrator",
                    "run_completed",
                    &json!({
                        "input_summary": report.record.input_summary,
                        "reward": report.reward.value(),
                        "long_term": report.long_term_event.is_some(),
                        "matches": report.long_term_matches.len(),
                    }),
                    "low",
                );
                Ok(report)
            }
            Err(err) => {
                tracing::warn!(step = %err.step, error = %err.source, "run aborted");
                self.logbook.record_action(
                    "orchestrator",
                    "run_failed",
                    &json!({ "step": err.step.to_string(), "error": err.source.to_string() }),
                    "medium",
                );
                Err(err)
            }
        }
    }

    fn run_steps(&self, req: &RunRequest) -> Result<RunReport, RunError> {
        // 1. Ingest
        let raw = match &req.input {
            InputSource::File(path) => {
                perception::read_input(path).map_err(|e| RunError::new(Step::Ingest, e))?
            }
            InputSource::Inline(text) => text.clone(),
        };
        let processed = perception::preprocess_text(&raw).join(" ");
        let input_summary = perception::summarize_input(&raw, self.config.ingestion.preview_chars);

        // 2. Embed
        let embedding = self
            .embedder
            .embed(&processed)
            .map_err(|e| RunError::new(Step::Embed, PipelineError::collaborator("embedder", e)))?;
        let signal = Signal::from_embedding(&embedding).map_err(|e| RunError::new(Step::Embed, e))?;

        // 3-6. Reason, enrich, evaluate, analyze
        let label = self.engine.base_decision(&signal);
        let concept = self.config.reasoning.concept.as_str();
        let related = self.graph.neighbors(concept);
        let decision = self.engine.enrich(label, concept, related);
        let reward = self.engine.evaluate(&decision);
        let analysis = self.engine.analyze(&signal, &decision, reward);
        let improvement = self.engine.summarize_improvement(&analysis);
        tracing::debug!(signal = signal.value(), %label, %reward, "decision evaluated");

        // 7. Act + assemble
        let action_outcome = self.action.execute(&decision);
        let record = EventRecord {
            timestamp: Utc::now(),
            input_summary,
            embedding_stats: EmbeddingStats {
                mean: signal.value(),
                std: signal.std(),
            },
            decision: decision.text(),
            reward,
            analysis,
            improvement_outcome: format!("{improvement} | {action_outcome}"),
        };

        // 8. PersistShortTerm
        self.short_term
            .append(&record)
            .map_err(|e| RunError::new(Step::PersistShortTerm, e))?;

        // 9. ReviewShortTerm
        let history = self
            .short_term
            .retrieve_all()
            .map_err(|e| RunError::new(Step::ReviewShortTerm, e))?;
        let performance = self.analyzer.analyze(&history);
        let code_suggestion = self.analyzer.propose();
        let auto_code_suggestion = self.analyzer.suggest(BOTTLENECK_PROMPT);

        let external_items = self.external.fetch().unwrap_or_else(|e| {
            tracing::warn!(
                error = %format!("{e:#}"),
                "external text unavailable; continuing without it"
            );
            Vec::new()
        });
        let external_text = external_items.join(" ");
        let feedback = self.feedback.feedback().unwrap_or_else(|e| {
            tracing::warn!(
                error = %format!("{e:#}"),
                "feedback unavailable; continuing without it"
            );
            String::new()
        });
        let training_input = collaborators::training_input(&external_items, &feedback);

        // 10. PersistLongTerm
        let long_term_event = if req.multi_modal.is_empty() {
            None
        } else {
            let ev = LongTermEvent {
                event: record.clone(),
                multi_modal: req.multi_modal.clone(),
            };
            self.long_term
                .append(&ev)
                .map_err(|e| RunError::new(Step::PersistLongTerm, e))?;
            Some(ev)
        };

        // 11. QueryLongTerm
        let query_term = req
            .query_term
            .clone()
            .or_else(|| self.config.reasoning.query_term.clone())
            .unwrap_or_else(|| record.input_summary.clone());
        let long_term_matches = self
            .long_term
            .query(&query_term)
            .map_err(|e| RunError::new(Step::QueryLongTerm, e))?;

        tracing::info!(
            reward = reward.value(),
            history = history.len(),
            matches = long_term_matches.len(),
            "run complete"
        );

        Ok(RunReport {
            improvement_outcome: improvement.to_string(),
            decision,
            reward,
            analysis,
            action_outcome,
            record,
            performance,
            code_suggestion,
            auto_code_suggestion,
            external_text,
            feedback,
            training_input,
            long_term_event,
            query_term,
            long_term_matches,
        })
    }

    /// Independent runs over `workers` threads. Results come back in request
    /// order; one failure does not stop the rest.
    pub fn run_batch(
        &self,
        requests: &[RunRequest],
        workers: usize,
    ) -> Vec<Result<RunReport, RunError>> {
        if requests.is_empty() {
            return Vec::new();
        }
        let workers = workers.clamp(1, requests.len());
        let (tx, rx) = bounded::<(usize, &RunRequest)>(workers * 2);
        let (done_tx, done_rx) = unbounded();

        thread::scope(|s| {
            for _ in 0..workers {
                let rx = rx.clone();
                let done_tx = done_tx.clone();
                s.spawn(move || {
                    for (idx, req) in rx.iter() {
                        let _ = done_tx.send((idx, self.run(req)));
                    }
                });
            }
            drop(done_tx);
            drop(rx);
            for job in requests.iter().enumerate() {
                if tx.send(job).is_err() {
                    break;
                }
            }
            drop(tx);
        });

        let mut results: Vec<(usize, Result<RunReport, RunError>)> = done_rx.iter().collect();
        results.sort_by_key(|(idx, _)| *idx);
        tracing::info!(runs = results.len(), workers, "batch complete");
        results.into_iter().map(|(_, r)| r).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InputError;
    use crate::services::memory::Tier;

    struct Fixed(Vec<f32>);

    impl Embedder for Fixed {
        fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(self.0.clone())
        }
    }

    fn orchestrator(dir: &Path) -> Orchestrator {
        Orchestrator::open(dir).expect("open workspace")
    }

    #[test]
    fn positive_run_persists_one_record() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path()).with_embedder(Fixed(vec![0.5, 0.25]));
        let report = orch.run(&RunRequest::inline("hello genesis")).unwrap();

        assert_eq!(report.reward, Reward::Positive);
        assert_eq!(
            report.record.improvement_outcome,
            "System is performing optimally. No self-improvement required. | \
             Positive action executed: Affirmative tasks initiated."
        );
        assert_eq!(orch.short_term().len().unwrap(), 1);
        assert!(report.long_term_event.is_none());
        assert_eq!(report.query_term, "hello genesis");
        assert!(report.long_term_matches.is_empty());
    }

    #[test]
    fn empty_embedding_fails_before_persisting() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path()).with_embedder(Fixed(Vec::new()));
        let err = orch.run(&RunRequest::inline("anything")).unwrap_err();
        assert_eq!(err.step, Step::Embed);
        assert!(matches!(err.source, PipelineError::Input(InputError::EmptyEmbedding)));
        assert_eq!(orch.short_term().len().unwrap(), 0);
    }

    #[test]
    fn missing_input_file_fails_at_ingest() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path());
        let err = orch
            .run(&RunRequest::from_file(dir.path().join("nope.txt")))
            .unwrap_err();
        assert_eq!(err.step, Step::Ingest);
        assert_eq!(orch.short_term().len().unwrap(), 0);
    }

    #[test]
    fn corrupt_short_term_store_aborts_at_persist() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path()).with_embedder(Fixed(vec![1.0]));
        std::fs::write(orch.short_term().path(), "not json").unwrap();

        let err = orch
            .run(&RunRequest::inline("x").with_image_shape(vec![1, 512]))
            .unwrap_err();
        assert_eq!(err.step, Step::PersistShortTerm);
        match err.source {
            PipelineError::Persistence(p) => assert_eq!(p.tier(), Tier::ShortTerm),
            other => panic!("unexpected error: {other:?}"),
        }
        // Long-term step never ran.
        assert_eq!(orch.long_term().len().unwrap(), 0);
    }

    #[test]
    fn corrupt_long_term_store_aborts_at_persist_long_term() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path()).with_embedder(Fixed(vec![1.0]));
        std::fs::write(orch.long_term().path(), "[{ broken").unwrap();

        let err = orch
            .run(&RunRequest::inline("multi modal run").with_image_shape(vec![3, 224, 224]))
            .unwrap_err();
        assert_eq!(err.step, Step::PersistLongTerm);
        match &err.source {
            PipelineError::Persistence(p) => assert_eq!(p.tier(), Tier::LongTerm),
            other => panic!("unexpected error: {other:?}"),
        }

        // Step 8 already landed; the long-term artifact is left as it was.
        let short = orch.short_term().retrieve_all().unwrap();
        assert_eq!(short.len(), 1);
        assert_eq!(short[0].input_summary, "multi modal run");
        assert_eq!(std::fs::read_to_string(orch.long_term().path()).unwrap(), "[{ broken");

        // No completion was reported, only the failure at the long-term step.
        let log = std::fs::read_to_string(&orch.config().logbook.actions).unwrap();
        let actions: Vec<serde_json::Value> = log
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .filter(|v: &serde_json::Value| v["event"] == "action")
            .collect();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0]["action"], "run_failed");
        assert_eq!(actions[0]["details"]["step"], "persist_long_term");
    }

    #[test]
    fn independently_opened_orchestrators_lose_no_records() {
        let dir = tempfile::tempdir().unwrap();
        orchestrator(dir.path());
        let (threads, runs) = (4, 25);

        std::thread::scope(|s| {
            for t in 0..threads {
                let root = dir.path();
                s.spawn(move || {
                    let orch = orchestrator(root).with_embedder(Fixed(vec![0.5]));
                    for i in 0..runs {
                        orch.run(&RunRequest::inline(format!("worker {t} run {i}"))).unwrap();
                    }
                });
            }
        });

        let orch = orchestrator(dir.path());
        assert_eq!(orch.short_term().len().unwrap(), threads * runs);
    }

    #[test]
    fn batch_preserves_request_order() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path());
        let reqs: Vec<RunRequest> = (0..6)
            .map(|i| {
                if i == 3 {
                    RunRequest::from_file(dir.path().join("missing.txt"))
                } else {
                    RunRequest::inline(format!("batch item {i}"))
                }
            })
            .collect();
        let results = orch.run_batch(&reqs, 3);
        assert_eq!(results.len(), 6);
        for (i, r) in results.iter().enumerate() {
            match r {
                Ok(rep) => assert_eq!(rep.record.input_summary, format!("batch item {i}")),
                Err(e) => {
                    assert_eq!(i, 3);
                    assert_eq!(e.step, Step::Ingest);
                }
            }
        }
        assert_eq!(orch.short_term().len().unwrap(), 5);
    }
}
