// src/services/mod.rs

pub mod analyzer;       // history review + improvement suggestions
pub mod audit;          // JSONL action logbook
pub mod collaborators;  // action / feedback / external text boundaries
pub mod graph;
pub mod memory;         // the only writer of tier artifacts
pub mod perception;     // ingest, tokenize, summarize, embed
pub mod reasoning;

// Public API
pub use analyzer::{CodeAnalyzer, HeuristicAnalyzer, PerformanceReport};
pub use audit::Logbook;
pub use collaborators::{
    ActionExecutor, ExternalTextSource, FeedbackSource, FixedFeedback, LineFileSource,
    NoExternalText, NoFeedback, SimulatedAction,
};
pub use graph::ConceptGraph;
pub use memory::{
    EventRecord, EventStore, LongTermEvent, LongTermStore, MultiModal, ShortTermStore, StoredEvent,
    Tier,
};
pub use perception::{Embedder, HashingEmbedder};
pub use reasoning::{AnalysisReport, Decision, DecisionEngine, Label, Reward, Signal};
