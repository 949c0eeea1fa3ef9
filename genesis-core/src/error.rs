//! Typed failures for the decision pipeline.
//!
//! Library code returns these; configuration, initialization and the driver
//! glue stay on `anyhow` and attach context as they go.

use std::path::PathBuf;
use thiserror::Error;

use crate::commands::pipeline::Step;
use crate::services::memory::Tier;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("input file {} could not be read: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("embedder returned an empty vector")]
    EmptyEmbedding,
    #[error("embedding contains a non-finite value at index {index}")]
    NonFinite { index: usize },
    #[error("invalid shape {0:?}: expected dimensions like 3x224x224")]
    InvalidShape(String),
}

/// Failure to read or write a tier artifact. Never used for "no records".
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("{tier} store I/O failed at {}: {source}", .path.display())]
    Io {
        tier: Tier,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{tier} store artifact at {} is corrupt: {source}", .path.display())]
    Corrupt {
        tier: Tier,
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{tier} store could not encode records for {}: {source}", .path.display())]
    Encode {
        tier: Tier,
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl PersistenceError {
    pub fn tier(&self) -> Tier {
        match self {
            Self::Io { tier, .. } | Self::Corrupt { tier, .. } | Self::Encode { tier, .. } => *tier,
        }
    }

    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::Io { path, .. } | Self::Corrupt { path, .. } | Self::Encode { path, .. } => path,
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error("decision text carries no recognizable label: {0:?}")]
    UnrecognizedDecision(String),
    #[error("collaborator `{name}` failed: {message}")]
    Collaborator { name: &'static str, message: String },
}

impl PipelineError {
    /// Flatten an `anyhow` chain from a collaborator into a typed error.
    pub fn collaborator(name: &'static str, err: anyhow::Error) -> Self {
        Self::Collaborator {
            name,
            message: format!("{err:#}"),
        }
    }
}

/// A single pipeline pass that stopped at `step`. Earlier persisted state is untouched.
#[derive(Debug, Error)]
#[error("run failed at step {step}: {source}")]
pub struct RunError {
    pub step: Step,
    #[source]
    pub source: PipelineError,
}

impl RunError {
    pub fn new(step: Step, source: impl Into<PipelineError>) -> Self {
        Self {
            step,
            source: source.into(),
        }
    }
}
