// genesis-core/src/lib.rs

pub mod commands;
pub mod config;
pub mod error;
pub mod services;

pub use commands::{InitReport, Orchestrator, RunReport, RunRequest, Step, ensure_initialized};
pub use config::CoreConfig;
pub use error::{InputError, PersistenceError, PipelineError, RunError};
