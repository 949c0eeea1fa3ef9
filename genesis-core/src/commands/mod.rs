// src/commands/mod.rs
pub mod init;
pub mod pipeline;

pub use init::{InitReport, ensure_initialized};
pub use pipeline::{InputSource, Orchestrator, RunReport, RunRequest, Step};
