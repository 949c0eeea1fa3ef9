//! services/audit.rs
//! Action logbook: one JSON object per line under `<root>/logbook/actions.jsonl`.
//!
//! Logging is best effort. A failed write is reported through `tracing` and
//! never interrupts the caller.

use chrono::Utc;
use serde::Serialize;
use serde_json::{Value, json};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::config::CoreConfig;

#[derive(Debug, Clone)]
pub struct Logbook {
    actions: PathBuf,
    enabled: bool,
    // Keeps concurrent runs from interleaving partial lines.
    write_lock: Arc<Mutex<()>>,
}

impl Logbook {
    pub fn from_config(cfg: &CoreConfig) -> Self {
        Self::new(cfg.logbook.actions.clone(), cfg.services.audit_enabled)
    }

    pub fn new(actions: impl Into<PathBuf>, enabled: bool) -> Self {
        Self {
            actions: actions.into(),
            enabled,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn actions_path(&self) -> &Path {
        &self.actions
    }

    /// Record a generic action event.
    ///
    /// # Arguments
    /// * `agent`: Component name (e.g. `"orchestrator"`).
    /// * `action`: Short verb label (e.g. `"run_completed"`).
    /// * `details`: Arbitrary JSON payload.
    /// * `severity`: `"low" | "medium" | "high"`.
    pub fn record_action(&self, agent: &str, action: &str, details: &Value, severity: &str) {
        if !self.enabled {
            return;
        }
        let entry = json!({
            "timestamp": Utc::now().to_rfc3339(),
            "event": "action",
            "agent": agent,
            "action": action,
            "severity": severity,
            "details": details,
        });
        if let Err(e) = self.append_jsonl(&entry) {
            tracing::warn!(path = %self.actions.display(), error = %e, "logbook write failed");
        }
    }

    fn append_jsonl<S: Serialize>(&self, val: &S) -> std::io::Result<()> {
        let line = serde_json::to_string(val)?;
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(parent) = self.actions.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.actions)?;
        writeln!(f, "{line}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_one_line_per_action() {
        let dir = tempfile::tempdir().unwrap();
        let log = Logbook::new(dir.path().join("logbook/actions.jsonl"), true);
        log.record_action("test", "first", &json!({"n": 1}), "low");
        log.record_action("test", "second", &json!({"n": 2}), "medium");

        let text = fs::read_to_string(log.actions_path()).unwrap();
        let lines: Vec<Value> = text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["action"], "first");
        assert_eq!(lines[1]["details"]["n"], 2);
        assert_eq!(lines[1]["severity"], "medium");
    }

    #[test]
    fn disabled_logbook_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let log = Logbook::new(dir.path().join("actions.jsonl"), false);
        log.record_action("test", "ignored", &json!({}), "low");
        assert!(!log.actions_path().exists());
    }

    #[test]
    fn write_failure_does_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        // Parent is a regular file, so the directory cannot be created.
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "x").unwrap();
        let log = Logbook::new(blocker.join("actions.jsonl"), true);
        log.record_action("test", "lost", &json!({}), "high");
    }
}
