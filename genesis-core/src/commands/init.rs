// genesis-core/src/commands/init.rs

use anyhow::{Context, Result};
use chrono::Utc;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::CoreConfig;
use crate::services::memory::{LongTermStore, ShortTermStore};

#[derive(Debug, Clone)]
pub struct InitReport {
    pub root: PathBuf,
    pub created: Vec<String>,
    pub existed: Vec<String>,
    pub config: CoreConfig,
}

/// Lay out a workspace under `root` (idempotent). Safe to call before every run.
pub fn ensure_initialized(root: &Path) -> Result<InitReport> {
    let root = root.to_path_buf();
    let mut created = Vec::new();
    let mut existed = Vec::new();

    ensure_dir(&root, "", &mut created, &mut existed)?;
    ensure_file(&root, "config.toml", DEFAULT_CONFIG_TOML, &mut created, &mut existed)?;

    let config = CoreConfig::load(&root)?;

    let short = ShortTermStore::short_term(&config);
    track(&root, short.path(), short.initialize()?, &mut created, &mut existed);
    let long = LongTermStore::long_term(&config);
    track(&root, long.path(), long.initialize()?, &mut created, &mut existed);

    initialize_logbook(&root, &config, &mut created, &mut existed)?;

    tracing::debug!(root = %root.display(), created = created.len(), "workspace ready");
    Ok(InitReport { root, created, existed, config })
}

fn track(
    root: &Path,
    path: &Path,
    was_created: bool,
    created: &mut Vec<String>,
    existed: &mut Vec<String>,
) {
    let label = path
        .strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned();
    if was_created {
        created.push(label);
    } else {
        existed.push(label);
    }
}

fn ensure_dir(
    base: &Path,
    rel: &str,
    created: &mut Vec<String>,
    existed: &mut Vec<String>,
) -> Result<()> {
    let p = if rel.is_empty() { base.to_path_buf() } else { base.join(rel) };
    let label = if rel.is_empty() { ".".to_string() } else { rel.to_string() };
    if p.exists() {
        existed.push(label);
        return Ok(());
    }
    fs::create_dir_all(&p).with_context(|| format!("create_dir_all({:?})", p))?;
    created.push(label);
    Ok(())
}

fn ensure_file(
    base: &Path,
    rel_file: &str,
    content_if_absent: &str,
    created: &mut Vec<String>,
    existed: &mut Vec<String>,
) -> Result<()> {
    let p = base.join(rel_file);
    if p.exists() {
        existed.push(rel_file.to_string());
        return Ok(());
    }
    write_atomic(&p, content_if_absent.as_bytes())?;
    created.push(rel_file.to_string());
    Ok(())
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create_dir_all({:?})", parent))?;
    }
    let tmp = path.with_extension("tmp");
    {
        let mut f = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&tmp)
            .with_context(|| format!("open temp file {:?}", tmp))?;
        f.write_all(bytes)?;
        f.flush()?;
    }
    fs::rename(&tmp, path).with_context(|| format!("rename {:?} -> {:?}", tmp, path))?;
    Ok(())
}

/// Seed the actions log with a `system_init` line when it is missing or empty.
fn initialize_logbook(
    root: &Path,
    cfg: &CoreConfig,
    created: &mut Vec<String>,
    existed: &mut Vec<String>,
) -> Result<()> {
    let init_event = serde_json::json!({
        "timestamp": Utc::now().to_rfc3339(),
        "event": "system_init",
        "agent": "system",
        "data": { "name": cfg.system.name, "version": cfg.system.version },
    })
    .to_string();

    let dir = &cfg.logbook.path;
    if !dir.exists() {
        fs::create_dir_all(dir).with_context(|| format!("create_dir_all({:?})", dir))?;
    }

    let p = &cfg.logbook.actions;
    let was_created = !p.exists();
    if was_created {
        write_atomic(p, format!("{init_event}\n").as_bytes())?;
    } else if fs::metadata(p)?.len() == 0 {
        let mut f = OpenOptions::new()
            .append(true)
            .open(p)
            .with_context(|| format!("open {:?}", p))?;
        writeln!(f, "{init_event}")?;
    }
    track(root, p, was_created, created, existed);
    Ok(())
}

// ---------- defaults ----------

const DEFAULT_CONFIG_TOML: &str = r#"[system]
name = "genesis"
version = "0.1.0"

[memory]
short_term_path = "memory.json"
long_term_path = "long_term_memory.json"

[graph]
nodes = [
  "Artificial Intelligence",
  "Machine Learning",
  "Neural Networks",
  "Reinforcement Learning",
  "Computer Vision",
]
edges = [
  { a = "Artificial Intelligence", b = "Machine Learning", weight = 0.9 },
  { a = "Machine Learning", b = "Neural Networks", weight = 0.8 },
  { a = "Neural Networks", b = "Reinforcement Learning", weight = 0.7 },
  { a = "Artificial Intelligence", b = "Computer Vision", weight = 0.85 },
]

[reasoning]
concept = "Machine Learning"
# query_term = "rust"   # default: each run queries with its own input summary

[ingestion]
preview_chars = 100
embedding_dim = 768

[logbook]
path = "logbook"
actions = "logbook/actions.jsonl"

[services]
audit_enabled = true
ci_mode = false
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GraphConfig;

    #[test]
    fn default_config_text_matches_defaults() {
        let parsed: CoreConfig = toml::from_str(DEFAULT_CONFIG_TOML).expect("parse default config");
        assert_eq!(parsed.graph, GraphConfig::default());
        assert_eq!(parsed.reasoning.concept, "Machine Learning");
        assert!(parsed.reasoning.query_term.is_none());
        assert_eq!(parsed.ingestion.embedding_dim, 768);
    }

    #[test]
    fn init_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("ws");

        let first = ensure_initialized(&root).unwrap();
        assert!(first.created.contains(&"config.toml".to_string()));
        assert!(first.created.contains(&"memory.json".to_string()));
        assert!(first.created.contains(&"long_term_memory.json".to_string()));
        assert_eq!(fs::read_to_string(root.join("memory.json")).unwrap(), "[]");
        assert_eq!(
            fs::read_to_string(root.join("config.toml")).unwrap(),
            DEFAULT_CONFIG_TOML
        );

        let log_before = fs::read_to_string(root.join("logbook/actions.jsonl")).unwrap();
        assert_eq!(log_before.lines().count(), 1);

        let second = ensure_initialized(&root).unwrap();
        assert!(second.created.is_empty());
        assert!(second.existed.contains(&"memory.json".to_string()));
        assert_eq!(
            fs::read_to_string(root.join("logbook/actions.jsonl")).unwrap(),
            log_before
        );
    }
}
