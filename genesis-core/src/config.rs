use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    #[serde(default)]
    pub system: SystemConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub reasoning: ReasoningConfig,
    #[serde(default)]
    pub ingestion: IngestionConfig,
    #[serde(default)]
    pub logbook: LogbookConfig,
    #[serde(default)]
    pub services: ServicesConfig,
}

impl CoreConfig {
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join("config.toml");
        let mut cfg = if path.exists() {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            toml::from_str::<CoreConfig>(&text)
                .with_context(|| format!("parsing config file {}", path.display()))?
        } else {
            tracing::info!(
                "No config file found at {}. Using CoreConfig::default().",
                path.display()
            );
            CoreConfig::default()
        };
        cfg.resolve_paths(root);
        Ok(cfg)
    }

    /// Defaults with every relative path anchored under `root`.
    pub fn rooted(root: &Path) -> Self {
        let mut cfg = CoreConfig::default();
        cfg.resolve_paths(root);
        cfg
    }

    fn resolve_paths(&mut self, root: &Path) {
        self.memory.short_term_path = absolutize(root, &self.memory.short_term_path);
        self.memory.long_term_path = absolutize(root, &self.memory.long_term_path);
        self.logbook.path = absolutize(root, &self.logbook.path);
        self.logbook.actions = absolutize(root, &self.logbook.actions);
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            system: SystemConfig::default(),
            memory: MemoryConfig::default(),
            graph: GraphConfig::default(),
            reasoning: ReasoningConfig::default(),
            ingestion: IngestionConfig::default(),
            logbook: LogbookConfig::default(),
            services: ServicesConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    #[serde(default = "SystemConfig::default_name")]
    pub name: String,
    #[serde(default = "SystemConfig::default_version")]
    pub version: String,
}

impl SystemConfig {
    fn default_name() -> String {
        "genesis".to_string()
    }

    fn default_version() -> String {
        "0.1.0".to_string()
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            name: Self::default_name(),
            version: Self::default_version(),
        }
    }
}

/// Locations of the two event tiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "MemoryConfig::default_short_term_path")]
    pub short_term_path: PathBuf,
    #[serde(default = "MemoryConfig::default_long_term_path")]
    pub long_term_path: PathBuf,
}

impl MemoryConfig {
    fn default_short_term_path() -> PathBuf {
        PathBuf::from("memory.json")
    }

    fn default_long_term_path() -> PathBuf {
        PathBuf::from("long_term_memory.json")
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            short_term_path: Self::default_short_term_path(),
            long_term_path: Self::default_long_term_path(),
        }
    }
}

/// Concept vocabulary and weighted links. Fixed once a graph is built from it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphConfig {
    #[serde(default = "GraphConfig::default_nodes")]
    pub nodes: Vec<String>,
    #[serde(default = "GraphConfig::default_edges")]
    pub edges: Vec<EdgeConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EdgeConfig {
    pub a: String,
    pub b: String,
    #[serde(default = "EdgeConfig::default_weight")]
    pub weight: f32,
}

impl EdgeConfig {
    pub fn new(a: &str, b: &str, weight: f32) -> Self {
        Self {
            a: a.to_string(),
            b: b.to_string(),
            weight,
        }
    }

    fn default_weight() -> f32 {
        1.0
    }
}

impl GraphConfig {
    fn default_nodes() -> Vec<String> {
        [
            "Artificial Intelligence",
            "Machine Learning",
            "Neural Networks",
            "Reinforcement Learning",
            "Computer Vision",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    fn default_edges() -> Vec<EdgeConfig> {
        vec![
            EdgeConfig::new("Artificial Intelligence", "Machine Learning", 0.9),
            EdgeConfig::new("Machine Learning", "Neural Networks", 0.8),
            EdgeConfig::new("Neural Networks", "Reinforcement Learning", 0.7),
            EdgeConfig::new("Artificial Intelligence", "Computer Vision", 0.85),
        ]
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            nodes: Self::default_nodes(),
            edges: Self::default_edges(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningConfig {
    /// Concept whose neighbors enrich every decision.
    #[serde(default = "ReasoningConfig::default_concept")]
    pub concept: String,
    /// Long-term query term. `None` queries with the run's own input summary.
    #[serde(default)]
    pub query_term: Option<String>,
}

impl ReasoningConfig {
    fn default_concept() -> String {
        "Machine Learning".to_string()
    }
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            concept: Self::default_concept(),
            query_term: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    #[serde(default = "IngestionConfig::default_preview_chars")]
    pub preview_chars: usize,
    #[serde(default = "IngestionConfig::default_embedding_dim")]
    pub embedding_dim: usize,
}

impl IngestionConfig {
    fn default_preview_chars() -> usize {
        100
    }

    fn default_embedding_dim() -> usize {
        768
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            preview_chars: Self::default_preview_chars(),
            embedding_dim: Self::default_embedding_dim(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogbookConfig {
    #[serde(default = "LogbookConfig::default_path")]
    pub path: PathBuf,
    #[serde(default = "LogbookConfig::default_actions")]
    pub actions: PathBuf,
}

impl LogbookConfig {
    fn default_path() -> PathBuf {
        PathBuf::from("logbook")
    }

    fn default_actions() -> PathBuf {
        PathBuf::from("logbook/actions.jsonl")
    }
}

impl Default for LogbookConfig {
    fn default() -> Self {
        Self {
            path: Self::default_path(),
            actions: Self::default_actions(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicesConfig {
    #[serde(default = "ServicesConfig::default_true")]
    pub audit_enabled: bool,
    /// Unattended mode: no interactive feedback prompt.
    #[serde(default)]
    pub ci_mode: bool,
}

impl ServicesConfig {
    fn default_true() -> bool {
        true
    }
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            audit_enabled: true,
            ci_mode: false,
        }
    }
}

fn absolutize(root: &Path, value: &Path) -> PathBuf {
    if value.is_absolute() {
        value.to_path_buf()
    } else {
        root.join(value)
    }
}
