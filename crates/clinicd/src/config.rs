//! Configuration management for clinicd.
//!
//! Search order: explicit path, `$CLINIC_CONFIG`, /etc/clinic/config.toml,
//! /var/lib/clinic/config.toml, then built-in defaults. Every field has a
//! serde default so partial files are fine.

use crate::followup::{FollowUpDetector, DEFAULT_FAQ_QUESTIONS};
use crate::knowledge::DEFAULT_TOP_K;
use crate::ollama::{DEFAULT_KEEP_ALIVE, DEFAULT_MODEL, DEFAULT_OLLAMA_URL};
use crate::orchestrator::{OrchestratorConfig, DEFAULT_MAX_RETRIES};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Config file path
pub const CONFIG_PATH: &str = "/etc/clinic/config.toml";

/// Default config file path for fallback
pub const DEFAULT_CONFIG_PATH: &str = "/var/lib/clinic/config.toml";

/// Environment variable naming a config file
pub const CONFIG_ENV: &str = "CLINIC_CONFIG";

/// Turn policy and deadlines
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorSettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Per capability call
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,

    /// Whole turn, all stages included
    #[serde(default = "default_turn_timeout")]
    pub turn_timeout_secs: u64,
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_call_timeout() -> u64 {
    60
}

fn default_turn_timeout() -> u64 {
    180
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            call_timeout_secs: default_call_timeout(),
            turn_timeout_secs: default_turn_timeout(),
        }
    }
}

/// LLM endpoint and models
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    #[serde(default = "default_model")]
    pub router_model: String,

    /// Relevance, grounding and usefulness graders
    #[serde(default = "default_model")]
    pub grader_model: String,

    /// Evidence-lane answers
    #[serde(default = "default_model")]
    pub generator_model: String,

    /// Fallback-lane answers
    #[serde(default = "default_model")]
    pub fallback_model: String,

    #[serde(default)]
    pub generator_temperature: f32,

    #[serde(default = "default_fallback_temperature")]
    pub fallback_temperature: f32,

    /// How long Ollama keeps a model loaded ("5m", "0", "1h")
    #[serde(default = "default_keep_alive")]
    pub keep_alive: String,
}

fn default_ollama_url() -> String {
    DEFAULT_OLLAMA_URL.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_fallback_temperature() -> f32 {
    0.3
}

fn default_keep_alive() -> String {
    DEFAULT_KEEP_ALIVE.to_string()
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            ollama_url: default_ollama_url(),
            router_model: default_model(),
            grader_model: default_model(),
            generator_model: default_model(),
            fallback_model: default_model(),
            generator_temperature: 0.0,
            fallback_temperature: default_fallback_temperature(),
            keep_alive: default_keep_alive(),
        }
    }
}

impl LlmSettings {
    /// Unique models this config needs pulled
    pub fn required_models(&self) -> Vec<String> {
        let mut models = vec![
            self.router_model.clone(),
            self.grader_model.clone(),
            self.generator_model.clone(),
            self.fallback_model.clone(),
        ];
        models.sort();
        models.dedup();
        models
    }
}

/// Knowledge base location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeSettings {
    /// JSON-lines document file
    #[serde(default = "default_knowledge_path")]
    pub path: PathBuf,

    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_knowledge_path() -> PathBuf {
    PathBuf::from("/var/lib/clinic/knowledge.jsonl")
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

impl Default for KnowledgeSettings {
    fn default() -> Self {
        Self {
            path: default_knowledge_path(),
            top_k: default_top_k(),
        }
    }
}

/// FAQ follow-up detection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaqSettings {
    #[serde(default = "default_faq_questions")]
    pub questions: Vec<String>,

    /// Recent history positions searched for an FAQ exchange
    #[serde(default = "default_lookback")]
    pub lookback: usize,
}

fn default_faq_questions() -> Vec<String> {
    DEFAULT_FAQ_QUESTIONS.iter().map(|q| q.to_string()).collect()
}

fn default_lookback() -> usize {
    3
}

impl Default for FaqSettings {
    fn default() -> Self {
        Self {
            questions: default_faq_questions(),
            lookback: default_lookback(),
        }
    }
}

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub orchestrator: OrchestratorSettings,
    #[serde(default)]
    pub llm: LlmSettings,
    #[serde(default)]
    pub knowledge: KnowledgeSettings,
    #[serde(default)]
    pub faq: FaqSettings,
}

impl Config {
    /// Load config following the search order.
    ///
    /// A path given explicitly (argument or environment) must load; the
    /// system paths are optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from_path(path);
        }
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            if !path.trim().is_empty() {
                return Self::load_from_path(Path::new(&path))
                    .with_context(|| format!("${} points to an unusable config", CONFIG_ENV));
            }
        }

        Ok(Self::load_from_path(Path::new(CONFIG_PATH))
            .or_else(|_| Self::load_from_path(Path::new(DEFAULT_CONFIG_PATH)))
            .unwrap_or_else(|e| {
                warn!("Config not found, using defaults: {}", e);
                Config::default()
            }))
    }

    /// Load config from specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Save default config to path (for init)
    pub fn save_default(path: &Path) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        info!("Saved default config to {}", path.display());
        Ok(())
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            max_retries: self.orchestrator.max_retries,
            call_timeout: Duration::from_secs(self.orchestrator.call_timeout_secs.max(1)),
            turn_timeout: Duration::from_secs(self.orchestrator.turn_timeout_secs.max(1)),
            follow_up: FollowUpDetector::new(self.faq.questions.clone(), self.faq.lookback),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.orchestrator.max_retries, 3);
        assert_eq!(config.knowledge.top_k, 3);
        assert_eq!(config.llm.generator_temperature, 0.0);
        assert_eq!(config.llm.fallback_temperature, 0.3);
        assert_eq!(config.faq.lookback, 3);
        assert_eq!(config.faq.questions.len(), 8);
    }

    #[test]
    fn test_required_models_dedup() {
        let mut config = Config::default();
        assert_eq!(config.llm.required_models().len(), 1);

        config.llm.generator_model = "writer:8b".to_string();
        assert_eq!(config.llm.required_models().len(), 2);
    }

    #[test]
    fn test_parse_partial_toml() {
        let toml_str = r#"
[orchestrator]
max_retries = 2

[llm]
generator_model = "qwen3:8b"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.orchestrator.max_retries, 2);
        assert_eq!(config.llm.generator_model, "qwen3:8b");
        // Defaults for missing fields
        assert_eq!(config.orchestrator.turn_timeout_secs, 180);
        assert_eq!(config.llm.router_model, DEFAULT_MODEL);
        assert_eq!(config.llm.keep_alive, "5m");
    }

    #[test]
    fn test_save_default_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        Config::save_default(&path).unwrap();
        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded.orchestrator.call_timeout_secs, 60);
        assert_eq!(loaded.faq.questions, default_faq_questions());
    }

    #[test]
    fn test_explicit_path_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(Config::load(Some(&missing)).is_err());
    }

    #[test]
    fn test_orchestrator_config_mapping() {
        let mut config = Config::default();
        config.orchestrator.call_timeout_secs = 0;
        config.orchestrator.max_retries = 5;

        let oc = config.orchestrator_config();
        assert_eq!(oc.max_retries, 5);
        assert_eq!(oc.call_timeout, Duration::from_secs(1));
        assert_eq!(oc.turn_timeout, Duration::from_secs(180));
    }
}
