use anyhow::{Context, Result};
use rag_core::{PipelineConfig, PromptConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub pipeline: PipelineConfig,
    pub generator: GeneratorConfig,
    /// Largest `k` a client may ask for.
    pub max_top_k: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self { pipeline: PipelineConfig::default(), generator: GeneratorConfig::default(), max_top_k: 100 }
    }
}

impl AppConfig {
    /// Read a JSON config file; missing keys keep their defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else { return Ok(Self::default()) };
        let text = std::fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
        let config: AppConfig =
            serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))?;
        if config.max_top_k == 0 {
            anyhow::bail!("max_top_k must be at least 1");
        }
        Ok(config)
    }
}

/// Settings for the Ollama-backed generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    pub prompt: PromptConfig,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "qwen2.5:0.5b-instruct".to_string(),
            temperature: 0.3,
            top_p: 0.9,
            max_tokens: 300,
            timeout_secs: 120,
            prompt: PromptConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_file_means_defaults() {
        assert_eq!(AppConfig::load(None).unwrap(), AppConfig::default());
    }

    #[test]
    fn file_overrides_only_what_it_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.json");
        std::fs::write(&path, r#"{"generator": {"model": "llama3"}, "max_top_k": 20}"#).unwrap();
        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.generator.model, "llama3");
        assert_eq!(config.generator.max_tokens, 300);
        assert_eq!(config.max_top_k, 20);
        assert_eq!(config.pipeline, PipelineConfig::default());
    }

    #[test]
    fn zero_max_top_k_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.json");
        std::fs::write(&path, r#"{"max_top_k": 0}"#).unwrap();
        assert!(AppConfig::load(Some(&path)).is_err());
    }
}
