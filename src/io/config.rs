//! Oracle provider configuration stored as TOML.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Oracle configuration (TOML).
///
/// Provider model names live here instead of process-global defaults; the
/// reasoning core never reads this, only the HTTP oracle does. Missing
/// fields default to sensible local-first values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OracleConfig {
    pub ollama: OllamaConfig,
    pub openai: OpenAiConfig,
    pub anthropic: AnthropicConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
    /// Generous budget: local generation is slow.
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OpenAiConfig {
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnthropicConfig {
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.2".to_string(),
            timeout_secs: 120,
        }
    }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            model: "claude-3-haiku-20240307".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            ollama: OllamaConfig::default(),
            openai: OpenAiConfig::default(),
            anthropic: AnthropicConfig::default(),
        }
    }
}

impl OracleConfig {
    pub fn validate(&self) -> Result<()> {
        if self.ollama.base_url.trim().is_empty() {
            return Err(anyhow!("ollama.base_url must not be empty"));
        }
        for (field, model) in [
            ("ollama.model", &self.ollama.model),
            ("openai.model", &self.openai.model),
            ("anthropic.model", &self.anthropic.model),
        ] {
            if model.trim().is_empty() {
                return Err(anyhow!("{field} must not be empty"));
            }
        }
        for (field, timeout) in [
            ("ollama.timeout_secs", self.ollama.timeout_secs),
            ("openai.timeout_secs", self.openai.timeout_secs),
            ("anthropic.timeout_secs", self.anthropic.timeout_secs),
        ] {
            if timeout == 0 {
                return Err(anyhow!("{field} must be > 0"));
            }
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `OracleConfig::default()`.
pub fn load_config(path: &Path) -> Result<OracleConfig> {
    if !path.exists() {
        let config = OracleConfig::default();
        config.validate()?;
        return Ok(config);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let config: OracleConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, config: &OracleConfig) -> Result<()> {
    config.validate()?;
    let mut buf = toml::to_string_pretty(config).context("serialize config toml")?;
    buf.push('\n');

    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, buf).with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let config = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(config, OracleConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("oracle.toml");
        let config = OracleConfig {
            ollama: OllamaConfig {
                model: "mistral".to_string(),
                ..OllamaConfig::default()
            },
            ..OracleConfig::default()
        };
        write_config(&path, &config).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, config);
    }

    #[test]
    fn zero_timeout_fails_validation() {
        let config = OracleConfig {
            ollama: OllamaConfig {
                timeout_secs: 0,
                ..OllamaConfig::default()
            },
            ..OracleConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: OracleConfig =
            toml::from_str("[ollama]\nmodel = \"phi3\"\n").expect("parse");
        assert_eq!(config.ollama.model, "phi3");
        assert_eq!(config.openai, OpenAiConfig::default());
    }
}
