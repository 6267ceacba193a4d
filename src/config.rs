use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub corpus: CorpusConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Base URL of an OpenAI-compatible API (without `/embeddings`).
    #[serde(default = "default_url")]
    pub url: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            dims: default_dims(),
            batch_size: default_batch_size(),
            timeout_secs: default_timeout_secs(),
            url: default_url(),
            api_key_env: default_api_key_env(),
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}
fn default_model() -> String {
    "text-embedding-ada-002".to_string()
}
fn default_dims() -> usize {
    1536
}
fn default_batch_size() -> usize {
    100
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}

/// Where the corpus comes from: inline `texts`, or a file with one entry per line.
#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    #[serde(default = "default_texts")]
    pub texts: Vec<String>,
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            texts: default_texts(),
            path: None,
        }
    }
}

fn default_texts() -> Vec<String> {
    vec![
        "Information about product A.".to_string(),
        "Details regarding service B.".to_string(),
        "FAQs about product C.".to_string(),
    ]
}

impl CorpusConfig {
    /// Resolve the corpus entries. A configured `path` takes precedence over
    /// inline `texts`; blank lines in the file are skipped.
    pub fn load(&self) -> Result<Vec<String>> {
        let texts: Vec<String> = match &self.path {
            Some(path) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read corpus file: {}", path.display()))?
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect(),
            None => self.texts.clone(),
        };

        if texts.is_empty() {
            bail!("corpus must contain at least one entry");
        }
        if texts.iter().any(|t| t.trim().is_empty()) {
            bail!("corpus entries must not be empty");
        }

        Ok(texts)
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    match config.embedding.provider.as_str() {
        "disabled" | "openai" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    if config.embedding.is_enabled() {
        if config.embedding.dims == 0 {
            bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.trim().is_empty() {
            bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }

    if config.server.bind.trim().is_empty() {
        bail!("server.bind must not be empty");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("semsearch.toml");
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let cfg = load_config(&write_config(&tmp, "")).unwrap();

        assert_eq!(cfg.embedding.provider, "openai");
        assert_eq!(cfg.embedding.model, "text-embedding-ada-002");
        assert_eq!(cfg.embedding.dims, 1536);
        assert_eq!(cfg.embedding.batch_size, 100);
        assert_eq!(cfg.embedding.api_key_env, "OPENAI_API_KEY");
        assert_eq!(cfg.server.bind, "127.0.0.1:3000");
        assert_eq!(cfg.corpus.load().unwrap().len(), 3);
    }

    #[test]
    fn test_overrides() {
        let tmp = TempDir::new().unwrap();
        let cfg = load_config(&write_config(
            &tmp,
            r#"
[embedding]
model = "text-embedding-3-small"
dims = 512
batch_size = 16
url = "http://localhost:9999/v1"

[server]
bind = "0.0.0.0:8080"

[corpus]
texts = ["one", "two"]
"#,
        ))
        .unwrap();

        assert_eq!(cfg.embedding.model, "text-embedding-3-small");
        assert_eq!(cfg.embedding.dims, 512);
        assert_eq!(cfg.embedding.batch_size, 16);
        assert_eq!(cfg.embedding.url, "http://localhost:9999/v1");
        assert_eq!(cfg.server.bind, "0.0.0.0:8080");
        assert_eq!(cfg.corpus.load().unwrap(), vec!["one", "two"]);
    }

    #[test]
    fn test_rejects_invalid_values() {
        let tmp = TempDir::new().unwrap();
        for content in [
            "[embedding]\nprovider = \"ollama\"",
            "[embedding]\ndims = 0",
            "[embedding]\nbatch_size = 0",
            "[embedding]\nmodel = \"\"",
        ] {
            assert!(
                load_config(&write_config(&tmp, content)).is_err(),
                "should reject: {}",
                content
            );
        }
    }

    #[test]
    fn test_corpus_file_skips_blank_lines() {
        let tmp = TempDir::new().unwrap();
        let corpus_path = tmp.path().join("corpus.txt");
        fs::write(&corpus_path, "first entry\n\n  second entry  \n").unwrap();

        let corpus = CorpusConfig {
            texts: vec!["ignored".to_string()],
            path: Some(corpus_path),
        };
        assert_eq!(corpus.load().unwrap(), vec!["first entry", "second entry"]);
    }

    #[test]
    fn test_empty_corpus_rejected() {
        let corpus = CorpusConfig {
            texts: vec![],
            path: None,
        };
        assert!(corpus.load().is_err());

        let corpus = CorpusConfig {
            texts: vec!["ok".to_string(), " ".to_string()],
            path: None,
        };
        assert!(corpus.load().is_err());
    }
}
