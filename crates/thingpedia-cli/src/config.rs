//! Configuration loading

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use thingpedia_client::{FileClient, FileClientOptions, HttpClient, ThingpediaClient};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub file: FileConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    File,
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Locale tag sent to Thingpedia
    #[serde(default = "default_locale")]
    pub locale: String,
    /// Where manifests and examples come from
    #[serde(default)]
    pub backend: Backend,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            locale: default_locale(),
            backend: Backend::default(),
        }
    }
}

fn default_locale() -> String {
    "en-US".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    /// Manifest bundle
    #[serde(default = "default_thingpedia_path")]
    pub thingpedia: PathBuf,
    /// Entity types (JSON)
    #[serde(default)]
    pub entities: Option<PathBuf>,
    /// Example dataset
    #[serde(default)]
    pub dataset: Option<PathBuf>,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            thingpedia: default_thingpedia_path(),
            entities: None,
            dataset: None,
        }
    }
}

fn default_thingpedia_path() -> PathBuf {
    PathBuf::from("./thingpedia.tt")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Thingpedia server base URL
    #[serde(default = "default_url")]
    pub url: String,
    /// Developer key for unpublished devices
    #[serde(default)]
    pub developer_key: Option<String>,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            developer_key: None,
            timeout_secs: default_timeout(),
        }
    }
}

fn default_url() -> String {
    thingpedia_client::THINGPEDIA_URL.to_string()
}

fn default_timeout() -> u64 {
    30
}

impl Config {
    /// Build the client selected by `[client] backend`
    pub fn build_client(&self) -> Result<Arc<dyn ThingpediaClient>> {
        match self.client.backend {
            Backend::File => Ok(Arc::new(FileClient::new(FileClientOptions {
                locale: self.client.locale.clone(),
                thingpedia: self.file.thingpedia.clone(),
                entities: self.file.entities.clone(),
                dataset: self.file.dataset.clone(),
            }))),
            Backend::Http => {
                if self.http.timeout_secs == 0 {
                    bail!("http.timeout_secs must be positive");
                }
                let client = HttpClient::new(
                    self.http.url.clone(),
                    self.client.locale.clone(),
                    self.http.developer_key.clone(),
                    Duration::from_secs(self.http.timeout_secs),
                )
                .context("Failed to create HTTP client")?;
                Ok(Arc::new(client))
            }
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(Config::default())
    }
}

/// Save default configuration to file
pub fn save_default_config(path: &Path) -> Result<()> {
    let config = Config {
        file: FileConfig {
            entities: Some(PathBuf::from("./entities.json")),
            dataset: Some(PathBuf::from("./dataset.tt")),
            ..FileConfig::default()
        },
        ..Config::default()
    };

    let content = toml::to_string_pretty(&config)?;
    std::fs::write(path, content)?;
    Ok(())
}
