use std::{fs, path::Path};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tribunal_oracle::{OracleConfig, OracleKind};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub name: String,
    pub env: String,
}

fn default_bind() -> String {
    "0.0.0.0:3001".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
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

fn default_database_path() -> String {
    "data/tribunal.db".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

fn default_storage_root() -> String {
    "data/evidence".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_root")]
    pub root: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
        }
    }
}

fn default_oracle_model() -> String {
    "gemini-2.0-flash-001".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleSettings {
    #[serde(rename = "type")]
    pub oracle_type: OracleKind,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_oracle_model")]
    pub model: String,
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            oracle_type: OracleKind::Stub,
            api_key: String::new(),
            base_url: None,
            model: default_oracle_model(),
        }
    }
}

impl OracleSettings {
    /// Empty api_key (for example an unset env placeholder) maps to `None` so
    /// the provider factory reports the missing key.
    pub fn to_oracle_config(&self) -> OracleConfig {
        OracleConfig {
            oracle_type: self.oracle_type.clone(),
            api_key: if self.api_key.is_empty() {
                None
            } else {
                Some(self.api_key.clone())
            },
            base_url: self.base_url.clone(),
        }
    }
}

fn default_confidence_threshold() -> f64 {
    0.8
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionConfig {
    /// Outcomes below this confidence are routed to a human regardless of
    /// the stated status.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TribunalConfig {
    pub app: AppConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub oracle: OracleSettings,
    #[serde(default)]
    pub resolution: ResolutionConfig,
}

pub fn resolve_env_var(raw: &str) -> String {
    let mut output = String::new();
    let mut rest = raw;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);

        let candidate = &rest[start + 2..];
        let Some(end) = candidate.find('}') else {
            output.push_str(&rest[start..]);
            return output;
        };

        let key = &candidate[..end];
        output.push_str(&std::env::var(key).unwrap_or_default());
        rest = &candidate[end + 1..];
    }

    output.push_str(rest);
    output
}

pub fn load_config(path: &Path) -> Result<TribunalConfig> {
    let mut config: TribunalConfig = read_yaml_file(path)?;
    resolve_config_env(&mut config);
    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &TribunalConfig) -> Result<()> {
    let threshold = config.resolution.confidence_threshold;
    if !(0.0..=1.0).contains(&threshold) {
        return Err(anyhow!(
            "confidence_threshold must be between 0.0 and 1.0, got {threshold}"
        ));
    }

    if config.oracle.model.is_empty() {
        return Err(anyhow!("oracle model must not be empty"));
    }

    Ok(())
}

fn read_yaml_file<T>(path: &Path) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse yaml file: {}", path.display()))
}

fn resolve_config_env(config: &mut TribunalConfig) {
    config.app.name = resolve_env_var(&config.app.name);
    config.app.env = resolve_env_var(&config.app.env);
    config.server.bind = resolve_env_var(&config.server.bind);
    config.database.path = resolve_env_var(&config.database.path);
    config.storage.root = resolve_env_var(&config.storage.root);
    config.oracle.api_key = resolve_env_var(&config.oracle.api_key);
    config.oracle.model = resolve_env_var(&config.oracle.model);
    if let Some(base_url) = &mut config.oracle.base_url {
        *base_url = resolve_env_var(base_url);
    }
}
