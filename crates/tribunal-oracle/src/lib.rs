pub mod gemini;
pub mod types;

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use gemini::GeminiOracle;
pub use types::*;

#[async_trait]
pub trait ReasoningOracle: Send + Sync {
    async fn generate(&self, request: OracleRequest) -> Result<OracleResponse>;
    async fn health(&self) -> Result<()> {
        Ok(())
    }
}

/// Produces a textual description of an uploaded media object.
#[async_trait]
pub trait MediaAnalyzer: Send + Sync {
    async fn describe(
        &self,
        model: &str,
        file_uri: &str,
        mime_type: &str,
        instruction: &str,
    ) -> Result<String>;
}

// ============================================================
// Oracle Configuration
// ============================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OracleKind {
    Gemini,
    /// Offline stub for development and tests.
    Stub,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    #[serde(rename = "type")]
    pub oracle_type: OracleKind,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Custom base URL (optional, uses the Gemini default otherwise)
    #[serde(default)]
    pub base_url: Option<String>,
}

impl OracleConfig {
    pub fn new(oracle_type: OracleKind) -> Self {
        Self {
            oracle_type,
            api_key: None,
            base_url: None,
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }
}

/// Build the reasoning and media halves from one configuration. Both handles
/// share the same underlying client.
pub fn create_oracle(
    config: &OracleConfig,
) -> Result<(Arc<dyn ReasoningOracle>, Arc<dyn MediaAnalyzer>)> {
    match config.oracle_type {
        OracleKind::Gemini => {
            let key = config
                .api_key
                .as_ref()
                .ok_or_else(|| anyhow!("gemini requires api_key"))?;
            let mut oracle = GeminiOracle::new(key.clone());
            if let Some(base) = &config.base_url {
                oracle = oracle.with_base_url(base.clone());
            }
            let oracle = Arc::new(oracle);
            Ok((oracle.clone(), oracle))
        }
        OracleKind::Stub => {
            let stub = Arc::new(StubOracle);
            Ok((stub.clone(), stub))
        }
    }
}

pub struct StubOracle;

#[async_trait]
impl ReasoningOracle for StubOracle {
    async fn generate(&self, request: OracleRequest) -> Result<OracleResponse> {
        Ok(OracleResponse {
            text: format!("[stub:{}] {} [finish]", request.model, request.prompt),
            finish_reason: Some("end_turn".into()),
            input_tokens: None,
            output_tokens: None,
        })
    }
}

#[async_trait]
impl MediaAnalyzer for StubOracle {
    async fn describe(
        &self,
        _model: &str,
        _file_uri: &str,
        mime_type: &str,
        _instruction: &str,
    ) -> Result<String> {
        Ok(format!("[stub:{mime_type}] no media analysis performed"))
    }
}
