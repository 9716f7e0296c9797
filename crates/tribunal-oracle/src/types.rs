use serde::{Deserialize, Serialize};

/// Reference to an uploaded media object the oracle should inspect.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MediaRef {
    pub file_uri: String,
    pub mime_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleRequest {
    pub model: String,
    pub system: Option<String>,
    pub prompt: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Ask the backend to emit a JSON document instead of prose.
    #[serde(default)]
    pub json_response: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaRef>,
}

fn default_max_tokens() -> u32 {
    2048
}

impl OracleRequest {
    pub fn text(
        model: impl Into<String>,
        system: Option<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            system,
            prompt: prompt.into(),
            max_tokens: default_max_tokens(),
            json_response: false,
            media: None,
        }
    }

    pub fn json(
        model: impl Into<String>,
        system: Option<String>,
        prompt: impl Into<String>,
    ) -> Self {
        let mut req = Self::text(model, system, prompt);
        req.json_response = true;
        req
    }

    pub fn with_media(mut self, file_uri: impl Into<String>, mime_type: impl Into<String>) -> Self {
        self.media = Some(MediaRef {
            file_uri: file_uri.into(),
            mime_type: mime_type.into(),
        });
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleResponse {
    pub text: String,
    pub finish_reason: Option<String>,
    pub input_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
}
