//! Recognition engine seam.
//!
//! The gateway never recognises anything itself; it forwards jobs to an
//! engine behind the [`Recognizer`] trait and records the outcome.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::schema::EngineConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognitionRequest {
    /// Job type, e.g. "slide" or "click".
    pub kind: String,
    /// Site the job originates from.
    #[serde(default)]
    pub host: String,
    /// Engine-specific input, passed through untouched.
    #[serde(default)]
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recognition {
    pub data: serde_json::Value,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine unreachable: {0}")]
    Transport(String),

    #[error("engine returned status {0}")]
    Status(u16),

    #[error("engine response malformed: {0}")]
    Decode(String),

    #[error("engine rejected the job: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Model name recorded against each job.
    fn model(&self) -> &str;

    async fn recognize(&self, request: &RecognitionRequest) -> Result<Recognition, EngineError>;
}

/// Forwards jobs to an HTTP engine as JSON.
pub struct RemoteRecognizer {
    client: reqwest::Client,
    url: String,
    model: String,
}

impl RemoteRecognizer {
    pub fn new(config: &EngineConfig) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EngineError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            url: config.url.clone(),
            model: config.model.clone(),
        })
    }
}

#[derive(Deserialize)]
struct EngineReply {
    #[serde(default)]
    data: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}

#[async_trait]
impl Recognizer for RemoteRecognizer {
    fn model(&self) -> &str {
        &self.model
    }

    async fn recognize(&self, request: &RecognitionRequest) -> Result<Recognition, EngineError> {
        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| EngineError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::Status(status.as_u16()));
        }

        let reply: EngineReply = response
            .json()
            .await
            .map_err(|e| EngineError::Decode(e.to_string()))?;
        match (reply.data, reply.error) {
            (_, Some(error)) => Err(EngineError::Rejected(error)),
            (Some(data), None) => Ok(Recognition { data }),
            (None, None) => Err(EngineError::Decode("missing data".into())),
        }
    }
}
