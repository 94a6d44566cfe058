// src/classifiers/mod.rs
//
// Seams for the three external models. The pipeline only ever talks to
// these traits; the concrete backend is an HTTP inference service, with
// scripted stand-ins for tests.

pub mod remote;

#[cfg(test)]
pub mod mock;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::PipelineError;
use crate::types::{Frame, ModelsConfig, TextScore};

/// Single-frame classifier output against a fixed label set.
#[derive(Debug, Clone)]
pub struct Classification {
    pub label: String,
    pub confidence: f32,
}

/// A transcription segment as produced by the speech model. The start
/// timestamp may be missing; the text branch filters those out.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSegment {
    pub start: Option<f64>,
    pub text: String,
}

#[async_trait]
pub trait FrameClassifier: Send + Sync {
    async fn classify(
        &self,
        frame: &Frame,
        labels: &'static [&'static str],
    ) -> Result<Classification, PipelineError>;
}

#[async_trait]
pub trait TextClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<TextScore, PipelineError>;
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribes mono 16 kHz s16 PCM WAV bytes into ordered segments.
    async fn transcribe(&self, wav: &[u8]) -> Result<Vec<RawSegment>, PipelineError>;
}

/// All loaded models, constructed once at startup and passed by reference
/// into the orchestrator. No ambient global state.
pub struct ModelRegistry {
    pub frames: Arc<dyn FrameClassifier>,
    pub text: Arc<dyn TextClassifier>,
    pub transcriber: Arc<dyn Transcriber>,
}

impl ModelRegistry {
    /// Registry backed by the remote inference service for all three models.
    pub fn remote(config: &ModelsConfig) -> Result<Self, PipelineError> {
        let client = Arc::new(remote::RemoteModelClient::new(config)?);
        Ok(Self {
            frames: client.clone(),
            text: client.clone(),
            transcriber: client,
        })
    }
}
