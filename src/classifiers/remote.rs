// src/classifiers/remote.rs
//
// HTTP client for the inference service. Frames go out as base64 JPEG,
// audio as base64 WAV; responses are plain JSON. Transport and non-2xx
// failures both surface as `PipelineError::Classifier` and are not retried.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Classification, FrameClassifier, RawSegment, TextClassifier, Transcriber};
use crate::annotate::encode_jpeg;
use crate::error::PipelineError;
use crate::types::{Frame, ModelsConfig, TextScore};

pub struct RemoteModelClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct FrameRequest<'a> {
    image_b64: String,
    labels: &'a [&'a str],
}

#[derive(Deserialize)]
struct FrameResponse {
    label: String,
    confidence: f32,
}

#[derive(Serialize)]
struct TextRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct TextResponse {
    harmful: f32,
    safe: f32,
    #[serde(default)]
    highlighted: String,
}

#[derive(Serialize)]
struct TranscribeRequest {
    audio_b64: String,
    sample_rate: u32,
}

#[derive(Deserialize)]
struct TranscribeResponse {
    segments: Vec<RawSegment>,
}

impl RemoteModelClient {
    pub fn new(config: &ModelsConfig) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PipelineError::Classifier(format!("failed to build http client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    async fn post<Req, Resp>(&self, path: &str, body: &Req) -> Result<Resp, PipelineError>
    where
        Req: Serialize,
        Resp: for<'de> Deserialize<'de>,
    {
        let url = format!("{}{}", self.endpoint, path);
        debug!("📤 POST {}", url);

        let mut request = self.client.post(&url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PipelineError::Classifier(format!("request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(PipelineError::Classifier(format!(
                "{} returned {}: {}",
                url, status, detail
            )));
        }

        response
            .json::<Resp>()
            .await
            .map_err(|e| PipelineError::Classifier(format!("invalid response from {}: {}", url, e)))
    }
}

#[async_trait]
impl FrameClassifier for RemoteModelClient {
    async fn classify(
        &self,
        frame: &Frame,
        labels: &'static [&'static str],
    ) -> Result<Classification, PipelineError> {
        let image = frame.to_rgb_image().ok_or_else(|| {
            PipelineError::Classifier(format!("frame {} has malformed pixel data", frame.index))
        })?;
        let jpeg = encode_jpeg(&image).ok_or_else(|| {
            PipelineError::Classifier(format!("failed to encode frame {}", frame.index))
        })?;

        let request = FrameRequest {
            image_b64: base64::engine::general_purpose::STANDARD.encode(&jpeg),
            labels,
        };
        let resp: FrameResponse = self.post("/v1/frames", &request).await?;

        Ok(Classification {
            label: resp.label,
            confidence: resp.confidence,
        })
    }
}

#[async_trait]
impl TextClassifier for RemoteModelClient {
    async fn classify(&self, text: &str) -> Result<TextScore, PipelineError> {
        let resp: TextResponse = self.post("/v1/text", &TextRequest { text }).await?;
        Ok(TextScore {
            harmful: resp.harmful,
            safe: resp.safe,
            highlighted: resp.highlighted,
        })
    }
}

#[async_trait]
impl Transcriber for RemoteModelClient {
    async fn transcribe(&self, wav: &[u8]) -> Result<Vec<RawSegment>, PipelineError> {
        let request = TranscribeRequest {
            audio_b64: base64::engine::general_purpose::STANDARD.encode(wav),
            sample_rate: 16_000,
        };
        let resp: TranscribeResponse = self.post("/v1/transcribe", &request).await?;
        Ok(resp.segments)
    }
}
