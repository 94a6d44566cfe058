// src/classifiers/mock.rs
//
// Scripted model stand-ins for tests. The frame mock replays a fixed
// sequence of (label, confidence) pairs and then repeats its last entry.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::{Classification, FrameClassifier, RawSegment, TextClassifier, Transcriber};
use crate::error::PipelineError;
use crate::types::{Frame, TextScore};

pub struct MockFrameClassifier {
    script: Vec<(String, f32)>,
    calls: AtomicUsize,
}

impl MockFrameClassifier {
    pub fn new(script: Vec<(&str, f32)>) -> Self {
        Self {
            script: script
                .into_iter()
                .map(|(label, conf)| (label.to_string(), conf))
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Every frame gets the same verdict.
    pub fn constant(label: &str, confidence: f32) -> Self {
        Self::new(vec![(label, confidence)])
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FrameClassifier for MockFrameClassifier {
    async fn classify(
        &self,
        _frame: &Frame,
        _labels: &'static [&'static str],
    ) -> Result<Classification, PipelineError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let (label, confidence) = self
            .script
            .get(n)
            .or_else(|| self.script.last())
            .cloned()
            .ok_or_else(|| PipelineError::Classifier("empty mock script".to_string()))?;
        Ok(Classification { label, confidence })
    }
}

pub struct StaticTextClassifier(pub TextScore);

#[async_trait]
impl TextClassifier for StaticTextClassifier {
    async fn classify(&self, _text: &str) -> Result<TextScore, PipelineError> {
        Ok(self.0.clone())
    }
}

pub struct StaticTranscriber(pub Vec<RawSegment>);

#[async_trait]
impl Transcriber for StaticTranscriber {
    async fn transcribe(&self, _wav: &[u8]) -> Result<Vec<RawSegment>, PipelineError> {
        Ok(self.0.clone())
    }
}
