// src/transcript.rs
//
// Audio branch: turn the extracted WAV into validated transcript segments
// and score the joined text once. Segments without a usable start timestamp
// are dropped silently.

use tracing::{debug, info};

use crate::classifiers::{RawSegment, TextClassifier, Transcriber};
use crate::error::PipelineError;
use crate::types::{TextScore, TranscriptSegment};

pub fn filter_segments(raw: Vec<RawSegment>) -> Vec<TranscriptSegment> {
    raw.into_iter()
        .filter_map(|segment| match segment.start {
            Some(start) if start.is_finite() => Some(TranscriptSegment {
                start_time: start,
                text: segment.text,
            }),
            _ => None,
        })
        .collect()
}

pub async fn transcribe(
    transcriber: &dyn Transcriber,
    wav: &[u8],
) -> Result<Vec<TranscriptSegment>, PipelineError> {
    let raw = transcriber.transcribe(wav).await?;
    let total = raw.len();
    let segments = filter_segments(raw);
    if segments.len() < total {
        debug!(
            "🎤 dropped {} transcript segments without timestamps",
            total - segments.len()
        );
    }
    info!("🎤 transcript: {} segments", segments.len());
    Ok(segments)
}

/// Joins segment texts with single spaces and classifies the transcript in
/// one call. An empty transcript still goes to the classifier, which scores
/// the empty string.
pub async fn classify_transcript(
    classifier: &dyn TextClassifier,
    segments: &[TranscriptSegment],
) -> Result<TextScore, PipelineError> {
    let joined = segments
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    classifier.classify(&joined).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifiers::mock::{StaticTranscriber, StaticTextClassifier};
    use crate::types::TextScore;

    fn raw(start: Option<f64>, text: &str) -> RawSegment {
        RawSegment {
            start,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_segments_without_start_are_dropped() {
        let segments = filter_segments(vec![
            raw(Some(0.0), "hello"),
            raw(None, "ghost"),
            raw(Some(f64::NAN), "bad clock"),
            raw(Some(12.5), "world"),
        ]);

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "hello");
        assert_eq!(segments[1].start_time, 12.5);
    }

    #[tokio::test]
    async fn test_classify_transcript_scores_joined_text() {
        let classifier = StaticTextClassifier(TextScore {
            harmful: 0.7,
            safe: 0.3,
            highlighted: "<b>bad</b> words".to_string(),
        });
        let segments = vec![
            TranscriptSegment {
                start_time: 0.0,
                text: "bad".to_string(),
            },
            TranscriptSegment {
                start_time: 1.0,
                text: "words".to_string(),
            },
        ];

        let score = classify_transcript(&classifier, &segments).await.unwrap();
        assert!((score.harmful - 0.7).abs() < 1e-6);
        assert_eq!(score.highlighted, "<b>bad</b> words");
    }

    #[tokio::test]
    async fn test_transcribe_filters_and_preserves_order() {
        let transcriber = StaticTranscriber(vec![
            raw(Some(1.0), "first"),
            raw(None, "dropped"),
            raw(Some(2.0), "second"),
        ]);
        let segments = transcribe(&transcriber, &[]).await.unwrap();

        assert_eq!(segments.len(), 2);
        assert!(segments[0].start_time < segments[1].start_time);
    }
}
