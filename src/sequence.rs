// src/sequence.rs
//
// Visual branch: classify every decoded frame, annotate it, and extract
// contiguous harmful runs. A run only becomes a sequence once it reaches
// the configured length; any safe frame discards a shorter run in progress.
// Sequences never overlap and arrive in frame order.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::annotate::{annotate_frame, encode_jpeg};
use crate::cancel::CancellationFlag;
use crate::classifiers::FrameClassifier;
use crate::error::PipelineError;
use crate::media::reader::FrameSource;
use crate::media::render::render_sequence_clip;
use crate::types::{AggregateScores, DetectionMode, FrameVerdict, HarmfulSequence};

#[derive(Debug, Clone)]
pub struct SequenceOptions {
    /// Exact run length that promotes a harmful run to a sequence.
    pub sequence_length: usize,
    /// Harmful verdicts below this confidence are downgraded to safe while
    /// keeping their confidence value. `None` disables the floor.
    pub confidence_floor: Option<f32>,
    /// Directory receiving annotated `frame_%04d.jpg` files.
    pub frames_dir: PathBuf,
    /// Whether flushed sequences are rendered as looping clips.
    pub render_clips: bool,
}

/// Everything the visual branch produced for one video.
#[derive(Debug, Clone)]
pub struct VisualAnalysis {
    pub frame_count: u64,
    pub verdicts: Vec<FrameVerdict>,
    pub aggregate: AggregateScores,
    pub sequences: Vec<HarmfulSequence>,
}

struct RunBuffer {
    start_frame: u64,
    len: usize,
    last_confidence: f32,
}

pub async fn extract<S: FrameSource>(
    mut source: S,
    classifier: &dyn FrameClassifier,
    mode: DetectionMode,
    options: &SequenceOptions,
    cancel: &CancellationFlag,
    progress: &mut (dyn FnMut(u64) + Send),
) -> Result<VisualAnalysis, PipelineError> {
    let labels = mode.labels();
    let harmful_label = mode.harmful_label();
    let fps = source.fps();

    let mut verdicts: Vec<FrameVerdict> = Vec::new();
    let mut sequences: Vec<HarmfulSequence> = Vec::new();
    let mut sums: BTreeMap<String, (f64, u64)> = BTreeMap::new();
    let mut run: Option<RunBuffer> = None;
    let mut frame_count: u64 = 0;

    while let Some(frame) = source.next_frame()? {
        cancel.check()?;

        let classification = classifier.classify(&frame, labels).await?;

        // Low-confidence harmful frames fall back to the safe label but
        // keep their reported confidence.
        let mut label = classification.label;
        let confidence = classification.confidence;
        if label == harmful_label {
            if let Some(floor) = options.confidence_floor {
                if confidence < floor {
                    debug!(
                        "frame {} downgraded: {} {:.2} below floor {:.2}",
                        frame.index, label, confidence, floor
                    );
                    label = mode.safe_label().to_string();
                }
            }
        }

        let is_harmful = label == harmful_label;
        let annotated = annotate_frame(&frame, &label, confidence, is_harmful, fps)
            .ok_or_else(|| {
                PipelineError::Classifier(format!("frame {} has malformed pixel data", frame.index))
            })?;
        let jpeg = encode_jpeg(&annotated).ok_or_else(|| {
            PipelineError::Classifier(format!("failed to encode frame {}", frame.index))
        })?;
        std::fs::write(
            options.frames_dir.join(format!("frame_{:04}.jpg", frame.index)),
            &jpeg,
        )?;

        frame_count = frame.index;
        let entry = sums.entry(label.clone()).or_insert((0.0, 0));
        entry.0 += confidence as f64;
        entry.1 += 1;
        verdicts.push(FrameVerdict {
            frame_index: frame.index,
            label: label.clone(),
            confidence,
        });

        if is_harmful {
            let buffer = run.get_or_insert(RunBuffer {
                start_frame: frame.index,
                len: 0,
                last_confidence: confidence,
            });
            buffer.len += 1;
            buffer.last_confidence = confidence;

            if buffer.len == options.sequence_length {
                let start = buffer.start_frame;
                let end = frame.index;
                let clip_path = options.frames_dir.join(format!("sequence_{}.gif", end));
                if options.render_clips {
                    match render_sequence_clip(
                        &options.frames_dir,
                        start,
                        end - start + 1,
                        &clip_path,
                    ) {
                        Ok(()) => info!("🎞️ sequence clip {:?}", clip_path),
                        Err(e) => warn!("⚠️ sequence clip render failed: {}", e),
                    }
                }
                sequences.push(HarmfulSequence {
                    start_frame: start,
                    end_frame: end,
                    confidence: buffer.last_confidence,
                    clip_path,
                });
                run = None;
            }
        } else {
            // A single safe frame breaks the run; shorter runs are discarded.
            run = None;
        }

        progress(frame.index);
    }

    let mut aggregate = AggregateScores::default();
    aggregate.set(harmful_label, 0.0);
    aggregate.set(mode.safe_label(), 0.0);
    for (label, (sum, count)) in &sums {
        if *count > 0 {
            aggregate.set(label, (*sum / *count as f64) as f32);
        }
    }

    info!(
        "👁️ visual pass done: {} frames, {} sequences, mean {}={:.3}",
        frame_count,
        sequences.len(),
        harmful_label,
        aggregate.get(harmful_label)
    );

    Ok(VisualAnalysis {
        frame_count,
        verdicts,
        aggregate,
        sequences,
    })
}
