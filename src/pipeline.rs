// src/pipeline.rs
//
// Per-video orchestrator. Runs the staged state machine over one input:
// audio out, transcript, text score, visual sequences, fusion, final
// render, history save. Any failure or cancellation triggers best-effort
// cleanup of the partial output directory and then propagates unchanged.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::cancel::CancellationFlag;
use crate::classifiers::ModelRegistry;
use crate::error::PipelineError;
use crate::fusion::fuse;
use crate::history::{ArtifactSet, HistoryEntry, HistoryStore};
use crate::media::reader::FfmpegFrameReader;
use crate::media::render::{extract_audio, render_processed_video};
use crate::media::{probe, validate_input};
use crate::sequence::{self, SequenceOptions};
use crate::transcript;
use crate::types::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    ExtractingAudio,
    Transcribing,
    ClassifyingText,
    ExtractingVisualSequences,
    Fusing,
    RenderingOutput,
}

impl Stage {
    fn as_str(&self) -> &'static str {
        match self {
            Self::ExtractingAudio => "extracting_audio",
            Self::Transcribing => "transcribing",
            Self::ClassifyingText => "classifying_text",
            Self::ExtractingVisualSequences => "extracting_visual_sequences",
            Self::Fusing => "fusing",
            Self::RenderingOutput => "rendering_output",
        }
    }
}

pub struct VideoPipeline {
    config: Config,
    registry: ModelRegistry,
    history: HistoryStore,
    cancel: CancellationFlag,
}

impl VideoPipeline {
    pub fn new(
        config: Config,
        registry: ModelRegistry,
        history: HistoryStore,
        cancel: CancellationFlag,
    ) -> Self {
        Self {
            config,
            registry,
            history,
            cancel,
        }
    }

    fn enter(&self, stage: Stage) -> Result<(), PipelineError> {
        self.cancel.check()?;
        info!("▶️ stage: {}", stage.as_str());
        Ok(())
    }

    /// Processes one video end to end and records it in history.
    pub async fn run(&self, video_path: &Path) -> Result<HistoryEntry, PipelineError> {
        // Validation happens before any artifact exists; a rejected video
        // leaves no trace.
        let info = probe(video_path)?;
        validate_input(&info, &self.config.video)?;

        let video_id = video_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| {
                PipelineError::InputValidation(format!("no file name in {:?}", video_path))
            })?;
        let out_dir = PathBuf::from(&self.config.video.output_dir).join(&video_id);
        let frames_dir = out_dir.join("frames");
        std::fs::create_dir_all(&frames_dir)?;

        info!(
            "🎬 processing '{}' ({:.1}s, {}x{} @ {:.1}fps, mode {})",
            video_id,
            info.duration_secs,
            info.width,
            info.height,
            info.fps,
            self.config.detection.mode.as_str()
        );

        match self
            .run_stages(video_path, &info, &video_id, &out_dir, &frames_dir)
            .await
        {
            Ok(entry) => {
                cleanup_temp_files(&out_dir, &frames_dir);
                Ok(entry)
            }
            Err(e) => Err(abort_with_cleanup(&video_id, &out_dir, e)),
        }
    }

    async fn run_stages(
        &self,
        video_path: &Path,
        info: &crate::media::VideoInfo,
        video_id: &str,
        out_dir: &Path,
        frames_dir: &Path,
    ) -> Result<HistoryEntry, PipelineError> {
        let started = Instant::now();
        let mode = self.config.detection.mode;

        self.enter(Stage::ExtractingAudio)?;
        let wav_path = out_dir.join("audio.wav");
        extract_audio(video_path, &wav_path)?;

        self.enter(Stage::Transcribing)?;
        let wav = std::fs::read(&wav_path)?;
        let segments = transcript::transcribe(self.registry.transcriber.as_ref(), &wav).await?;

        self.enter(Stage::ClassifyingText)?;
        let text_score =
            transcript::classify_transcript(self.registry.text.as_ref(), &segments).await?;

        self.enter(Stage::ExtractingVisualSequences)?;
        let reader = FfmpegFrameReader::open(video_path, info)?;
        let options = SequenceOptions {
            sequence_length: self.config.detection.sequence_length,
            confidence_floor: mode.confidence_floor(&self.config.detection),
            frames_dir: frames_dir.to_path_buf(),
            render_clips: self.config.video.render_clips,
        };
        let mut progress = |index: u64| {
            if index % 100 == 0 {
                debug!("🎞️ classified {} frames", index);
            }
        };
        let analysis = sequence::extract(
            reader,
            self.registry.frames.as_ref(),
            mode,
            &options,
            &self.cancel,
            &mut progress,
        )
        .await?;

        self.enter(Stage::Fusing)?;
        let fusion = fuse(&text_score, &analysis.aggregate, mode);

        self.enter(Stage::RenderingOutput)?;
        let processed_clip = if analysis.frame_count > 0 {
            let clip = out_dir.join("processed.mp4");
            render_processed_video(
                frames_dir,
                video_path,
                self.config.video.render_fps,
                &clip,
            )?;
            Some(clip)
        } else {
            info!("⏭️ no frames decoded, skipping output render");
            None
        };

        let entry = HistoryEntry {
            video_id: video_id.to_string(),
            fusion,
            transcript: segments,
            frame_count: analysis.frame_count,
            artifacts: ArtifactSet {
                output_dir: out_dir.to_path_buf(),
                processed_clip,
                sequence_clips: analysis
                    .sequences
                    .iter()
                    .map(|s| s.clip_path.clone())
                    .collect(),
            },
            processing_secs: started.elapsed().as_secs_f64(),
            processed_at: Utc::now(),
        };

        let evicted = self.history.save(entry.clone())?;
        for id in evicted {
            info!("🗑️ history evicted '{}'", id);
        }

        info!(
            "✅ '{}' done in {:.1}s: {} ({:.1}% confidence), {} sequences",
            video_id,
            entry.processing_secs,
            entry.fusion.verdict.as_str(),
            entry.fusion.confidence * 100.0,
            entry.artifacts.sequence_clips.len()
        );
        Ok(entry)
    }
}

/// Aborted-run cleanup: removes the whole partial output directory and hands
/// back the original outcome unchanged. Cleanup failures are logged, never
/// escalated.
fn abort_with_cleanup(video_id: &str, out_dir: &Path, error: PipelineError) -> PipelineError {
    if error.is_cancelled() {
        info!("🛑 processing of '{}' cancelled", video_id);
    } else {
        warn!("❌ processing of '{}' failed: {}", video_id, error);
    }
    if let Err(cleanup_err) = std::fs::remove_dir_all(out_dir) {
        if cleanup_err.kind() != std::io::ErrorKind::NotFound {
            warn!("⚠️ cleanup of {:?} failed: {}", out_dir, cleanup_err);
        }
    }
    error
}

/// Removes the intermediate WAV and per-frame JPEGs after a successful run.
/// Sequence clips and the processed video stay. Never fails the run.
fn cleanup_temp_files(out_dir: &Path, frames_dir: &Path) {
    let wav = out_dir.join("audio.wav");
    if wav.exists() {
        if let Err(e) = std::fs::remove_file(&wav) {
            warn!("⚠️ could not remove {:?}: {}", wav, e);
        }
    }

    let entries = match std::fs::read_dir(frames_dir) {
        Ok(entries) => entries,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("⚠️ could not list {:?}: {}", frames_dir, e);
            }
            return;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().map(|e| e == "jpg").unwrap_or(false) {
            if let Err(e) = std::fs::remove_file(&path) {
                warn!("⚠️ could not remove {:?}: {}", path, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleanup_keeps_clips_and_drops_temp() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path();
        let frames_dir = out_dir.join("frames");
        std::fs::create_dir_all(&frames_dir).unwrap();

        std::fs::write(out_dir.join("audio.wav"), b"wav").unwrap();
        std::fs::write(out_dir.join("processed.mp4"), b"mp4").unwrap();
        std::fs::write(frames_dir.join("frame_0001.jpg"), b"jpg").unwrap();
        std::fs::write(frames_dir.join("frame_0002.jpg"), b"jpg").unwrap();
        std::fs::write(frames_dir.join("sequence_16.gif"), b"gif").unwrap();

        cleanup_temp_files(out_dir, &frames_dir);

        assert!(!out_dir.join("audio.wav").exists());
        assert!(!frames_dir.join("frame_0001.jpg").exists());
        assert!(!frames_dir.join("frame_0002.jpg").exists());
        assert!(frames_dir.join("sequence_16.gif").exists());
        assert!(out_dir.join("processed.mp4").exists());
    }

    #[test]
    fn test_cleanup_tolerates_missing_dirs() {
        let dir = tempfile::tempdir().unwrap();
        cleanup_temp_files(&dir.path().join("gone"), &dir.path().join("gone/frames"));
    }

    #[test]
    fn test_abort_removes_partial_outputs_and_keeps_error() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("clip1");
        std::fs::create_dir_all(out_dir.join("frames")).unwrap();
        std::fs::write(out_dir.join("audio.wav"), b"wav").unwrap();
        std::fs::write(out_dir.join("frames/frame_0001.jpg"), b"jpg").unwrap();

        let returned = abort_with_cleanup(
            "clip1",
            &out_dir,
            PipelineError::Classifier("model gone".to_string()),
        );

        assert!(!out_dir.exists());
        assert!(matches!(returned, PipelineError::Classifier(m) if m == "model gone"));
    }

    #[test]
    fn test_abort_on_cancellation_still_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("clip2");
        std::fs::create_dir_all(&out_dir).unwrap();

        let returned = abort_with_cleanup("clip2", &out_dir, PipelineError::Cancelled);

        assert!(!out_dir.exists());
        assert!(returned.is_cancelled());
    }

    #[test]
    fn test_abort_tolerates_missing_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let returned = abort_with_cleanup(
            "clip3",
            &dir.path().join("never-created"),
            PipelineError::Cancelled,
        );
        assert!(returned.is_cancelled());
    }
}
