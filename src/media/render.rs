// src/media/render.rs
//
// Output rendering through ffmpeg subprocesses: audio track extraction for
// transcription, looping clips for harmful sequences, and the final
// annotated video with the original audio muxed back in.

use std::path::Path;
use std::process::Command;

use tracing::{info, warn};

use crate::error::{PipelineError, ToolStage};

/// Runs ffmpeg and maps a nonzero exit to a stage-tagged error carrying the
/// stderr tail.
fn run_ffmpeg(args: &[&str], stage: ToolStage) -> Result<(), PipelineError> {
    let output = Command::new(super::ffmpeg_path()?)
        .args(args)
        .output()
        .map_err(|e| PipelineError::tool(stage, e.to_string()))?;

    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let tail: String = stderr
        .lines()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect::<Vec<_>>()
        .join("; ");
    Err(PipelineError::tool(stage, tail))
}

fn path_str(path: &Path, stage: ToolStage) -> Result<&str, PipelineError> {
    path.to_str()
        .ok_or_else(|| PipelineError::tool(stage, format!("non-utf8 path {:?}", path)))
}

/// Extracts the audio track as mono 16 kHz s16 PCM WAV, the format the
/// speech model consumes.
pub fn extract_audio(video: &Path, wav_out: &Path) -> Result<(), PipelineError> {
    let stage = ToolStage::AudioExtract;
    run_ffmpeg(
        &[
            "-v", "error", "-y",
            "-i", path_str(video, stage)?,
            "-vn",
            "-acodec", "pcm_s16le",
            "-ac", "1",
            "-ar", "16000",
            path_str(wav_out, stage)?,
        ],
        stage,
    )
}

/// Renders one harmful sequence as a short looping GIF from the annotated
/// frame images already on disk.
pub fn render_sequence_clip(
    frames_dir: &Path,
    start_frame: u64,
    frame_count: u64,
    gif_out: &Path,
) -> Result<(), PipelineError> {
    let stage = ToolStage::ClipRender;
    let pattern = frames_dir.join("frame_%04d.jpg");
    let start = start_frame.to_string();
    let count = frame_count.to_string();
    run_ffmpeg(
        &[
            "-v", "error", "-y",
            "-start_number", &start,
            "-i", path_str(&pattern, stage)?,
            "-frames:v", &count,
            "-vf", "fps=5,scale=480:-1",
            "-loop", "0",
            path_str(gif_out, stage)?,
        ],
        stage,
    )
}

/// Muxes the annotated frames back into a playable video with the original
/// audio. Tries h264 first; if the encoder is unavailable the frames are
/// stream-copied as MJPEG instead so an output always exists.
pub fn render_processed_video(
    frames_dir: &Path,
    original: &Path,
    fps: u32,
    video_out: &Path,
) -> Result<(), PipelineError> {
    let stage = ToolStage::Mux;
    let pattern = frames_dir.join("frame_%04d.jpg");
    let rate = fps.to_string();

    let encode = run_ffmpeg(
        &[
            "-v", "error", "-y",
            "-framerate", &rate,
            "-start_number", "1",
            "-i", path_str(&pattern, stage)?,
            "-i", path_str(original, stage)?,
            "-map", "0:v:0",
            "-map", "1:a:0?",
            "-c:v", "libx264",
            "-pix_fmt", "yuv420p",
            "-crf", "23",
            "-preset", "fast",
            "-c:a", "aac",
            "-b:a", "192k",
            "-movflags", "+faststart",
            "-shortest",
            path_str(video_out, stage)?,
        ],
        stage,
    );

    match encode {
        Ok(()) => {
            info!("🎞️ rendered {:?}", video_out);
            Ok(())
        }
        Err(e) => {
            warn!("⚠️ h264 encode failed ({}), retrying with stream copy", e);
            run_ffmpeg(
                &[
                    "-v", "error", "-y",
                    "-framerate", &rate,
                    "-start_number", "1",
                    "-i", path_str(&pattern, stage)?,
                    "-i", path_str(original, stage)?,
                    "-map", "0:v:0",
                    "-map", "1:a:0?",
                    "-c:v", "copy",
                    "-c:a", "aac",
                    "-b:a", "192k",
                    "-shortest",
                    path_str(video_out, stage)?,
                ],
                stage,
            )?;
            info!("🎞️ rendered {:?} (stream copy fallback)", video_out);
            Ok(())
        }
    }
}
