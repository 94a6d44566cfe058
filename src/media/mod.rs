// src/media/mod.rs
//
// External transcoding tool access. All decoding, audio extraction and
// rendering goes through ffmpeg/ffprobe subprocesses; this module locates
// the binaries, probes container metadata and validates inputs before any
// processing work starts.

pub mod reader;
pub mod render;

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{PipelineError, ToolStage};
use crate::types::VideoConfig;

const FFMPEG_CANDIDATES: &[&str] = &[
    "/usr/bin/ffmpeg",
    "/usr/local/bin/ffmpeg",
    "/opt/homebrew/bin/ffmpeg",
    "/opt/local/bin/ffmpeg",
];

const FFPROBE_CANDIDATES: &[&str] = &[
    "/usr/bin/ffprobe",
    "/usr/local/bin/ffprobe",
    "/opt/homebrew/bin/ffprobe",
    "/opt/local/bin/ffprobe",
];

fn locate(candidates: &[&str], name: &str) -> Option<PathBuf> {
    for candidate in candidates {
        let path = PathBuf::from(candidate);
        if path.exists() {
            if let Ok(output) = Command::new(&path).arg("-version").output() {
                if output.status.success() {
                    info!("🎬 using {} at {:?}", name, path);
                    return Some(path);
                }
            }
        }
    }

    // Fall back to PATH lookup.
    if let Ok(output) = Command::new(name).arg("-version").output() {
        if output.status.success() {
            info!("🎬 using {} from PATH", name);
            return Some(PathBuf::from(name));
        }
    }
    None
}

pub fn ffmpeg_path() -> Result<&'static Path, PipelineError> {
    static PATH: OnceLock<Option<PathBuf>> = OnceLock::new();
    PATH.get_or_init(|| locate(FFMPEG_CANDIDATES, "ffmpeg"))
        .as_deref()
        .ok_or_else(|| PipelineError::tool(ToolStage::Probe, "ffmpeg binary not found"))
}

pub fn ffprobe_path() -> Result<&'static Path, PipelineError> {
    static PATH: OnceLock<Option<PathBuf>> = OnceLock::new();
    PATH.get_or_init(|| locate(FFPROBE_CANDIDATES, "ffprobe"))
        .as_deref()
        .ok_or_else(|| PipelineError::tool(ToolStage::Probe, "ffprobe binary not found"))
}

/// Container metadata for an input video.
#[derive(Debug, Clone)]
pub struct VideoInfo {
    pub duration_secs: f64,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub size_bytes: u64,
}

#[derive(Deserialize)]
struct ProbeOutput {
    format: Option<ProbeFormat>,
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
    size: Option<String>,
}

#[derive(Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
}

fn parse_rate(rate: &str) -> Option<f64> {
    let (num, den) = rate.split_once('/')?;
    let num: f64 = num.trim().parse().ok()?;
    let den: f64 = den.trim().parse().ok()?;
    if den > 0.0 && num > 0.0 {
        Some(num / den)
    } else {
        None
    }
}

pub fn probe(path: &Path) -> Result<VideoInfo, PipelineError> {
    let output = Command::new(ffprobe_path()?)
        .args(["-v", "error", "-print_format", "json", "-show_format", "-show_streams"])
        .arg(path)
        .output()
        .map_err(|e| PipelineError::tool(ToolStage::Probe, e.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(PipelineError::tool(
            ToolStage::Probe,
            format!("{:?}: {}", path, stderr.trim()),
        ));
    }

    let parsed: ProbeOutput = serde_json::from_slice(&output.stdout)
        .map_err(|e| PipelineError::tool(ToolStage::Probe, format!("unparseable output: {}", e)))?;

    let format = parsed
        .format
        .ok_or_else(|| PipelineError::tool(ToolStage::Probe, "no format section"))?;
    let duration_secs = format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
        .ok_or_else(|| PipelineError::tool(ToolStage::Probe, "missing duration"))?;
    let size_bytes = format
        .size
        .as_deref()
        .and_then(|s| s.parse::<u64>().ok())
        .or_else(|| std::fs::metadata(path).ok().map(|m| m.len()))
        .unwrap_or(0);

    let video = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| PipelineError::tool(ToolStage::Probe, "no video stream"))?;

    let width = video
        .width
        .ok_or_else(|| PipelineError::tool(ToolStage::Probe, "missing width"))?;
    let height = video
        .height
        .ok_or_else(|| PipelineError::tool(ToolStage::Probe, "missing height"))?;
    let fps = video
        .avg_frame_rate
        .as_deref()
        .and_then(parse_rate)
        .unwrap_or(30.0);

    let info = VideoInfo {
        duration_secs,
        width,
        height,
        fps,
        size_bytes,
    };
    debug!(
        "📋 probe {:?}: {:.1}s {}x{} @ {:.2}fps, {} bytes",
        path, info.duration_secs, info.width, info.height, info.fps, info.size_bytes
    );
    Ok(info)
}

/// Gatekeeper run before any artifacts are created. A rejected video leaves
/// no trace on disk.
pub fn validate_input(info: &VideoInfo, config: &VideoConfig) -> Result<(), PipelineError> {
    if info.duration_secs < config.min_duration_secs {
        return Err(PipelineError::InputValidation(format!(
            "video is {:.1}s, below the {:.0}s minimum",
            info.duration_secs, config.min_duration_secs
        )));
    }
    if info.duration_secs > config.max_duration_secs {
        return Err(PipelineError::InputValidation(format!(
            "video is {:.1}s, above the {:.0}s maximum",
            info.duration_secs, config.max_duration_secs
        )));
    }
    if info.size_bytes > config.max_size_bytes {
        return Err(PipelineError::InputValidation(format!(
            "video is {} bytes, above the {} byte limit",
            info.size_bytes, config.max_size_bytes
        )));
    }
    Ok(())
}
