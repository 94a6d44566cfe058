// src/types.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Context;
use image::RgbImage;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub models: ModelsConfig,
    pub detection: DetectionConfig,
    pub video: VideoConfig,
    pub history: HistoryConfig,
    pub logging: LoggingConfig,
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path))?;
        let config: Config =
            serde_yaml::from_str(&raw).with_context(|| format!("invalid config in {}", path))?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    pub mode: DetectionMode,
    pub sequence_length: usize,
    pub nudity_confidence_floor: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoConfig {
    pub input_dir: String,
    pub output_dir: String,
    pub min_duration_secs: f64,
    pub max_duration_secs: f64,
    pub max_size_bytes: u64,
    pub render_fps: u32,
    pub render_clips: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    pub path: String,
    pub max_entries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

/// Active detection mode. Each mode carries its own fixed label set; the
/// harmful label is what the frame classifier emits for undesired content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionMode {
    Violence,
    Nudity,
}

impl DetectionMode {
    pub fn labels(&self) -> &'static [&'static str] {
        match self {
            Self::Violence => &["Safe", "Violence"],
            Self::Nudity => &["nude", "safe"],
        }
    }

    pub fn harmful_label(&self) -> &'static str {
        match self {
            Self::Violence => "Violence",
            Self::Nudity => "nude",
        }
    }

    pub fn safe_label(&self) -> &'static str {
        match self {
            Self::Violence => "Safe",
            Self::Nudity => "safe",
        }
    }

    /// Minimum confidence for a harmful classification to stand. Below the
    /// floor the frame is downgraded to the safe label (nudity mode only).
    pub fn confidence_floor(&self, detection: &DetectionConfig) -> Option<f32> {
        match self {
            Self::Violence => None,
            Self::Nudity => Some(detection.nudity_confidence_floor),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Violence => "violence",
            Self::Nudity => "nudity",
        }
    }
}

impl FromStr for DetectionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "violence" => Ok(Self::Violence),
            "nudity" => Ok(Self::Nudity),
            other => Err(format!("unknown detection mode '{}'", other)),
        }
    }
}

/// One decoded frame in rgb24 layout. `index` starts at 1 and follows
/// presentation order.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub index: u64,
    pub timestamp_ms: f64,
}

impl Frame {
    pub fn to_rgb_image(&self) -> Option<RgbImage> {
        let expected = self.width as usize * self.height as usize * 3;
        if self.data.len() < expected {
            return None;
        }
        RgbImage::from_raw(self.width, self.height, self.data[..expected].to_vec())
    }
}

/// Per-frame classifier outcome, immutable once recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameVerdict {
    pub frame_index: u64,
    pub label: String,
    pub confidence: f32,
}

/// A contiguous run of harmful frames that reached the configured minimum
/// length, rendered as a short looping clip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarmfulSequence {
    pub start_frame: u64,
    pub end_frame: u64,
    pub confidence: f32,
    pub clip_path: PathBuf,
}

impl HarmfulSequence {
    pub fn len(&self) -> u64 {
        self.end_frame - self.start_frame + 1
    }
}

/// Mean per-frame confidence keyed by class label. Labels that never
/// occurred map to 0.0 rather than being absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateScores(pub BTreeMap<String, f32>);

impl AggregateScores {
    pub fn get(&self, label: &str) -> f32 {
        self.0.get(label).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, label: &str, value: f32) {
        self.0.insert(label.to_string(), value);
    }
}

/// Transcript-level classifier output with span highlighting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextScore {
    pub harmful: f32,
    pub safe: f32,
    pub highlighted: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Harmful,
    Safe,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Harmful => "Harmful",
            Self::Safe => "Safe",
        }
    }
}

/// Fused outcome across both modalities. One normalized schema for every
/// mode; the mode tag tells consumers which harmful label fed the visual
/// side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionResult {
    pub mode: DetectionMode,
    pub text_score: TextScore,
    pub visual_score: AggregateScores,
    pub combined_harmful_score: f32,
    pub verdict: Verdict,
    pub confidence: f32,
}

/// One transcribed speech segment with a validated start timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub start_time: f64,
    pub text: String,
}
