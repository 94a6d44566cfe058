// src/main.rs

mod annotate;
mod cancel;
mod classifiers;
mod error;
mod fusion;
mod history;
mod media;
mod pipeline;
mod report;
mod sequence;
mod transcript;
mod types;

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Result;
use cancel::CancellationFlag;
use classifiers::ModelRegistry;
use history::HistoryStore;
use pipeline::VideoPipeline;
use tracing::{error, info, warn};
use types::{Config, DetectionMode};
use walkdir::WalkDir;

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv"];

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load("config.yaml")?;

    tracing_subscriber::fmt()
        .with_env_filter(format!("harmscan={}", config.logging.level))
        .init();

    info!("🛡️ Harmful Content Detection System Starting");
    info!("✓ Configuration loaded");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let mode = match args.get(1) {
        Some(raw) => DetectionMode::from_str(raw).map_err(anyhow::Error::msg)?,
        None => config.detection.mode,
    };

    let video_files = match args.first() {
        Some(path) => vec![PathBuf::from(path)],
        None => find_video_files(&config.video.input_dir)?,
    };
    if video_files.is_empty() {
        error!("No video files found in {}", config.video.input_dir);
        return Ok(());
    }
    info!(
        "Found {} video file(s) to process in {} mode",
        video_files.len(),
        mode.as_str()
    );

    let mut run_config = config.clone();
    run_config.detection.mode = mode;

    let registry = ModelRegistry::remote(&run_config.models)?;
    info!("✓ Model endpoint: {}", run_config.models.endpoint);

    let history = HistoryStore::new(&run_config.history.path, run_config.history.max_entries);
    match history.list() {
        Ok(entries) => info!(
            "📚 history: {}/{} entries",
            entries.len(),
            run_config.history.max_entries
        ),
        Err(e) => warn!("⚠️ could not read history: {}", e),
    }

    let flag = CancellationFlag::new();
    let signal_flag = flag.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("🛑 interrupt received, finishing current frame and cleaning up");
            signal_flag.cancel();
        }
    });

    let pipeline = VideoPipeline::new(run_config.clone(), registry, history, flag.clone());

    let mut processed: usize = 0;
    let mut harmful: usize = 0;
    let mut failed: usize = 0;

    for (idx, video_path) in video_files.iter().enumerate() {
        if flag.is_cancelled() {
            warn!("skipping remaining {} video(s)", video_files.len() - idx);
            break;
        }

        info!("========================================");
        info!(
            "Processing video {}/{}: {}",
            idx + 1,
            video_files.len(),
            video_path.display()
        );
        info!("========================================");

        match pipeline.run(video_path).await {
            Ok(entry) => {
                processed += 1;
                if entry.fusion.verdict == types::Verdict::Harmful {
                    harmful += 1;
                }

                let report_path = entry.artifacts.output_dir.join("report.html");
                if let Err(e) = report::write_report(&entry, &report_path) {
                    warn!("⚠️ report generation failed: {}", e);
                }

                info!("✓ Video processed successfully!");
                info!("  Verdict: {}", entry.fusion.verdict.as_str());
                info!("  Confidence: {:.1}%", entry.fusion.confidence * 100.0);
                info!(
                    "  Combined harmful score: {:.3}",
                    entry.fusion.combined_harmful_score
                );
                info!("  Frames analyzed: {}", entry.frame_count);
                info!(
                    "  Harmful sequences: {}",
                    entry.artifacts.sequence_clips.len()
                );
                info!("  Transcript segments: {}", entry.transcript.len());
                info!("  Processing time: {:.1}s", entry.processing_secs);
            }
            Err(e) if e.is_cancelled() => {
                warn!("Video cancelled: {}", video_path.display());
            }
            Err(e) => {
                failed += 1;
                error!("Failed to process video: {}", e);
            }
        }
    }

    info!("📊 Run summary:");
    info!("  Processed: {}", processed);
    info!("  🚨 Harmful: {}", harmful);
    info!("  ✅ Safe: {}", processed - harmful);
    if failed > 0 {
        warn!("  ❌ Failed: {}", failed);
    }

    Ok(())
}

fn find_video_files(input_dir: &str) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = WalkDir::new(input_dir)
        .max_depth(2)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| is_video_file(path))
        .collect();
    files.sort();
    Ok(files)
}

fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            VIDEO_EXTENSIONS.iter().any(|v| *v == ext)
        })
        .unwrap_or(false)
}
