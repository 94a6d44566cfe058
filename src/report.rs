// src/report.rs
//
// Self-contained HTML report for one processed video: verdict banner,
// per-modality scores, fusion breakdown and a capped transcript excerpt.

use std::path::Path;

use tracing::info;

use crate::error::PipelineError;
use crate::fusion;
use crate::history::HistoryEntry;
use crate::types::{DetectionMode, Verdict};

const MAX_TRANSCRIPT_SEGMENTS: usize = 12;

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn fusion_note(entry: &HistoryEntry) -> String {
    let mode = entry.fusion.mode;
    let visual = entry.fusion.visual_score.get(mode.harmful_label());

    if mode == DetectionMode::Nudity && visual > fusion::NUDITY_OVERRIDE_THRESHOLD {
        format!(
            "Visual override: visual score {:.2} above {:.2}, combined lifted to at least {:.2} × {:.1}.",
            visual,
            fusion::NUDITY_OVERRIDE_THRESHOLD,
            visual,
            fusion::NUDITY_OVERRIDE_BOOST
        )
    } else if mode == DetectionMode::Nudity && visual > fusion::NUDITY_REWEIGHT_THRESHOLD {
        format!(
            "Visual-dominant weighting: {:.1} text / {:.1} visual.",
            fusion::NUDITY_TEXT_WEIGHT,
            fusion::NUDITY_VISUAL_WEIGHT
        )
    } else {
        format!(
            "Standard weighting: {:.1} text / {:.1} visual.",
            fusion::TEXT_WEIGHT,
            fusion::VISUAL_WEIGHT
        )
    }
}

pub fn write_report(entry: &HistoryEntry, path: &Path) -> Result<(), PipelineError> {
    let (banner_color, banner_text) = match entry.fusion.verdict {
        Verdict::Harmful => ("#c62828", "HARMFUL"),
        Verdict::Safe => ("#2e7d32", "SAFE"),
    };

    let mut visual_rows = String::new();
    for (label, score) in &entry.fusion.visual_score.0 {
        visual_rows.push_str(&format!(
            "<tr><td>{}</td><td>{:.3}</td></tr>\n",
            escape(label),
            score
        ));
    }

    let mut transcript_rows = String::new();
    for segment in entry.transcript.iter().take(MAX_TRANSCRIPT_SEGMENTS) {
        transcript_rows.push_str(&format!(
            "<tr><td>[{:.1}s]</td><td>{}</td></tr>\n",
            segment.start_time,
            escape(&segment.text)
        ));
    }
    let truncation_note = if entry.transcript.len() > MAX_TRANSCRIPT_SEGMENTS {
        format!(
            "<p class=\"muted\">Showing {} of {} segments.</p>",
            MAX_TRANSCRIPT_SEGMENTS,
            entry.transcript.len()
        )
    } else {
        String::new()
    };

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Content analysis: {video_id}</title>
<style>
body {{ font-family: sans-serif; max-width: 720px; margin: 2em auto; color: #222; }}
.banner {{ background: {banner_color}; color: #fff; padding: 1em; font-size: 1.4em; font-weight: bold; }}
table {{ border-collapse: collapse; margin: 1em 0; width: 100%; }}
td, th {{ border: 1px solid #ccc; padding: 0.4em 0.8em; text-align: left; }}
.muted {{ color: #777; font-size: 0.9em; }}
</style>
</head>
<body>
<h1>Content analysis: {video_id}</h1>
<div class="banner">{banner_text} &mdash; confidence {confidence:.1}%</div>
<p>Mode: {mode} &middot; {frame_count} frames &middot; processed in {processing:.1}s at {processed_at}</p>

<h2>Visual scores (per-frame mean)</h2>
<table>{visual_rows}</table>

<h2>Text scores</h2>
<table>
<tr><td>harmful</td><td>{text_harmful:.3}</td></tr>
<tr><td>safe</td><td>{text_safe:.3}</td></tr>
</table>

<h2>Fusion</h2>
<p>{fusion_note}</p>
<p>Combined harmful score: <strong>{combined:.3}</strong></p>

<h2>Transcript excerpt</h2>
<table>{transcript_rows}</table>
{truncation_note}
</body>
</html>
"#,
        video_id = escape(&entry.video_id),
        banner_color = banner_color,
        banner_text = banner_text,
        confidence = entry.fusion.confidence * 100.0,
        mode = entry.fusion.mode.as_str(),
        frame_count = entry.frame_count,
        processing = entry.processing_secs,
        processed_at = entry.processed_at.format("%Y-%m-%d %H:%M:%S UTC"),
        visual_rows = visual_rows,
        text_harmful = entry.fusion.text_score.harmful,
        text_safe = entry.fusion.text_score.safe,
        fusion_note = fusion_note(entry),
        combined = entry.fusion.combined_harmful_score,
        transcript_rows = transcript_rows,
        truncation_note = truncation_note,
    );

    std::fs::write(path, html)?;
    info!("📄 report written to {:?}", path);
    Ok(())
}
