// src/annotate.rs
//
// Frame annotation overlay. Each classified frame gets a banner across the
// top with the class label, confidence, frame number and wall-clock
// position, colored red for harmful and green for safe. Annotated frames
// are what the output render and sequence clips are built from.

use std::io::Cursor;
use std::sync::OnceLock;

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use rusttype::{Font, Scale};
use tracing::warn;

use crate::types::Frame;

const BANNER_HEIGHT: u32 = 72;
const BANNER_COLOR: Rgb<u8> = Rgb([20, 20, 20]);
const HARMFUL_COLOR: Rgb<u8> = Rgb([220, 40, 40]);
const SAFE_COLOR: Rgb<u8> = Rgb([40, 200, 80]);
const INFO_COLOR: Rgb<u8> = Rgb([235, 235, 235]);

/// Common system font locations. The first readable TTF wins; without any
/// the banner is drawn without text.
const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/System/Library/Fonts/Helvetica.ttc",
];

fn overlay_font() -> Option<&'static Font<'static>> {
    static FONT: OnceLock<Option<Font<'static>>> = OnceLock::new();
    FONT.get_or_init(|| {
        for path in FONT_CANDIDATES {
            if let Ok(bytes) = std::fs::read(path) {
                if let Some(font) = Font::try_from_vec(bytes) {
                    return Some(font);
                }
            }
        }
        warn!("⚠️ no usable overlay font found, frames get banner only");
        None
    })
    .as_ref()
}

/// Renders the annotation overlay onto a copy of the frame.
pub fn annotate_frame(frame: &Frame, label: &str, confidence: f32, is_harmful: bool, fps: f64) -> Option<RgbImage> {
    let mut image = frame.to_rgb_image()?;
    let width = image.width();

    let banner_height = BANNER_HEIGHT.min(image.height());
    draw_filled_rect_mut(
        &mut image,
        Rect::at(0, 0).of_size(width, banner_height),
        BANNER_COLOR,
    );

    if let Some(font) = overlay_font() {
        let label_color = if is_harmful { HARMFUL_COLOR } else { SAFE_COLOR };
        let seconds = if fps > 0.0 {
            frame.index as f64 / fps
        } else {
            frame.timestamp_ms / 1000.0
        };

        let verdict_line = format!("{}: {:.2}", label, confidence);
        let info_line = format!(
            "Frame: {}   Time: {}",
            frame.index,
            format_timestamp(seconds)
        );

        draw_text_mut(
            &mut image,
            label_color,
            12,
            8,
            Scale::uniform(28.0),
            font,
            &verdict_line,
        );
        draw_text_mut(
            &mut image,
            INFO_COLOR,
            12,
            42,
            Scale::uniform(20.0),
            font,
            &info_line,
        );
    }

    Some(image)
}

/// Formats seconds as H:MM:SS.
pub fn format_timestamp(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

/// Encodes an image to in-memory JPEG bytes.
pub fn encode_jpeg(image: &RgbImage) -> Option<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, 85);
    if image.write_with_encoder(encoder).is_ok() {
        Some(buf.into_inner())
    } else {
        None
    }
}
