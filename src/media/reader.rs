// src/media/reader.rs
//
// Sequential frame decoding. Frames stream out of an ffmpeg subprocess as
// raw rgb24 over stdout; the reader refills a fixed-size buffer per frame
// and hands back `None` at clean end of stream.

use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};

use tracing::{debug, warn};

use crate::error::PipelineError;
use crate::types::Frame;

use super::{ffmpeg_path, VideoInfo};

/// Anything that can hand the sequence extractor decoded frames in
/// presentation order.
pub trait FrameSource {
    /// Next frame, or `None` once the stream ends.
    fn next_frame(&mut self) -> Result<Option<Frame>, PipelineError>;
    fn fps(&self) -> f64;
    fn dimensions(&self) -> (u32, u32);
}

pub struct FfmpegFrameReader {
    child: Child,
    width: u32,
    height: u32,
    fps: f64,
    next_index: u64,
    finished: bool,
}

impl FfmpegFrameReader {
    pub fn open(path: &Path, info: &VideoInfo) -> Result<Self, PipelineError> {
        let child = Command::new(ffmpeg_path()?)
            .args(["-v", "error", "-i"])
            .arg(path)
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .stdin(Stdio::null())
            .spawn()?;

        debug!("🎥 decoding {:?} ({}x{})", path, info.width, info.height);
        Ok(Self {
            child,
            width: info.width,
            height: info.height,
            fps: info.fps,
            next_index: 1,
            finished: false,
        })
    }

    fn frame_bytes(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

impl FrameSource for FfmpegFrameReader {
    fn next_frame(&mut self) -> Result<Option<Frame>, PipelineError> {
        if self.finished {
            return Ok(None);
        }

        let frame_bytes = self.frame_bytes();
        let stdout = match self.child.stdout.as_mut() {
            Some(s) => s,
            None => {
                self.finished = true;
                return Ok(None);
            }
        };

        let mut data = vec![0u8; frame_bytes];
        let mut filled = 0;
        while filled < data.len() {
            let n = stdout.read(&mut data[filled..])?;
            if n == 0 {
                self.finished = true;
                if filled == 0 {
                    // Clean end of stream on a frame boundary.
                    return Ok(None);
                }
                warn!(
                    "⚠️ truncated frame at index {} ({} of {} bytes), stopping",
                    self.next_index,
                    filled,
                    data.len()
                );
                return Ok(None);
            }
            filled += n;
        }

        let index = self.next_index;
        self.next_index += 1;
        let timestamp_ms = if self.fps > 0.0 {
            (index - 1) as f64 / self.fps * 1000.0
        } else {
            0.0
        };

        Ok(Some(Frame {
            data,
            width: self.width,
            height: self.height,
            index,
            timestamp_ms,
        }))
    }

    fn fps(&self) -> f64 {
        self.fps
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl Drop for FfmpegFrameReader {
    fn drop(&mut self) {
        // Stops the decoder early on cancellation or error paths.
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
