// src/error.rs
//
// Pipeline error taxonomy. Every stage-local failure unwinds to the
// orchestrator as one of these variants; cleanup never masks the original
// error.

use std::fmt;

use thiserror::Error;

/// Which external tool invocation failed. Callers use this to distinguish
/// audio extraction failures from muxing failures (the latter is retryable
/// with a stream-copy fallback).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolStage {
    Probe,
    AudioExtract,
    ClipRender,
    Mux,
}

impl fmt::Display for ToolStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Probe => "ffprobe",
            Self::AudioExtract => "audio extraction",
            Self::ClipRender => "sequence clip render",
            Self::Mux => "output muxing",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Rejected before any processing work began; no partial artifacts.
    #[error("input validation failed: {0}")]
    InputValidation(String),

    #[error("{tool} failed: {message}")]
    ExternalTool { tool: ToolStage, message: String },

    /// A frame or text classification call failed. Not retried.
    #[error("classifier call failed: {0}")]
    Classifier(String),

    #[error("history storage error: {0}")]
    Storage(String),

    /// Distinguished outcome, not a true failure. Cleanup still runs.
    #[error("processing cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn tool(tool: ToolStage, message: impl Into<String>) -> Self {
        Self::ExternalTool {
            tool,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_failures_are_distinguishable() {
        let extract = PipelineError::tool(ToolStage::AudioExtract, "no audio stream");
        let mux = PipelineError::tool(ToolStage::Mux, "encoder missing");

        assert!(extract.to_string().contains("audio extraction"));
        assert!(mux.to_string().contains("output muxing"));
        assert!(!extract.is_cancelled());
        assert!(PipelineError::Cancelled.is_cancelled());
    }
}
