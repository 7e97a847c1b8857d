use std::path::PathBuf;

use crate::frame::Timestamp;
use crate::wait::Checkpoint;

/// Errors surfaced by a split, merge or extract run.
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    /// Input or configuration rejected before any resource was opened.
    #[error("invalid media input: {0}")]
    InvalidMediaInput(String),

    #[error("no video tracks found in {}", .0.display())]
    NoVideoTracksFound(PathBuf),

    /// The reader could not be started or produced an unreadable sample.
    #[error("could not read sample from {}: {reason}", path.display())]
    CouldNotReadSample { path: PathBuf, reason: String },

    /// Track format description could not be parsed (e.g. missing dimensions).
    #[error("could not parse format description of {}: {reason}", path.display())]
    CouldNotParse { path: PathBuf, reason: String },

    #[error("{checkpoint} exceeded the wait ceiling of {ceiling_secs}s")]
    TimeoutError {
        checkpoint: Checkpoint,
        ceiling_secs: u64,
    },

    #[error("could not create output {}: {reason}", path.display())]
    CreateOutputError { path: PathBuf, reason: String },

    #[error("mismatched presentation timestamps on frame {frame}: left {left} right {right}")]
    InputTimestampMismatch {
        frame: u64,
        left: Timestamp,
        right: Timestamp,
    },

    #[error("appending tagged buffers for frame {frame} was not successful")]
    AppendTaggedBufferError { frame: u64 },
}

impl MediaError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        MediaError::InvalidMediaInput(msg.into())
    }

    pub(crate) fn create_output(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        MediaError::CreateOutputError {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn read_sample(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        MediaError::CouldNotReadSample {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// True for errors raised before any output was opened.
    pub fn is_preflight(&self) -> bool {
        matches!(self, MediaError::InvalidMediaInput(_))
    }
}

pub type Result<T> = std::result::Result<T, MediaError>;
