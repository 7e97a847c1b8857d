use std::fmt::{Display, Formatter};
use std::path::Path;

use crate::frame::Frame;
use crate::metadata::TrackMetadata;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderStatus {
    Idle,
    Reading,
    Completed,
    Failed,
}

impl Display for ReaderStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ReaderStatus::Idle => "idle",
            ReaderStatus::Reading => "reading",
            ReaderStatus::Completed => "completed",
            ReaderStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Sequential reader over the one video track of an input.
///
/// `next_frame` returning `Ok(None)` means the reader has nothing more to give;
/// [`status`](FrameSource::status) tells whether that was a clean end of stream
/// (`Completed`) or a truncation (`Failed`).
pub trait FrameSource: Send {
    fn path(&self) -> &Path;

    fn metadata(&self) -> &TrackMetadata;

    fn status(&self) -> ReaderStatus;

    /// Moves the reader from `Idle` to `Reading`. Returns false when it cannot start.
    fn start_reading(&mut self) -> bool;

    fn next_frame(&mut self) -> anyhow::Result<Option<Frame>>;
}

/// Pulls the next frame, folding a read error into the reader's terminal state.
///
/// Returns `None` once the reader has stopped; the caller decides how to
/// interpret that from [`FrameSource::status`].
pub fn pull<S: FrameSource + ?Sized>(source: &mut S) -> Option<Frame> {
    if source.status() != ReaderStatus::Reading {
        return None;
    }
    match source.next_frame() {
        Ok(frame) => frame,
        Err(e) => {
            log::error!("read sample from {} failed: {:#}", source.path().display(), e);
            None
        }
    }
}
