use std::path::PathBuf;

use crate::sink::WriterStatus;
use crate::source::ReaderStatus;

/// Progress of one run, owned by whichever loop is driving it.
#[derive(Debug, Clone)]
pub struct RunState {
    completed_frames: u64,
    skipped_frames: u64,
    ready_stalls: u64,
    reader: ReaderStatus,
    writer: WriterStatus,
    drained: bool,
}

impl RunState {
    pub fn new() -> Self {
        Self {
            completed_frames: 0,
            skipped_frames: 0,
            ready_stalls: 0,
            reader: ReaderStatus::Reading,
            writer: WriterStatus::Writing,
            drained: false,
        }
    }

    pub fn completed_frames(&self) -> u64 {
        self.completed_frames
    }

    pub fn skipped_frames(&self) -> u64 {
        self.skipped_frames
    }

    pub fn ready_stalls(&self) -> u64 {
        self.ready_stalls
    }

    /// 1-based number of the frame currently being processed.
    pub fn current_frame(&self) -> u64 {
        self.completed_frames + 1
    }

    pub(crate) fn record_written(&mut self) {
        self.completed_frames += 1;
        log::debug!("encoded {} frames", self.completed_frames);
    }

    pub(crate) fn record_skipped(&mut self) {
        self.skipped_frames += 1;
    }

    pub(crate) fn record_stalls(&mut self, stalls: u64) {
        self.ready_stalls += stalls;
    }

    /// The reader stopped with `reader`; every writer was marked finished.
    pub(crate) fn record_drained(&mut self, reader: ReaderStatus, writer: WriterStatus) {
        self.reader = reader;
        self.writer = writer;
        self.drained = true;
    }

    /// The loop finished only after the drain ceiling had passed.
    pub(crate) fn record_overrun(&mut self) {
        self.drained = false;
    }

    pub(crate) fn into_summary(self, outputs: Vec<PathBuf>) -> RunSummary {
        RunSummary {
            completed_frames: self.completed_frames,
            skipped_frames: self.skipped_frames,
            ready_stalls: self.ready_stalls,
            reader: self.reader,
            writer: self.writer,
            drained: self.drained,
            outputs,
        }
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a run that reached the end of its inputs.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub completed_frames: u64,
    /// Frames dropped because a view was missing or unusable.
    pub skipped_frames: u64,
    pub ready_stalls: u64,
    pub reader: ReaderStatus,
    pub writer: WriterStatus,
    /// False when the loop outlived the drain ceiling under the lenient policy.
    pub drained: bool,
    pub outputs: Vec<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_only_moves_on_success() {
        let mut state = RunState::new();
        assert_eq!(state.current_frame(), 1);
        state.record_skipped();
        assert_eq!(state.completed_frames(), 0);
        state.record_written();
        state.record_written();
        assert_eq!(state.completed_frames(), 2);
        assert_eq!(state.current_frame(), 3);
        assert_eq!(state.skipped_frames(), 1);
    }

    #[test]
    fn summary_carries_the_writer_status() {
        let mut state = RunState::new();
        state.record_drained(ReaderStatus::Failed, WriterStatus::Failed);
        let summary = state.into_summary(Vec::new());
        assert!(summary.drained);
        assert_eq!(summary.reader, ReaderStatus::Failed);
        assert_eq!(summary.writer, WriterStatus::Failed);

        let mut state = RunState::new();
        state.record_drained(ReaderStatus::Completed, WriterStatus::Completed);
        state.record_overrun();
        assert!(!state.into_summary(Vec::new()).drained);
    }
}
