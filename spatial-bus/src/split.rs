//! Demultiplex a two-view track into one single-view file per eye.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::backend::{self, MediaBackend};
use crate::error::{MediaError, Result};
use crate::frame::{Eye, Frame, TaggedBuffer};
use crate::options::RunOptions;
use crate::output::{self, OutputGuard, OverwritePrompt};
use crate::ready::wait_until_ready;
use crate::sink::{FrameSink, SinkConfig, WriterStatus};
use crate::source::{self, FrameSource, ReaderStatus};
use crate::state::{RunState, RunSummary};
use crate::wait;

#[derive(Debug, Clone)]
pub struct SplitRequest {
    pub input: PathBuf,
    /// Directory for `<basename>_LEFT.mov` and `<basename>_RIGHT.mov`.
    /// Defaults to the current directory.
    pub output_dir: Option<PathBuf>,
}

pub struct SpatialVideoSplitter<B: MediaBackend> {
    backend: Arc<B>,
    options: RunOptions,
}

impl<B: MediaBackend> SpatialVideoSplitter<B> {
    pub fn new(backend: Arc<B>, options: RunOptions) -> Self {
        Self { backend, options }
    }

    pub async fn run(
        &self,
        request: &SplitRequest,
        prompt: &mut dyn OverwritePrompt,
    ) -> Result<RunSummary> {
        if !self.backend.capabilities().multiview_decode {
            log::error!("multi-view decoding is not available");
            return Err(MediaError::invalid("this system cannot decode multi-view video"));
        }
        let (left_path, right_path) =
            output::split_output_paths(&request.input, request.output_dir.as_deref())?;

        let mut source = backend::discover(&self.backend, &request.input, &self.options).await?;
        let metadata = source.metadata();
        let dimensions = metadata.require_dimensions(&request.input)?;
        let config = SinkConfig::single_view(dimensions, metadata.time_base, metadata.frame_rate);

        output::prepare_output(&left_path, prompt)?;
        output::prepare_output(&right_path, prompt)?;
        backend::start_reading(&mut source)?;

        let mut guard = OutputGuard::new(self.options.remove_partial_output);
        let left = self.backend.open_sink(&left_path, &config)?;
        guard.track(&left_path);
        let right = self.backend.open_sink(&right_path, &config)?;
        guard.track(&right_path);
        log::info!(
            "splitting {} ({}) into {} and {}",
            request.input.display(),
            dimensions,
            left_path.display(),
            right_path.display()
        );

        let poll = self.options.ready_poll_interval;
        let worker = tokio::task::spawn_blocking(move || split_loop(source, left, right, poll));
        let outputs = vec![left_path.clone(), right_path.clone()];
        let (joined, within_ceiling) = wait::drain(&self.options, worker).await?;
        let (mut state, left, right) = wait::joined(joined, "split")
            .map_err(|e| MediaError::read_sample(&request.input, format!("{:#}", e)))??;

        let (l, r) = futures::join!(
            wait::finalize(&left_path, &self.options, left.finish()),
            wait::finalize(&right_path, &self.options, right.finish()),
        );
        l?;
        r?;
        guard.disarm();
        if !within_ceiling {
            state.record_overrun();
        }

        log::info!(
            "split {} frames from {}",
            state.completed_frames(),
            request.input.display()
        );
        Ok(state.into_summary(outputs))
    }
}

fn eye_of(frame: &Frame, eye: Eye) -> Option<TaggedBuffer> {
    frame
        .tagged_buffers()?
        .iter()
        .find(|b| b.eye() == Some(eye))
        .cloned()
}

fn split_loop<S: FrameSource, K: FrameSink>(
    mut source: S,
    mut left: K,
    mut right: K,
    poll: Duration,
) -> Result<(RunState, K, K)> {
    let mut state = RunState::new();
    loop {
        let Some(frame) = source::pull(&mut source) else {
            finish_reading(source.path(), source.status());
            left.mark_finished();
            right.mark_finished();
            let writer = if left.status() != WriterStatus::Completed {
                left.status()
            } else {
                right.status()
            };
            state.record_drained(source.status(), writer);
            return Ok((state, left, right));
        };

        let (Some(l), Some(r)) = (eye_of(&frame, Eye::Left), eye_of(&frame, Eye::Right)) else {
            state.record_skipped();
            log::warn!(
                "sample at {} is missing a stereo view, skipping ({} skipped so far)",
                frame.pts,
                state.skipped_frames()
            );
            continue;
        };

        for (sink, buffer) in [(&mut left, l), (&mut right, r)] {
            state.record_stalls(wait_until_ready(&*sink, poll));
            if !sink.append(vec![buffer], frame.pts) {
                log::error!(
                    "append to {} failed on frame {}",
                    sink.path().display(),
                    state.current_frame()
                );
                return Err(MediaError::AppendTaggedBufferError {
                    frame: state.current_frame(),
                });
            }
        }
        state.record_written();
    }
}

fn finish_reading(path: &Path, status: ReaderStatus) {
    match status {
        ReaderStatus::Completed => log::info!("finished reading all of {}", path.display()),
        status => log::warn!(
            "advancing due to null sample from {}, reader status is {}",
            path.display(),
            status
        ),
    }
}

#[cfg(test)]
#[path = "split_test.rs"]
mod split_test;
