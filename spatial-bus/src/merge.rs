//! Multiplex two single-view files into one two-view track.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::{self, MediaBackend};
use crate::error::{MediaError, Result};
use crate::frame::{Eye, Frame, FrameContent, TaggedBuffer};
use crate::metadata::{ColorOverrides, ColorProperties, DisparityAdjustment, FieldOfView, Quality};
use crate::options::RunOptions;
use crate::output::{self, OutputGuard, OverwritePrompt};
use crate::ready::wait_until_ready;
use crate::sink::{FrameSink, MultiViewConfig, PrimaryEye, SinkConfig};
use crate::source::{self, FrameSource, ReaderStatus};
use crate::state::{RunState, RunSummary};
use crate::wait;

#[derive(Debug, Clone)]
pub struct MergeRequest {
    pub left: PathBuf,
    pub right: PathBuf,
    pub output: PathBuf,
    /// 0 to 100
    pub quality_percent: i32,
    pub left_is_primary: bool,
    pub right_is_primary: bool,
    /// Degrees
    pub horizontal_field_of_view: f32,
    pub horizontal_disparity_adjustment: Option<i32>,
    pub color: ColorOverrides,
}

pub struct SpatialVideoMerger<B: MediaBackend> {
    backend: Arc<B>,
    options: RunOptions,
}

impl<B: MediaBackend> SpatialVideoMerger<B> {
    pub fn new(backend: Arc<B>, options: RunOptions) -> Self {
        Self { backend, options }
    }

    pub async fn run(
        &self,
        request: &MergeRequest,
        prompt: &mut dyn OverwritePrompt,
    ) -> Result<RunSummary> {
        let primary = PrimaryEye::from_flags(request.left_is_primary, request.right_is_primary)?;
        let quality = Quality::from_percent(request.quality_percent)?;
        let field_of_view = FieldOfView::from_degrees(request.horizontal_field_of_view)?;
        let disparity_adjustment = request
            .horizontal_disparity_adjustment
            .map(DisparityAdjustment::new)
            .transpose()?;
        if !self.backend.capabilities().multiview_encode {
            log::error!("multi-view encoding is not available");
            return Err(MediaError::invalid("this system does not support MV-HEVC encoding"));
        }

        let mut left = backend::discover(&self.backend, &request.left, &self.options).await?;
        let mut right = backend::discover(&self.backend, &request.right, &self.options).await?;
        backend::start_reading(&mut left)?;
        backend::start_reading(&mut right)?;

        let dimensions = left.metadata().require_dimensions(&request.left)?;
        let right_dimensions = right.metadata().require_dimensions(&request.right)?;
        if dimensions != right_dimensions {
            log::error!("left is {} but right is {}", dimensions, right_dimensions);
            return Err(MediaError::invalid(format!(
                "left and right dimensions do not match: {} vs {}",
                dimensions, right_dimensions
            )));
        }

        let hero = match primary {
            PrimaryEye::Left => left.metadata(),
            PrimaryEye::Right => right.metadata(),
        };
        let color = ColorProperties::resolve(&hero.extensions, &request.color);
        log::info!(
            "colour primaries {}, transfer function {}, matrix {}",
            color.color_primaries,
            color.transfer_function,
            color.color_matrix
        );
        let config = SinkConfig::multi_view(
            dimensions,
            left.metadata().time_base,
            left.metadata().frame_rate,
            MultiViewConfig {
                quality,
                color,
                field_of_view,
                disparity_adjustment,
                primary,
            },
        );

        output::prepare_output(&request.output, prompt)?;
        let mut guard = OutputGuard::new(self.options.remove_partial_output);
        let sink = self.backend.open_sink(&request.output, &config)?;
        guard.track(&request.output);
        log::info!(
            "merging {} and {} ({}, {} primary) into {}",
            request.left.display(),
            request.right.display(),
            dimensions,
            primary.eye(),
            request.output.display()
        );

        let poll = self.options.ready_poll_interval;
        let worker =
            tokio::task::spawn_blocking(move || merge_loop(left, right, sink, primary, poll));
        let outputs = vec![request.output.clone()];
        let (joined, within_ceiling) = wait::drain(&self.options, worker).await?;
        let (mut state, sink) = wait::joined(joined, "merge")
            .map_err(|e| MediaError::read_sample(&request.left, format!("{:#}", e)))??;

        wait::finalize(&request.output, &self.options, sink.finish()).await?;
        guard.disarm();
        if !within_ceiling {
            state.record_overrun();
        }

        log::info!(
            "merged {} frames into {}",
            state.completed_frames(),
            request.output.display()
        );
        Ok(state.into_summary(outputs))
    }
}

/// The single-view picture of one side, tagged for its place in the output.
fn tag_view(frame: Frame, eye: Eye, primary: PrimaryEye) -> Option<TaggedBuffer> {
    match frame.content {
        FrameContent::Image(buffer) => {
            Some(TaggedBuffer::stereo(eye, primary.layer_index(eye), buffer))
        }
        FrameContent::Tagged(_) => None,
    }
}

fn merge_loop<S: FrameSource, K: FrameSink>(
    mut left: S,
    mut right: S,
    mut sink: K,
    primary: PrimaryEye,
    poll: Duration,
) -> Result<(RunState, K)> {
    let mut state = RunState::new();
    loop {
        let (Some(l), Some(r)) = (source::pull(&mut left), source::pull(&mut right)) else {
            log::info!(
                "finished reading after {} frames, left reader {}, right reader {}",
                state.completed_frames(),
                left.status(),
                right.status()
            );
            sink.mark_finished();
            let stopped = if left.status() != ReaderStatus::Reading {
                left.status()
            } else {
                right.status()
            };
            state.record_drained(stopped, sink.status());
            return Ok((state, sink));
        };

        if l.pts != r.pts {
            log::error!(
                "timestamps differ on frame {}: left {} right {}",
                state.current_frame(),
                l.pts,
                r.pts
            );
            return Err(MediaError::InputTimestampMismatch {
                frame: state.current_frame(),
                left: l.pts,
                right: r.pts,
            });
        }

        let pts = l.pts;
        let (Some(l), Some(r)) = (
            tag_view(l, Eye::Left, primary),
            tag_view(r, Eye::Right, primary),
        ) else {
            state.record_skipped();
            log::warn!(
                "sample at {} is not single-view on both sides, skipping ({} skipped so far)",
                pts,
                state.skipped_frames()
            );
            continue;
        };
        let buffers = vec![l, r];
        state.record_stalls(wait_until_ready(&sink, poll));
        if !sink.append(buffers, pts) {
            log::error!(
                "append to {} failed on frame {}",
                sink.path().display(),
                state.current_frame()
            );
            return Err(MediaError::AppendTaggedBufferError {
                frame: state.current_frame(),
            });
        }
        state.record_written();
    }
}

#[cfg(test)]
#[path = "merge_test.rs"]
mod merge_test;
