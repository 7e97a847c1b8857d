//! Pull one eye out of a two-view track, driven by the sink's readiness.
//!
//! A dedicated `writer` thread plays the part of the sink's serial queue: each
//! time the sink turns ready it calls back into the producer, which keeps
//! appending until the sink pushes back or the source runs dry.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;

use crate::backend::{self, MediaBackend};
use crate::error::{MediaError, Result};
use crate::frame::{Eye, Tag, TaggedBuffer};
use crate::options::RunOptions;
use crate::output::{self, OutputGuard, OverwritePrompt};
use crate::ready::wait_until_ready;
use crate::sink::{FrameSink, SinkConfig};
use crate::source::{self, FrameSource, ReaderStatus};
use crate::state::{RunState, RunSummary};
use crate::wait;

#[derive(Debug, Clone)]
pub struct ExtractRequest {
    pub input: PathBuf,
    pub eye: Eye,
    /// Defaults to `output_<eye>.mov` in the current directory.
    pub output: Option<PathBuf>,
}

pub struct SingleEyeExtractor<B: MediaBackend> {
    backend: Arc<B>,
    options: RunOptions,
}

impl<B: MediaBackend> SingleEyeExtractor<B> {
    pub fn new(backend: Arc<B>, options: RunOptions) -> Self {
        Self { backend, options }
    }

    pub async fn run(
        &self,
        request: &ExtractRequest,
        prompt: &mut dyn OverwritePrompt,
    ) -> Result<RunSummary> {
        if !self.backend.capabilities().multiview_decode {
            log::error!("multi-view decoding is not available");
            return Err(MediaError::invalid("this system cannot decode multi-view video"));
        }
        let output_path = match &request.output {
            Some(path) => path.clone(),
            None => output::extract_output_path(request.eye)?,
        };

        let mut source = backend::discover(&self.backend, &request.input, &self.options).await?;
        let metadata = source.metadata();
        let dimensions = metadata.require_dimensions(&request.input)?;
        let config = SinkConfig::single_view(dimensions, metadata.time_base, metadata.frame_rate);

        output::prepare_output(&output_path, prompt)?;
        backend::start_reading(&mut source)?;
        let mut guard = OutputGuard::new(self.options.remove_partial_output);
        let sink = self.backend.open_sink(&output_path, &config)?;
        guard.track(&output_path);
        log::info!(
            "extracting {} eye of {} into {}",
            request.eye,
            request.input.display(),
            output_path.display()
        );

        let producer = EyeProducer {
            source,
            eye: request.eye,
            state: RunState::new(),
        };
        let poll = self.options.ready_poll_interval;
        let (done_tx, done_rx) = oneshot::channel();
        let writer = std::thread::Builder::new()
            .name("writer".to_string())
            .spawn(move || request_media_data_when_ready(sink, producer, poll, done_tx))
            .map_err(|e| MediaError::read_sample(&request.input, e))?;

        let outputs = vec![output_path.clone()];
        let (finished, within_ceiling) = wait::drain(&self.options, done_rx).await?;
        if let Ok(Err(panic)) = tokio::task::spawn_blocking(move || writer.join()).await {
            std::panic::resume_unwind(panic);
        }
        let (mut state, sink) = finished.map_err(|_| {
            MediaError::read_sample(&request.input, "writer stopped without reporting")
        })??;

        wait::finalize(&output_path, &self.options, sink.finish()).await?;
        guard.disarm();
        if !within_ceiling {
            state.record_overrun();
        }

        log::info!(
            "extracted {} frames into {}",
            state.completed_frames(),
            output_path.display()
        );
        Ok(state.into_summary(outputs))
    }
}

enum Progress {
    /// The sink pushed back; call again once it is ready.
    Pending,
    Done,
}

struct EyeProducer<S> {
    source: S,
    eye: Eye,
    state: RunState,
}

impl<S: FrameSource> EyeProducer<S> {
    fn produce<K: FrameSink>(&mut self, sink: &mut K) -> Result<Progress> {
        while sink.ready_for_write() {
            let Some(frame) = source::pull(&mut self.source) else {
                match self.source.status() {
                    ReaderStatus::Completed => {
                        log::info!("finished reading all of {}", self.source.path().display())
                    }
                    status => log::warn!(
                        "advancing due to null sample from {}, reader status is {}",
                        self.source.path().display(),
                        status
                    ),
                }
                sink.mark_finished();
                self.state.record_drained(self.source.status(), sink.status());
                return Ok(Progress::Done);
            };

            let Some(buffer) = frame.eye_buffer(self.eye) else {
                self.state.record_skipped();
                log::warn!("sample at {} has no {} view, skipping", frame.pts, self.eye);
                continue;
            };
            let tagged = TaggedBuffer::new(vec![Tag::StereoView(self.eye)], buffer.clone());
            if !sink.append(vec![tagged], frame.pts) {
                log::error!(
                    "append to {} failed on frame {}",
                    sink.path().display(),
                    self.state.current_frame()
                );
                return Err(MediaError::AppendTaggedBufferError {
                    frame: self.state.current_frame(),
                });
            }
            self.state.record_written();
        }
        Ok(Progress::Pending)
    }
}

/// Body of the writer thread: hands the sink to `producer` whenever it is
/// ready and reports the outcome through `done`.
fn request_media_data_when_ready<S: FrameSource, K: FrameSink>(
    mut sink: K,
    mut producer: EyeProducer<S>,
    poll: Duration,
    done: oneshot::Sender<Result<(RunState, K)>>,
) {
    let outcome = loop {
        producer.state.record_stalls(wait_until_ready(&sink, poll));
        match producer.produce(&mut sink) {
            Ok(Progress::Pending) => continue,
            Ok(Progress::Done) => break Ok(()),
            Err(e) => break Err(e),
        }
    };
    if done.send(outcome.map(|()| (producer.state, sink))).is_err() {
        log::warn!("extraction finished after the caller stopped waiting");
    }
}

#[cfg(test)]
#[path = "extract_test.rs"]
mod extract_test;
