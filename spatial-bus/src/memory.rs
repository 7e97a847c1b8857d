//! In-memory backend: scripted tracks in, recorded samples out.
//!
//! Sinks run a background "encoder" thread fed through a bounded queue, so
//! readiness genuinely flips while the producer runs ahead. Finalized outputs
//! are registered as new tracks, which lets split output feed a merge.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{Receiver, SyncSender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use bytes::Bytes;

use crate::backend::{Capabilities, MediaBackend};
use crate::error::{MediaError, Result};
use crate::frame::{
    Eye, Frame, FrameContent, PixelBuffer, PixelFormat, Rational, TaggedBuffer, Timestamp,
};
use crate::metadata::{Dimensions, FormatExtensions, TrackMetadata};
use crate::ready::ReadySignal;
use crate::sink::{CodecConfig, FinishHandle, FrameSink, SinkConfig, WriterStatus};
use crate::source::{FrameSource, ReaderStatus};

/// Ticks per frame at the default 1/600 time base (30 fps).
pub const TICKS_PER_FRAME: i64 = 20;

/// Plane filled with a byte derived from `eye` and `index`, so routing can be checked.
pub fn marker_buffer(dimensions: Dimensions, eye: Eye, index: usize) -> PixelBuffer {
    let marker = match eye {
        Eye::Left => 0x10u8,
        Eye::Right => 0x80u8,
    }
    .wrapping_add(index as u8 & 0x3f);
    let len = (dimensions.width * dimensions.height) as usize;
    PixelBuffer::new(dimensions.width, dimensions.height, PixelFormat::Yuv420p)
        .with_plane(Bytes::from(vec![marker; len]), dimensions.width as usize)
}

/// Timestamp of frame `index` at 30 fps in a 1/600 time base.
pub fn frame_pts(index: usize) -> Timestamp {
    Timestamp::new(index as i64 * TICKS_PER_FRAME, Rational::new(1, 600))
}

#[derive(Debug, Clone)]
pub struct MemoryTrack {
    pub metadata: TrackMetadata,
    pub frames: Vec<Frame>,
    /// Reader fails after the last frame instead of completing.
    pub truncated: bool,
    pub fail_start: bool,
}

impl MemoryTrack {
    pub fn new(metadata: TrackMetadata, frames: Vec<Frame>) -> Self {
        Self {
            metadata,
            frames,
            truncated: false,
            fail_start: false,
        }
    }

    /// Multiplexed track: left on layer 0, right on layer 1.
    pub fn stereo(dimensions: Dimensions, count: usize) -> Self {
        let frames = (0..count)
            .map(|i| {
                Frame::tagged(
                    frame_pts(i),
                    vec![
                        TaggedBuffer::stereo(Eye::Left, 0, marker_buffer(dimensions, Eye::Left, i)),
                        TaggedBuffer::stereo(
                            Eye::Right,
                            1,
                            marker_buffer(dimensions, Eye::Right, i),
                        ),
                    ],
                )
            })
            .collect();
        Self::new(
            TrackMetadata::new("mvhevc", dimensions)
                .multiview(true)
                .with_timing(Rational::new(1, 600), Rational::new(30, 1)),
            frames,
        )
    }

    /// Single-view track for one eye.
    pub fn mono(dimensions: Dimensions, count: usize, eye: Eye) -> Self {
        let frames = (0..count)
            .map(|i| Frame::image(frame_pts(i), marker_buffer(dimensions, eye, i)))
            .collect();
        Self::new(
            TrackMetadata::new("prores", dimensions)
                .with_timing(Rational::new(1, 600), Rational::new(30, 1)),
            frames,
        )
    }

    pub fn with_extensions(mut self, extensions: FormatExtensions) -> Self {
        self.metadata.extensions = extensions;
        self
    }

    pub fn with_pts(mut self, index: usize, pts: Timestamp) -> Self {
        if let Some(frame) = self.frames.get_mut(index) {
            frame.pts = pts;
        }
        self
    }

    /// Removes `eye` from multiplexed frame `index`.
    pub fn without_eye(mut self, index: usize, eye: Eye) -> Self {
        if let Some(Frame {
            content: FrameContent::Tagged(buffers),
            ..
        }) = self.frames.get_mut(index)
        {
            buffers.retain(|b| b.eye() != Some(eye));
        }
        self
    }

    pub fn truncated(mut self) -> Self {
        self.truncated = true;
        self
    }

    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }
}

/// Knobs for every sink opened after they are set.
#[derive(Debug, Clone)]
pub struct SinkBehavior {
    /// Samples the encoder may hold before the sink stops being ready.
    pub queue_depth: usize,
    /// Time the encoder spends per sample.
    pub encode_delay: Duration,
    /// 1-based append that reports a codec failure.
    pub fail_append_at: Option<u64>,
    pub finish_delay: Duration,
}

impl Default for SinkBehavior {
    fn default() -> Self {
        Self {
            queue_depth: 2,
            encode_delay: Duration::ZERO,
            fail_append_at: None,
            finish_delay: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordedSample {
    pub pts: Timestamp,
    pub buffers: Vec<TaggedBuffer>,
}

/// Everything a sink saw, readable after the run.
#[derive(Debug, Clone)]
pub struct Recording {
    pub path: PathBuf,
    pub config: SinkConfig,
    /// Encoded samples in encode order.
    pub samples: Vec<RecordedSample>,
    pub append_calls: u64,
    pub not_ready_polls: u64,
    /// Appends made while the last readiness poll said no.
    pub backpressure_violations: u64,
    pub marked_finished: bool,
    pub finalized: bool,
}

struct Registry {
    tracks: HashMap<PathBuf, MemoryTrack>,
    recordings: HashMap<PathBuf, Arc<Mutex<Recording>>>,
    opened_sources: Vec<PathBuf>,
    capabilities: Capabilities,
    behavior: SinkBehavior,
    discovery_delay: Duration,
}

#[derive(Clone)]
pub struct MemoryBackend {
    inner: Arc<Mutex<Registry>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Registry {
                tracks: HashMap::new(),
                recordings: HashMap::new(),
                opened_sources: Vec::new(),
                capabilities: Capabilities {
                    multiview_decode: true,
                    multiview_encode: true,
                },
                behavior: SinkBehavior::default(),
                discovery_delay: Duration::ZERO,
            })),
        }
    }

    pub fn insert_track(&self, path: impl Into<PathBuf>, track: MemoryTrack) {
        lock(&self.inner).tracks.insert(path.into(), track);
    }

    pub fn set_capabilities(&self, capabilities: Capabilities) {
        lock(&self.inner).capabilities = capabilities;
    }

    pub fn set_sink_behavior(&self, behavior: SinkBehavior) {
        lock(&self.inner).behavior = behavior;
    }

    pub fn set_discovery_delay(&self, delay: Duration) {
        lock(&self.inner).discovery_delay = delay;
    }

    pub fn track(&self, path: &Path) -> Option<MemoryTrack> {
        lock(&self.inner).tracks.get(path).cloned()
    }

    pub fn recording(&self, path: &Path) -> Option<Recording> {
        let registry = lock(&self.inner);
        registry.recordings.get(path).map(|r| lock(r).clone())
    }

    pub fn opened_sources(&self) -> Vec<PathBuf> {
        lock(&self.inner).opened_sources.clone()
    }

    pub fn opened_sinks(&self) -> Vec<PathBuf> {
        lock(&self.inner).recordings.keys().cloned().collect()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaBackend for MemoryBackend {
    type Source = MemorySource;
    type Sink = MemorySink;

    fn capabilities(&self) -> Capabilities {
        lock(&self.inner).capabilities
    }

    fn open_source(&self, path: &Path) -> Result<MemorySource> {
        let delay = lock(&self.inner).discovery_delay;
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        let mut registry = lock(&self.inner);
        registry.opened_sources.push(path.to_path_buf());
        let track = registry
            .tracks
            .get(path)
            .cloned()
            .ok_or_else(|| MediaError::NoVideoTracksFound(path.to_path_buf()))?;
        Ok(MemorySource {
            path: path.to_path_buf(),
            track,
            position: 0,
            status: ReaderStatus::Idle,
        })
    }

    fn open_sink(&self, path: &Path, config: &SinkConfig) -> Result<MemorySink> {
        std::fs::File::create(path).map_err(|e| MediaError::create_output(path, e))?;
        let behavior = lock(&self.inner).behavior.clone();
        let record = Arc::new(Mutex::new(Recording {
            path: path.to_path_buf(),
            config: config.clone(),
            samples: Vec::new(),
            append_calls: 0,
            not_ready_polls: 0,
            backpressure_violations: 0,
            marked_finished: false,
            finalized: false,
        }));
        lock(&self.inner)
            .recordings
            .insert(path.to_path_buf(), Arc::clone(&record));

        let depth = behavior.queue_depth.max(1);
        let (tx, rx) = std::sync::mpsc::sync_channel(depth);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let signal = ReadySignal::new();
        let encoder = {
            let record = Arc::clone(&record);
            let in_flight = Arc::clone(&in_flight);
            let signal = signal.clone();
            let delay = behavior.encode_delay;
            std::thread::Builder::new()
                .name(format!("encoder:{}", path.display()))
                .spawn(move || encoder_loop(rx, record, in_flight, signal, delay))
                .map_err(|e| MediaError::create_output(path, e))?
        };

        Ok(MemorySink {
            path: path.to_path_buf(),
            queue: Some(tx),
            depth,
            in_flight,
            last_ready: AtomicBool::new(false),
            signal,
            record,
            appends: 0,
            behavior,
            encoder: Some(encoder),
            registry: Arc::clone(&self.inner),
            status: WriterStatus::Writing,
        })
    }
}

fn encoder_loop(
    rx: Receiver<RecordedSample>,
    record: Arc<Mutex<Recording>>,
    in_flight: Arc<AtomicUsize>,
    signal: ReadySignal,
    delay: Duration,
) {
    while let Ok(sample) = rx.recv() {
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        lock(&record).samples.push(sample);
        in_flight.fetch_sub(1, Ordering::SeqCst);
        signal.notify();
    }
}

pub struct MemorySource {
    path: PathBuf,
    track: MemoryTrack,
    position: usize,
    status: ReaderStatus,
}

impl FrameSource for MemorySource {
    fn path(&self) -> &Path {
        &self.path
    }

    fn metadata(&self) -> &TrackMetadata {
        &self.track.metadata
    }

    fn status(&self) -> ReaderStatus {
        self.status
    }

    fn start_reading(&mut self) -> bool {
        if self.track.fail_start {
            self.status = ReaderStatus::Failed;
            return false;
        }
        self.status = ReaderStatus::Reading;
        true
    }

    fn next_frame(&mut self) -> anyhow::Result<Option<Frame>> {
        if self.status != ReaderStatus::Reading {
            return Ok(None);
        }
        if let Some(frame) = self.track.frames.get(self.position) {
            self.position += 1;
            return Ok(Some(frame.clone()));
        }
        if self.track.truncated {
            self.status = ReaderStatus::Failed;
            anyhow::bail!("sample data truncated after {} frames", self.position);
        }
        self.status = ReaderStatus::Completed;
        Ok(None)
    }
}

pub struct MemorySink {
    path: PathBuf,
    queue: Option<SyncSender<RecordedSample>>,
    depth: usize,
    in_flight: Arc<AtomicUsize>,
    last_ready: AtomicBool,
    signal: ReadySignal,
    record: Arc<Mutex<Recording>>,
    appends: u64,
    behavior: SinkBehavior,
    encoder: Option<JoinHandle<()>>,
    registry: Arc<Mutex<Registry>>,
    status: WriterStatus,
}

impl FrameSink for MemorySink {
    fn path(&self) -> &Path {
        &self.path
    }

    fn status(&self) -> WriterStatus {
        self.status
    }

    fn ready_for_write(&self) -> bool {
        let ready = self.queue.is_some() && self.in_flight.load(Ordering::SeqCst) < self.depth;
        self.last_ready.store(ready, Ordering::SeqCst);
        if !ready {
            lock(&self.record).not_ready_polls += 1;
        }
        ready
    }

    fn ready_signal(&self) -> Option<ReadySignal> {
        Some(self.signal.clone())
    }

    fn append(&mut self, buffers: Vec<TaggedBuffer>, pts: Timestamp) -> bool {
        self.appends += 1;
        {
            let mut record = lock(&self.record);
            record.append_calls += 1;
            if !self.last_ready.swap(false, Ordering::SeqCst) {
                record.backpressure_violations += 1;
            }
        }
        if self.behavior.fail_append_at == Some(self.appends) {
            self.status = WriterStatus::Failed;
            return false;
        }
        let Some(queue) = &self.queue else {
            return false;
        };
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        if queue.send(RecordedSample { pts, buffers }).is_err() {
            self.status = WriterStatus::Failed;
            return false;
        }
        true
    }

    fn mark_finished(&mut self) {
        self.queue = None;
        if self.status == WriterStatus::Writing {
            self.status = WriterStatus::Completed;
        }
        lock(&self.record).marked_finished = true;
    }

    fn finish(mut self) -> FinishHandle {
        self.queue = None;
        let encoder = self.encoder.take();
        let delay = self.behavior.finish_delay;
        Box::pin(async move {
            let flushed = tokio::task::spawn_blocking(move || {
                if let Some(encoder) = encoder {
                    let _ = encoder.join();
                }
                if !delay.is_zero() {
                    std::thread::sleep(delay);
                }
            });
            flushed.await?;

            let recording = {
                let mut record = lock(&self.record);
                record.finalized = true;
                record.clone()
            };
            std::fs::write(
                &self.path,
                format!("frames={}\n", recording.samples.len()),
            )?;
            lock(&self.registry)
                .tracks
                .insert(self.path.clone(), track_from_recording(&recording));
            Ok(())
        })
    }
}

/// What a decoder would read back from a finalized output.
fn track_from_recording(recording: &Recording) -> MemoryTrack {
    let config = &recording.config;
    let (metadata, frames) = match &config.codec {
        CodecConfig::SingleView(_) => (
            TrackMetadata::new("prores", config.dimensions),
            recording
                .samples
                .iter()
                .filter_map(|s| s.buffers.first().map(|b| Frame::image(s.pts, b.buffer.clone())))
                .collect(),
        ),
        CodecConfig::MultiView(mv) => (
            TrackMetadata::new("mvhevc", config.dimensions)
                .multiview(true)
                .with_extensions(FormatExtensions {
                    color_primaries: Some(mv.color.color_primaries.to_string()),
                    transfer_function: Some(mv.color.transfer_function.to_string()),
                    color_matrix: Some(mv.color.color_matrix.to_string()),
                }),
            recording
                .samples
                .iter()
                .map(|s| Frame::tagged(s.pts, s.buffers.clone()))
                .collect(),
        ),
    };
    MemoryTrack::new(metadata.with_timing(config.time_base, config.frame_rate), frames)
}
