use std::fmt::{Display, Formatter};
use std::path::Path;

use futures::future::BoxFuture;

use crate::error::{MediaError, Result};
use crate::frame::{Eye, Rational, TaggedBuffer, Timestamp};
use crate::metadata::{ColorProperties, Dimensions, DisparityAdjustment, FieldOfView, Quality};
use crate::ready::ReadySignal;

/// Resolves once the sink has flushed everything to durable storage.
pub type FinishHandle = BoxFuture<'static, anyhow::Result<()>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterStatus {
    Idle,
    Writing,
    Completed,
    Failed,
}

impl Display for WriterStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WriterStatus::Idle => "idle",
            WriterStatus::Writing => "writing",
            WriterStatus::Completed => "completed",
            WriterStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// The hero eye of a multiplexed output. Decides layer and view ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimaryEye {
    Left,
    Right,
}

impl PrimaryEye {
    /// Exactly one of the two flags must be set.
    pub fn from_flags(left_is_primary: bool, right_is_primary: bool) -> Result<Self> {
        match (left_is_primary, right_is_primary) {
            (true, false) => Ok(PrimaryEye::Left),
            (false, true) => Ok(PrimaryEye::Right),
            (true, true) => Err(MediaError::invalid(
                "both left and right eye are marked primary, choose one",
            )),
            (false, false) => Err(MediaError::invalid(
                "neither left nor right eye is marked primary, choose one",
            )),
        }
    }

    pub fn eye(self) -> Eye {
        match self {
            PrimaryEye::Left => Eye::Left,
            PrimaryEye::Right => Eye::Right,
        }
    }

    /// Video layer carrying `eye`. The primary eye always sits on layer 0.
    pub fn layer_index(self, eye: Eye) -> i64 {
        if eye == self.eye() { 0 } else { 1 }
    }

    /// View IDs assigned to `[left, right]`.
    pub fn left_and_right_view_ids(self) -> [i64; 2] {
        [self.layer_index(Eye::Left), self.layer_index(Eye::Right)]
    }

    /// Eyes in layer order.
    pub fn view_order(self) -> [Eye; 2] {
        let primary = self.eye();
        [primary, primary.other()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SingleViewCodec {
    /// Intra-frame 4:2:2 10-bit mezzanine, suited to per-eye editing.
    ProRes422Hq,
}

/// Encoder settings for a two-view output.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiViewConfig {
    pub quality: Quality,
    pub color: ColorProperties,
    pub field_of_view: FieldOfView,
    pub disparity_adjustment: Option<DisparityAdjustment>,
    pub primary: PrimaryEye,
}

impl MultiViewConfig {
    pub fn left_and_right_view_ids(&self) -> [i64; 2] {
        self.primary.left_and_right_view_ids()
    }

    pub fn hero_eye(&self) -> Eye {
        self.primary.eye()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CodecConfig {
    SingleView(SingleViewCodec),
    MultiView(MultiViewConfig),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SinkConfig {
    pub dimensions: Dimensions,
    pub time_base: Rational,
    pub frame_rate: Rational,
    pub codec: CodecConfig,
}

impl SinkConfig {
    pub fn single_view(dimensions: Dimensions, time_base: Rational, frame_rate: Rational) -> Self {
        Self {
            dimensions,
            time_base,
            frame_rate,
            codec: CodecConfig::SingleView(SingleViewCodec::ProRes422Hq),
        }
    }

    pub fn multi_view(
        dimensions: Dimensions,
        time_base: Rational,
        frame_rate: Rational,
        config: MultiViewConfig,
    ) -> Self {
        Self {
            dimensions,
            time_base,
            frame_rate,
            codec: CodecConfig::MultiView(config),
        }
    }

    pub fn is_multiview(&self) -> bool {
        matches!(self.codec, CodecConfig::MultiView(_))
    }
}

/// Encoder plus muxer for one output track.
///
/// Producers must see `ready_for_write() == true` immediately before every
/// `append`. `append` returning false is a codec failure and must not be
/// retried.
pub trait FrameSink: Send {
    fn path(&self) -> &Path;

    fn status(&self) -> WriterStatus;

    fn ready_for_write(&self) -> bool;

    /// Signal fired when readiness may have flipped back to true.
    /// Sinks without one are polled.
    fn ready_signal(&self) -> Option<ReadySignal> {
        None
    }

    /// Appends one sample made of `buffers` at `pts`.
    fn append(&mut self, buffers: Vec<TaggedBuffer>, pts: Timestamp) -> bool;

    /// No more samples will follow.
    fn mark_finished(&mut self);

    /// Starts the final flush. The returned future resolves when it is on disk.
    fn finish(self) -> FinishHandle
    where
        Self: Sized;
}
