use ffmpeg_next::{codec::Parameters, format::stream};

use crate::frame::Rational;
use crate::metadata::{Dimensions, TrackMetadata};

unsafe impl Send for AvStream {}
unsafe impl Sync for AvStream {}

/// Snapshot of one demuxed stream, detached from its format context.
pub struct AvStream {
    index: usize,
    parameters: Parameters,
    time_base: ffmpeg_next::Rational,
    rate: ffmpeg_next::Rational,
}

impl AvStream {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn time_base(&self) -> ffmpeg_next::Rational {
        self.time_base
    }

    pub fn is_video(&self) -> bool {
        self.parameters.medium() == ffmpeg_next::media::Type::Video
    }

    pub fn width(&self) -> u32 {
        unsafe {
            let ptr = self.parameters.as_ptr() as *const ffmpeg_next::ffi::AVCodecParameters;
            (*ptr).width.max(0) as u32
        }
    }

    pub fn height(&self) -> u32 {
        unsafe {
            let ptr = self.parameters.as_ptr() as *const ffmpeg_next::ffi::AVCodecParameters;
            (*ptr).height.max(0) as u32
        }
    }

    pub fn metadata(&self) -> TrackMetadata {
        let codec = self.parameters.id().name();
        let mut meta = TrackMetadata::new(codec, Dimensions::new(self.width(), self.height()))
            .with_timing(to_rational(self.time_base), to_rational(self.rate));
        if meta.dimensions.is_some_and(|d| d.is_empty()) {
            meta.dimensions = None;
        }
        meta
    }
}

pub fn to_rational(r: ffmpeg_next::Rational) -> Rational {
    Rational::new(r.numerator(), r.denominator())
}

pub fn to_av_rational(r: Rational) -> ffmpeg_next::Rational {
    ffmpeg_next::Rational::new(r.numerator(), r.denominator())
}

impl From<stream::Stream<'_>> for AvStream {
    fn from(stream: stream::Stream<'_>) -> Self {
        Self {
            index: stream.index(),
            parameters: stream.parameters(),
            time_base: stream.time_base(),
            rate: stream.avg_frame_rate(),
        }
    }
}
