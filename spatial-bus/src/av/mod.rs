//! FFmpeg backend: MV-HEVC or single-view decode in, ProRes 422 HQ `.mov` out.
//!
//! Needs FFmpeg 7.1 or newer for multi-view decoding. FFmpeg has no MV-HEVC
//! encoder, so merging is refused by the capability probe.

mod convert;
mod input;
mod output;
mod scaler;
mod stream;

use std::path::Path;

pub use input::FfmpegSource;
pub use output::FfmpegSink;

use crate::backend::{Capabilities, MediaBackend};
use crate::error::{MediaError, Result};
use crate::sink::SinkConfig;

#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegBackend;

impl FfmpegBackend {
    pub fn new() -> Self {
        Self
    }
}

impl MediaBackend for FfmpegBackend {
    type Source = FfmpegSource;
    type Sink = FfmpegSink;

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            multiview_decode: input::supports_multiview_decode(),
            multiview_encode: false,
        }
    }

    fn open_source(&self, path: &Path) -> Result<FfmpegSource> {
        FfmpegSource::open(path)
    }

    fn open_sink(&self, path: &Path, config: &SinkConfig) -> Result<FfmpegSink> {
        if config.is_multiview() {
            return Err(MediaError::create_output(
                path,
                "multi-view encoding is not available with FFmpeg",
            ));
        }
        FfmpegSink::open(path, config)
            .map_err(|e| MediaError::create_output(path, format!("{:#}", e)))
    }
}
