use std::path::{Path, PathBuf};

use ffmpeg_next::Dictionary;
use ffmpeg_next::ffi;

use super::convert;
use super::stream::{AvStream, to_rational};
use crate::error::{MediaError, Result};
use crate::frame::{Eye, Frame, Rational, TaggedBuffer, Timestamp};
use crate::metadata::TrackMetadata;
use crate::source::{FrameSource, ReaderStatus};

/// Demuxer plus decoder for the first video stream of a file.
///
/// HEVC streams are opened with every view enabled, so MV-HEVC input yields
/// both eyes. Views of one access unit are paired by timestamp.
pub struct FfmpegSource {
    path: PathBuf,
    input: ffmpeg_next::format::context::Input,
    stream: AvStream,
    decoder: ffmpeg_next::decoder::Video,
    metadata: TrackMetadata,
    time_base: Rational,
    status: ReaderStatus,
    eof_sent: bool,
    pending: Option<(Timestamp, TaggedBuffer)>,
}

impl FfmpegSource {
    pub fn open(path: &Path) -> Result<Self> {
        let input = ffmpeg_next::format::input(path)
            .map_err(|e| MediaError::read_sample(path, format!("open input: {}", e)))?;
        let stream = input
            .streams()
            .map(AvStream::from)
            .find(AvStream::is_video)
            .ok_or_else(|| MediaError::NoVideoTracksFound(path.to_path_buf()))?;
        let decoder = open_decoder(&stream).map_err(|e| MediaError::CouldNotParse {
            path: path.to_path_buf(),
            reason: format!("{:#}", e),
        })?;

        let mut metadata = stream.metadata();
        metadata.extensions = convert::extensions(&decoder);
        Ok(Self {
            path: path.to_path_buf(),
            time_base: to_rational(stream.time_base()),
            input,
            stream,
            decoder,
            metadata,
            status: ReaderStatus::Idle,
            eof_sent: false,
            pending: None,
        })
    }

    fn read_packet(&mut self) -> Option<ffmpeg_next::Packet> {
        let index = self.stream.index();
        for (stream, packet) in self.input.packets() {
            if stream.index() == index {
                return Some(packet);
            }
        }
        None
    }

    fn decode_next(&mut self) -> anyhow::Result<Option<ffmpeg_next::frame::Video>> {
        loop {
            let mut frame = ffmpeg_next::frame::Video::empty();
            match self.decoder.receive_frame(&mut frame) {
                Ok(()) => return Ok(Some(frame)),
                Err(ffmpeg_next::Error::Eof) => return Ok(None),
                Err(ffmpeg_next::Error::Other { errno })
                    if errno == ffmpeg_next::util::error::EAGAIN => {}
                Err(err) => return Err(err.into()),
            }
            if self.eof_sent {
                return Ok(None);
            }
            match self.read_packet() {
                Some(packet) => self.decoder.send_packet(&packet)?,
                None => {
                    self.decoder.send_eof()?;
                    self.eof_sent = true;
                }
            }
        }
    }

    fn on_decoded(&mut self, decoded: ffmpeg_next::frame::Video) -> Option<Frame> {
        let value = decoded.timestamp().or(decoded.pts()).unwrap_or(0);
        let pts = Timestamp::new(value, self.time_base);
        let buffer = convert::to_pixel_buffer(&decoded);
        let Some((eye, layer)) = view_of(&decoded) else {
            return Some(Frame::image(pts, buffer));
        };
        self.metadata.multiview = true;

        let tagged = TaggedBuffer::stereo(eye, layer, buffer);
        match self.pending.take() {
            Some((first_pts, first)) if first_pts == pts => {
                Some(Frame::tagged(pts, vec![first, tagged]))
            }
            Some((first_pts, first)) => {
                self.pending = Some((pts, tagged));
                Some(Frame::tagged(first_pts, vec![first]))
            }
            None => {
                self.pending = Some((pts, tagged));
                None
            }
        }
    }

    fn advance(&mut self) -> anyhow::Result<Option<Frame>> {
        loop {
            let Some(decoded) = self.decode_next()? else {
                return Ok(self
                    .pending
                    .take()
                    .map(|(pts, buffer)| Frame::tagged(pts, vec![buffer])));
            };
            if let Some(frame) = self.on_decoded(decoded) {
                return Ok(Some(frame));
            }
        }
    }
}

impl FrameSource for FfmpegSource {
    fn path(&self) -> &Path {
        &self.path
    }

    fn metadata(&self) -> &TrackMetadata {
        &self.metadata
    }

    fn status(&self) -> ReaderStatus {
        self.status
    }

    fn start_reading(&mut self) -> bool {
        if self.status != ReaderStatus::Idle {
            return false;
        }
        self.status = ReaderStatus::Reading;
        true
    }

    fn next_frame(&mut self) -> anyhow::Result<Option<Frame>> {
        if self.status != ReaderStatus::Reading {
            return Ok(None);
        }
        let result = self.advance();
        match &result {
            Ok(Some(_)) => {}
            Ok(None) => self.status = ReaderStatus::Completed,
            Err(_) => self.status = ReaderStatus::Failed,
        }
        result
    }
}

fn open_decoder(stream: &AvStream) -> anyhow::Result<ffmpeg_next::decoder::Video> {
    let id = stream.parameters().id();
    let mut decoder_ctx =
        ffmpeg_next::codec::Context::from_parameters(stream.parameters().clone())?;
    unsafe {
        (*decoder_ctx.as_mut_ptr()).time_base = stream.time_base().into();
    }
    let codec =
        ffmpeg_next::decoder::find(id).ok_or_else(|| anyhow::anyhow!("no decoder for {:?}", id))?;

    let mut opts = Dictionary::new();
    if id == ffmpeg_next::codec::Id::HEVC {
        // all views, not just the base layer
        opts.set("view_ids", "-1");
    }
    let decoder = decoder_ctx.decoder().open_as_with(codec, opts)?.video()?;
    if decoder.format() == ffmpeg_next::format::Pixel::None
        || decoder.width() == 0
        || decoder.height() == 0
    {
        anyhow::bail!("missing codec parameters");
    }
    Ok(decoder)
}

/// Eye and layer of a decoded view, or `None` for single-view output.
fn view_of(frame: &ffmpeg_next::frame::Video) -> Option<(Eye, i64)> {
    unsafe {
        let ptr = frame.as_ptr();
        let view_id =
            ffi::av_frame_get_side_data(ptr, ffi::AVFrameSideDataType::AV_FRAME_DATA_VIEW_ID);
        if view_id.is_null() {
            return None;
        }
        let layer = if *((*view_id).data as *const i32) == 0 { 0 } else { 1 };

        let stereo =
            ffi::av_frame_get_side_data(ptr, ffi::AVFrameSideDataType::AV_FRAME_DATA_STEREO3D);
        let eye = if stereo.is_null() {
            None
        } else {
            match (*((*stereo).data as *const ffi::AVStereo3D)).view {
                ffi::AVStereo3DView::AV_STEREO3D_VIEW_LEFT => Some(Eye::Left),
                ffi::AVStereo3DView::AV_STEREO3D_VIEW_RIGHT => Some(Eye::Right),
                _ => None,
            }
        };
        let eye = eye.unwrap_or(if layer == 0 { Eye::Left } else { Eye::Right });
        Some((eye, layer))
    }
}

/// MV-HEVC decoding arrived in libavcodec 61.19 (FFmpeg 7.1).
pub fn supports_multiview_decode() -> bool {
    let version = unsafe { ffi::avcodec_version() };
    version >= (61 << 16 | 19 << 8)
        && ffmpeg_next::decoder::find(ffmpeg_next::codec::Id::HEVC).is_some()
}
