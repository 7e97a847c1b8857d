use std::path::{Path, PathBuf};

use ffmpeg_next::format::Pixel;
use ffmpeg_next::{Dictionary, Rescale};

use super::convert;
use super::scaler::Scaler;
use super::stream::to_av_rational;
use crate::frame::{TaggedBuffer, Timestamp};
use crate::sink::{FinishHandle, FrameSink, SinkConfig, WriterStatus};

/// prores_ks profile 3
const PRORES_HQ_PROFILE: &str = "3";
const PRORES_PIXEL: Pixel = Pixel::YUV422P10LE;

/// ProRes 422 HQ encoder muxing one video track into a QuickTime file.
///
/// Encoding happens inline on `append`, so the sink is always ready.
pub struct FfmpegSink {
    path: PathBuf,
    output: ffmpeg_next::format::context::Output,
    encoder: ffmpeg_next::encoder::Video,
    encoder_time_base: ffmpeg_next::Rational,
    stream_time_base: ffmpeg_next::Rational,
    scaler: Option<Scaler>,
    status: WriterStatus,
    frames: u64,
}

impl FfmpegSink {
    pub fn open(path: &Path, config: &SinkConfig) -> anyhow::Result<Self> {
        let mut output = ffmpeg_next::format::output_as(path, "mov")?;
        let codec = ffmpeg_next::encoder::find_by_name("prores_ks")
            .ok_or(anyhow::anyhow!("codec not found: prores_ks"))?;
        let global_header = output
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);

        let time_base = to_av_rational(config.time_base);
        let mut encoder = ffmpeg_next::codec::Context::new_with_codec(codec)
            .encoder()
            .video()?;
        encoder.set_width(config.dimensions.width);
        encoder.set_height(config.dimensions.height);
        encoder.set_format(PRORES_PIXEL);
        encoder.set_time_base(time_base);
        encoder.set_frame_rate(Some(to_av_rational(config.frame_rate)));
        if global_header {
            encoder.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }
        let mut opts = Dictionary::new();
        opts.set("profile", PRORES_HQ_PROFILE);
        opts.set("vendor", "apl0");
        let encoder = encoder.open_with(opts)?;

        let mut stream = output.add_stream(codec)?;
        stream.set_time_base(time_base);
        stream.set_parameters(&encoder);
        output.write_header()?;
        let stream_time_base = output
            .stream(0)
            .map(|s| s.time_base())
            .ok_or(anyhow::anyhow!("output stream missing after header"))?;
        log::info!(
            "opened {} for prores_ks {} at {}",
            path.display(),
            config.dimensions,
            config.time_base
        );

        Ok(Self {
            path: path.to_path_buf(),
            output,
            encoder,
            encoder_time_base: time_base,
            stream_time_base,
            scaler: None,
            status: WriterStatus::Writing,
            frames: 0,
        })
    }

    fn encode(&mut self, buffers: &[TaggedBuffer], pts: Timestamp) -> anyhow::Result<()> {
        let buffer = buffers
            .first()
            .ok_or(anyhow::anyhow!("sample has no buffers"))?;
        let frame = convert::to_av_frame(&buffer.buffer)?;
        let mut frame = if frame.format() != PRORES_PIXEL
            || frame.width() != self.encoder.width()
            || frame.height() != self.encoder.height()
        {
            if !self.scaler.as_ref().is_some_and(|s| s.accepts(&frame)) {
                self.scaler = Some(Scaler::new(
                    (frame.format(), frame.width(), frame.height()),
                    (PRORES_PIXEL, self.encoder.width(), self.encoder.height()),
                )?);
            }
            let mut converted = ffmpeg_next::frame::Video::empty();
            if let Some(scaler) = self.scaler.as_mut() {
                scaler.run(&frame, &mut converted)?;
            }
            converted
        } else {
            frame
        };
        frame.set_pts(Some(
            pts.value()
                .rescale(to_av_rational(pts.time_base()), self.encoder_time_base),
        ));
        self.encoder.send_frame(&frame)?;
        self.write_packets()
    }

    fn write_packets(&mut self) -> anyhow::Result<()> {
        let mut packet = ffmpeg_next::Packet::empty();
        loop {
            match self.encoder.receive_packet(&mut packet) {
                Ok(()) => {
                    packet.set_stream(0);
                    packet.set_position(-1);
                    packet.rescale_ts(self.encoder_time_base, self.stream_time_base);
                    packet.write_interleaved(&mut self.output)?;
                }
                Err(ffmpeg_next::Error::Other { errno })
                    if errno == ffmpeg_next::util::error::EAGAIN =>
                {
                    return Ok(());
                }
                Err(ffmpeg_next::Error::Eof) => return Ok(()),
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn flush(mut self) -> anyhow::Result<()> {
        self.encoder.send_eof()?;
        self.write_packets()?;
        self.output.write_trailer()?;
        log::debug!("wrote trailer of {} after {} frames", self.path.display(), self.frames);
        Ok(())
    }
}

impl FrameSink for FfmpegSink {
    fn path(&self) -> &Path {
        &self.path
    }

    fn status(&self) -> WriterStatus {
        self.status
    }

    fn ready_for_write(&self) -> bool {
        self.status == WriterStatus::Writing
    }

    fn append(&mut self, buffers: Vec<TaggedBuffer>, pts: Timestamp) -> bool {
        match self.encode(&buffers, pts) {
            Ok(()) => {
                self.frames += 1;
                true
            }
            Err(e) => {
                log::error!("encode into {} failed: {:#}", self.path.display(), e);
                self.status = WriterStatus::Failed;
                false
            }
        }
    }

    fn mark_finished(&mut self) {
        if self.status == WriterStatus::Writing {
            self.status = WriterStatus::Completed;
        }
    }

    fn finish(self) -> FinishHandle {
        Box::pin(async move { tokio::task::spawn_blocking(move || self.flush()).await? })
    }
}
