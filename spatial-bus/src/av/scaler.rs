use ffmpeg_next::format::Pixel;
use ffmpeg_next::software::scaling;

/// Converts decoded frames into the encoder's pixel format, rebuilt whenever
/// the source geometry or format changes.
pub struct Scaler {
    context: scaling::Context,
    source: (Pixel, u32, u32),
}

impl Scaler {
    pub fn new(source: (Pixel, u32, u32), destination: (Pixel, u32, u32)) -> anyhow::Result<Self> {
        let context = scaling::Context::get(
            source.0,
            source.1,
            source.2,
            destination.0,
            destination.1,
            destination.2,
            scaling::flag::Flags::BILINEAR,
        )?;
        Ok(Self { context, source })
    }

    pub fn accepts(&self, frame: &ffmpeg_next::frame::Video) -> bool {
        self.source == (frame.format(), frame.width(), frame.height())
    }

    pub fn run(
        &mut self,
        frame: &ffmpeg_next::frame::Video,
        dst: &mut ffmpeg_next::frame::Video,
    ) -> anyhow::Result<()> {
        self.context.run(frame, dst).map_err(|e| e.into())
    }
}

unsafe impl Send for Scaler {}
