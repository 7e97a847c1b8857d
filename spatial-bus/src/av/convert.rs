//! Conversions between decoded FFmpeg frames and the crate's pixel buffers.

use bytes::Bytes;
use ffmpeg_next::color::{Primaries, Space, TransferCharacteristic};
use ffmpeg_next::format::Pixel;

use crate::frame::{PixelBuffer, PixelFormat};
use crate::metadata::{ColorMatrix, ColorPrimaries, FormatExtensions, TransferFunction};

pub fn pixel_format(pixel: Pixel) -> PixelFormat {
    match pixel {
        Pixel::YUV420P => PixelFormat::Yuv420p,
        Pixel::YUV420P10LE => PixelFormat::Yuv420p10,
        Pixel::YUV422P10LE => PixelFormat::Yuv422p10,
        Pixel::YUV422P16LE => PixelFormat::Yuv422p16,
        Pixel::NV12 => PixelFormat::Nv12,
        Pixel::P010LE => PixelFormat::P010,
        other => PixelFormat::Other(ffmpeg_next::ffi::AVPixelFormat::from(other) as i32),
    }
}

pub fn av_pixel(format: PixelFormat) -> anyhow::Result<Pixel> {
    Ok(match format {
        PixelFormat::Yuv420p => Pixel::YUV420P,
        PixelFormat::Yuv420p10 => Pixel::YUV420P10LE,
        PixelFormat::Yuv422p10 => Pixel::YUV422P10LE,
        PixelFormat::Yuv422p16 => Pixel::YUV422P16LE,
        PixelFormat::Nv12 => Pixel::NV12,
        PixelFormat::P010 => Pixel::P010LE,
        PixelFormat::Other(id) => anyhow::bail!("pixel format {} cannot be encoded", id),
    })
}

/// Copies every plane of `frame` into a reference counted buffer.
pub fn to_pixel_buffer(frame: &ffmpeg_next::frame::Video) -> PixelBuffer {
    let mut buffer = PixelBuffer::new(frame.width(), frame.height(), pixel_format(frame.format()));
    for plane in 0..frame.planes() {
        buffer = buffer.with_plane(Bytes::copy_from_slice(frame.data(plane)), frame.stride(plane));
    }
    buffer
}

/// Rebuilds an FFmpeg frame from `buffer`, row by row since strides may differ.
pub fn to_av_frame(buffer: &PixelBuffer) -> anyhow::Result<ffmpeg_next::frame::Video> {
    let mut frame =
        ffmpeg_next::frame::Video::new(av_pixel(buffer.format)?, buffer.width, buffer.height);
    if frame.planes() != buffer.planes.len() {
        anyhow::bail!(
            "expected {} planes for {:?}, got {}",
            frame.planes(),
            buffer.format,
            buffer.planes.len()
        );
    }
    for plane in 0..frame.planes() {
        let rows = frame.plane_height(plane) as usize;
        let dst_stride = frame.stride(plane);
        let src_stride = buffer.strides[plane];
        let row_len = dst_stride.min(src_stride);
        let src = &buffer.planes[plane];
        let dst = frame.data_mut(plane);
        for row in 0..rows {
            let from = row * src_stride;
            if from + row_len > src.len() {
                anyhow::bail!("plane {} is shorter than {} rows", plane, rows);
            }
            dst[row * dst_stride..row * dst_stride + row_len]
                .copy_from_slice(&src[from..from + row_len]);
        }
    }
    Ok(frame)
}

/// Colour tags of a decoded stream, named the way the encoder expects them.
pub fn extensions(decoder: &ffmpeg_next::decoder::Video) -> FormatExtensions {
    let primaries = match decoder.color_primaries() {
        Primaries::BT709 => Some(ColorPrimaries::Itu709),
        Primaries::SMPTE170M => Some(ColorPrimaries::SmpteC),
        Primaries::SMPTE432 => Some(ColorPrimaries::P3D65),
        Primaries::BT2020 => Some(ColorPrimaries::Itu2020),
        _ => None,
    };
    let transfer = match decoder.color_transfer_characteristic() {
        TransferCharacteristic::BT709 => Some(TransferFunction::Itu709),
        TransferCharacteristic::SMPTE240M => Some(TransferFunction::Smpte240M),
        TransferCharacteristic::SMPTE2084 => Some(TransferFunction::SmpteSt2084Pq),
        TransferCharacteristic::ARIB_STD_B67 => Some(TransferFunction::Itu2100Hlg),
        TransferCharacteristic::Linear => Some(TransferFunction::Linear),
        TransferCharacteristic::IEC61966_2_1 => Some(TransferFunction::Srgb),
        _ => None,
    };
    let matrix = match decoder.color_space() {
        Space::BT709 => Some(ColorMatrix::Itu709),
        Space::BT470BG | Space::SMPTE170M => Some(ColorMatrix::Itu601),
        Space::SMPTE240M => Some(ColorMatrix::Smpte240M),
        Space::BT2020NCL => Some(ColorMatrix::Itu2020),
        _ => None,
    };
    FormatExtensions {
        color_primaries: primaries.map(|p| p.to_string()),
        transfer_function: transfer.map(|t| t.to_string()),
        color_matrix: matrix.map(|m| m.to_string()),
    }
}
