use std::time::Instant;

use anyhow::{Result, anyhow, bail};
use nokhwa::{Buffer, utils::FrameFormat};
use rayon::prelude::*;
use yuv::{
    YuvBiPlanarImage, YuvConversionMode, YuvPackedImage, YuvRange, YuvStandardMatrix,
    yuv_nv12_to_rgba, yuyv422_to_rgba,
};
use zune_jpeg::{
    JpegDecoder,
    zune_core::{bytestream::ZCursor, colorspace::ColorSpace, options::DecoderOptions},
};

use crate::types::Frame;

/// Channel layout of uncompressed packed formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Packed {
    Rgb,
    Bgr,
    Gray,
}

impl Packed {
    fn channels(self) -> usize {
        match self {
            Packed::Rgb | Packed::Bgr => 3,
            Packed::Gray => 1,
        }
    }
}

/// Converts a raw camera buffer into an RGBA [`Frame`] stamped with `timestamp`.
pub fn camera_buffer_to_frame(buffer: &Buffer, timestamp: Instant) -> Result<Frame> {
    let resolution = buffer.resolution();
    let (width, height) = (resolution.width_x, resolution.height_y);
    if width == 0 || height == 0 {
        bail!("camera reported an empty {width}x{height} frame");
    }
    let data = buffer.buffer();

    let rgba = match buffer.source_frame_format() {
        FrameFormat::NV12 => nv12_to_rgba(data, width, height)?,
        FrameFormat::YUYV => yuyv_to_rgba(data, width, height)?,
        FrameFormat::MJPEG => mjpeg_to_rgba(data, width, height)?,
        FrameFormat::RAWRGB => packed_to_rgba(data, width, height, Packed::Rgb)?,
        FrameFormat::RAWBGR => packed_to_rgba(data, width, height, Packed::Bgr)?,
        FrameFormat::GRAY => packed_to_rgba(data, width, height, Packed::Gray)?,
    };

    Ok(Frame {
        rgba,
        width,
        height,
        timestamp,
    })
}

fn require_len(label: &str, data: &[u8], expected: usize) -> Result<()> {
    if data.len() < expected {
        bail!(
            "{label} buffer too small: got {}, expected {expected}",
            data.len()
        );
    }
    Ok(())
}

fn nv12_to_rgba(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let luma_len = width as usize * height as usize;
    let chroma_len = luma_len / 2;
    require_len("NV12", data, luma_len + chroma_len)?;

    let image = YuvBiPlanarImage {
        y_plane: &data[..luma_len],
        y_stride: width,
        uv_plane: &data[luma_len..luma_len + chroma_len],
        uv_stride: width,
        width,
        height,
    };
    let mut rgba = vec![0u8; luma_len * 4];
    yuv_nv12_to_rgba(
        &image,
        &mut rgba,
        width * 4,
        YuvRange::Full,
        YuvStandardMatrix::Bt709,
        YuvConversionMode::Balanced,
    )
    .map_err(|err| anyhow!("NV12 to RGBA failed: {err:?}"))?;
    Ok(rgba)
}

fn yuyv_to_rgba(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let pixels = width as usize * height as usize;
    require_len("YUYV", data, pixels * 2)?;

    let packed = YuvPackedImage {
        yuy: data,
        yuy_stride: width * 2,
        width,
        height,
    };
    let mut rgba = vec![0u8; pixels * 4];
    yuyv422_to_rgba(
        &packed,
        &mut rgba,
        width * 4,
        YuvRange::Full,
        YuvStandardMatrix::Bt709,
    )
    .map_err(|err| anyhow!("YUYV422 to RGBA failed: {err:?}"))?;
    Ok(rgba)
}

fn mjpeg_to_rgba(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let options = DecoderOptions::default().jpeg_set_out_colorspace(ColorSpace::RGBA);
    let mut decoder = JpegDecoder::new_with_options(ZCursor::new(data), options);
    let rgba = decoder
        .decode()
        .map_err(|err| anyhow!("MJPEG decode failed: {err:?}"))?;

    // Some drivers report a mode that differs from the encoded stream; the
    // frame must match the advertised resolution for cropping to be correct.
    let expected = width as usize * height as usize * 4;
    if rgba.len() != expected {
        bail!(
            "MJPEG frame is {} bytes, expected {expected} for {width}x{height}",
            rgba.len()
        );
    }
    Ok(rgba)
}

fn packed_to_rgba(data: &[u8], width: u32, height: u32, layout: Packed) -> Result<Vec<u8>> {
    let pixels = width as usize * height as usize;
    let channels = layout.channels();
    require_len("packed", data, pixels * channels)?;

    let mut rgba = vec![0u8; pixels * 4];
    rgba.par_chunks_mut(4)
        .zip(data[..pixels * channels].par_chunks_exact(channels))
        .for_each(|(dst, src)| {
            let [r, g, b] = match layout {
                Packed::Rgb => [src[0], src[1], src[2]],
                Packed::Bgr => [src[2], src[1], src[0]],
                Packed::Gray => [src[0]; 3],
            };
            dst.copy_from_slice(&[r, g, b, 255]);
        });
    Ok(rgba)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bgr_swaps_channels() {
        let data = [10u8, 20, 30, 40, 50, 60];
        let rgba = packed_to_rgba(&data, 2, 1, Packed::Bgr).unwrap();
        assert_eq!(rgba, vec![30, 20, 10, 255, 60, 50, 40, 255]);
    }

    #[test]
    fn test_gray_expands_to_rgba() {
        let rgba = packed_to_rgba(&[7u8, 9], 2, 1, Packed::Gray).unwrap();
        assert_eq!(rgba, vec![7, 7, 7, 255, 9, 9, 9, 255]);
    }

    #[test]
    fn test_short_buffer_is_rejected() {
        assert!(packed_to_rgba(&[1u8, 2, 3], 2, 1, Packed::Rgb).is_err());
        assert!(nv12_to_rgba(&[0u8; 4], 4, 4).is_err());
    }
}
