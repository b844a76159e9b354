use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use base64::Engine;
use fast_image_resize as fir;
use image::{DynamicImage, RgbaImage, codecs::jpeg::JpegEncoder, imageops};

use crate::{config::CaptureConfig, types::Frame};

use super::buffer::EncodedFrame;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RoiSettings {
    pub fraction: f32,
    pub max_width: u32,
    pub jpeg_quality: f32,
}

impl Default for RoiSettings {
    fn default() -> Self {
        Self::from(&CaptureConfig::default())
    }
}

impl From<&CaptureConfig> for RoiSettings {
    fn from(config: &CaptureConfig) -> Self {
        Self {
            fraction: config.roi_fraction,
            max_width: config.max_width,
            jpeg_quality: config.jpeg_quality,
        }
    }
}

/// Pixel rectangle in source-frame coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Centered `fraction`×`fraction` region of a `width`×`height` frame.
pub fn crop_rect(width: u32, height: u32, fraction: f32) -> CropRect {
    let fraction = fraction.clamp(f32::EPSILON, 1.0);
    let crop_w = ((width as f32 * fraction).round() as u32).clamp(1, width.max(1));
    let crop_h = ((height as f32 * fraction).round() as u32).clamp(1, height.max(1));
    let x = ((width as f32 * (1.0 - fraction) / 2.0).round() as u32).min(width - crop_w.min(width));
    let y =
        ((height as f32 * (1.0 - fraction) / 2.0).round() as u32).min(height - crop_h.min(height));

    CropRect {
        x,
        y,
        width: crop_w,
        height: crop_h,
    }
}

/// Size of the encoded image: the crop scaled by `min(1, max_width / crop.width)`.
pub fn output_size(crop: &CropRect, max_width: u32) -> (u32, u32) {
    if crop.width <= max_width {
        return (crop.width, crop.height);
    }
    let scale = max_width as f32 / crop.width as f32;
    let out_h = ((crop.height as f32 * scale).round() as u32).max(1);
    (max_width, out_h)
}

/// Crops the region of interest out of `frame` and downscales it when wider than allowed.
pub fn crop_frame(frame: &Frame, settings: &RoiSettings) -> Result<RgbaImage> {
    let expected_len = (frame.width as usize)
        .saturating_mul(frame.height as usize)
        .saturating_mul(4);
    if frame.is_blank() || frame.rgba.len() != expected_len {
        return Err(anyhow!(
            "frame buffer size mismatch: got {} bytes for {}x{}",
            frame.rgba.len(),
            frame.width,
            frame.height
        ));
    }

    let Some(image) = RgbaImage::from_raw(frame.width, frame.height, frame.rgba.clone()) else {
        return Err(anyhow!("failed to build RGBA image from frame"));
    };

    let rect = crop_rect(frame.width, frame.height, settings.fraction);
    let cropped = imageops::crop_imm(&image, rect.x, rect.y, rect.width, rect.height).to_image();
    let (out_w, out_h) = output_size(&rect, settings.max_width);
    if (out_w, out_h) == (rect.width, rect.height) {
        return Ok(cropped);
    }

    let src_image =
        fir::images::Image::from_vec_u8(rect.width, rect.height, cropped.into_raw(), fir::PixelType::U8x4)?;
    let mut dst_image = fir::images::Image::new(out_w, out_h, fir::PixelType::U8x4);
    let mut resizer = fir::Resizer::new();
    let resize_options = fir::ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::CatmullRom));
    resizer
        .resize(&src_image, &mut dst_image, Some(&resize_options))
        .context("fast resize failed")?;

    RgbaImage::from_raw(out_w, out_h, dst_image.into_vec())
        .ok_or_else(|| anyhow!("resized buffer does not match {out_w}x{out_h}"))
}

pub fn encode_jpeg(image: &RgbaImage, quality: f32) -> Result<Vec<u8>> {
    let quality = (quality.clamp(0.01, 1.0) * 100.0).round() as u8;
    let rgb = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality)
        .encode_image(&rgb)
        .context("jpeg encode failed")?;
    Ok(bytes)
}

/// Crop, scale and encode one sample taken `offset` after capture began.
pub fn encode_frame(frame: &Frame, settings: &RoiSettings, offset: Duration) -> Result<EncodedFrame> {
    let cropped = crop_frame(frame, settings)?;
    let jpeg = encode_jpeg(&cropped, settings.jpeg_quality)?;
    Ok(EncodedFrame {
        width: cropped.width(),
        height: cropped.height(),
        offset,
        jpeg,
    })
}

pub fn jpeg_data_uri(jpeg: &[u8]) -> String {
    format!(
        "data:image/jpeg;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(jpeg)
    )
}
