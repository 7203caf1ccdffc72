//! Compositing a generated decoration over a base image.

use image::{DynamicImage, RgbImage, Rgba, RgbaImage, imageops::FilterType};

use crate::error::{Error, Result};

/// Default scale applied to the decoration's alpha channel.
pub const DEFAULT_DECORATION_OPACITY: f32 = 0.5;

/// Composite `decoration` over `base`.
///
/// The decoration is stretched to the base's dimensions, its alpha channel is
/// multiplied by `opacity`, and the two are combined with the "over"
/// operator. The result drops the alpha channel. Neither input is modified.
///
/// # Errors
///
/// Returns an error if `opacity` is outside `[0, 1]`.
pub fn decorate_image(
    base: &DynamicImage,
    decoration: &DynamicImage,
    opacity: f32,
) -> Result<RgbImage> {
    if !(0.0..=1.0).contains(&opacity) {
        return Err(Error::invalid_parameter(
            "decoration_opacity",
            "must be between 0.0 and 1.0",
        ));
    }

    let base = base.to_rgba8();
    let (width, height) = base.dimensions();
    let mut decoration = decoration
        .resize_exact(width, height, FilterType::CatmullRom)
        .to_rgba8();

    scale_alpha(&mut decoration, opacity);

    let composed = alpha_composite(&base, &decoration);
    Ok(DynamicImage::ImageRgba8(composed).to_rgb8())
}

/// Multiply every alpha value by `factor`, truncating.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn scale_alpha(image: &mut RgbaImage, factor: f32) {
    if (factor - 1.0).abs() < f32::EPSILON {
        return;
    }
    for pixel in image.pixels_mut() {
        pixel[3] = (f32::from(pixel[3]) * factor) as u8;
    }
}

/// Porter-Duff "over" of `src` onto `dst`. Both must be the same size.
fn alpha_composite(dst: &RgbaImage, src: &RgbaImage) -> RgbaImage {
    let mut out = dst.clone();
    for (out_px, src_px) in out.pixels_mut().zip(src.pixels()) {
        *out_px = over(*out_px, *src_px);
    }
    out
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn over(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    let src_a = f32::from(src[3]) / 255.0;
    let dst_a = f32::from(dst[3]) / 255.0;
    let out_a = src_a + dst_a * (1.0 - src_a);

    // Nothing visible on either side keeps the base color.
    if out_a <= 0.0 {
        return dst;
    }

    let blend = |s: u8, d: u8| {
        let value = (f32::from(s) * src_a + f32::from(d) * dst_a * (1.0 - src_a)) / out_a;
        value.round().clamp(0.0, 255.0) as u8
    };

    Rgba([
        blend(src[0], dst[0]),
        blend(src[1], dst[1]),
        blend(src[2], dst[2]),
        (out_a * 255.0).round() as u8,
    ])
}
