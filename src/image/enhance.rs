//! Upscaling and sharpness/contrast enhancement.

use image::{RgbImage, imageops::FilterType};

use crate::error::{Error, Result};

/// Factor used when upscaling is requested without an explicit factor.
pub const DEFAULT_UPSCALE_FACTOR: u32 = 2;

/// Largest accepted upscale factor.
pub const MAX_UPSCALE_FACTOR: u32 = 16;

/// 3x3 smoothing kernel, normalized by [`SMOOTH_SCALE`].
const SMOOTH_KERNEL: [f32; 9] = [1.0, 1.0, 1.0, 1.0, 5.0, 1.0, 1.0, 1.0, 1.0];
const SMOOTH_SCALE: f32 = 13.0;

/// Post-processing applied after generation or compositing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PostProcessConfig {
    /// Integer resize factor; 1 leaves the size alone.
    pub upscale_factor: u32,

    /// Sharpness multiplier; 1.0 is the identity, 0.0 fully smoothed.
    pub sharpness: f32,

    /// Contrast multiplier; 1.0 is the identity, 0.0 flat gray.
    pub contrast: f32,
}

impl Default for PostProcessConfig {
    fn default() -> Self {
        Self {
            upscale_factor: 1,
            sharpness: 1.0,
            contrast: 1.0,
        }
    }
}

impl PostProcessConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any parameter is out of valid range.
    pub fn validate(&self) -> Result<()> {
        check_upscale_factor(self.upscale_factor)?;
        check_factor("sharpness", self.sharpness)?;
        check_factor("contrast", self.contrast)
    }

    /// Upscale, then enhance.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn apply(&self, image: &RgbImage) -> Result<RgbImage> {
        self.validate()?;
        let upscaled = upscale_image(image, self.upscale_factor)?;
        enhance_image(&upscaled, self.sharpness, self.contrast)
    }
}

fn check_upscale_factor(factor: u32) -> Result<()> {
    if !(1..=MAX_UPSCALE_FACTOR).contains(&factor) {
        return Err(Error::invalid_parameter(
            "upscale_factor",
            format!("must be between 1 and {MAX_UPSCALE_FACTOR}"),
        ));
    }
    Ok(())
}

fn check_factor(name: &str, value: f32) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(Error::invalid_parameter(
            name,
            "must be a non-negative number",
        ));
    }
    Ok(())
}

/// Resize to `factor` times the size with Lanczos3.
///
/// # Errors
///
/// Returns an error if `factor` is outside `1..=MAX_UPSCALE_FACTOR` or the
/// resulting size does not fit in `u32`.
pub fn upscale_image(image: &RgbImage, factor: u32) -> Result<RgbImage> {
    check_upscale_factor(factor)?;
    if factor == 1 {
        return Ok(image.clone());
    }

    let (width, height) = image.dimensions();
    let (Some(new_width), Some(new_height)) =
        (width.checked_mul(factor), height.checked_mul(factor))
    else {
        return Err(Error::invalid_parameter(
            "upscale_factor",
            format!("{width}x{height} times {factor} overflows the image size"),
        ));
    };
    tracing::info!("Upscaling {width}x{height} -> {new_width}x{new_height}");

    Ok(image::imageops::resize(
        image,
        new_width,
        new_height,
        FilterType::Lanczos3,
    ))
}

/// Apply sharpness, then contrast. A factor of exactly 1.0 is skipped.
///
/// # Errors
///
/// Returns an error if a factor is negative or not finite.
#[allow(clippy::float_cmp)]
pub fn enhance_image(image: &RgbImage, sharpness: f32, contrast: f32) -> Result<RgbImage> {
    check_factor("sharpness", sharpness)?;
    check_factor("contrast", contrast)?;

    let mut image = image.clone();

    if sharpness != 1.0 {
        tracing::debug!("Applying sharpness {sharpness}");
        let smooth = smooth(&image);
        image = blend(&smooth, &image, sharpness);
    }

    if contrast != 1.0 {
        tracing::debug!("Applying contrast {contrast}");
        let mean = mean_luma(&image);
        let gray = RgbImage::from_pixel(image.width(), image.height(), image::Rgb([mean; 3]));
        image = blend(&gray, &image, contrast);
    }

    Ok(image)
}

/// `degenerate + factor * (image - degenerate)`, truncated and clamped.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn blend(degenerate: &RgbImage, image: &RgbImage, factor: f32) -> RgbImage {
    let mut out = image.clone();
    for ((o, d), i) in out
        .iter_mut()
        .zip(degenerate.iter())
        .zip(image.iter())
    {
        let d = f32::from(*d);
        let value = factor.mul_add(f32::from(*i) - d, d);
        // Safe: clamped to [0, 255] before casting
        *o = value.trunc().clamp(0.0, 255.0) as u8;
    }
    out
}

/// Smooth with [`SMOOTH_KERNEL`]; the one-pixel frame is copied unchanged.
///
/// Sums are taken over the integer weights and rounded once after dividing
/// by [`SMOOTH_SCALE`], so flat regions come back exactly.
/// `image::imageops::filter3x3` truncates a sum of pre-divided weights instead.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn smooth(image: &RgbImage) -> RgbImage {
    let (width, height) = image.dimensions();
    let mut out = image.clone();
    if width < 3 || height < 3 {
        return out;
    }

    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let mut sums = [0.0f32; 3];
            for (k, weight) in SMOOTH_KERNEL.iter().enumerate() {
                let px = image.get_pixel(x + (k as u32 % 3) - 1, y + (k as u32 / 3) - 1);
                for (sum, channel) in sums.iter_mut().zip(px.0) {
                    *sum += weight * f32::from(channel);
                }
            }
            let target = out.get_pixel_mut(x, y);
            for (channel, sum) in target.0.iter_mut().zip(sums) {
                *channel = (sum / SMOOTH_SCALE).round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    out
}

/// Mean ITU-R 601 luma, rounded.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn mean_luma(image: &RgbImage) -> u8 {
    let pixels = u64::from(image.width()) * u64::from(image.height());
    if pixels == 0 {
        return 0;
    }
    let total: u64 = image.pixels().map(|p| u64::from(super::luma(p.0))).sum();
    (total as f64 / pixels as f64).round() as u8
}
