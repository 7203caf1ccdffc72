//! VQGAN detokenizer and grid assembly.

use image::{GenericImage, RgbImage};
use ndarray::Array2;
use ort::session::Session;
use ort::value::Tensor;

use crate::error::{Error, Result};

use super::bart::extract;

/// Side length in pixels of one generated sample.
pub const SAMPLE_SIZE: u32 = 256;

/// Image tokens per sample (16 x 16 codebook entries).
pub const IMAGE_TOKEN_COUNT: usize = 256;

/// Turn image token rows `(samples, 256)` into RGB images.
///
/// # Errors
///
/// Returns an error if inference fails or the output is not
/// `(samples, 256, 256, 3)`.
pub fn detokenize(detokenizer: &mut Session, image_tokens: &Array2<i64>) -> Result<Vec<RgbImage>> {
    let input_value =
        Tensor::from_array(image_tokens.clone()).map_err(|source| Error::Inference { source })?;

    let outputs = detokenizer
        .run(ort::inputs!["image_tokens" => input_value])
        .map_err(|source| Error::Inference { source })?;

    let output = outputs
        .values()
        .next()
        .ok_or_else(|| Error::ShapeMismatch {
            expected: "image output".to_string(),
            actual: "no output".to_string(),
        })?;

    let (dims, data) = extract(&output)?;
    let side = SAMPLE_SIZE as usize;
    let samples = image_tokens.nrows();
    if dims != [samples, side, side, 3] {
        return Err(Error::ShapeMismatch {
            expected: format!("[{samples}, {side}, {side}, 3]"),
            actual: format!("{dims:?}"),
        });
    }

    data.chunks_exact(side * side * 3)
        .map(pixels_to_image)
        .collect()
}

/// Convert one `(256, 256, 3)` block of 0..255 floats into an image.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn pixels_to_image(block: &[f32]) -> Result<RgbImage> {
    let len = block.len();
    // Safe: clamped to [0, 255] before casting
    let raw = block.iter().map(|&v| v.clamp(0.0, 255.0) as u8).collect();
    RgbImage::from_raw(SAMPLE_SIZE, SAMPLE_SIZE, raw).ok_or_else(|| Error::ShapeMismatch {
        expected: format!("{} values", SAMPLE_SIZE * SAMPLE_SIZE * 3),
        actual: len.to_string(),
    })
}

/// Tile `grid_size * grid_size` samples into one image.
///
/// Sample `i` lands in column `i % grid_size`, row `i / grid_size`.
///
/// # Errors
///
/// Returns an error if the number of samples does not fill the grid or the
/// grid is too large for `u32` dimensions.
#[allow(clippy::cast_possible_truncation)]
pub fn tile_grid(samples: &[RgbImage], grid_size: u32) -> Result<RgbImage> {
    let side = grid_size as usize;
    let expected = side.checked_mul(side).unwrap_or(usize::MAX);
    if samples.len() != expected || expected == 0 {
        return Err(Error::ShapeMismatch {
            expected: format!("{grid_size}x{grid_size} samples"),
            actual: samples.len().to_string(),
        });
    }

    let (tile_w, tile_h) = samples[0].dimensions();
    let (Some(width), Some(height)) =
        (tile_w.checked_mul(grid_size), tile_h.checked_mul(grid_size))
    else {
        return Err(Error::ShapeMismatch {
            expected: "a grid that fits in u32 pixels".to_string(),
            actual: format!("{grid_size} x {tile_w}x{tile_h} tiles"),
        });
    };
    let mut grid = RgbImage::new(width, height);

    for (i, sample) in samples.iter().enumerate() {
        let i = i as u32;
        let (col, row) = (i % grid_size, i / grid_size);
        grid.copy_from(sample, col * tile_w, row * tile_h)
            .map_err(|err| Error::ShapeMismatch {
                expected: format!("{tile_w}x{tile_h} tiles"),
                actual: err.to_string(),
            })?;
    }

    Ok(grid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_tile_positions() {
        let samples: Vec<RgbImage> = (0..4u8)
            .map(|i| RgbImage::from_pixel(2, 2, Rgb([i * 10, 0, 0])))
            .collect();

        let grid = tile_grid(&samples, 2).unwrap();

        assert_eq!(grid.dimensions(), (4, 4));
        assert_eq!(grid.get_pixel(0, 0)[0], 0);
        assert_eq!(grid.get_pixel(3, 0)[0], 10);
        assert_eq!(grid.get_pixel(0, 3)[0], 20);
        assert_eq!(grid.get_pixel(3, 3)[0], 30);
    }

    #[test]
    fn test_single_sample_grid() {
        let sample = RgbImage::from_pixel(3, 3, Rgb([1, 2, 3]));
        let grid = tile_grid(std::slice::from_ref(&sample), 1).unwrap();
        assert_eq!(grid, sample);
    }

    #[test]
    fn test_incomplete_grid() {
        let samples = vec![RgbImage::new(2, 2); 3];
        assert!(tile_grid(&samples, 2).is_err());
    }

    #[test]
    fn test_huge_grid_size_rejected() {
        let samples = vec![RgbImage::new(2, 2)];
        assert!(matches!(
            tile_grid(&samples, 65_536),
            Err(Error::ShapeMismatch { .. })
        ));
        assert!(tile_grid(&samples, u32::MAX).is_err());
    }

    #[test]
    fn test_pixels_clamped() {
        let mut block = vec![128.4; (SAMPLE_SIZE * SAMPLE_SIZE * 3) as usize];
        block[0] = -5.0;
        block[1] = 300.0;

        let img = pixels_to_image(&block).unwrap();

        assert_eq!(img.get_pixel(0, 0).0, [0, 255, 128]);
    }

    #[test]
    fn test_short_pixel_block_rejected() {
        let block = vec![0.0; 12];
        assert!(matches!(
            pixels_to_image(&block),
            Err(Error::ShapeMismatch { .. })
        ));
    }
}
