//! ASCII-art preview for the terminal.

use image::{RgbImage, imageops::FilterType};

use crate::error::{Error, Result};

/// Default preview width in characters.
pub const DEFAULT_PREVIEW_WIDTH: u32 = 128;

/// Characters from darkest to brightest.
const RAMP: [char; 7] = ['.', ',', ';', '/', 'I', 'O', 'X'];

/// Terminal cells are roughly twice as tall as they are wide.
const CELL_ASPECT: f32 = 0.55;

/// Render `image` as ASCII art `width` characters wide.
///
/// The image is resized to `width` x `floor(0.55 * width)` and each pixel's
/// luma picks a character from a seven-step ramp. Rows are joined with `\n`
/// and there is no trailing newline.
///
/// # Errors
///
/// Returns an error if `width` is 0.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn ascii_from_image(image: &RgbImage, width: u32) -> Result<String> {
    if width == 0 {
        return Err(Error::invalid_parameter("preview_width", "must be at least 1"));
    }

    let height = ((width as f32 * CELL_ASPECT) as u32).max(1);
    let resized = image::imageops::resize(image, width, height, FilterType::CatmullRom);

    let rows: Vec<String> = resized
        .rows()
        .map(|row| row.map(|pixel| ramp_char(super::luma(pixel.0))).collect())
        .collect();

    Ok(rows.join("\n"))
}

/// Map a luma value onto the ramp.
fn ramp_char(luma: u8) -> char {
    RAMP[usize::from(luma) * RAMP.len() / 256]
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn solid(level: u8) -> RgbImage {
        RgbImage::from_pixel(40, 30, Rgb([level; 3]))
    }

    #[test]
    fn test_preview_shape() {
        let text = ascii_from_image(&solid(100), DEFAULT_PREVIEW_WIDTH).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 70);
        assert!(lines.iter().all(|line| line.chars().count() == 128));
    }

    #[test]
    fn test_solid_image_uses_one_symbol() {
        for level in [0u8, 37, 128, 201, 255] {
            let text = ascii_from_image(&solid(level), 32).unwrap();
            let mut symbols: Vec<char> = text.chars().filter(|&c| c != '\n').collect();
            symbols.dedup();
            assert_eq!(symbols.len(), 1, "level {level}");
        }
    }

    #[test]
    fn test_symbols_monotonic_in_brightness() {
        let rank = |c: char| RAMP.iter().position(|&r| r == c).unwrap();

        let ranks: Vec<usize> = (0..=8u32)
            .map(|step| (step * 32).min(255) as u8)
            .map(|level| {
                let text = ascii_from_image(&solid(level), 16).unwrap();
                rank(text.chars().next().unwrap())
            })
            .collect();

        assert!(ranks.windows(2).all(|pair| pair[0] <= pair[1]), "{ranks:?}");
        assert_eq!(ranks.first(), Some(&0));
        assert_eq!(ranks.last(), Some(&(RAMP.len() - 1)));
    }

    #[test]
    fn test_ramp_bounds() {
        assert_eq!(ramp_char(0), '.');
        assert_eq!(ramp_char(36), '.');
        assert_eq!(ramp_char(37), ',');
        assert_eq!(ramp_char(255), 'X');
    }

    #[test]
    fn test_zero_width_rejected() {
        assert!(ascii_from_image(&solid(0), 0).is_err());
    }

    #[test]
    fn test_deterministic() {
        let img = RgbImage::from_fn(50, 20, |x, y| Rgb([(x * 5) as u8, (y * 12) as u8, 90]));
        assert_eq!(
            ascii_from_image(&img, 64).unwrap(),
            ascii_from_image(&img, 64).unwrap()
        );
    }
}
