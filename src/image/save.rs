//! Image saving utilities.

use std::path::{Path, PathBuf};

use image::{ImageFormat, RgbImage};

use crate::error::{Error, Result};

/// Filename used when the target is a directory.
pub const DEFAULT_FILENAME: &str = "generated.png";

/// Resolve where an image for `path` is written.
///
/// - an existing directory gets [`DEFAULT_FILENAME`] inside it
/// - anything not ending in `.png` gets `.png` appended
/// - everything else is used as is
#[must_use]
pub fn resolve_output_path<P: AsRef<Path>>(path: P) -> PathBuf {
    let path = path.as_ref();

    if path.is_dir() {
        return path.join(DEFAULT_FILENAME);
    }

    let mut raw = path.as_os_str().to_os_string();
    if !raw.to_string_lossy().ends_with(".png") {
        raw.push(".png");
    }
    PathBuf::from(raw)
}

/// Save an image as PNG.
///
/// The image is only borrowed, so callers keep using it afterwards. The file
/// is created or overwritten.
///
/// # Returns
///
/// The resolved path the image was written to.
///
/// # Errors
///
/// Returns an error if the image cannot be written.
pub fn save_image<P: AsRef<Path>>(image: &RgbImage, path: P) -> Result<PathBuf> {
    let path = resolve_output_path(path);

    tracing::info!("Saving image to {}", path.display());

    image
        .save_with_format(&path, ImageFormat::Png)
        .map_err(|source| Error::ImageSave {
            path: path.clone(),
            source,
        })?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_directory_gets_default_name() {
        let dir = tempfile::tempdir().unwrap();
        let outdir = dir.path().join("outdir");
        std::fs::create_dir(&outdir).unwrap();

        let with_slash = format!("{}/", outdir.display());
        assert_eq!(resolve_output_path(&with_slash), outdir.join("generated.png"));
        assert_eq!(resolve_output_path(&outdir), outdir.join("generated.png"));
    }

    #[test]
    fn test_extension_appended() {
        assert_eq!(resolve_output_path("foo"), PathBuf::from("foo.png"));
        assert_eq!(resolve_output_path("foo.jpg"), PathBuf::from("foo.jpg.png"));
    }

    #[test]
    fn test_png_unchanged() {
        assert_eq!(resolve_output_path("foo.png"), PathBuf::from("foo.png"));
    }

    #[test]
    fn test_save_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out");

        let first = save_image(&RgbImage::from_pixel(4, 4, Rgb([1, 2, 3])), &target).unwrap();
        let second = save_image(&RgbImage::from_pixel(2, 3, Rgb([9, 9, 9])), &target).unwrap();

        assert_eq!(first, second);
        assert_eq!(first, dir.path().join("out.png"));

        let written = image::open(&second).unwrap().to_rgb8();
        assert_eq!(written.dimensions(), (2, 3));
        assert_eq!(written.get_pixel(0, 0), &Rgb([9, 9, 9]));
    }

    #[test]
    fn test_unwritable_path() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("missing").join("deeper").join("out.png");

        assert!(save_image(&RgbImage::new(1, 1), &target).is_err());
    }
}
