//! Image loading utilities.

use std::path::Path;

use image::DynamicImage;

use crate::error::{Error, Result};

/// Load an image from disk.
///
/// The path is checked up front so a missing file is reported as
/// [`Error::ImageNotFound`] rather than a decoder error.
///
/// # Errors
///
/// Returns an error if the file does not exist or cannot be decoded.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(Error::ImageNotFound {
            path: path.to_path_buf(),
        });
    }

    tracing::info!("Loading image from {}", path.display());

    image::open(path).map_err(|source| Error::ImageLoad {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.png");

        match load_image(&missing) {
            Err(Error::ImageNotFound { path }) => assert_eq!(path, missing),
            other => panic!("expected ImageNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_not_an_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("text.png");
        std::fs::write(&path, b"definitely not a png").unwrap();

        assert!(matches!(load_image(&path), Err(Error::ImageLoad { .. })));
    }

    #[test]
    fn test_round_trip_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("small.png");
        image::RgbaImage::new(7, 5).save(&path).unwrap();

        let img = load_image(&path).unwrap();
        assert_eq!((img.width(), img.height()), (7, 5));
    }
}
