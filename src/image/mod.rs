//! Image loading, compositing, post-processing, preview and saving.

mod compose;
mod enhance;
mod load;
mod preview;
mod save;

pub use compose::{DEFAULT_DECORATION_OPACITY, decorate_image};
pub use enhance::{
    DEFAULT_UPSCALE_FACTOR, MAX_UPSCALE_FACTOR, PostProcessConfig, enhance_image, upscale_image,
};
pub use load::load_image;
pub use preview::{DEFAULT_PREVIEW_WIDTH, ascii_from_image};
pub use save::{DEFAULT_FILENAME, resolve_output_path, save_image};

/// ITU-R 601 luma of an RGB pixel, in fixed point.
// Standard luminosity formula: 0.299*R + 0.587*G + 0.114*B
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn luma([r, g, b]: [u8; 3]) -> u8 {
    let weighted = u32::from(r) * 19_595 + u32::from(g) * 38_470 + u32::from(b) * 7_471;
    ((weighted + 0x8000) >> 16) as u8
}
