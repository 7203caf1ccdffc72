//! Text-to-image generation pipeline.

mod bart;
mod generation;
mod sampling;
mod vqgan;

pub use generation::{
    DEFAULT_PROMPT, DEFAULT_TOP_K, DalleGenerator, GenerationConfig, ImageGenerator,
    MAX_GRID_SIZE,
};
pub use sampling::{IMAGE_VOCAB_COUNT, SamplingSettings, sample_token};
pub use vqgan::{SAMPLE_SIZE, tile_grid};
