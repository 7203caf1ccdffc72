//! Sequencing of the decorate and generate paths.

use std::path::PathBuf;

use image::DynamicImage;

use crate::error::{Error, Result};
use crate::image::{
    DEFAULT_DECORATION_OPACITY, DEFAULT_PREVIEW_WIDTH, PostProcessConfig, ascii_from_image,
    decorate_image, load_image, save_image,
};
use crate::pipeline::{DEFAULT_TOP_K, GenerationConfig, ImageGenerator};

/// Where the decoration is written in the decorate path.
pub const DEFAULT_DECORATION_PATH: &str = "generated_decorative.png";

/// Everything one run needs.
#[derive(Debug, Clone)]
pub struct Options {
    /// Model and sampling settings.
    pub generation: GenerationConfig,

    /// Base image; present selects the decorate path.
    pub input_image: Option<PathBuf>,

    /// Final output path, normalized on save.
    pub image_path: PathBuf,

    /// Intermediate decoration output.
    pub decoration_path: PathBuf,

    /// Alpha scale for the decoration.
    pub decoration_opacity: f32,

    /// Upscale and enhancement settings.
    pub post: PostProcessConfig,

    /// Preview width, `None` to skip rendering.
    pub preview_width: Option<u32>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            generation: GenerationConfig::default(),
            input_image: None,
            image_path: PathBuf::from("generated"),
            decoration_path: PathBuf::from(DEFAULT_DECORATION_PATH),
            decoration_opacity: DEFAULT_DECORATION_OPACITY,
            post: PostProcessConfig::default(),
            preview_width: Some(DEFAULT_PREVIEW_WIDTH),
        }
    }
}

impl Options {
    /// Validate everything before any work starts.
    ///
    /// # Errors
    ///
    /// Returns an error if any parameter is out of valid range.
    pub fn validate(&self) -> Result<()> {
        self.generation.validate()?;
        self.post.validate()?;

        if !(0.0..=1.0).contains(&self.decoration_opacity) {
            return Err(Error::invalid_parameter(
                "decoration_opacity",
                "must be between 0.0 and 1.0",
            ));
        }

        if self.preview_width == Some(0) {
            return Err(Error::invalid_parameter("preview_width", "must be at least 1"));
        }

        Ok(())
    }
}

/// What a run produced.
#[derive(Debug, Clone)]
pub struct Outcome {
    /// Where the final image was written.
    pub output_path: PathBuf,

    /// Other files written along the way (the decoration, if any).
    pub intermediate_paths: Vec<PathBuf>,

    /// ASCII preview of the final image.
    pub preview: Option<String>,
}

/// Run either the decorate or the generate path.
///
/// # Errors
///
/// Returns the first failure of any stage; nothing is retried.
pub fn run<G: ImageGenerator + ?Sized>(generator: &mut G, options: &Options) -> Result<Outcome> {
    options.validate()?;
    tracing::debug!("Running with {options:?}");

    let mut intermediate_paths = Vec::new();

    let image = if let Some(input) = &options.input_image {
        let original = load_image(input)?;

        let decoration_config = GenerationConfig {
            grid_size: 1,
            top_k: DEFAULT_TOP_K,
            ..options.generation.clone()
        };
        tracing::info!("Generating decoration for {:?}", decoration_config.prompt);
        let decoration = generator.generate(&decoration_config)?;
        intermediate_paths.push(save_image(&decoration, &options.decoration_path)?);

        tracing::info!("Decorating {}", input.display());
        decorate_image(
            &original,
            &DynamicImage::ImageRgb8(decoration),
            options.decoration_opacity,
        )?
    } else {
        tracing::info!("Generating image for {:?}", options.generation.prompt);
        let generated = generator.generate(&options.generation)?;
        // First pass; the final save below overwrites it.
        save_image(&generated, &options.image_path)?;
        generated
    };

    let image = options.post.apply(&image)?;
    let output_path = save_image(&image, &options.image_path)?;

    let preview = options
        .preview_width
        .map(|width| ascii_from_image(&image, width))
        .transpose()?;

    Ok(Outcome {
        output_path,
        intermediate_paths,
        preview,
    })
}
