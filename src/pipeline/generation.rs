//! Text-to-image generation on top of the ONNX model files.

use std::path::PathBuf;

use image::RgbImage;
use indicatif::{ProgressBar, ProgressStyle};
use ndarray::{Array1, Array2, Array4, Axis};
use ort::session::Session;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::error::{Error, Result};
use crate::model::{ModelFile, ModelStore, Precision, TEXT_TOKEN_COUNT, TextTokenizer, Variant};

use super::bart::{self, DecodeStep};
use super::sampling::{IMAGE_VOCAB_COUNT, SamplingSettings, sample_token};
use super::vqgan::{self, IMAGE_TOKEN_COUNT};

/// Default prompt.
pub const DEFAULT_PROMPT: &str = "Dali painting of WALL·E";

/// Default number of candidates kept while sampling.
pub const DEFAULT_TOP_K: usize = 256;

/// Largest grid the generator accepts per side.
pub const MAX_GRID_SIZE: u32 = 8;

/// Configuration for one generation call.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Model size.
    pub variant: Variant,

    /// Numeric precision of the graphs.
    pub precision: Precision,

    /// Text prompt.
    pub prompt: String,

    /// Random seed. Negative values draw a fresh seed from the OS.
    pub seed: i64,

    /// Samples per side of the output grid.
    pub grid_size: u32,

    /// Number of most likely tokens kept at each step.
    pub top_k: usize,

    /// Softmax temperature.
    pub temperature: f32,

    /// Weight of the prompt-conditioned logits over the unconditioned ones.
    pub supercondition_factor: f32,

    /// Directory holding the model files.
    pub models_root: PathBuf,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            variant: Variant::Mini,
            precision: Precision::Full,
            prompt: DEFAULT_PROMPT.to_string(),
            seed: -1,
            grid_size: 1,
            top_k: DEFAULT_TOP_K,
            temperature: 1.0,
            supercondition_factor: 16.0,
            models_root: PathBuf::from("our_model"),
        }
    }
}

impl GenerationConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any parameter is out of valid range.
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_GRID_SIZE).contains(&self.grid_size) {
            return Err(Error::invalid_parameter(
                "grid_size",
                format!("must be between 1 and {MAX_GRID_SIZE}"),
            ));
        }

        if !(1..=IMAGE_VOCAB_COUNT).contains(&self.top_k) {
            return Err(Error::invalid_parameter(
                "top_k",
                format!("must be between 1 and {IMAGE_VOCAB_COUNT}"),
            ));
        }

        if !(self.temperature.is_finite() && self.temperature > 0.0) {
            return Err(Error::invalid_parameter(
                "temperature",
                "must be a positive number",
            ));
        }

        if !self.supercondition_factor.is_finite() {
            return Err(Error::invalid_parameter(
                "supercondition_factor",
                "must be a finite number",
            ));
        }

        Ok(())
    }

    /// Number of samples in one call.
    #[must_use]
    pub fn sample_count(&self) -> usize {
        (self.grid_size * self.grid_size) as usize
    }

    fn sampling(&self) -> SamplingSettings {
        SamplingSettings {
            temperature: self.temperature,
            top_k: self.top_k,
            supercondition_factor: self.supercondition_factor,
        }
    }

    fn rng(&self) -> StdRng {
        u64::try_from(self.seed).map_or_else(|_| StdRng::from_os_rng(), StdRng::seed_from_u64)
    }
}

/// Something that turns a prompt into pixels.
pub trait ImageGenerator {
    /// Produce one image, a grid of samples when `grid_size > 1`.
    ///
    /// # Errors
    ///
    /// Returns an error if the model is unavailable, misconfigured or fails.
    fn generate(&mut self, config: &GenerationConfig) -> Result<RgbImage>;
}

/// Generator backed by the DALL·E Mini ONNX export.
///
/// Models are loaded for every call and dropped afterwards.
#[derive(Debug, Default, Clone, Copy)]
pub struct DalleGenerator {
    /// Hide the per-token progress bar.
    pub quiet: bool,
}

impl DalleGenerator {
    /// Create a generator.
    #[must_use]
    pub const fn new(quiet: bool) -> Self {
        Self { quiet }
    }
}

impl ImageGenerator for DalleGenerator {
    fn generate(&mut self, config: &GenerationConfig) -> Result<RgbImage> {
        config.validate()?;

        let mut model = DalleModel::load(config)?;
        model.generate_image(config, self.quiet)
    }
}

/// Loaded sessions and tokenizer for one variant.
struct DalleModel {
    variant: Variant,
    tokenizer: TextTokenizer,
    encoder: Session,
    decoder: Session,
    detokenizer: Session,
}

impl DalleModel {
    fn load(config: &GenerationConfig) -> Result<Self> {
        check_precision(config.precision)?;

        let store = ModelStore::new(&config.models_root, config.variant, config.precision);
        store.ensure_complete()?;

        tracing::info!(
            "Loading {:?} model ({:?} precision) from {}",
            config.variant,
            config.precision,
            store.root().display()
        );

        let tokenizer = TextTokenizer::load(
            store.get_model_path(ModelFile::Vocab)?,
            store.get_model_path(ModelFile::Merges)?,
        )?;

        tracing::info!("Loading encoder...");
        let encoder = store.load_session(ModelFile::Encoder)?;

        tracing::info!("Loading decoder...");
        let decoder = store.load_session(ModelFile::Decoder)?;

        tracing::info!("Loading detokenizer...");
        let detokenizer = store.load_session(ModelFile::Detokenizer)?;

        Ok(Self {
            variant: config.variant,
            tokenizer,
            encoder,
            decoder,
            detokenizer,
        })
    }

    fn generate_image(&mut self, config: &GenerationConfig, quiet: bool) -> Result<RgbImage> {
        let count = config.sample_count();

        let tokens = self.tokenizer.tokenize(&config.prompt);
        tracing::debug!("Text tokens: {tokens:?}");

        // Rows 0..count are unconditioned, count..2*count carry the prompt.
        let unconditioned = self.tokenizer.pad(&self.tokenizer.unconditioned());
        let conditioned = self.tokenizer.pad(&tokens);
        let text_tokens = Array2::from_shape_fn((2 * count, TEXT_TOKEN_COUNT), |(row, col)| {
            if row < count {
                unconditioned[col]
            } else {
                conditioned[col]
            }
        });
        let pad = self.tokenizer.pad_token();
        let attention_mask = text_tokens.mapv(|t| i64::from(t != pad));

        tracing::info!("Encoding text...");
        let encoder_state = bart::encode(&mut self.encoder, &text_tokens)?;

        tracing::info!("Sampling {count} image(s)...");
        let image_tokens = self.sample_tokens(config, &attention_mask, &encoder_state, quiet)?;

        tracing::info!("Detokenizing...");
        let samples = vqgan::detokenize(&mut self.detokenizer, &image_tokens)?;

        vqgan::tile_grid(&samples, config.grid_size)
    }

    /// Run the autoregressive decoder loop.
    #[allow(clippy::cast_possible_wrap)]
    fn sample_tokens(
        &mut self,
        config: &GenerationConfig,
        attention_mask: &Array2<i64>,
        encoder_state: &bart::EncoderState,
        quiet: bool,
    ) -> Result<Array2<i64>> {
        let count = config.sample_count();
        let settings = config.sampling();
        let mut rng = config.rng();

        let mut attention_state = Array4::<f32>::zeros((
            self.variant.layer_count(),
            4 * count,
            IMAGE_TOKEN_COUNT,
            self.variant.embed_count(),
        ));
        let mut prev_tokens = Array1::from_elem(2 * count, IMAGE_VOCAB_COUNT as i64);
        let mut image_tokens = Array2::<i64>::zeros((count, IMAGE_TOKEN_COUNT));

        let pb = if quiet {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(IMAGE_TOKEN_COUNT as u64)
        };
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} Sampling [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
                .expect("valid template")
                .progress_chars("#>-"),
        );

        for token_index in 0..IMAGE_TOKEN_COUNT {
            let (logits, state) = bart::decode_step(
                &mut self.decoder,
                DecodeStep {
                    attention_mask,
                    encoder_state,
                    attention_state,
                    prev_tokens: &prev_tokens,
                    token_index: token_index as i64,
                },
            )?;
            attention_state = state;

            if logits.nrows() != 2 * count {
                return Err(Error::ShapeMismatch {
                    expected: format!("{} logit rows", 2 * count),
                    actual: logits.nrows().to_string(),
                });
            }

            for sample in 0..count {
                let unconditioned = logits.index_axis(Axis(0), sample);
                let conditioned = logits.index_axis(Axis(0), count + sample);
                let token = sample_token(
                    unconditioned.as_slice().unwrap_or_default(),
                    conditioned.as_slice().unwrap_or_default(),
                    &settings,
                    &mut rng,
                )?;

                image_tokens[[sample, token_index]] = token;
                prev_tokens[sample] = token;
                prev_tokens[count + sample] = token;
            }

            pb.inc(1);
        }

        pb.finish_with_message("Sampling complete");
        Ok(image_tokens)
    }
}

/// Half precision graphs only run on a GPU execution provider.
fn check_precision(precision: Precision) -> Result<()> {
    match precision {
        Precision::Full => Ok(()),
        #[cfg(feature = "cuda")]
        Precision::Half => {
            use ort::execution_providers::CUDAExecutionProvider;

            ort::init()
                .with_execution_providers([CUDAExecutionProvider::default()
                    .build()
                    .error_on_failure()])
                .commit()
                .map_err(|err| Error::InvalidConfiguration {
                    reason: format!("half precision needs the CUDA execution provider: {err}"),
                })?;
            Ok(())
        }
        #[cfg(not(feature = "cuda"))]
        Precision::Half => Err(Error::InvalidConfiguration {
            reason: "half precision needs a GPU execution provider; rebuild with the `cuda` feature"
                .to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(GenerationConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_grid_size() {
        let config = GenerationConfig {
            grid_size: 0,
            ..GenerationConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidParameter { ref name, .. }) if name == "grid_size"
        ));
    }

    #[test]
    fn test_invalid_top_k() {
        for top_k in [0, IMAGE_VOCAB_COUNT + 1] {
            let config = GenerationConfig {
                top_k,
                ..GenerationConfig::default()
            };
            assert!(config.validate().is_err());
        }
    }

    #[test]
    fn test_invalid_temperature() {
        let config = GenerationConfig {
            temperature: 0.0,
            ..GenerationConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_models() {
        let dir = tempfile::tempdir().unwrap();
        let config = GenerationConfig {
            models_root: dir.path().to_path_buf(),
            ..GenerationConfig::default()
        };

        let err = DalleGenerator::new(true).generate(&config).unwrap_err();
        assert!(matches!(err, Error::ModelUnavailable { .. }));
    }

    #[cfg(not(feature = "cuda"))]
    #[test]
    fn test_half_precision_without_gpu() {
        let config = GenerationConfig {
            precision: Precision::Half,
            ..GenerationConfig::default()
        };

        let err = DalleGenerator::new(true).generate(&config).unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration { .. }));
    }

    #[test]
    fn test_seeded_rng_is_stable() {
        use rand::Rng;

        let config = GenerationConfig {
            seed: 5,
            ..GenerationConfig::default()
        };
        let a: u64 = config.rng().random();
        let b: u64 = config.rng().random();
        assert_eq!(a, b);
    }
}
