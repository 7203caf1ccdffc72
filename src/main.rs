//! `dallify` CLI - generate or decorate images with DALL·E Mini.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dallify::image::{
    DEFAULT_DECORATION_OPACITY, DEFAULT_PREVIEW_WIDTH, DEFAULT_UPSCALE_FACTOR, MAX_UPSCALE_FACTOR,
    PostProcessConfig,
};
use dallify::model::{Precision, Variant};
use dallify::pipeline::{DEFAULT_PROMPT, DEFAULT_TOP_K, MAX_GRID_SIZE};
use dallify::{DalleGenerator, GenerationConfig, Options};

/// Generate an image from text, or decorate an existing image with one.
#[derive(Parser, Debug)]
#[command(name = "dallify")]
#[command(version, about, long_about = None)]
struct Args {
    /// Use the mega model.
    #[arg(long, overrides_with = "no_mega")]
    mega: bool,

    /// Use the mini model (default).
    #[arg(long = "no-mega", overrides_with = "mega")]
    no_mega: bool,

    /// Run the half precision graphs.
    #[arg(long)]
    fp16: bool,

    /// Text prompt.
    #[arg(long, default_value = DEFAULT_PROMPT, value_name = "TEXT")]
    text: String,

    /// Random seed; negative picks one at random.
    #[arg(long, default_value_t = -1, allow_negative_numbers = true, value_name = "INT")]
    seed: i64,

    /// Samples per side of the output grid (1-8).
    #[arg(
        long,
        default_value_t = 1,
        value_name = "INT",
        value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_GRID_SIZE)),
    )]
    grid_size: u32,

    /// Output image path. Directories get `generated.png`, other paths `.png`.
    #[arg(long, default_value = "generated", value_name = "PATH")]
    image_path: PathBuf,

    /// Directory holding the model files.
    #[arg(long, default_value = "our_model", value_name = "PATH")]
    models_root: PathBuf,

    /// Number of candidate tokens kept while sampling.
    #[arg(long = "top_k", alias = "top-k", default_value_t = DEFAULT_TOP_K, value_name = "INT")]
    top_k: usize,

    /// Sampling temperature.
    #[arg(long, default_value_t = 1.0, value_name = "FLOAT")]
    temperature: f32,

    /// Weight of the prompt over the unconditioned prediction.
    #[arg(long, default_value_t = 16.0, value_name = "FLOAT")]
    supercondition_factor: f32,

    /// Base image to decorate instead of generating from scratch.
    #[arg(long, value_name = "PATH")]
    input_image: Option<PathBuf>,

    /// Where the decoration is saved when decorating.
    #[arg(long, default_value = dallify::app::DEFAULT_DECORATION_PATH, value_name = "PATH")]
    decoration_path: PathBuf,

    /// Scale applied to the decoration's alpha (0.0-1.0).
    #[arg(long, default_value_t = DEFAULT_DECORATION_OPACITY, value_name = "FLOAT")]
    decoration_opacity: f32,

    /// Upscale the final image.
    #[arg(long)]
    upscale: bool,

    /// Resize factor used with --upscale (1-16).
    #[arg(
        long,
        default_value_t = DEFAULT_UPSCALE_FACTOR,
        value_name = "INT",
        value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_UPSCALE_FACTOR)),
    )]
    upscale_factor: u32,

    /// Sharpness factor; 1.0 leaves the image unchanged.
    #[arg(long, default_value_t = 1.0, value_name = "FLOAT")]
    sharpness: f32,

    /// Contrast factor; 1.0 leaves the image unchanged.
    #[arg(long, default_value_t = 1.0, value_name = "FLOAT")]
    contrast: f32,

    /// Width of the ASCII preview in characters.
    #[arg(long, default_value_t = DEFAULT_PREVIEW_WIDTH, value_name = "INT")]
    preview_width: u32,

    /// Do not print the ASCII preview.
    #[arg(long)]
    no_preview: bool,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn options(&self) -> Options {
        let generation = GenerationConfig {
            variant: if self.mega && !self.no_mega {
                Variant::Mega
            } else {
                Variant::Mini
            },
            precision: if self.fp16 {
                Precision::Half
            } else {
                Precision::Full
            },
            prompt: self.text.clone(),
            seed: self.seed,
            grid_size: self.grid_size,
            top_k: self.top_k,
            temperature: self.temperature,
            supercondition_factor: self.supercondition_factor,
            models_root: self.models_root.clone(),
        };

        Options {
            generation,
            input_image: self.input_image.clone(),
            image_path: self.image_path.clone(),
            decoration_path: self.decoration_path.clone(),
            decoration_opacity: self.decoration_opacity,
            post: PostProcessConfig {
                upscale_factor: if self.upscale { self.upscale_factor } else { 1 },
                sharpness: self.sharpness,
                contrast: self.contrast,
            },
            preview_width: (!self.no_preview).then_some(self.preview_width),
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logging; stdout is reserved for the preview.
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("dallify={log_level}").into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    if let Err(err) = run(&args) {
        tracing::error!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn run(args: &Args) -> Result<()> {
    tracing::debug!("{args:?}");

    let options = args.options();
    let mut generator = DalleGenerator::new(false);

    let outcome = dallify::run(&mut generator, &options).context("Failed to produce image")?;

    if let Some(preview) = &outcome.preview {
        println!("{preview}");
    }

    tracing::info!("Wrote {}", outcome.output_path.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["dallify"]).unwrap();
        let options = args.options();

        assert_eq!(options.generation.variant, Variant::Mini);
        assert_eq!(options.generation.seed, -1);
        assert_eq!(options.generation.top_k, 256);
        assert_eq!(options.image_path, PathBuf::from("generated"));
        assert_eq!(options.post, PostProcessConfig::default());
        assert_eq!(options.preview_width, Some(128));
        assert!(options.input_image.is_none());
    }

    #[test]
    fn test_last_mega_flag_wins() {
        let args = Args::try_parse_from(["dallify", "--mega", "--no-mega"]).unwrap();
        assert_eq!(args.options().generation.variant, Variant::Mini);

        let args = Args::try_parse_from(["dallify", "--no-mega", "--mega"]).unwrap();
        assert_eq!(args.options().generation.variant, Variant::Mega);
    }

    #[test]
    fn test_flags_map_to_options() {
        let args = Args::try_parse_from([
            "dallify",
            "--fp16",
            "--seed",
            "-7",
            "--top_k",
            "64",
            "--grid-size",
            "3",
            "--upscale",
            "--sharpness",
            "1.5",
            "--input-image",
            "base.png",
            "--no-preview",
        ])
        .unwrap();
        let options = args.options();

        assert_eq!(options.generation.precision, Precision::Half);
        assert_eq!(options.generation.seed, -7);
        assert_eq!(options.generation.top_k, 64);
        assert_eq!(options.generation.grid_size, 3);
        assert_eq!(options.post.upscale_factor, 2);
        assert!((options.post.sharpness - 1.5).abs() < f32::EPSILON);
        assert_eq!(options.input_image, Some(PathBuf::from("base.png")));
        assert_eq!(options.preview_width, None);
    }

    #[test]
    fn test_grid_size_limit() {
        assert!(Args::try_parse_from(["dallify", "--grid-size", "9"]).is_err());
        assert!(Args::try_parse_from(["dallify", "--grid-size", "0"]).is_err());

        let args = Args::try_parse_from(["dallify", "--grid-size", "8"]).unwrap();
        assert_eq!(args.grid_size, MAX_GRID_SIZE);

        let help = Args::command().render_help().to_string();
        assert!(help.contains("(1-8)"));
    }

    #[test]
    fn test_upscale_factor_limit() {
        let huge = Args::try_parse_from(["dallify", "--upscale", "--upscale-factor", "20000000"]);
        assert!(huge.is_err());

        let args =
            Args::try_parse_from(["dallify", "--upscale", "--upscale-factor", "16"]).unwrap();
        assert_eq!(args.options().post.upscale_factor, MAX_UPSCALE_FACTOR);
    }

    #[test]
    fn test_top_k_alias() {
        let args = Args::try_parse_from(["dallify", "--top-k", "32"]).unwrap();
        assert_eq!(args.top_k, 32);
    }
}
