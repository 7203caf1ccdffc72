//! Model files, variants and the text tokenizer.

mod loader;
mod tokenizer;

pub use loader::{ModelFile, ModelStore};
pub use tokenizer::{TextTokenizer, TEXT_TOKEN_COUNT};

/// Size of the BART model driving generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Variant {
    /// DALL·E Mini.
    #[default]
    Mini,
    /// DALL·E Mega.
    Mega,
}

impl Variant {
    /// Directory below the models root holding this variant's files.
    #[must_use]
    pub const fn directory(&self) -> &'static str {
        match self {
            Self::Mini => "dalle_bart_mini",
            Self::Mega => "dalle_bart_mega",
        }
    }

    /// Number of decoder layers.
    #[must_use]
    pub const fn layer_count(&self) -> usize {
        match self {
            Self::Mini => 12,
            Self::Mega => 24,
        }
    }

    /// Width of the hidden state.
    #[must_use]
    pub const fn embed_count(&self) -> usize {
        match self {
            Self::Mini => 1024,
            Self::Mega => 2048,
        }
    }
}

/// Numeric precision of the exported graphs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Precision {
    /// `float32` weights.
    #[default]
    Full,
    /// `float16` weights, float32 inputs and outputs.
    Half,
}

impl Precision {
    /// Suffix appended to graph file stems.
    #[must_use]
    pub const fn file_suffix(&self) -> &'static str {
        match self {
            Self::Full => "",
            Self::Half => "_fp16",
        }
    }
}
