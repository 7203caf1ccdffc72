//! Model file resolution and session loading.

use std::path::{Path, PathBuf};

use ort::session::Session;

use crate::error::{Error, Result};

use super::{Precision, Variant};

/// Files making up one model variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFile {
    /// BART encoder - encodes text tokens.
    Encoder,
    /// BART decoder - predicts the next image token.
    Decoder,
    /// VQGAN detokenizer - turns image tokens into pixels.
    Detokenizer,
    /// Tokenizer vocabulary.
    Vocab,
    /// Tokenizer merge ranks.
    Merges,
}

impl ModelFile {
    /// Every file a variant needs, in loading order.
    pub const ALL: [Self; 5] = [
        Self::Vocab,
        Self::Merges,
        Self::Encoder,
        Self::Decoder,
        Self::Detokenizer,
    ];

    /// Get the filename for this file at the given precision.
    #[must_use]
    pub fn filename(&self, precision: Precision) -> String {
        let suffix = precision.file_suffix();
        match self {
            Self::Encoder => format!("encoder{suffix}.onnx"),
            Self::Decoder => format!("decoder{suffix}.onnx"),
            Self::Detokenizer => format!("detoker{suffix}.onnx"),
            Self::Vocab => "vocab.json".to_string(),
            Self::Merges => "merges.txt".to_string(),
        }
    }

    /// Whether this file is shared by every variant.
    #[must_use]
    pub const fn is_shared(&self) -> bool {
        matches!(self, Self::Detokenizer)
    }
}

/// Resolves model files below a models root.
///
/// Layout:
/// - `<root>/dalle_bart_mini/` or `<root>/dalle_bart_mega/` holds the
///   tokenizer files and the BART encoder/decoder
/// - `<root>/vqgan/` holds the detokenizer
#[derive(Debug, Clone)]
pub struct ModelStore {
    root: PathBuf,
    variant: Variant,
    precision: Precision,
}

impl ModelStore {
    /// Create a store for one variant and precision.
    pub fn new<P: AsRef<Path>>(root: P, variant: Variant, precision: Precision) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            variant,
            precision,
        }
    }

    /// The models root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where a file is expected, whether or not it exists.
    #[must_use]
    pub fn expected_path(&self, file: ModelFile) -> PathBuf {
        let dir = if file.is_shared() {
            self.root.join("vqgan")
        } else {
            self.root.join(self.variant.directory())
        };
        dir.join(file.filename(self.precision))
    }

    /// Get the path to a model file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ModelUnavailable`] if the file is missing.
    pub fn get_model_path(&self, file: ModelFile) -> Result<PathBuf> {
        let path = self.expected_path(file);
        if !path.is_file() {
            return Err(Error::ModelUnavailable {
                name: file.filename(self.precision),
                path,
            });
        }
        Ok(path)
    }

    /// Check that every file is present before anything heavy is loaded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ModelUnavailable`] for the first missing file.
    pub fn ensure_complete(&self) -> Result<()> {
        for file in ModelFile::ALL {
            self.get_model_path(file)?;
        }
        Ok(())
    }

    /// Load an ONNX model session.
    ///
    /// # Errors
    ///
    /// Returns an error if the model is missing or cannot be loaded.
    pub fn load_session(&self, file: ModelFile) -> Result<Session> {
        let path = self.get_model_path(file)?;
        let name = file.filename(self.precision);

        tracing::debug!("Opening session for {}", path.display());

        Session::builder()
            .map_err(|source| Error::ModelLoad {
                name: name.clone(),
                source,
            })?
            .commit_from_file(&path)
            .map_err(|source| Error::ModelLoad { name, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_layout() {
        let store = ModelStore::new("models", Variant::Mega, Precision::Full);

        assert_eq!(
            store.expected_path(ModelFile::Encoder),
            Path::new("models/dalle_bart_mega/encoder.onnx")
        );
        assert_eq!(
            store.expected_path(ModelFile::Detokenizer),
            Path::new("models/vqgan/detoker.onnx")
        );
    }

    #[test]
    fn test_half_precision_filenames() {
        let store = ModelStore::new("models", Variant::Mini, Precision::Half);

        assert_eq!(
            store.expected_path(ModelFile::Decoder),
            Path::new("models/dalle_bart_mini/decoder_fp16.onnx")
        );
        assert_eq!(
            store.expected_path(ModelFile::Vocab),
            Path::new("models/dalle_bart_mini/vocab.json")
        );
    }

    #[test]
    fn test_missing_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path(), Variant::Mini, Precision::Full);

        match store.ensure_complete() {
            Err(Error::ModelUnavailable { name, path }) => {
                assert_eq!(name, "vocab.json");
                assert!(path.starts_with(dir.path()));
            }
            other => panic!("expected ModelUnavailable, got {other:?}"),
        }
    }

    #[test]
    fn test_present_file_resolves() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path(), Variant::Mini, Precision::Full);
        let vocab = store.expected_path(ModelFile::Vocab);
        std::fs::create_dir_all(vocab.parent().unwrap()).unwrap();
        std::fs::write(&vocab, "{}").unwrap();

        assert_eq!(store.get_model_path(ModelFile::Vocab).unwrap(), vocab);
        assert!(store.get_model_path(ModelFile::Merges).is_err());
    }
}
