//! Byte-pair text tokenizer for the BART encoder.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

/// Number of text tokens the encoder accepts.
pub const TEXT_TOKEN_COUNT: usize = 64;

/// Marker prepended to every word before merging (`'Ġ'`).
const WORD_START: char = '\u{0120}';

/// Tokenizer built from a `vocab.json` and `merges.txt` pair.
#[derive(Debug, Clone)]
pub struct TextTokenizer {
    token_from_subword: HashMap<String, i64>,
    rank_from_pair: HashMap<(String, String), usize>,
    bos: i64,
    eos: i64,
    pad: i64,
    unk: i64,
}

impl TextTokenizer {
    /// Load a tokenizer from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if either file is unreadable or malformed.
    pub fn load<P: AsRef<Path>, Q: AsRef<Path>>(vocab_path: P, merges_path: Q) -> Result<Self> {
        let vocab_path = vocab_path.as_ref();
        let merges_path = merges_path.as_ref();

        let vocab_text = fs::read_to_string(vocab_path)?;
        let vocab: HashMap<String, i64> =
            serde_json::from_str(&vocab_text).map_err(|err| Error::Vocabulary {
                path: vocab_path.to_path_buf(),
                reason: err.to_string(),
            })?;

        let merges_text = fs::read_to_string(merges_path)?;
        // First line is the `#version` header.
        let merges = merges_text.lines().skip(1).filter(|line| !line.is_empty());

        Self::from_parts(vocab, merges).map_err(|reason| Error::Vocabulary {
            path: vocab_path.to_path_buf(),
            reason,
        })
    }

    /// Build a tokenizer from an in-memory vocabulary and merge list.
    ///
    /// Merges are ranked by their position in the list.
    pub(crate) fn from_parts<'a, I>(
        vocab: HashMap<String, i64>,
        merges: I,
    ) -> std::result::Result<Self, String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut rank_from_pair = HashMap::new();
        for (rank, line) in merges.into_iter().enumerate() {
            let mut parts = line.split_whitespace();
            match (parts.next(), parts.next()) {
                (Some(a), Some(b)) => {
                    rank_from_pair
                        .entry((a.to_string(), b.to_string()))
                        .or_insert(rank);
                }
                _ => return Err(format!("malformed merge on line {}: {line:?}", rank + 2)),
            }
        }

        let special = |token: &str| {
            vocab
                .get(token)
                .copied()
                .ok_or_else(|| format!("missing special token {token}"))
        };

        Ok(Self {
            bos: special("<s>")?,
            eos: special("</s>")?,
            pad: special("<pad>")?,
            unk: special("<unk>")?,
            token_from_subword: vocab,
            rank_from_pair,
        })
    }

    /// Id used to pad token rows.
    #[must_use]
    pub const fn pad_token(&self) -> i64 {
        self.pad
    }

    /// Tokenize a prompt into `<s> ... </s>`.
    ///
    /// The prompt is lower-cased and stripped of non-ASCII characters before
    /// being split on spaces. The result is truncated to
    /// [`TEXT_TOKEN_COUNT`].
    #[must_use]
    pub fn tokenize(&self, text: &str) -> Vec<i64> {
        let text: String = text
            .to_lowercase()
            .chars()
            .filter(char::is_ascii)
            .collect();

        let mut tokens = vec![self.bos];
        for word in text.split(' ').filter(|word| !word.is_empty()) {
            for subword in self.byte_pair_encoding(word) {
                tokens.push(
                    self.token_from_subword
                        .get(&subword)
                        .copied()
                        .unwrap_or(self.unk),
                );
            }
        }
        tokens.push(self.eos);

        tokens.truncate(TEXT_TOKEN_COUNT);
        tokens
    }

    /// The unconditioned row: just `<s></s>`.
    #[must_use]
    pub fn unconditioned(&self) -> Vec<i64> {
        vec![self.bos, self.eos]
    }

    /// Pad a token list to [`TEXT_TOKEN_COUNT`].
    #[must_use]
    pub fn pad(&self, tokens: &[i64]) -> [i64; TEXT_TOKEN_COUNT] {
        let mut row = [self.pad; TEXT_TOKEN_COUNT];
        for (slot, token) in row.iter_mut().zip(tokens) {
            *slot = *token;
        }
        row
    }

    fn byte_pair_encoding(&self, word: &str) -> Vec<String> {
        let mut subwords: Vec<String> = std::iter::once(WORD_START.to_string())
            .chain(word.chars().map(String::from))
            .collect();

        while subwords.len() > 1 {
            // Lowest rank wins; ties go to the leftmost pair.
            let best = subwords
                .windows(2)
                .enumerate()
                .filter_map(|(i, pair)| {
                    self.rank_from_pair
                        .get(&(pair[0].clone(), pair[1].clone()))
                        .map(|&rank| (rank, i))
                })
                .min();

            let Some((_, i)) = best else {
                break;
            };

            let right = subwords.remove(i + 1);
            subwords[i].push_str(&right);
        }

        tracing::trace!("{word} -> {subwords:?}");
        subwords
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenizer() -> TextTokenizer {
        let vocab: HashMap<String, i64> = [
            ("<s>", 0),
            ("<pad>", 1),
            ("</s>", 2),
            ("<unk>", 3),
            ("Ġcat", 10),
            ("Ġa", 11),
            ("Ġc", 12),
            ("at", 13),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        TextTokenizer::from_parts(vocab, ["a t", "Ġ c", "Ġc at", "Ġ a"]).unwrap()
    }

    #[test]
    fn test_merges_follow_rank() {
        let tok = tokenizer();
        assert_eq!(tok.byte_pair_encoding("cat"), vec!["Ġcat".to_string()]);
    }

    #[test]
    fn test_tokenize_wraps_and_maps() {
        let tok = tokenizer();
        assert_eq!(tok.tokenize("A  Cat"), vec![0, 11, 10, 2]);
    }

    #[test]
    fn test_unknown_subwords() {
        let tok = tokenizer();
        // "dog" has no merges: Ġ, d, o, g all unknown.
        assert_eq!(tok.tokenize("dog"), vec![0, 3, 3, 3, 3, 2]);
    }

    #[test]
    fn test_non_ascii_dropped() {
        let tok = tokenizer();
        assert_eq!(tok.tokenize("cät"), tok.tokenize("ct"));
    }

    #[test]
    fn test_truncated_and_padded() {
        let tok = tokenizer();
        let long = "cat ".repeat(100);
        let tokens = tok.tokenize(&long);
        assert_eq!(tokens.len(), TEXT_TOKEN_COUNT);

        let row = tok.pad(&tok.unconditioned());
        assert_eq!(&row[..3], &[0, 2, 1]);
        assert!(row[2..].iter().all(|&t| t == 1));
    }

    #[test]
    fn test_missing_special_token() {
        let vocab = HashMap::from([("<s>".to_string(), 0)]);
        assert!(TextTokenizer::from_parts(vocab, std::iter::empty()).is_err());
    }

    #[test]
    fn test_load_skips_header() {
        let dir = tempfile::tempdir().unwrap();
        let vocab_path = dir.path().join("vocab.json");
        let merges_path = dir.path().join("merges.txt");
        std::fs::write(
            &vocab_path,
            r#"{"<s>": 0, "<pad>": 1, "</s>": 2, "<unk>": 3, "Ġhi": 7}"#,
        )
        .unwrap();
        std::fs::write(&merges_path, "#version: 0.2\nh i\nĠ hi\n").unwrap();

        let tok = TextTokenizer::load(&vocab_path, &merges_path).unwrap();
        assert_eq!(tok.tokenize("hi"), vec![0, 7, 2]);
    }
}
