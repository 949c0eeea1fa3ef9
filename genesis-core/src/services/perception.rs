//! services/perception.rs
//!
//! Input side of the pipeline: reading raw text, tokenizing it, summarizing it
//! for storage, and turning it into a numeric embedding.

use anyhow::Result;
use std::fs;
use std::path::Path;

use crate::error::InputError;

/// Produces a fixed-length numeric embedding for a piece of text.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Deterministic signed feature hashing over preprocessed tokens.
///
/// Each token lands in bucket `blake3(token) mod dim` with a sign taken from
/// the hash, and the vector is scaled by the token count. Same text, same
/// vector, on every platform.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dim: usize,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(768)
    }
}

impl Embedder for HashingEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut out = vec![0.0f32; self.dim];
        if self.dim == 0 {
            return Ok(out);
        }
        let tokens = preprocess_text(text);
        for tok in &tokens {
            let hash = blake3::hash(tok.as_bytes());
            let bytes = hash.as_bytes();
            let mut idx_bytes = [0u8; 8];
            idx_bytes.copy_from_slice(&bytes[..8]);
            let idx = (u64::from_le_bytes(idx_bytes) % self.dim as u64) as usize;
            let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
            out[idx] += sign;
        }
        if !tokens.is_empty() {
            let scale = 1.0 / tokens.len() as f32;
            out.iter_mut().for_each(|v| *v *= scale);
        }
        Ok(out)
    }
}

/// Lowercase, drop punctuation, split on whitespace.
pub fn preprocess_text(text: &str) -> Vec<String> {
    text.to_lowercase()
        .chars()
        .filter(|c| !c.is_ascii_punctuation())
        .collect::<String>()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// First `max_chars` characters, with `...` appended when anything was cut.
pub fn summarize_input(raw: &str, max_chars: usize) -> String {
    match raw.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &raw[..cut]),
        None => raw.to_string(),
    }
}

pub fn read_input(path: &Path) -> Result<String, InputError> {
    let text = fs::read_to_string(path).map_err(|source| InputError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(path = %path.display(), chars = text.chars().count(), "input ingested");
    Ok(text)
}

/// Parse a multi-modal shape written as `3x224x224` (also `3,224,224`).
pub fn parse_shape(text: &str) -> Result<Vec<usize>, InputError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(InputError::InvalidShape(text.to_string()));
    }
    trimmed
        .split(|c| c == 'x' || c == 'X' || c == ',')
        .map(|part| {
            part.trim()
                .parse::<usize>()
                .map_err(|_| InputError::InvalidShape(text.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preprocess_strips_punctuation_and_case() {
        assert_eq!(
            preprocess_text("Hello, World!  Rust's   great."),
            vec!["hello", "world", "rusts", "great"]
        );
        assert!(preprocess_text("  ...  ").is_empty());
    }

    #[test]
    fn summary_truncates_on_char_boundaries() {
        let short = "short text";
        assert_eq!(summarize_input(short, 100), short);

        let exact: String = "a".repeat(100);
        assert_eq!(summarize_input(&exact, 100), exact);

        let long: String = "é".repeat(101);
        let s = summarize_input(&long, 100);
        assert!(s.ends_with("..."));
        assert_eq!(s.chars().count(), 103);
    }

    #[test]
    fn hashing_embedder_is_deterministic() {
        let e = HashingEmbedder::new(64);
        let a = e.embed("The quick brown fox").unwrap();
        let b = e.embed("the quick, brown fox!").unwrap();
        assert_eq!(a.len(), 64);
        assert_eq!(a, b);
        assert!(a.iter().all(|v| v.is_finite()));
        assert!(e.embed("").unwrap().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn shapes_parse_or_fail_loudly() {
        assert_eq!(parse_shape("3x224x224").unwrap(), vec![3, 224, 224]);
        assert_eq!(parse_shape("100,5").unwrap(), vec![100, 5]);
        assert!(parse_shape("").is_err());
        assert!(parse_shape("3xfoo").is_err());
    }

    #[test]
    fn missing_input_file_is_an_input_error() {
        let err = read_input(Path::new("/definitely/not/here.txt")).unwrap_err();
        assert!(matches!(err, InputError::Unreadable { .. }));
    }
}
