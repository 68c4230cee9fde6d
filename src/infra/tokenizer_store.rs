// ============================================================
// Layer 6 — Tokenizer Store
// ============================================================
// Loads `tokenizer.json` from a model directory, copies it next
// to fine-tuned weights, and (for `init`) builds a word-level
// tokenizer from the dataset's questions and answers.
//
// The built tokenizer is written in HuggingFace JSON format and
// loaded back, so pretrained and scaffolded directories share
// one code path.
//
// Reference: HuggingFace tokenizers JSON format

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tokenizers::normalizers::bert::BertNormalizer;
use tokenizers::pre_tokenizers::whitespace::Whitespace;
use tokenizers::{
    NormalizedString, Normalizer, OffsetReferential, OffsetType, PreTokenizedString,
    PreTokenizer, Tokenizer,
};

use crate::domain::error::{Result, VqaError};

pub const TOKENIZER_FILE: &str = "tokenizer.json";

const SPECIAL_TOKENS: [&str; 5] = ["[PAD]", "[UNK]", "[CLS]", "[SEP]", "[MASK]"];

pub struct TokenizerStore {
    dir: PathBuf,
}

impl TokenizerStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self { dir: dir.as_ref().to_path_buf() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(TOKENIZER_FILE)
    }

    /// Load the tokenizer saved in this directory.
    pub fn load(&self) -> Result<Tokenizer> {
        let path = self.path();
        if !path.exists() {
            return Err(VqaError::ConfigurationMissing { path });
        }
        Tokenizer::from_file(&path).map_err(|e| {
            VqaError::Tokenizer(format!("cannot load '{}': {e}", path.display()))
        })
    }

    /// Copy this directory's tokenizer into `target_dir`.
    pub fn copy_to(&self, target_dir: &Path) -> Result<()> {
        let source = self.path();
        let target = target_dir.join(TOKENIZER_FILE);
        if source != target {
            fs::create_dir_all(target_dir)?;
            fs::copy(&source, &target)?;
        }
        Ok(())
    }

    /// Build a word-level vocabulary from `texts`, keeping the
    /// `vocab_size - 5` most frequent words, and save it here.
    pub fn build_and_save(&self, texts: &[String], vocab_size: usize) -> Result<Tokenizer> {
        fs::create_dir_all(&self.dir)?;

        // ── Step 1: Word frequencies ──────────────────────────────────────────
        // Counted over the same pieces the saved tokenizer produces.
        let normalizer    = BertNormalizer::new(true, true, None, true);
        let pre_tokenizer = Whitespace::default();

        let mut freq: HashMap<String, usize> = HashMap::new();
        for text in texts {
            for word in split_words(text, &normalizer, &pre_tokenizer)? {
                *freq.entry(word).or_insert(0) += 1;
            }
        }

        // Most frequent first; ties broken alphabetically so builds are stable
        let mut words: Vec<(String, usize)> = freq.into_iter().collect();
        words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        words.truncate(vocab_size.saturating_sub(SPECIAL_TOKENS.len()));

        // ── Step 2: Contiguous ids, specials first ────────────────────────────
        let mut vocab = serde_json::Map::new();
        for (id, token) in SPECIAL_TOKENS.iter().enumerate() {
            vocab.insert(token.to_string(), serde_json::json!(id));
        }
        for (word, _) in &words {
            let next_id = vocab.len();
            vocab.entry(word.clone()).or_insert_with(|| serde_json::json!(next_id));
        }

        let added_tokens: Vec<serde_json::Value> = SPECIAL_TOKENS
            .iter()
            .enumerate()
            .map(|(id, token)| serde_json::json!({
                "id": id, "content": token, "single_word": false, "lstrip": false,
                "rstrip": false, "normalized": false, "special": true
            }))
            .collect();

        // ── Step 3: HuggingFace tokenizer JSON ────────────────────────────────
        let tokenizer_json = serde_json::json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": added_tokens,
            "normalizer": serde_json::to_value(&normalizer)?,
            "pre_tokenizer": serde_json::to_value(&pre_tokenizer)?,
            "post_processor": null,
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": vocab,
                "unk_token": "[UNK]"
            }
        });

        let path = self.path();
        fs::write(&path, serde_json::to_string_pretty(&tokenizer_json)?)?;
        tracing::info!(
            "Tokenizer built with {} tokens, saved to '{}'",
            words.len() + SPECIAL_TOKENS.len(),
            path.display()
        );

        self.load()
    }
}

/// Normalise then pre-tokenise `text` into vocabulary pieces.
fn split_words(
    text:          &str,
    normalizer:    &BertNormalizer,
    pre_tokenizer: &Whitespace,
) -> Result<Vec<String>> {
    let to_err = |e: tokenizers::Error| VqaError::Tokenizer(e.to_string());

    let mut normalized = NormalizedString::from(text);
    normalizer.normalize(&mut normalized).map_err(to_err)?;
    let mut pieces = PreTokenizedString::from(normalized);
    pre_tokenizer.pre_tokenize(&mut pieces).map_err(to_err)?;

    Ok(pieces
        .get_splits(OffsetReferential::Original, OffsetType::Byte)
        .into_iter()
        .map(|(piece, _, _)| piece.to_string())
        .filter(|piece| !piece.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_assigns_contiguous_ids() {
        let dir   = tempfile::tempdir().unwrap();
        let store = TokenizerStore::new(dir.path());
        let tok   = store
            .build_and_save(&["Liver liver lung?".to_string()], 100)
            .unwrap();

        // liver ×2, then the ties "?" and "lung" alphabetically
        assert_eq!(tok.get_vocab_size(true), 8);
        assert_eq!(tok.token_to_id("[PAD]"), Some(0));
        assert_eq!(tok.token_to_id("liver"), Some(5));
        assert_eq!(tok.token_to_id("?"), Some(6));
        assert_eq!(tok.token_to_id("lung"), Some(7));
    }

    #[test]
    fn test_hyphenated_training_words_stay_encodable() {
        let dir   = tempfile::tempdir().unwrap();
        let store = TokenizerStore::new(dir.path());
        let tok   = store
            .build_and_save(&["Is this an X-ray of a T2-weighted scan?".to_string()], 100)
            .unwrap();

        assert_eq!(tok.token_to_id("x-ray"), None);
        let enc = tok.encode("is this an x-ray", false).unwrap();
        assert_eq!(enc.get_tokens(), &["is", "this", "an", "x", "-", "ray"]);
        assert!(!enc.get_ids().contains(&1));

        let enc = tok.encode("t2-weighted scan?", false).unwrap();
        assert!(!enc.get_ids().contains(&1));
    }

    #[test]
    fn test_vocab_size_caps_words() {
        let dir   = tempfile::tempdir().unwrap();
        let store = TokenizerStore::new(dir.path());
        let tok   = store
            .build_and_save(&["a b c d e f g".to_string()], 8)
            .unwrap();
        assert_eq!(tok.get_vocab_size(true), 8);
    }

    #[test]
    fn test_unknown_words_map_to_unk() {
        let dir   = tempfile::tempdir().unwrap();
        let store = TokenizerStore::new(dir.path());
        let tok   = store.build_and_save(&["yes no".to_string()], 20).unwrap();

        let enc = tok.encode("maybe", true).unwrap();
        assert_eq!(enc.get_ids(), &[1]);
    }

    #[test]
    fn test_load_missing_tokenizer() {
        let dir = tempfile::tempdir().unwrap();
        let err = TokenizerStore::new(dir.path()).load().unwrap_err();
        assert!(matches!(err, VqaError::ConfigurationMissing { .. }));
    }

    #[test]
    fn test_copy_to_other_directory() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        let store = TokenizerStore::new(src.path());
        store.build_and_save(&["yes".to_string()], 10).unwrap();

        store.copy_to(dst.path()).unwrap();
        assert!(TokenizerStore::new(dst.path()).load().is_ok());
    }
}
