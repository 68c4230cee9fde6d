// ============================================================
// Layer 4 — VQA Processor
// ============================================================
// Turns raw text and image files into fixed-size model inputs:
//
//   question → token ids + attention mask, padded/truncated
//              to max_question_len
//   answer   → label ids, padded/truncated to max_answer_len
//   image    → RGB, resized to image_size², rescaled to [0, 1],
//              normalised per channel, laid out channel-first
//
// The normalisation constants are the CLIP statistics BLIP's
// image processor ships with.
//
// Reference: Li et al. (2022) BLIP
//            image crate documentation (imageops::FilterType)

use std::path::Path;

use image::imageops::FilterType;
use tokenizers::Tokenizer;

use crate::domain::error::{Result, VqaError};

pub const IMAGE_MEAN: [f32; 3] = [0.481_454_66, 0.457_827_5, 0.408_210_73];
pub const IMAGE_STD:  [f32; 3] = [0.268_629_54, 0.261_302_58, 0.275_777_11];

pub struct VqaProcessor {
    tokenizer:        Tokenizer,
    image_size:       usize,
    max_question_len: usize,
    max_answer_len:   usize,
    pad_id:           u32,
}

impl VqaProcessor {
    pub fn new(
        tokenizer:        Tokenizer,
        image_size:       usize,
        max_question_len: usize,
        max_answer_len:   usize,
    ) -> Self {
        let pad_id = tokenizer.token_to_id("[PAD]").unwrap_or(0);
        Self { tokenizer, image_size, max_question_len, max_answer_len, pad_id }
    }

    pub fn image_size(&self) -> usize { self.image_size }

    /// Question ids and attention mask, both of length max_question_len.
    /// At least one position is always attended.
    pub fn encode_question(&self, question: &str) -> Result<(Vec<u32>, Vec<u32>)> {
        let mut ids = self.token_ids(question)?;
        if ids.is_empty() {
            ids.push(self.pad_id);
        }
        ids.truncate(self.max_question_len);

        let mut mask = vec![1u32; ids.len()];
        ids.resize(self.max_question_len, self.pad_id);
        mask.resize(self.max_question_len, 0);
        Ok((ids, mask))
    }

    /// Answer label ids of length max_answer_len.
    pub fn encode_answer(&self, answer: &str) -> Result<Vec<u32>> {
        let mut ids = self.token_ids(answer)?;
        ids.truncate(self.max_answer_len);
        ids.resize(self.max_answer_len, self.pad_id);
        Ok(ids)
    }

    /// Normalised pixels in [channel, row, column] order.
    pub fn load_image(&self, path: &Path) -> Result<Vec<f32>> {
        if !path.exists() {
            return Err(VqaError::MissingFile { path: path.to_path_buf() });
        }

        let side = self.image_size as u32;
        let rgb  = image::open(path)
            .map_err(|source| VqaError::Image { path: path.to_path_buf(), source })?
            .resize_exact(side, side, FilterType::CatmullRom)
            .to_rgb8();

        let plane      = self.image_size * self.image_size;
        let mut pixels = vec![0.0f32; 3 * plane];
        for (x, y, px) in rgb.enumerate_pixels() {
            let offset = y as usize * self.image_size + x as usize;
            for c in 0..3 {
                let value = px.0[c] as f32 / 255.0;
                pixels[c * plane + offset] = (value - IMAGE_MEAN[c]) / IMAGE_STD[c];
            }
        }
        Ok(pixels)
    }

    fn token_ids(&self, text: &str) -> Result<Vec<u32>> {
        let enc = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| VqaError::Tokenizer(e.to_string()))?;
        Ok(enc.get_ids().to_vec())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::infra::tokenizer_store::TokenizerStore;

    /// Small word-level tokenizer built the same way `init` builds one.
    pub(crate) fn test_tokenizer(dir: &Path) -> Tokenizer {
        let corpus = vec![
            "is there a fracture in the left femur".to_string(),
            "yes no liver lung kidney".to_string(),
        ];
        TokenizerStore::new(dir).build_and_save(&corpus, 64).unwrap()
    }

    pub(crate) fn write_png(path: &Path, side: u32, rgb: [u8; 3]) {
        image::RgbImage::from_pixel(side, side, image::Rgb(rgb))
            .save(path)
            .unwrap();
    }

    fn processor(dir: &Path) -> VqaProcessor {
        VqaProcessor::new(test_tokenizer(dir), 4, 6, 3)
    }

    #[test]
    fn test_question_is_padded_with_mask() {
        let dir = tempfile::tempdir().unwrap();
        let p   = processor(dir.path());

        let (ids, mask) = p.encode_question("is there a fracture").unwrap();
        assert_eq!(ids.len(), 6);
        assert_eq!(mask, vec![1, 1, 1, 1, 0, 0]);
        assert_eq!(&ids[4..], &[0, 0]);
    }

    #[test]
    fn test_long_question_is_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let p   = processor(dir.path());

        let (ids, mask) = p.encode_question("is there a fracture in the left femur").unwrap();
        assert_eq!(ids.len(), 6);
        assert!(mask.iter().all(|&m| m == 1));
    }

    #[test]
    fn test_empty_question_keeps_one_attended_position() {
        let dir = tempfile::tempdir().unwrap();
        let p   = processor(dir.path());

        let (_, mask) = p.encode_question("").unwrap();
        assert_eq!(mask[0], 1);
        assert_eq!(mask.iter().sum::<u32>(), 1);
    }

    #[test]
    fn test_answer_has_fixed_length() {
        let dir = tempfile::tempdir().unwrap();
        let p   = processor(dir.path());

        assert_eq!(p.encode_answer("liver").unwrap().len(), 3);
        assert_eq!(p.encode_answer("yes no liver lung kidney").unwrap().len(), 3);
    }

    #[test]
    fn test_image_is_normalised_channel_first() {
        let dir  = tempfile::tempdir().unwrap();
        let p    = processor(dir.path());
        let path = dir.path().join("white.png");
        write_png(&path, 9, [255, 255, 255]);

        let pixels = p.load_image(&path).unwrap();
        assert_eq!(pixels.len(), 3 * 4 * 4);
        for c in 0..3 {
            let expected = (1.0 - IMAGE_MEAN[c]) / IMAGE_STD[c];
            assert!((pixels[c * 16] - expected).abs() < 1e-4);
        }
    }

    #[test]
    fn test_missing_image_is_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let p   = processor(dir.path());

        let err = p.load_image(&dir.path().join("nope.png")).unwrap_err();
        assert!(matches!(err, VqaError::MissingFile { .. }));
    }
}
