// ============================================================
// Layer 6 — External Weight Tensors
// ============================================================
// Reads the two tensors of a separately trained convolutional
// patch embedding (kernel + bias) from a safetensors file. Only
// F32 tensors are accepted; the values are returned as flat
// little-endian-decoded buffers with their shapes.
//
// Reference: safetensors format specification

use std::fs;
use std::path::{Path, PathBuf};

use safetensors::{Dtype, SafeTensors};

use crate::domain::error::{Result, VqaError};

/// A named tensor read from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedTensor {
    pub name:   String,
    pub shape:  Vec<usize>,
    pub values: Vec<f32>,
}

/// Convolution kernel and bias to graft into the patch embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchEmbeddingWeights {
    pub weight: NamedTensor,
    pub bias:   NamedTensor,
}

impl PatchEmbeddingWeights {
    pub fn load(path: impl AsRef<Path>, weight_key: &str, bias_key: &str) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(VqaError::ConfigurationMissing { path: path.to_path_buf() });
        }

        let bytes   = fs::read(path)?;
        let tensors = SafeTensors::deserialize(&bytes).map_err(|e| weights_err(path, e))?;

        let weight = read_f32(&tensors, path, weight_key)?;
        let bias   = read_f32(&tensors, path, bias_key)?;
        tracing::info!(
            "Read patch embedding from '{}': {} {:?}, {} {:?}",
            path.display(),
            weight.name, weight.shape,
            bias.name,   bias.shape,
        );

        Ok(Self { weight, bias })
    }
}

fn read_f32(tensors: &SafeTensors<'_>, path: &Path, name: &str) -> Result<NamedTensor> {
    let view = tensors.tensor(name).map_err(|e| weights_err(path, e))?;
    if view.dtype() != Dtype::F32 {
        return Err(VqaError::Weights {
            path:    PathBuf::from(path),
            message: format!("tensor '{name}' has dtype {:?}, expected F32", view.dtype()),
        });
    }

    let values = view
        .data()
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();

    Ok(NamedTensor { name: name.to_string(), shape: view.shape().to_vec(), values })
}

fn weights_err(path: &Path, e: impl std::fmt::Display) -> VqaError {
    VqaError::Weights { path: path.to_path_buf(), message: e.to_string() }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use safetensors::tensor::TensorView;

    /// Write `tensors` (name, shape, values) to a safetensors file.
    pub(crate) fn write_safetensors(path: &Path, tensors: &[(&str, Vec<usize>, Vec<f32>)]) {
        let buffers: Vec<Vec<u8>> = tensors
            .iter()
            .map(|(_, _, values)| values.iter().flat_map(|v| v.to_le_bytes()).collect())
            .collect();
        let views: Vec<(&str, TensorView<'_>)> = tensors
            .iter()
            .zip(&buffers)
            .map(|((name, shape, _), bytes)| {
                (*name, TensorView::new(Dtype::F32, shape.clone(), bytes).unwrap())
            })
            .collect();
        let bytes = safetensors::serialize(views, &None).unwrap();
        fs::write(path, bytes).unwrap();
    }

    #[test]
    fn test_reads_kernel_and_bias() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("patch.safetensors");
        write_safetensors(&path, &[
            ("encoder.conv1.weight", vec![2, 1, 1, 2], vec![0.5, -1.0, 2.0, 4.0]),
            ("encoder.conv1.bias",   vec![2],          vec![0.1, 0.2]),
        ]);

        let w = PatchEmbeddingWeights::load(&path, "encoder.conv1.weight", "encoder.conv1.bias").unwrap();
        assert_eq!(w.weight.shape, vec![2, 1, 1, 2]);
        assert_eq!(w.weight.values, vec![0.5, -1.0, 2.0, 4.0]);
        assert_eq!(w.bias.values, vec![0.1, 0.2]);
    }

    #[test]
    fn test_missing_key_is_weights_error() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("patch.safetensors");
        write_safetensors(&path, &[("encoder.conv1.weight", vec![1], vec![1.0])]);

        let err = PatchEmbeddingWeights::load(&path, "encoder.conv1.weight", "encoder.conv1.bias").unwrap_err();
        assert!(matches!(err, VqaError::Weights { .. }));
    }

    #[test]
    fn test_missing_file_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = PatchEmbeddingWeights::load(dir.path().join("none.safetensors"), "w", "b").unwrap_err();
        assert!(matches!(err, VqaError::ConfigurationMissing { .. }));
    }
}
