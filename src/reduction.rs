use serde::{Deserialize, Serialize};

use crate::encoder::SparseVector;
use crate::error::{Error, Result};

/// Truncated-SVD components, row-major `n_components x n_features`.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct ReductionArtifact {
    pub n_components: usize,
    pub n_features: usize,
    pub components: Vec<f32>,
    pub normalize: bool,
}

#[derive(Debug)]
pub struct Projection {
    artifact: ReductionArtifact,
}

impl Projection {
    pub fn new(artifact: ReductionArtifact) -> Result<Self> {
        let expected = artifact.n_components * artifact.n_features;
        if artifact.n_components == 0 || artifact.n_features == 0 || artifact.components.len() != expected {
            return Err(Error::corrupt(
                "reduction",
                format!(
                    "{} values for a {}x{} projection",
                    artifact.components.len(),
                    artifact.n_components,
                    artifact.n_features
                ),
            ));
        }
        Ok(Self { artifact })
    }

    pub fn input_dim(&self) -> usize {
        self.artifact.n_features
    }

    pub fn output_dim(&self) -> usize {
        self.artifact.n_components
    }

    pub fn apply(&self, x: &SparseVector) -> Result<Vec<f32>> {
        if x.dim() != self.input_dim() {
            return Err(Error::DimensionMismatch {
                expected: self.input_dim(),
                actual: x.dim(),
            });
        }
        let mut out: Vec<f32> = self
            .artifact
            .components
            .chunks_exact(self.artifact.n_features)
            .map(|row| x.dot_dense(row))
            .collect();
        if self.artifact.normalize {
            let norm = out.iter().map(|v| v * v).sum::<f32>().sqrt();
            if norm > 0.0 {
                out.iter_mut().for_each(|v| *v /= norm);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projects_sparse_input() {
        let p = Projection::new(ReductionArtifact {
            n_components: 2,
            n_features: 3,
            components: vec![1.0, 0.0, 1.0, 0.0, 2.0, 0.0],
            normalize: false,
        })
        .unwrap();
        let x = SparseVector::new(3, [(0, 1.0), (1, 1.0), (2, 3.0)]).unwrap();
        assert_eq!(p.apply(&x).unwrap(), vec![4.0, 2.0]);
    }

    #[test]
    fn rejects_wrong_shape() {
        let err = Projection::new(ReductionArtifact {
            n_components: 2,
            n_features: 3,
            components: vec![0.0; 5],
            normalize: false,
        })
        .unwrap_err();
        assert!(matches!(err, Error::ArtifactCorrupt { .. }));
    }

    #[test]
    fn rejects_empty_feature_space() {
        let err = Projection::new(ReductionArtifact {
            n_components: 2,
            n_features: 0,
            components: Vec::new(),
            normalize: false,
        })
        .unwrap_err();
        assert!(matches!(err, Error::ArtifactCorrupt { .. }));
    }

    #[test]
    fn input_dimension_checked() {
        let p = Projection::new(ReductionArtifact {
            n_components: 1,
            n_features: 2,
            components: vec![1.0, 1.0],
            normalize: true,
        })
        .unwrap();
        let x = SparseVector::zeros(3);
        assert_eq!(
            p.apply(&x).unwrap_err(),
            Error::DimensionMismatch { expected: 2, actual: 3 }
        );
    }
}
