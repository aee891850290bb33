use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct SparseVector {
    dim: usize,
    indices: Vec<u32>,
    values: Vec<f32>,
}

impl SparseVector {
    /// Entries are sorted by column; duplicate columns are summed.
    pub fn new(dim: usize, entries: impl IntoIterator<Item = (u32, f32)>) -> Result<Self> {
        let mut merged: BTreeMap<u32, f32> = BTreeMap::new();
        for (i, v) in entries {
            if i as usize >= dim {
                return Err(Error::DimensionMismatch {
                    expected: dim,
                    actual: i as usize + 1,
                });
            }
            *merged.entry(i).or_insert(0.0) += v;
        }
        let (indices, values) = merged.into_iter().filter(|(_, v)| *v != 0.0).unzip();
        Ok(Self { dim, indices, values })
    }

    pub fn zeros(dim: usize) -> Self {
        Self {
            dim,
            indices: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    pub fn is_zero(&self) -> bool {
        self.values.iter().all(|v| *v == 0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, f32)> + '_ {
        self.indices
            .iter()
            .zip(self.values.iter())
            .map(|(i, v)| (*i as usize, *v))
    }

    pub fn norm(&self) -> f32 {
        self.values.iter().map(|v| v * v).sum::<f32>().sqrt()
    }

    pub fn dot(&self, other: &SparseVector) -> f32 {
        let (mut a, mut b) = (0, 0);
        let mut sum = 0.0;
        while a < self.indices.len() && b < other.indices.len() {
            match self.indices[a].cmp(&other.indices[b]) {
                std::cmp::Ordering::Less => a += 1,
                std::cmp::Ordering::Greater => b += 1,
                std::cmp::Ordering::Equal => {
                    sum += self.values[a] * other.values[b];
                    a += 1;
                    b += 1;
                }
            }
        }
        sum
    }

    pub fn dot_dense(&self, dense: &[f32]) -> f32 {
        self.iter()
            .map(|(i, v)| dense.get(i).copied().unwrap_or(0.0) * v)
            .sum()
    }

    pub fn to_dense(&self) -> Vec<f32> {
        let mut out = vec![0.0; self.dim];
        for (i, v) in self.iter() {
            out[i] = v;
        }
        out
    }

    pub(crate) fn check(&self) -> std::result::Result<(), String> {
        if self.indices.len() != self.values.len() {
            return Err("index/value length mismatch".into());
        }
        if self.indices.windows(2).any(|w| w[0] >= w[1]) {
            return Err("unsorted columns".into());
        }
        if self.indices.last().is_some_and(|i| *i as usize >= self.dim) {
            return Err("column out of range".into());
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Norm {
    L1,
    L2,
}

/// Pre-fitted TF-IDF table, serialized as the family's encoder artifact.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct EncoderArtifact {
    pub vocabulary: Vec<String>,
    pub idf: Vec<f32>,
    pub ngram_range: (usize, usize),
    pub sublinear_tf: bool,
    pub norm: Option<Norm>,
}

#[derive(Debug)]
pub struct TfidfEncoder {
    columns: HashMap<String, u32>,
    artifact: EncoderArtifact,
}

impl TfidfEncoder {
    pub fn new(artifact: EncoderArtifact) -> Result<Self> {
        let name = "encoder";
        if artifact.vocabulary.is_empty() {
            return Err(Error::corrupt(name, "empty vocabulary"));
        }
        if artifact.vocabulary.len() != artifact.idf.len() {
            return Err(Error::corrupt(
                name,
                format!(
                    "{} terms but {} idf weights",
                    artifact.vocabulary.len(),
                    artifact.idf.len()
                ),
            ));
        }
        let (min_n, max_n) = artifact.ngram_range;
        if min_n == 0 || min_n > max_n {
            return Err(Error::corrupt(name, format!("bad ngram range ({min_n}, {max_n})")));
        }
        let mut columns = HashMap::with_capacity(artifact.vocabulary.len());
        for (i, term) in artifact.vocabulary.iter().enumerate() {
            if columns.insert(term.clone(), i as u32).is_some() {
                return Err(Error::corrupt(name, format!("duplicate term {term:?}")));
            }
        }
        Ok(Self { columns, artifact })
    }

    pub fn dimension(&self) -> usize {
        self.artifact.vocabulary.len()
    }

    pub fn encode(&self, text: &str) -> SparseVector {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        let (min_n, max_n) = self.artifact.ngram_range;
        let mut counts: BTreeMap<u32, u32> = BTreeMap::new();
        for n in min_n..=max_n {
            for gram in tokens.windows(n) {
                if let Some(col) = self.columns.get(&gram.join(" ")) {
                    *counts.entry(*col).or_insert(0) += 1;
                }
            }
        }

        let mut indices = Vec::with_capacity(counts.len());
        let mut values = Vec::with_capacity(counts.len());
        for (col, count) in counts {
            let tf = if self.artifact.sublinear_tf {
                1.0 + (count as f32).ln()
            } else {
                count as f32
            };
            indices.push(col);
            values.push(tf * self.artifact.idf[col as usize]);
        }

        let scale = match self.artifact.norm {
            Some(Norm::L2) => values.iter().map(|v| v * v).sum::<f32>().sqrt(),
            Some(Norm::L1) => values.iter().map(|v| v.abs()).sum::<f32>(),
            None => 1.0,
        };
        if scale > 0.0 && scale != 1.0 {
            values.iter_mut().for_each(|v| *v /= scale);
        }
        SparseVector {
            dim: self.dimension(),
            indices,
            values,
        }
    }
}
