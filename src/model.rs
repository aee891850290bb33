use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::artifact::{Scalar, VariantDescriptor};
use crate::catalog::Catalog;
use crate::encoder::{SparseVector, TfidfEncoder};
use crate::error::{Error, Result};
use crate::index::{Algorithm, Query, SimilarityIndex};
use crate::reduction::Projection;
use crate::types::{Metric, NeighborResult};

pub enum Pipeline {
    Direct(SimilarityIndex),
    Reduced(Projection, SimilarityIndex),
}

impl Pipeline {
    pub fn index(&self) -> &SimilarityIndex {
        match self {
            Pipeline::Direct(index) | Pipeline::Reduced(_, index) => index,
        }
    }
}

/// Read-only diagnostic summary of a loaded variant.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct VariantInfo {
    pub name: String,
    pub model_kind: String,
    pub has_reduction: bool,
    pub metric: Metric,
    pub algorithm: Algorithm,
    pub params: BTreeMap<String, Scalar>,
    pub library_version: String,
    pub vocabulary_size: usize,
    pub index_dimension: usize,
    pub catalog_size: usize,
}

/// A loaded, immutable model variant. Shared across requests behind an `Arc`.
pub struct ModelVariant {
    name: String,
    descriptor: VariantDescriptor,
    encoder: Arc<TfidfEncoder>,
    catalog: Arc<Catalog>,
    pipeline: Pipeline,
}

impl std::fmt::Debug for ModelVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelVariant")
            .field("name", &self.name)
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

impl ModelVariant {
    pub fn new(
        name: impl Into<String>,
        descriptor: VariantDescriptor,
        encoder: Arc<TfidfEncoder>,
        catalog: Arc<Catalog>,
        pipeline: Pipeline,
    ) -> Result<Self> {
        let name = name.into();
        let index = pipeline.index();
        let feature_dim = match &pipeline {
            Pipeline::Direct(_) => encoder.dimension(),
            Pipeline::Reduced(projection, _) => {
                if projection.input_dim() != encoder.dimension() {
                    return Err(Error::corrupt(
                        format!("{name} reduction"),
                        format!(
                            "projection expects {} features, encoder produces {}",
                            projection.input_dim(),
                            encoder.dimension()
                        ),
                    ));
                }
                projection.output_dim()
            }
        };
        if index.dim() != feature_dim {
            return Err(Error::corrupt(
                format!("{name} index"),
                format!("index dimension {} but features have {}", index.dim(), feature_dim),
            ));
        }
        if index.len() != catalog.len() {
            return Err(Error::corrupt(
                format!("{name} index"),
                format!("{} rows for a catalog of {}", index.len(), catalog.len()),
            ));
        }
        if index.metric() != descriptor.metric {
            return Err(Error::corrupt(
                format!("{name} index"),
                format!(
                    "descriptor declares {:?}, index was built with {:?}",
                    descriptor.metric,
                    index.metric()
                ),
            ));
        }
        let reduced = matches!(pipeline, Pipeline::Reduced(..));
        if reduced != descriptor.has_reduction {
            return Err(Error::Configuration(format!(
                "{name}: has_reduction is {} but the pipeline disagrees",
                descriptor.has_reduction
            )));
        }
        Ok(Self {
            name,
            descriptor,
            encoder,
            catalog,
            pipeline,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn encoder(&self) -> &Arc<TfidfEncoder> {
        &self.encoder
    }

    /// Dimensionality of the vectors `search` accepts.
    pub fn input_dim(&self) -> usize {
        self.encoder.dimension()
    }

    pub fn encode(&self, preprocessed: &str) -> SparseVector {
        self.encoder.encode(preprocessed)
    }

    pub fn search(&self, query: &SparseVector, k: usize) -> Result<NeighborResult> {
        let query = self.prepare(query)?;
        self.search_prepared(&query, k)
    }

    /// Search restricted to the given catalog positions.
    pub fn search_within(&self, query: &SparseVector, k: usize, members: &[usize]) -> Result<NeighborResult> {
        let query = self.prepare(query)?;
        self.search_prepared_within(&query, k, members)
    }

    /// Searches with a query already taken through [`ModelVariant::prepare`].
    pub fn search_prepared(&self, query: &Query, k: usize) -> Result<NeighborResult> {
        self.pipeline.index().search(query, k)
    }

    pub fn search_prepared_within(&self, query: &Query, k: usize, members: &[usize]) -> Result<NeighborResult> {
        self.pipeline.index().search_within(query, k, members)
    }

    /// Maps an encoder vector into the index space, projecting when the
    /// variant carries a reduction.
    pub fn prepare(&self, query: &SparseVector) -> Result<Query> {
        if query.dim() != self.input_dim() {
            tracing::error!(
                model = %self.name,
                expected = self.input_dim(),
                actual = query.dim(),
                "query dimension does not match the encoder"
            );
            return Err(Error::DimensionMismatch {
                expected: self.input_dim(),
                actual: query.dim(),
            });
        }
        match &self.pipeline {
            Pipeline::Direct(_) => Ok(Query::Sparse(query.clone())),
            Pipeline::Reduced(projection, _) => Ok(Query::Dense(projection.apply(query)?)),
        }
    }

    pub fn describe(&self) -> VariantInfo {
        VariantInfo {
            name: self.name.clone(),
            model_kind: self.descriptor.model_kind.clone(),
            has_reduction: self.descriptor.has_reduction,
            metric: self.descriptor.metric,
            algorithm: self.descriptor.algorithm,
            params: self.descriptor.params.clone(),
            library_version: self.descriptor.library_version.clone(),
            vocabulary_size: self.encoder.dimension(),
            index_dimension: self.pipeline.index().dim(),
            catalog_size: self.catalog.len(),
        }
    }
}
