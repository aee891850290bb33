use ordered_float::OrderedFloat;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::encoder::SparseVector;
use crate::error::{Error, Result};
use crate::metrics::Graph;
use crate::types::{Metric, Neighbor, NeighborResult};

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    Brute,
    Hnsw,
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub enum Rows {
    Sparse(Vec<SparseVector>),
    Dense(Vec<Vec<f32>>),
}

impl Rows {
    pub fn len(&self) -> usize {
        match self {
            Rows::Sparse(r) => r.len(),
            Rows::Dense(r) => r.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Training-time feature vectors and the metric they were indexed with.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct IndexArtifact {
    pub metric: Metric,
    pub dim: usize,
    pub rows: Rows,
}

pub enum Query {
    Sparse(SparseVector),
    Dense(Vec<f32>),
}

impl Query {
    pub fn dim(&self) -> usize {
        match self {
            Query::Sparse(v) => v.dim(),
            Query::Dense(v) => v.len(),
        }
    }

    /// True when the query carries no weight at all.
    pub fn is_zero(&self) -> bool {
        match self {
            Query::Sparse(v) => v.is_zero(),
            Query::Dense(v) => v.iter().all(|x| *x == 0.0),
        }
    }

    fn norm(&self) -> f32 {
        match self {
            Query::Sparse(v) => v.norm(),
            Query::Dense(v) => v.iter().map(|x| x * x).sum::<f32>().sqrt(),
        }
    }
}

pub struct SimilarityIndex {
    metric: Metric,
    dim: usize,
    rows: Rows,
    norms: Vec<f32>,
    graph: Option<Graph>,
    ef_search: usize,
}

impl SimilarityIndex {
    pub fn new(artifact: IndexArtifact, algorithm: Algorithm, ef_search: usize) -> Result<Self> {
        let IndexArtifact { metric, dim, rows } = artifact;
        let norms = match &rows {
            Rows::Sparse(rows) => rows
                .iter()
                .enumerate()
                .map(|(i, r)| {
                    r.check().map_err(|e| Error::corrupt("index", format!("row {i}: {e}")))?;
                    if r.dim() != dim {
                        return Err(Error::corrupt("index", format!("row {i} has dimension {}", r.dim())));
                    }
                    Ok(r.norm())
                })
                .collect::<Result<Vec<_>>>()?,
            Rows::Dense(rows) => rows
                .iter()
                .enumerate()
                .map(|(i, r)| {
                    if r.len() != dim {
                        return Err(Error::corrupt("index", format!("row {i} has dimension {}", r.len())));
                    }
                    Ok(r.iter().map(|x| x * x).sum::<f32>().sqrt())
                })
                .collect::<Result<Vec<_>>>()?,
        };
        let graph = match (algorithm, &rows) {
            (Algorithm::Brute, _) => None,
            (Algorithm::Hnsw, Rows::Dense(dense)) => Some(Graph::build(metric, dense)),
            (Algorithm::Hnsw, Rows::Sparse(_)) => {
                return Err(Error::Configuration("hnsw algorithm requires dense index rows".into()))
            }
        };
        Ok(Self {
            metric,
            dim,
            rows,
            norms,
            graph,
            ef_search,
        })
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn search(&self, query: &Query, k: usize) -> Result<NeighborResult> {
        self.check_query(query, k)?;
        let k = k.min(self.len());
        match (&self.graph, query) {
            (Some(graph), Query::Dense(q)) if k < self.len() => {
                let mut found: Vec<Neighbor> = graph
                    .nearest(q, k, self.ef_search)
                    .into_iter()
                    .map(|(position, distance)| Neighbor { position, distance })
                    .collect();
                sort_neighbors(&mut found);
                found.truncate(k);
                Ok(found)
            }
            _ => Ok(self.scan(query, k, 0..self.len())),
        }
    }

    /// Exact search restricted to the given positions.
    pub fn search_within(&self, query: &Query, k: usize, members: &[usize]) -> Result<NeighborResult> {
        self.check_query(query, k)?;
        if let Some(bad) = members.iter().find(|p| **p >= self.len()) {
            return Err(Error::InvalidRequest(format!("position {bad} outside the index")));
        }
        let k = k.min(members.len());
        Ok(self.scan(query, k, members.iter().copied()))
    }

    fn check_query(&self, query: &Query, k: usize) -> Result<()> {
        if k == 0 {
            return Err(Error::InvalidRequest("k must be positive".into()));
        }
        if query.dim() != self.dim {
            return Err(Error::DimensionMismatch {
                expected: self.dim,
                actual: query.dim(),
            });
        }
        Ok(())
    }

    fn scan<I>(&self, query: &Query, k: usize, positions: I) -> NeighborResult
    where
        I: IntoIterator<Item = usize>,
    {
        let qn = query.norm();
        let positions: Vec<usize> = positions.into_iter().collect();
        let mut scored: Vec<Neighbor> = positions
            .par_iter()
            .map(|&position| Neighbor {
                position,
                distance: self.distance(query, qn, position),
            })
            .collect();
        sort_neighbors(&mut scored);
        scored.truncate(k);
        scored
    }

    fn distance(&self, query: &Query, qn: f32, position: usize) -> f32 {
        match (self.metric, query, &self.rows) {
            // direct form avoids cancellation for near-identical vectors
            (Metric::Euclidean, Query::Dense(q), Rows::Dense(rows)) => q
                .iter()
                .zip(rows[position].iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f32>()
                .sqrt(),
            (metric, _, _) => metric.distance(self.dot(query, position), qn, self.norms[position]),
        }
    }

    fn dot(&self, query: &Query, position: usize) -> f32 {
        match (query, &self.rows) {
            (Query::Sparse(q), Rows::Sparse(rows)) => q.dot(&rows[position]),
            (Query::Sparse(q), Rows::Dense(rows)) => q.dot_dense(&rows[position]),
            (Query::Dense(q), Rows::Sparse(rows)) => rows[position].dot_dense(q),
            (Query::Dense(q), Rows::Dense(rows)) => {
                q.iter().zip(rows[position].iter()).map(|(a, b)| a * b).sum()
            }
        }
    }
}

/// Ascending distance, ties by ascending position.
pub fn sort_neighbors(neighbors: &mut [Neighbor]) {
    neighbors.sort_by_key(|n| (OrderedFloat(n.distance), n.position));
}
