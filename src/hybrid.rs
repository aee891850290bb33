//! Hybrid recommendation: blends a cluster-scoped and a global neighbor search.
//!
//! Each scope's raw distances are min-max rescaled to similarities in `[0, 1]`
//! (nearest item = 1.0) before weighting, so one scope's distance range cannot
//! dominate the other. Results are merged by item identifier.

use std::collections::HashMap;
use std::sync::Arc;

use ordered_float::OrderedFloat;

use crate::error::{Error, Result};
use crate::model::ModelVariant;
use crate::preprocess::Preprocessor;
use crate::types::{NeighborResult, RecommendationItem, Recommendations, Scope, Status};

pub const WEIGHT_TOLERANCE: f64 = 1e-5;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Weights {
    cluster: f64,
    global: f64,
}

impl Weights {
    pub fn new(cluster: f64, global: f64) -> Result<Self> {
        for (name, w) in [("cluster", cluster), ("global", global)] {
            if !(0.0..=1.0).contains(&w) {
                return Err(Error::Configuration(format!("{name} weight {w} outside [0, 1]")));
            }
        }
        if (cluster + global - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(Error::Configuration(format!(
                "weights must sum to 1.0, got {}",
                cluster + global
            )));
        }
        Ok(Self { cluster, global })
    }

    pub fn cluster(&self) -> f64 {
        self.cluster
    }

    pub fn global(&self) -> f64 {
        self.global
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScoredItem {
    pub id: String,
    pub similarity: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MergedScore {
    pub id: String,
    pub score: f64,
    pub scope: Scope,
}

/// Min-max rescaled similarities, parallel to `result`.
pub fn similarities(result: &NeighborResult) -> Vec<f64> {
    let Some(first) = result.first() else {
        return Vec::new();
    };
    let (min, max) = result.iter().fold((first.distance, first.distance), |(lo, hi), n| {
        (lo.min(n.distance), hi.max(n.distance))
    });
    let span = f64::from(max) - f64::from(min);
    result
        .iter()
        .map(|n| {
            if span <= 0.0 {
                1.0
            } else {
                (1.0 - (f64::from(n.distance) - f64::from(min)) / span).clamp(0.0, 1.0)
            }
        })
        .collect()
}

/// Weighted merge keyed by identifier, ranked by score, then scope count,
/// then identifier. `exclude` is dropped from the output.
pub fn merge(
    cluster: &[ScoredItem],
    global: &[ScoredItem],
    weights: Weights,
    exclude: Option<&str>,
) -> Vec<MergedScore> {
    let mut merged: HashMap<&str, (Option<f64>, Option<f64>)> = HashMap::new();
    for item in cluster {
        let entry = merged.entry(item.id.as_str()).or_default();
        entry.0 = Some(entry.0.map_or(item.similarity, |s| s.max(item.similarity)));
    }
    for item in global {
        let entry = merged.entry(item.id.as_str()).or_default();
        entry.1 = Some(entry.1.map_or(item.similarity, |s| s.max(item.similarity)));
    }

    let mut out: Vec<MergedScore> = merged
        .into_iter()
        .filter(|(id, _)| Some(*id) != exclude)
        .filter_map(|(id, scores)| {
            let (score, scope) = match scores {
                (Some(c), Some(g)) => (weights.cluster * c + weights.global * g, Scope::Both),
                (Some(c), None) => (weights.cluster * c, Scope::Cluster),
                (None, Some(g)) => (weights.global * g, Scope::Global),
                (None, None) => return None,
            };
            Some(MergedScore {
                id: id.to_string(),
                score,
                scope,
            })
        })
        .collect();
    out.sort_by(|a, b| {
        OrderedFloat(b.score)
            .cmp(&OrderedFloat(a.score))
            .then_with(|| b.scope.count().cmp(&a.scope.count()))
            .then_with(|| a.id.cmp(&b.id))
    });
    out
}

#[derive(Clone, Copy, Debug)]
pub struct HybridConfig {
    pub weights: Weights,
    pub max_k: usize,
    pub pool_size: usize,
}

/// The anchor as seen by the recommender: its lyrics, its identifier when it
/// is a catalog song, and its cluster when one is known.
#[derive(Clone, Debug, Default)]
pub struct AnchorQuery {
    pub id: Option<String>,
    pub text: String,
    pub cluster: Option<u32>,
}

pub struct HybridRecommender {
    config: HybridConfig,
    preprocessor: Arc<Preprocessor>,
}

impl HybridRecommender {
    pub fn new(config: HybridConfig, preprocessor: Arc<Preprocessor>) -> Result<Self> {
        if config.max_k == 0 {
            return Err(Error::Configuration("max_k must be positive".into()));
        }
        Ok(Self {
            config,
            preprocessor,
        })
    }

    pub fn config(&self) -> &HybridConfig {
        &self.config
    }

    pub fn recommend(
        &self,
        model: &ModelVariant,
        anchor: &AnchorQuery,
        k: usize,
        weights: Option<Weights>,
    ) -> Result<Recommendations> {
        if k == 0 || k > self.config.max_k {
            return Err(Error::InvalidRequest(format!(
                "k must be between 1 and {}, got {k}",
                self.config.max_k
            )));
        }
        let weights = weights.unwrap_or(self.config.weights);

        let text = self.preprocessor.process(&anchor.text);
        if text.is_empty() {
            tracing::debug!(model = model.name(), "no searchable terms after preprocessing");
            return Ok(Recommendations::no_signal(model.name()));
        }
        let vector = model.encode(&text);
        if vector.is_zero() {
            tracing::debug!(model = model.name(), "no vocabulary terms in query");
            return Ok(Recommendations::no_signal(model.name()));
        }
        let query = model.prepare(&vector)?;
        if query.is_zero() {
            tracing::debug!(model = model.name(), "query vanishes under the projection");
            return Ok(Recommendations::no_signal(model.name()));
        }

        let catalog = model.catalog();
        let pool = self.config.pool_size.max(k) + 1;
        let global = model.search_prepared(&query, pool)?;

        let cluster = anchor
            .cluster
            .or_else(|| {
                anchor
                    .id
                    .as_deref()
                    .and_then(|id| catalog.position(id))
                    .and_then(|p| catalog.cluster_of(p))
            })
            .or_else(|| global.first().and_then(|n| catalog.cluster_of(n.position)));
        let local = match cluster.map(|c| catalog.members(c)) {
            Some(members) if !members.is_empty() => model.search_prepared_within(&query, pool, members)?,
            _ => Vec::new(),
        };

        let cluster_scores = self.scored(model, &local)?;
        let global_scores = self.scored(model, &global)?;
        let mut merged = merge(&cluster_scores, &global_scores, weights, anchor.id.as_deref());
        merged.truncate(k);

        let items = merged
            .into_iter()
            .map(|m| {
                let record = catalog
                    .position(&m.id)
                    .and_then(|p| catalog.get(p))
                    .ok_or_else(|| Error::corrupt("catalog", format!("unknown id {:?}", m.id)))?;
                Ok(RecommendationItem {
                    id: m.id,
                    name: record.name.clone(),
                    artist: record.artist.clone(),
                    score: m.score,
                    scope: m.scope,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            model = model.name(),
            cluster = ?cluster,
            local = local.len(),
            global = global.len(),
            returned = items.len(),
            "recommendation computed"
        );
        Ok(Recommendations {
            status: Status::Ok,
            model: model.name().to_string(),
            items,
        })
    }

    fn scored(&self, model: &ModelVariant, result: &NeighborResult) -> Result<Vec<ScoredItem>> {
        let catalog = model.catalog();
        result
            .iter()
            .zip(similarities(result))
            .map(|(n, similarity)| {
                let record = catalog.get(n.position).ok_or_else(|| {
                    Error::corrupt("catalog", format!("position {} outside catalog", n.position))
                })?;
                Ok(ScoredItem {
                    id: record.id.clone(),
                    similarity,
                })
            })
            .collect()
    }
}
