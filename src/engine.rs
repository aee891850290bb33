use std::collections::BTreeSet;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::hybrid::{AnchorQuery, HybridConfig, HybridRecommender, Weights};
use crate::model::VariantInfo;
use crate::preprocess::Preprocessor;
use crate::registry::Registry;
use crate::store::{ItemStore, LogStore};
use crate::types::{Anchor, Recommendations};

/// Recommendation API offered to the service layer.
pub struct Engine {
    registry: Arc<Registry>,
    store: Arc<dyn ItemStore>,
    recommender: HybridRecommender,
    default_model: String,
}

impl Engine {
    pub fn new(
        registry: Arc<Registry>,
        store: Arc<dyn ItemStore>,
        recommender: HybridRecommender,
        default_model: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            store,
            recommender,
            default_model: default_model.into(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        config.validate()?;
        let preprocessor = Preprocessor::from_resource_path(&config.language, config.lemma_path.as_deref())?;
        let recommender = HybridRecommender::new(
            HybridConfig {
                weights: Weights::new(config.cluster_weight, config.global_weight)?,
                max_k: config.max_k,
                pool_size: config.pool_size,
            },
            Arc::new(preprocessor),
        )?;
        let store = LogStore::open(&config.store_path)?;
        Ok(Self::new(
            Arc::new(Registry::from_config(config)),
            Arc::new(store),
            recommender,
            config.default_model.clone(),
        ))
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn recommend(
        &self,
        anchor: &Anchor,
        k: usize,
        cluster_weight: f64,
        global_weight: f64,
    ) -> Result<Recommendations> {
        self.recommend_with(&self.default_model, anchor, k, cluster_weight, global_weight)
    }

    pub fn recommend_with(
        &self,
        model: &str,
        anchor: &Anchor,
        k: usize,
        cluster_weight: f64,
        global_weight: f64,
    ) -> Result<Recommendations> {
        let weights = Weights::new(cluster_weight, global_weight)?;
        let query = self.resolve(anchor)?;
        let model = self.registry.load(model)?;
        self.recommender.recommend(&model, &query, k, Some(weights))
    }

    pub fn list_available_models(&self) -> Result<BTreeSet<String>> {
        self.registry.list_variants()
    }

    pub fn get_variant_info(&self, name: &str) -> Result<VariantInfo> {
        self.registry.variant_info(name)
    }

    fn resolve(&self, anchor: &Anchor) -> Result<AnchorQuery> {
        match anchor {
            Anchor::Id(id) => {
                if id.trim().is_empty() {
                    return Err(Error::InvalidRequest("empty anchor id".into()));
                }
                let record = self
                    .store
                    .get(id)?
                    .ok_or_else(|| Error::InvalidRequest(format!("unknown song {id:?}")))?;
                Ok(AnchorQuery {
                    id: Some(record.id),
                    text: record.lyrics.unwrap_or_default(),
                    cluster: record.cluster,
                })
            }
            Anchor::Text(text) => Ok(AnchorQuery {
                id: None,
                text: text.clone(),
                cluster: None,
            }),
        }
    }
}
