pub mod artifact;
pub mod catalog;
pub mod config;
pub mod encoder;
pub mod engine;
pub mod error;
pub mod hybrid;
pub mod index;
pub mod lemma;
pub mod maintenance;
pub mod metrics;
pub mod model;
pub mod preprocess;
pub mod reduction;
pub mod registry;
pub mod stopwords;
pub mod store;
pub mod types;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{Error, Result};
pub use hybrid::{HybridConfig, HybridRecommender, Weights};
pub use model::{ModelVariant, VariantInfo};
pub use preprocess::Preprocessor;
pub use registry::{Registry, RegistryOptions};
pub use store::{ItemStore, LogStore, MemoryStore, SongRecord};
pub use types::{Anchor, Metric, Neighbor, NeighborResult, RecommendationItem, Recommendations, Scope, Status};
