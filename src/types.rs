use serde::{Deserialize, Serialize};

#[repr(u8)]
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Cosine = 1,
    Euclidean = 2,
}

/// One entry of the training catalog. Its position in the catalog is the
/// row position used by every index of the family.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct CatalogRecord {
    pub id: String,
    pub name: String,
    pub artist: String,
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    pub distance: f32,
}

/// Nearest-first neighbors of one query, positions local to the variant's catalog.
pub type NeighborResult = Vec<Neighbor>;

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Cluster,
    Global,
    Both,
}

impl Scope {
    pub fn count(self) -> usize {
        match self {
            Scope::Both => 2,
            Scope::Cluster | Scope::Global => 1,
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct RecommendationItem {
    pub id: String,
    pub name: String,
    pub artist: String,
    pub score: f64,
    pub scope: Scope,
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Ok,
    NoSignal,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Recommendations {
    pub status: Status,
    pub model: String,
    pub items: Vec<RecommendationItem>,
}

impl Recommendations {
    pub fn no_signal(model: impl Into<String>) -> Self {
        Self {
            status: Status::NoSignal,
            model: model.into(),
            items: Vec::new(),
        }
    }
}

/// What to recommend for: a known song or free lyrics text.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Anchor {
    Id(String),
    Text(String),
}
