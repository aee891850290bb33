use std::collections::{BTreeMap, HashMap};

use crate::artifact::FamilyMetadata;
use crate::error::{Error, Result};
use crate::types::CatalogRecord;

/// Training catalog in index order, with the cluster label of each position.
#[derive(Debug)]
pub struct Catalog {
    records: Vec<CatalogRecord>,
    labels: Vec<Option<u32>>,
    positions: HashMap<String, usize>,
    clusters: BTreeMap<u32, Vec<usize>>,
}

impl Catalog {
    pub fn new(records: Vec<CatalogRecord>, metadata: &FamilyMetadata) -> Result<Self> {
        if metadata.n_items != records.len() {
            return Err(Error::corrupt(
                "catalog",
                format!(
                    "metadata records {} items, catalog has {}",
                    metadata.n_items,
                    records.len()
                ),
            ));
        }
        let labels = if metadata.cluster_labels.is_empty() {
            vec![None; records.len()]
        } else if metadata.cluster_labels.len() == records.len() {
            metadata.cluster_labels.clone()
        } else {
            return Err(Error::corrupt(
                "metadata",
                format!(
                    "{} cluster labels for {} items",
                    metadata.cluster_labels.len(),
                    records.len()
                ),
            ));
        };

        let mut positions = HashMap::with_capacity(records.len());
        let mut clusters: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
        for (position, record) in records.iter().enumerate() {
            if positions.insert(record.id.clone(), position).is_some() {
                return Err(Error::corrupt("catalog", format!("duplicate id {:?}", record.id)));
            }
            if let Some(label) = labels[position] {
                clusters.entry(label).or_default().push(position);
            }
        }
        Ok(Self {
            records,
            labels,
            positions,
            clusters,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&CatalogRecord> {
        self.records.get(position)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.positions.get(id).copied()
    }

    pub fn cluster_of(&self, position: usize) -> Option<u32> {
        self.labels.get(position).copied().flatten()
    }

    /// Positions assigned to `cluster`, ascending.
    pub fn members(&self, cluster: u32) -> &[usize] {
        self.clusters.get(&cluster).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn cluster_count(&self) -> usize {
        self.clusters.len()
    }
}
