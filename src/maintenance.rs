use serde::Serialize;

use crate::error::{Error, Result};
use crate::store::ItemStore;

#[derive(Clone, Copy, Serialize, Debug, Default, PartialEq, Eq)]
pub struct ClusterUpdateReport {
    pub batches: usize,
    pub updated: usize,
    pub skipped: usize,
}

/// Writes trained cluster labels into the store, `labels[i]` belonging to `ids[i]`.
pub fn assign_clusters(
    store: &dyn ItemStore,
    ids: &[String],
    labels: &[u32],
    batch_size: usize,
) -> Result<ClusterUpdateReport> {
    if ids.len() != labels.len() {
        return Err(Error::InvalidRequest(format!(
            "{} ids but {} labels",
            ids.len(),
            labels.len()
        )));
    }
    if batch_size == 0 {
        return Err(Error::InvalidRequest("batch size must be positive".into()));
    }

    let pairs: Vec<(String, u32)> = ids.iter().cloned().zip(labels.iter().copied()).collect();
    let mut report = ClusterUpdateReport::default();
    for batch in pairs.chunks(batch_size) {
        let updated = store.set_clusters(batch)?;
        report.batches += 1;
        report.updated += updated;
        report.skipped += batch.len() - updated;
        tracing::info!(
            batch = report.batches,
            updated,
            progress = report.updated + report.skipped,
            total = pairs.len(),
            "cluster batch written"
        );
    }
    Ok(report)
}
