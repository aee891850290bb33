use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use once_cell::sync::OnceCell;

use crate::artifact::{
    self, decode, decode_json, ArtifactKind, ArtifactStore, FamilyMetadata, FsArtifactStore,
    VariantDescriptor, CATALOG_FILE, DESCRIPTOR_SUFFIX, ENCODER_FILE, METADATA_FILE,
};
use crate::catalog::Catalog;
use crate::config::EngineConfig;
use crate::encoder::{EncoderArtifact, SparseVector, TfidfEncoder};
use crate::error::{Error, Result};
use crate::index::{IndexArtifact, SimilarityIndex};
use crate::model::{ModelVariant, Pipeline, VariantInfo};
use crate::reduction::{Projection, ReductionArtifact};
use crate::types::{CatalogRecord, NeighborResult};

#[derive(Clone, Copy, Debug)]
pub struct RegistryOptions {
    pub ef_search: usize,
    pub max_load_attempts: u32,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            ef_search: 64,
            max_load_attempts: 3,
        }
    }
}

/// Artifacts shared by every variant of the family.
struct Family {
    encoder: Arc<TfidfEncoder>,
    catalog: Arc<Catalog>,
}

#[derive(Default)]
struct Failures {
    attempts: u32,
    last: Option<Error>,
}

#[derive(Default)]
struct Slot {
    model: OnceCell<Arc<ModelVariant>>,
    failures: Mutex<Failures>,
}

/// Process-scoped cache of loaded model variants.
///
/// Create one at startup and share it behind an `Arc`. Concurrent loads of
/// the same name are serialized: one caller reads the artifacts, the others
/// block and receive the same handle.
pub struct Registry {
    store: Arc<dyn ArtifactStore>,
    options: RegistryOptions,
    family: OnceCell<Family>,
    slots: Mutex<HashMap<String, Arc<Slot>>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Registry {
    pub fn new(store: Arc<dyn ArtifactStore>, options: RegistryOptions) -> Self {
        Self {
            store,
            options,
            family: OnceCell::new(),
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            Arc::new(FsArtifactStore::new(&config.artifact_dir)),
            RegistryOptions {
                ef_search: config.ef_search,
                max_load_attempts: config.max_load_attempts,
            },
        )
    }

    /// Variant names with a configuration descriptor in the store right now.
    pub fn list_variants(&self) -> Result<BTreeSet<String>> {
        Ok(self
            .store
            .list()?
            .into_iter()
            .filter_map(|f| f.strip_suffix(DESCRIPTOR_SUFFIX).map(str::to_string))
            .filter(|n| !n.is_empty())
            .collect())
    }

    pub fn load(&self, name: &str) -> Result<Arc<ModelVariant>> {
        validate_name(name)?;
        let slot = self.slot(name);
        if let Some(model) = slot.model.get() {
            return Ok(model.clone());
        }
        slot.model
            .get_or_try_init(|| {
                if let Some(e) = self.permanent_failure(&slot) {
                    return Err(e);
                }
                match self.read_variant(name) {
                    Ok(model) => {
                        tracing::info!(
                            model = name,
                            reduced = model.describe().has_reduction,
                            rows = model.catalog().len(),
                            "model variant loaded"
                        );
                        Ok(Arc::new(model))
                    }
                    Err(e) => Err(self.record_failure(name, &slot, e)),
                }
            })
            .cloned()
    }

    /// Handle of an already-loaded variant.
    pub fn get(&self, name: &str) -> Result<Arc<ModelVariant>> {
        lock(&self.slots)
            .get(name)
            .and_then(|slot| slot.model.get().cloned())
            .ok_or_else(|| Error::NotLoaded(name.to_string()))
    }

    pub fn search(&self, name: &str, query: &SparseVector, k: usize) -> Result<NeighborResult> {
        self.get(name)?.search(query, k)
    }

    pub fn describe(&self, model: &ModelVariant) -> VariantInfo {
        model.describe()
    }

    /// Loads `name` if needed and describes it.
    pub fn variant_info(&self, name: &str) -> Result<VariantInfo> {
        Ok(self.load(name)?.describe())
    }

    pub fn loaded(&self) -> BTreeSet<String> {
        lock(&self.slots)
            .iter()
            .filter(|(_, slot)| slot.model.get().is_some())
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn slot(&self, name: &str) -> Arc<Slot> {
        lock(&self.slots).entry(name.to_string()).or_default().clone()
    }

    fn permanent_failure(&self, slot: &Slot) -> Option<Error> {
        let failures = lock(&slot.failures);
        if failures.attempts >= self.options.max_load_attempts {
            failures.last.clone()
        } else {
            None
        }
    }

    fn record_failure(&self, name: &str, slot: &Arc<Slot>, error: Error) -> Error {
        // Unknown or misconfigured names hold no artifacts and do not spend retries.
        if matches!(error, Error::Configuration(_)) {
            self.forget(name, slot);
            tracing::warn!(model = name, error = %error, "model variant is not configured");
            return error;
        }
        let mut failures = lock(&slot.failures);
        failures.attempts += 1;
        failures.last = Some(error.clone());
        if failures.attempts >= self.options.max_load_attempts {
            tracing::error!(model = name, attempts = failures.attempts, error = %error, "giving up on model variant");
        } else {
            tracing::warn!(model = name, attempts = failures.attempts, error = %error, "model variant failed to load");
        }
        error
    }

    fn forget(&self, name: &str, slot: &Arc<Slot>) {
        let mut slots = lock(&self.slots);
        let idle = lock(&slot.failures).attempts == 0 && slot.model.get().is_none();
        if idle && slots.get(name).is_some_and(|s| Arc::ptr_eq(s, slot)) {
            slots.remove(name);
        }
    }

    fn family(&self) -> Result<&Family> {
        self.family.get_or_try_init(|| {
            let encoder: EncoderArtifact =
                decode(ENCODER_FILE, ArtifactKind::Encoder, &self.store.read(ENCODER_FILE)?)?;
            let encoder = TfidfEncoder::new(encoder)?;
            let metadata: FamilyMetadata = decode_json(METADATA_FILE, &self.store.read(METADATA_FILE)?)?;
            let records: Vec<CatalogRecord> =
                decode(CATALOG_FILE, ArtifactKind::Catalog, &self.store.read(CATALOG_FILE)?)?;
            let catalog = Catalog::new(records, &metadata)?;
            tracing::info!(
                vocabulary = encoder.dimension(),
                items = catalog.len(),
                clusters = catalog.cluster_count(),
                library_version = %metadata.library_version,
                "shared artifacts loaded"
            );
            Ok(Family {
                encoder: Arc::new(encoder),
                catalog: Arc::new(catalog),
            })
        })
    }

    fn read_variant(&self, name: &str) -> Result<ModelVariant> {
        let file = artifact::descriptor_file(name);
        let bytes = self.store.read(&file).map_err(|e| match e {
            Error::ArtifactMissing(_) => {
                Error::Configuration(format!("no configuration descriptor for variant {name:?}"))
            }
            other => other,
        })?;
        let descriptor: VariantDescriptor = serde_json::from_slice(&bytes)
            .map_err(|e| Error::Configuration(format!("{file}: {e}")))?;

        let family = self.family()?;

        let file = artifact::index_file(name);
        let index: IndexArtifact = decode(&file, ArtifactKind::Index, &self.store.read(&file)?)?;
        let index = SimilarityIndex::new(index, descriptor.algorithm, self.options.ef_search)?;

        let pipeline = if descriptor.has_reduction {
            let file = artifact::reduction_file(name);
            let reduction: ReductionArtifact =
                decode(&file, ArtifactKind::Reduction, &self.store.read(&file)?)?;
            Pipeline::Reduced(Projection::new(reduction)?, index)
        } else {
            Pipeline::Direct(index)
        };

        ModelVariant::new(
            name,
            descriptor,
            family.encoder.clone(),
            family.catalog.clone(),
            pipeline,
        )
    }
}

fn validate_name(name: &str) -> Result<()> {
    let ok = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
        && !name.starts_with('.');
    if ok {
        Ok(())
    } else {
        Err(Error::Configuration(format!("invalid variant name {name:?}")))
    }
}
