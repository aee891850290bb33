#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use songsim::artifact::{
    self, ArtifactKind, ArtifactStore, FamilyMetadata, FsArtifactStore, Scalar, VariantDescriptor,
};
use songsim::encoder::{EncoderArtifact, Norm, SparseVector, TfidfEncoder};
use songsim::index::{Algorithm, IndexArtifact, Rows};
use songsim::lemma::Lemmatizer;
use songsim::preprocess::LinguisticResources;
use songsim::reduction::{Projection, ReductionArtifact};
use songsim::stopwords::StopWords;
use songsim::types::CatalogRecord;
use songsim::{
    Engine, HybridConfig, HybridRecommender, MemoryStore, Metric, Preprocessor, Registry,
    RegistryOptions, SongRecord, Weights,
};

pub const VOCABULARY: [&str; 10] = [
    "love", "heart", "night", "star", "dream", "fire", "rain", "road", "ocean", "dance",
];
pub const IDF: [f32; 10] = [1.0, 1.2, 1.5, 2.0, 2.0, 1.3, 1.1, 1.7, 2.2, 1.4];

/// (id, name, artist, lyrics, cluster)
pub const SONGS: [(&str, &str, &str, &str, u32); 6] = [
    ("s0", "Midnight Hearts", "Aurora", "Love, my heart, the night!", 0),
    ("s1", "Starlit", "Aurora", "Love and hearts under a star", 0),
    ("s2", "Dreamers", "Nova", "A heart dreams through the night", 0),
    ("s3", "Wildfire Road", "Ember", "Fire on the road, rain on the road", 1),
    ("s4", "Tides", "Ember", "Ocean rain, we dance", 1),
    ("s5", "Burning Miles", "Cinder", "Fire, the road, and a dance", 1),
];

pub fn preprocessor() -> Preprocessor {
    Preprocessor::full(LinguisticResources {
        stop_words: StopWords::for_language("english").unwrap(),
        lemmatizer: Lemmatizer::parse(&VOCABULARY.join("\n")),
    })
}

pub fn encoder_artifact() -> EncoderArtifact {
    EncoderArtifact {
        vocabulary: VOCABULARY.iter().map(|s| s.to_string()).collect(),
        idf: IDF.to_vec(),
        ngram_range: (1, 1),
        sublinear_tf: true,
        norm: Some(Norm::L2),
    }
}

pub fn reduction_artifact() -> ReductionArtifact {
    // love+heart | night+star+dream | fire+rain+road | ocean+dance
    let groups = [vec![0, 1], vec![2, 3, 4], vec![5, 6, 7], vec![8, 9]];
    let mut components = vec![0.0; groups.len() * VOCABULARY.len()];
    for (c, group) in groups.iter().enumerate() {
        for &f in group {
            components[c * VOCABULARY.len() + f] = 1.0;
        }
    }
    ReductionArtifact {
        n_components: groups.len(),
        n_features: VOCABULARY.len(),
        components,
        normalize: true,
    }
}

pub fn songs() -> Vec<SongRecord> {
    SONGS
        .iter()
        .map(|(id, name, artist, lyrics, _)| SongRecord {
            id: id.to_string(),
            name: name.to_string(),
            artist: artist.to_string(),
            lyrics: Some(lyrics.to_string()),
            cluster: None,
        })
        .collect()
}

pub fn encoded_songs() -> Vec<SparseVector> {
    let encoder = TfidfEncoder::new(encoder_artifact()).unwrap();
    let pre = preprocessor();
    SONGS
        .iter()
        .map(|(_, _, _, lyrics, _)| encoder.encode(&pre.process(lyrics)))
        .collect()
}

pub fn descriptor(kind: &str, has_reduction: bool, metric: Metric, algorithm: Algorithm) -> VariantDescriptor {
    let mut params = BTreeMap::new();
    params.insert("n_neighbors".to_string(), Scalar::Int(20));
    params.insert("algorithm".to_string(), Scalar::Text("brute".into()));
    VariantDescriptor {
        model_kind: kind.to_string(),
        has_reduction,
        metric,
        algorithm,
        params,
        library_version: "1.3.2".to_string(),
    }
}

pub fn write_variant(
    dir: &Path,
    name: &str,
    descriptor: &VariantDescriptor,
    index: &IndexArtifact,
    reduction: Option<&ReductionArtifact>,
) -> Result<()> {
    artifact::write_json(dir.join(artifact::descriptor_file(name)), descriptor)?;
    artifact::write(dir.join(artifact::index_file(name)), ArtifactKind::Index, index)?;
    if let Some(reduction) = reduction {
        artifact::write(dir.join(artifact::reduction_file(name)), ArtifactKind::Reduction, reduction)?;
    }
    Ok(())
}

/// Writes the shared artifacts plus variants `knn`, `svd_knn` and `svd_hnsw`.
pub fn build(dir: &Path) -> Result<()> {
    let records: Vec<CatalogRecord> = SONGS
        .iter()
        .map(|(id, name, artist, _, _)| CatalogRecord {
            id: id.to_string(),
            name: name.to_string(),
            artist: artist.to_string(),
        })
        .collect();
    artifact::write(dir.join(artifact::ENCODER_FILE), ArtifactKind::Encoder, &encoder_artifact())?;
    artifact::write(dir.join(artifact::CATALOG_FILE), ArtifactKind::Catalog, &records)?;
    artifact::write_json(
        dir.join(artifact::METADATA_FILE),
        &FamilyMetadata {
            library_version: "1.3.2".into(),
            n_items: SONGS.len(),
            cluster_labels: SONGS.iter().map(|s| Some(s.4)).collect(),
        },
    )?;

    let sparse = encoded_songs();
    write_variant(
        dir,
        "knn",
        &descriptor("knn", false, Metric::Cosine, Algorithm::Brute),
        &IndexArtifact {
            metric: Metric::Cosine,
            dim: VOCABULARY.len(),
            rows: Rows::Sparse(sparse.clone()),
        },
        None,
    )?;

    let reduction = reduction_artifact();
    let projection = Projection::new(reduction.clone())?;
    let dense: Vec<Vec<f32>> = sparse.iter().map(|v| projection.apply(v)).collect::<Result<_, _>>()?;
    write_variant(
        dir,
        "svd_knn",
        &descriptor("svd_knn", true, Metric::Cosine, Algorithm::Brute),
        &IndexArtifact {
            metric: Metric::Cosine,
            dim: reduction.n_components,
            rows: Rows::Dense(dense.clone()),
        },
        Some(&reduction),
    )?;
    write_variant(
        dir,
        "svd_hnsw",
        &descriptor("svd_knn", true, Metric::Euclidean, Algorithm::Hnsw),
        &IndexArtifact {
            metric: Metric::Euclidean,
            dim: reduction.n_components,
            rows: Rows::Dense(dense),
        },
        Some(&reduction),
    )?;
    Ok(())
}

pub fn registry(dir: &Path) -> Registry {
    Registry::new(Arc::new(FsArtifactStore::new(dir)), RegistryOptions::default())
}

pub fn recommender(max_k: usize) -> HybridRecommender {
    HybridRecommender::new(
        HybridConfig {
            weights: Weights::new(0.6, 0.4).unwrap(),
            max_k,
            pool_size: 50,
        },
        Arc::new(preprocessor()),
    )
    .unwrap()
}

pub fn engine(dir: &Path) -> Engine {
    Engine::new(
        Arc::new(registry(dir)),
        Arc::new(MemoryStore::new(songs())),
        recommender(5),
        "knn",
    )
}

/// Counts reads per file name.
pub struct CountingStore {
    inner: FsArtifactStore,
    reads: Mutex<HashMap<String, usize>>,
}

impl CountingStore {
    pub fn new(dir: &Path) -> Self {
        Self {
            inner: FsArtifactStore::new(dir),
            reads: Mutex::new(HashMap::new()),
        }
    }

    pub fn reads(&self, name: &str) -> usize {
        self.reads.lock().unwrap().get(name).copied().unwrap_or(0)
    }
}

impl ArtifactStore for CountingStore {
    fn list(&self) -> songsim::Result<Vec<String>> {
        self.inner.list()
    }

    fn read(&self, name: &str) -> songsim::Result<Vec<u8>> {
        *self.reads.lock().unwrap().entry(name.to_string()).or_insert(0) += 1;
        self.inner.read(name)
    }
}
