mod common;

use std::sync::{Arc, Barrier};

use anyhow::Result;
use songsim::artifact::{self, ArtifactKind};
use songsim::encoder::SparseVector;
use songsim::index::{Algorithm, IndexArtifact, Rows};
use songsim::{Error, Metric, Registry, RegistryOptions};

#[test]
fn lists_variants_from_descriptors() -> Result<()> {
    let dir = tempfile::tempdir()?;
    common::build(dir.path())?;
    let registry = common::registry(dir.path());
    let names: Vec<String> = registry.list_variants()?.into_iter().collect();
    assert_eq!(names, vec!["knn", "svd_hnsw", "svd_knn"]);

    std::fs::remove_file(dir.path().join(artifact::descriptor_file("svd_hnsw")))?;
    assert!(!registry.list_variants()?.contains("svd_hnsw"));
    Ok(())
}

#[test]
fn load_is_idempotent_and_shares_family_artifacts() -> Result<()> {
    let dir = tempfile::tempdir()?;
    common::build(dir.path())?;
    let registry = common::registry(dir.path());

    let a = registry.load("knn")?;
    let b = registry.load("knn")?;
    assert!(Arc::ptr_eq(&a, &b));

    let svd = registry.load("svd_knn")?;
    assert!(Arc::ptr_eq(a.encoder(), svd.encoder()));
    assert!(Arc::ptr_eq(a.catalog(), svd.catalog()));

    assert!(Arc::ptr_eq(&registry.get("svd_knn")?, &svd));
    assert_eq!(registry.loaded().len(), 2);
    Ok(())
}

#[test]
fn describe_reports_variant() -> Result<()> {
    let dir = tempfile::tempdir()?;
    common::build(dir.path())?;
    let registry = common::registry(dir.path());
    let model = registry.load("svd_knn")?;
    let info = registry.describe(&model);
    assert_eq!(info.name, "svd_knn");
    assert!(info.has_reduction);
    assert_eq!(info.vocabulary_size, common::VOCABULARY.len());
    assert_eq!(info.index_dimension, 4);
    assert_eq!(info.catalog_size, common::SONGS.len());
    assert_eq!(info.library_version, "1.3.2");
    assert!(info.params.contains_key("n_neighbors"));
    Ok(())
}

#[test]
fn unknown_variant_is_configuration_error() -> Result<()> {
    let dir = tempfile::tempdir()?;
    common::build(dir.path())?;
    let err = common::registry(dir.path()).load("nope").err().unwrap();
    assert!(matches!(err, Error::Configuration(_)));
    Ok(())
}

#[test]
fn malformed_descriptor_is_configuration_error() -> Result<()> {
    let dir = tempfile::tempdir()?;
    common::build(dir.path())?;
    std::fs::write(dir.path().join(artifact::descriptor_file("broken")), "{ not json")?;
    let err = common::registry(dir.path()).load("broken").err().unwrap();
    assert!(matches!(err, Error::Configuration(_)));
    Ok(())
}

#[test]
fn missing_reduction_is_artifact_missing() -> Result<()> {
    let dir = tempfile::tempdir()?;
    common::build(dir.path())?;
    std::fs::remove_file(dir.path().join(artifact::reduction_file("svd_knn")))?;
    let err = common::registry(dir.path()).load("svd_knn").err().unwrap();
    assert!(matches!(err, Error::ArtifactMissing(_)));
    Ok(())
}

#[test]
fn index_dimension_skew_is_corrupt() -> Result<()> {
    let dir = tempfile::tempdir()?;
    common::build(dir.path())?;
    let rows = (0..common::SONGS.len())
        .map(|i| SparseVector::new(9, [(i as u32, 1.0)]))
        .collect::<songsim::Result<Vec<_>>>()?;
    common::write_variant(
        dir.path(),
        "skewed",
        &common::descriptor("knn", false, Metric::Cosine, Algorithm::Brute),
        &IndexArtifact {
            metric: Metric::Cosine,
            dim: 9,
            rows: Rows::Sparse(rows),
        },
        None,
    )?;
    let err = common::registry(dir.path()).load("skewed").err().unwrap();
    assert!(matches!(err, Error::ArtifactCorrupt { .. }), "{err}");
    Ok(())
}

#[test]
fn index_shorter_than_catalog_is_corrupt() -> Result<()> {
    let dir = tempfile::tempdir()?;
    common::build(dir.path())?;
    let mut rows = common::encoded_songs();
    rows.truncate(4);
    common::write_variant(
        dir.path(),
        "short",
        &common::descriptor("knn", false, Metric::Cosine, Algorithm::Brute),
        &IndexArtifact {
            metric: Metric::Cosine,
            dim: common::VOCABULARY.len(),
            rows: Rows::Sparse(rows),
        },
        None,
    )?;
    let err = common::registry(dir.path()).load("short").err().unwrap();
    assert!(matches!(err, Error::ArtifactCorrupt { .. }), "{err}");
    Ok(())
}

#[test]
fn metric_mismatch_is_corrupt() -> Result<()> {
    let dir = tempfile::tempdir()?;
    common::build(dir.path())?;
    common::write_variant(
        dir.path(),
        "mixed",
        &common::descriptor("knn", false, Metric::Euclidean, Algorithm::Brute),
        &IndexArtifact {
            metric: Metric::Cosine,
            dim: common::VOCABULARY.len(),
            rows: Rows::Sparse(common::encoded_songs()),
        },
        None,
    )?;
    let err = common::registry(dir.path()).load("mixed").err().unwrap();
    assert!(matches!(err, Error::ArtifactCorrupt { .. }));
    Ok(())
}

#[test]
fn wrong_artifact_kind_is_corrupt() -> Result<()> {
    let dir = tempfile::tempdir()?;
    common::build(dir.path())?;
    artifact::write(
        dir.path().join(artifact::index_file("knn")),
        ArtifactKind::Reduction,
        &common::reduction_artifact(),
    )?;
    let err = common::registry(dir.path()).load("knn").err().unwrap();
    assert!(matches!(err, Error::ArtifactCorrupt { .. }));
    Ok(())
}

#[test]
fn search_requires_loaded_variant() -> Result<()> {
    let dir = tempfile::tempdir()?;
    common::build(dir.path())?;
    let registry = common::registry(dir.path());
    let query = common::encoded_songs().remove(0);
    assert_eq!(
        registry.search("knn", &query, 3).err(),
        Some(Error::NotLoaded("knn".into()))
    );
    registry.load("knn")?;
    assert_eq!(registry.search("knn", &query, 3)?.len(), 3);
    Ok(())
}

#[test]
fn concurrent_loads_read_once() -> Result<()> {
    let dir = tempfile::tempdir()?;
    common::build(dir.path())?;
    let store = Arc::new(common::CountingStore::new(dir.path()));
    let registry = Registry::new(store.clone(), RegistryOptions::default());

    let threads = 8;
    let barrier = Barrier::new(threads);
    let handles: Vec<_> = std::thread::scope(|s| {
        let workers: Vec<_> = (0..threads)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    registry.load("svd_knn")
                })
            })
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });

    let first = handles[0].as_ref().unwrap().clone();
    for handle in &handles {
        assert!(Arc::ptr_eq(handle.as_ref().unwrap(), &first));
    }
    assert_eq!(store.reads(&artifact::index_file("svd_knn")), 1);
    assert_eq!(store.reads(&artifact::reduction_file("svd_knn")), 1);
    assert_eq!(store.reads(&artifact::descriptor_file("svd_knn")), 1);
    assert_eq!(store.reads(artifact::ENCODER_FILE), 1);
    assert_eq!(store.reads(artifact::CATALOG_FILE), 1);
    Ok(())
}

#[test]
fn failed_loads_give_up_after_max_attempts() -> Result<()> {
    let dir = tempfile::tempdir()?;
    common::build(dir.path())?;
    let index = dir.path().join(artifact::index_file("knn"));
    let saved = std::fs::read(&index)?;
    std::fs::remove_file(&index)?;

    let store = Arc::new(common::CountingStore::new(dir.path()));
    let registry = Registry::new(
        store.clone(),
        RegistryOptions {
            ef_search: 16,
            max_load_attempts: 2,
        },
    );
    for _ in 0..2 {
        assert!(matches!(registry.load("knn"), Err(Error::ArtifactMissing(_))));
    }

    std::fs::write(&index, saved)?;
    assert!(matches!(registry.load("knn"), Err(Error::ArtifactMissing(_))));
    assert_eq!(store.reads(&artifact::index_file("knn")), 2);

    // other variants are unaffected
    registry.load("svd_knn")?;
    Ok(())
}

#[test]
fn transient_failure_recovers_within_limit() -> Result<()> {
    let dir = tempfile::tempdir()?;
    common::build(dir.path())?;
    let index = dir.path().join(artifact::index_file("knn"));
    let saved = std::fs::read(&index)?;
    std::fs::remove_file(&index)?;

    let registry = common::registry(dir.path());
    assert!(registry.load("knn").is_err());
    std::fs::write(&index, saved)?;
    registry.load("knn")?;
    Ok(())
}

#[test]
fn missing_descriptor_does_not_spend_retries() -> Result<()> {
    let dir = tempfile::tempdir()?;
    common::build(dir.path())?;
    let descriptor = dir.path().join(artifact::descriptor_file("knn"));
    let saved = std::fs::read(&descriptor)?;
    std::fs::remove_file(&descriptor)?;

    let registry = common::registry(dir.path());
    for _ in 0..5 {
        assert!(matches!(registry.load("knn"), Err(Error::Configuration(_))));
    }
    std::fs::write(&descriptor, saved)?;
    registry.load("knn")?;
    Ok(())
}

#[test]
fn listing_and_describing_leave_the_item_store_alone() -> Result<()> {
    let dir = tempfile::tempdir()?;
    common::build(dir.path())?;
    let config = songsim::EngineConfig {
        artifact_dir: dir.path().to_path_buf(),
        store_path: dir.path().join("songs.log"),
        ..Default::default()
    };
    let registry = Registry::from_config(&config);
    assert!(registry.list_variants()?.contains("knn"));
    assert_eq!(registry.variant_info("knn")?.catalog_size, common::SONGS.len());
    assert!(!config.store_path.exists());
    Ok(())
}
