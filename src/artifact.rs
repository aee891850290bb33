use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::index::Algorithm;
use crate::types::Metric;

pub const MAGIC: [u8; 4] = *b"SSA0";
pub const VERSION: u8 = 1;

pub const ENCODER_FILE: &str = "encoder.bin";
pub const CATALOG_FILE: &str = "catalog.bin";
pub const METADATA_FILE: &str = "metadata.json";
pub const DESCRIPTOR_SUFFIX: &str = ".config.json";

pub fn descriptor_file(variant: &str) -> String {
    format!("{variant}{DESCRIPTOR_SUFFIX}")
}

pub fn index_file(variant: &str) -> String {
    format!("{variant}.index.bin")
}

pub fn reduction_file(variant: &str) -> String {
    format!("{variant}.reduction.bin")
}

#[repr(u8)]
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum ArtifactKind {
    Encoder = 1,
    Catalog = 2,
    Index = 3,
    Reduction = 4,
}

#[derive(Serialize, Deserialize)]
pub struct Header {
    pub magic: [u8; 4],
    pub version: u8,
    pub kind: ArtifactKind,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

/// Per-variant configuration descriptor (`<name>.config.json`).
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct VariantDescriptor {
    pub model_kind: String,
    pub has_reduction: bool,
    pub metric: Metric,
    #[serde(default = "default_algorithm")]
    pub algorithm: Algorithm,
    #[serde(default)]
    pub params: BTreeMap<String, Scalar>,
    #[serde(default)]
    pub library_version: String,
}

fn default_algorithm() -> Algorithm {
    Algorithm::Brute
}

/// Family-wide metadata shared by every variant (`metadata.json`).
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct FamilyMetadata {
    #[serde(default)]
    pub library_version: String,
    pub n_items: usize,
    #[serde(default)]
    pub cluster_labels: Vec<Option<u32>>,
}

/// Read access to a directory of model artifacts.
pub trait ArtifactStore: Send + Sync {
    /// File names currently present.
    fn list(&self) -> Result<Vec<String>>;

    fn read(&self, name: &str) -> Result<Vec<u8>>;
}

pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ArtifactStore for FsArtifactStore {
    fn list(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.root)
            .map_err(|e| Error::ArtifactMissing(format!("{}: {e}", self.root.display())))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::ArtifactMissing(e.to_string()))?;
            if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn read(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.root.join(name);
        fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::ArtifactMissing(path.display().to_string()),
            _ => Error::corrupt(path.display().to_string(), e),
        })
    }
}

pub fn decode<T: DeserializeOwned>(name: &str, kind: ArtifactKind, bytes: &[u8]) -> Result<T> {
    let mut reader = bytes;
    let header: Header =
        bincode::deserialize_from(&mut reader).map_err(|e| Error::corrupt(name, e))?;
    if header.magic != MAGIC {
        return Err(Error::corrupt(name, "invalid magic"));
    }
    if header.version != VERSION {
        return Err(Error::corrupt(name, format!("unsupported version {}", header.version)));
    }
    if header.kind != kind {
        return Err(Error::corrupt(
            name,
            format!("expected {kind:?} artifact, found {:?}", header.kind),
        ));
    }
    bincode::deserialize_from(&mut reader).map_err(|e| Error::corrupt(name, e))
}

pub fn decode_json<T: DeserializeOwned>(name: &str, bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| Error::corrupt(name, e))
}

/// Writes a binary artifact with its header. Used by exporters, tests and benches.
pub fn write<P: AsRef<Path>, T: Serialize>(path: P, kind: ArtifactKind, payload: &T) -> Result<()> {
    let header = Header {
        magic: MAGIC,
        version: VERSION,
        kind,
    };
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    bincode::serialize_into(&mut writer, &header)?;
    bincode::serialize_into(&mut writer, payload)?;
    writer.flush()?;
    Ok(())
}

pub fn write_json<P: AsRef<Path>, T: Serialize>(path: P, payload: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(payload).map_err(|e| Error::Store(e.to_string()))?;
    fs::write(path, text)?;
    Ok(())
}
