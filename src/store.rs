use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct SongRecord {
    pub id: String,
    pub name: String,
    pub artist: String,
    #[serde(default)]
    pub lyrics: Option<String>,
    #[serde(default)]
    pub cluster: Option<u32>,
}

/// Read/write contract of the persistence layer.
pub trait ItemStore: Send + Sync {
    fn get(&self, id: &str) -> Result<Option<SongRecord>>;

    /// Sets cluster assignments; unknown ids are skipped. Returns the number updated.
    fn set_clusters(&self, batch: &[(String, u32)]) -> Result<usize>;
}

#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, SongRecord>>,
}

impl MemoryStore {
    pub fn new(records: impl IntoIterator<Item = SongRecord>) -> Self {
        Self {
            records: RwLock::new(records.into_iter().map(|r| (r.id.clone(), r)).collect()),
        }
    }
}

impl ItemStore for MemoryStore {
    fn get(&self, id: &str) -> Result<Option<SongRecord>> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        Ok(records.get(id).cloned())
    }

    fn set_clusters(&self, batch: &[(String, u32)]) -> Result<usize> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let mut updated = 0;
        for (id, cluster) in batch {
            if let Some(record) = records.get_mut(id) {
                record.cluster = Some(*cluster);
                updated += 1;
            }
        }
        Ok(updated)
    }
}

pub const MAGIC: [u8; 4] = *b"SNG0";
pub const VERSION: u8 = 1;

#[derive(Serialize, Deserialize)]
struct Header {
    magic: [u8; 4],
    version: u8,
}

#[derive(Serialize, Deserialize)]
enum LogEntry {
    Upsert(SongRecord),
    Cluster { id: String, cluster: u32 },
}

/// Append-only song log. Replayed into memory on open; last write wins.
pub struct LogStore {
    path: PathBuf,
    records: Mutex<HashMap<String, SongRecord>>,
}

impl LogStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&path)?;
            let mut writer = BufWriter::new(file);
            bincode::serialize_into(
                &mut writer,
                &Header {
                    magic: MAGIC,
                    version: VERSION,
                },
            )?;
            writer.flush()?;
            return Ok(Self {
                path,
                records: Mutex::new(HashMap::new()),
            });
        }

        let file = File::open(&path)?;
        let mut reader = BufReader::new(file);
        let header: Header = bincode::deserialize_from(&mut reader)?;
        if header.magic != MAGIC {
            return Err(Error::Store("invalid magic".into()));
        }
        if header.version != VERSION {
            return Err(Error::Store("unsupported version".into()));
        }
        let mut records = HashMap::new();
        loop {
            match bincode::deserialize_from::<_, LogEntry>(&mut reader) {
                Ok(LogEntry::Upsert(record)) => {
                    records.insert(record.id.clone(), record);
                }
                Ok(LogEntry::Cluster { id, cluster }) => {
                    if let Some(record) = records.get_mut(&id) {
                        record.cluster = Some(cluster);
                    }
                }
                Err(e) => {
                    if let bincode::ErrorKind::Io(ref io_err) = *e {
                        if io_err.kind() == std::io::ErrorKind::UnexpectedEof {
                            break;
                        }
                    }
                    return Err(e.into());
                }
            }
        }
        tracing::debug!(path = %path.display(), records = records.len(), "song log replayed");
        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    pub fn insert(&self, records: impl IntoIterator<Item = SongRecord>) -> Result<usize> {
        let mut map = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let entries: Vec<LogEntry> = records.into_iter().map(LogEntry::Upsert).collect();
        self.append(&entries)?;
        for entry in entries.iter() {
            if let LogEntry::Upsert(record) = entry {
                map.insert(record.id.clone(), record.clone());
            }
        }
        Ok(entries.len())
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn append(&self, entries: &[LogEntry]) -> Result<()> {
        let file = OpenOptions::new().append(true).open(&self.path)?;
        let mut writer = BufWriter::new(file);
        for entry in entries {
            bincode::serialize_into(&mut writer, entry)?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl ItemStore for LogStore {
    fn get(&self, id: &str) -> Result<Option<SongRecord>> {
        let map = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(map.get(id).cloned())
    }

    fn set_clusters(&self, batch: &[(String, u32)]) -> Result<usize> {
        let mut map = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let entries: Vec<LogEntry> = batch
            .iter()
            .filter(|(id, _)| map.contains_key(id))
            .map(|(id, cluster)| LogEntry::Cluster {
                id: id.clone(),
                cluster: *cluster,
            })
            .collect();
        self.append(&entries)?;
        for entry in &entries {
            if let LogEntry::Cluster { id, cluster } = entry {
                if let Some(record) = map.get_mut(id) {
                    record.cluster = Some(*cluster);
                }
            }
        }
        Ok(entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn song(id: &str) -> SongRecord {
        SongRecord {
            id: id.into(),
            name: format!("song {id}"),
            artist: "artist".into(),
            lyrics: Some("la la".into()),
            cluster: None,
        }
    }

    #[test]
    fn memory_store_updates_known_ids() {
        let store = MemoryStore::new([song("a"), song("b")]);
        let updated = store
            .set_clusters(&[("a".into(), 4), ("zzz".into(), 1)])
            .unwrap();
        assert_eq!(updated, 1);
        assert_eq!(store.get("a").unwrap().unwrap().cluster, Some(4));
        assert!(store.get("zzz").unwrap().is_none());
    }

    #[test]
    fn log_store_replays() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("songs.log");
        {
            let store = LogStore::open(&path)?;
            store.insert([song("a"), song("b")])?;
            store.set_clusters(&[("b".into(), 2)])?;
            let mut renamed = song("a");
            renamed.name = "renamed".into();
            store.insert([renamed])?;
        }
        let store = LogStore::open(&path)?;
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("a")?.unwrap().name, "renamed");
        assert_eq!(store.get("b")?.unwrap().cluster, Some(2));
        Ok(())
    }

    #[test]
    fn log_store_rejects_foreign_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("other.log");
        std::fs::write(&path, b"XXXXXXXXXXXX")?;
        assert!(LogStore::open(&path).is_err());
        Ok(())
    }
}
