use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Clone, Serialize, Deserialize, Debug)]
#[serde(default)]
pub struct EngineConfig {
    pub artifact_dir: PathBuf,
    pub store_path: PathBuf,
    pub default_model: String,
    pub language: String,
    pub lemma_path: Option<PathBuf>,
    pub cluster_weight: f64,
    pub global_weight: f64,
    pub max_k: usize,
    pub pool_size: usize,
    pub ef_search: usize,
    pub max_load_attempts: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            artifact_dir: PathBuf::from("models"),
            store_path: PathBuf::from("songs.log"),
            default_model: "knn".to_string(),
            language: "english".to_string(),
            lemma_path: None,
            cluster_weight: 0.6,
            global_weight: 0.4,
            max_k: 50,
            pool_size: 50,
            ef_search: 64,
            max_load_attempts: 3,
        }
    }
}

impl EngineConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Configuration(format!("{}: {e}", path.display())))?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| Error::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_k == 0 {
            return Err(Error::Configuration("max_k must be positive".into()));
        }
        if self.max_load_attempts == 0 {
            return Err(Error::Configuration("max_load_attempts must be positive".into()));
        }
        if self.default_model.is_empty() {
            return Err(Error::Configuration("default_model is empty".into()));
        }
        Ok(())
    }
}
