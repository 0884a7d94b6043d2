use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

pub const APP_DIR: &str = "stream-tui";

pub type StreamId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamRecord {
    pub id: StreamId,
    pub name: String,
    pub url: String,
    pub resolution: String,
    #[serde(default)]
    pub seen_count: u64,
    /// Unix seconds of the last counted view, 0 when never viewed.
    #[serde(default)]
    pub last_seen: u64,
}

/// Persistence collaborator of the registry: load everything once, save full snapshots.
pub trait RecordStore {
    fn load(&mut self) -> Result<Vec<StreamRecord>>;
    fn save(&mut self, records: &[StreamRecord]) -> Result<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct StoreFile {
    streams: Vec<StreamRecord>,
}

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn at_default_path() -> Result<Self> {
        Ok(Self::new(database_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordStore for JsonFileStore {
    fn load(&mut self) -> Result<Vec<StreamRecord>> {
        let path = &self.path;
        if !path.exists() {
            return Ok(Vec::new());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed reading stream database at {}", path.display()))?;
        let parsed = serde_json::from_str::<StoreFile>(&raw)
            .with_context(|| format!("failed parsing stream database at {}", path.display()))?;
        Ok(parsed.streams)
    }

    fn save(&mut self, records: &[StreamRecord]) -> Result<()> {
        let path = &self.path;
        ensure_parent_dir(path)?;

        let payload = serde_json::to_string_pretty(&StoreFile {
            streams: records.to_vec(),
        })
        .context("failed serializing stream database")?;
        fs::write(path, payload)
            .with_context(|| format!("failed writing stream database at {}", path.display()))?;
        Ok(())
    }
}

pub fn database_path() -> Result<PathBuf> {
    scoped_path("streams.json")
}

pub fn settings_path() -> Result<PathBuf> {
    scoped_path("settings.json")
}

pub fn log_path() -> Result<PathBuf> {
    scoped_path("stream-tui.log")
}

#[must_use]
pub fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed creating data directory {}", parent.display()))?;
    }
    Ok(())
}

fn data_root() -> Result<PathBuf> {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .context("unable to determine user data directory")
}

fn scoped_path(file: &str) -> Result<PathBuf> {
    Ok(data_root()?.join(APP_DIR).join(file))
}
