//! Storage for SEO override records.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::record::SeoOverride;
use crate::error::{Result, ToolsetError};

/// Lookup and upsert of override records keyed by exact URL path.
#[async_trait]
pub trait SeoStore: Send + Sync {
    /// Fetch the override for `path`, if one exists.
    async fn get(&self, path: &str) -> Result<Option<SeoOverride>>;

    /// Insert or replace the override for `record.url`.
    async fn upsert(&self, record: SeoOverride) -> Result<()>;
}

/// In-memory override store.
#[derive(Debug, Default)]
pub struct MemorySeoStore {
    records: RwLock<HashMap<String, SeoOverride>>,
}

impl MemorySeoStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `records`. Later duplicates replace earlier ones.
    pub fn with_records(records: impl IntoIterator<Item = SeoOverride>) -> Self {
        let records = records
            .into_iter()
            .map(|record| (record.url.clone(), record))
            .collect();
        Self {
            records: RwLock::new(records),
        }
    }

    /// All records, ordered by URL.
    pub fn snapshot(&self) -> Vec<SeoOverride> {
        let mut records: Vec<SeoOverride> = self.records.read().values().cloned().collect();
        records.sort_by(|a, b| a.url.cmp(&b.url));
        records
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    fn validate(record: &SeoOverride) -> Result<()> {
        record.validate().map_err(|errors| {
            let fields: Vec<&str> = errors.keys().copied().collect();
            ToolsetError::Validation(format!("invalid fields: {}", fields.join(", ")))
        })
    }
}

#[async_trait]
impl SeoStore for MemorySeoStore {
    async fn get(&self, path: &str) -> Result<Option<SeoOverride>> {
        Ok(self.records.read().get(path).cloned())
    }

    async fn upsert(&self, record: SeoOverride) -> Result<()> {
        Self::validate(&record)?;
        debug!(url = %record.url, "Upserting SEO override");
        self.records.write().insert(record.url.clone(), record);
        Ok(())
    }
}

/// Override store persisted to a YAML file.
///
/// The whole file is read at startup and rewritten after every upsert.
pub struct YamlSeoStore {
    path: PathBuf,
    records: MemorySeoStore,
    write_lock: Mutex<()>,
}

impl YamlSeoStore {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let records: Vec<SeoOverride> = match std::fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => Vec::new(),
            Ok(contents) => serde_yaml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        for record in &records {
            MemorySeoStore::validate(record)?;
        }

        info!(
            path = %path.display(),
            records = records.len(),
            "Loaded SEO overrides"
        );

        Ok(Self {
            path,
            records: MemorySeoStore::with_records(records),
            write_lock: Mutex::new(()),
        })
    }

    async fn persist(&self, records: &[SeoOverride]) -> Result<()> {
        let yaml = serde_yaml::to_string(records)?;
        let tmp = self.path.with_extension("yaml.tmp");
        tokio::fs::write(&tmp, yaml).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl SeoStore for YamlSeoStore {
    async fn get(&self, path: &str) -> Result<Option<SeoOverride>> {
        self.records.get(path).await
    }

    async fn upsert(&self, record: SeoOverride) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        MemorySeoStore::validate(&record)?;

        // Disk first: memory only changes once the file holds the record.
        let mut records = self.records.snapshot();
        match records.iter_mut().find(|r| r.url == record.url) {
            Some(existing) => *existing = record.clone(),
            None => {
                records.push(record.clone());
                records.sort_by(|a, b| a.url.cmp(&b.url));
            }
        }
        self.persist(&records).await?;

        self.records.upsert(record).await
    }
}
