use async_trait::async_trait;
use fieldmark_common::FieldmarkError;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// Asynchronous key-value area shared by every context.
#[async_trait]
pub trait StorageArea: Send + Sync {
    /// Read `keys`. Keys that were never written are absent from the result.
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, FieldmarkError>;

    /// Write `items`, leaving other keys untouched.
    async fn set(&self, items: Map<String, Value>) -> Result<(), FieldmarkError>;
}

#[derive(Clone, Default)]
pub struct MemoryStorage {
    items: Arc<Mutex<Map<String, Value>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageArea for MemoryStorage {
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, FieldmarkError> {
        let items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(select(&items, keys))
    }

    async fn set(&self, new_items: Map<String, Value>) -> Result<(), FieldmarkError> {
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        items.extend(new_items);
        Ok(())
    }
}

/// Storage persisted as one JSON object in a file, rewritten on every set.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling file a write lands in before replacing `path`.
    pub fn staging_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    async fn load(&self) -> Result<Map<String, Value>, FieldmarkError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(unavailable(&self.path, e)),
        };
        if content.trim().is_empty() {
            return Ok(Map::new());
        }
        Ok(serde_json::from_str(&content)?)
    }
}

#[async_trait]
impl StorageArea for JsonFileStorage {
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, FieldmarkError> {
        let items = self.load().await?;
        Ok(select(&items, keys))
    }

    async fn set(&self, new_items: Map<String, Value>) -> Result<(), FieldmarkError> {
        let mut items = self.load().await?;
        items.extend(new_items);

        if let Some(dir) = self.path.parent()
            && !dir.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| unavailable(dir, e))?;
        }
        let content = serde_json::to_string_pretty(&Value::Object(items))?;
        // Readers see either the old file or the new one, never a partial write.
        let staging = self.staging_path();
        tokio::fs::write(&staging, content)
            .await
            .map_err(|e| unavailable(&staging, e))?;
        tokio::fs::rename(&staging, &self.path)
            .await
            .map_err(|e| unavailable(&self.path, e))
    }
}

fn select(items: &Map<String, Value>, keys: &[&str]) -> Map<String, Value> {
    keys.iter()
        .filter_map(|k| items.get(*k).map(|v| (k.to_string(), v.clone())))
        .collect()
}

fn unavailable(path: &Path, err: std::io::Error) -> FieldmarkError {
    FieldmarkError::StoreUnavailable(format!("{}: {}", path.display(), err))
}
