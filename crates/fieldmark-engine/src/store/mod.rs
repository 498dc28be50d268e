//! Durable profile storage.
//!
//! Every mutation is a whole-profile read-modify-write against the shared
//! `StorageArea`. Concurrent writers from different contexts can lose
//! updates; the last write wins.

mod storage;

pub use storage::{JsonFileStorage, MemoryStorage, StorageArea};

use fieldmark_common::FieldmarkError;
use fieldmark_common::protocol::{
    CAPTURED_FIELDS_KEY, FieldDescriptor, IGNORED_FIELDS_KEY, Profile, StoreNotification,
    TARGET_URL_KEY,
};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

const PROFILE_KEYS: &[&str] = &[TARGET_URL_KEY, CAPTURED_FIELDS_KEY, IGNORED_FIELDS_KEY];

/// Capacity of the notification channel; slow subscribers skip ahead.
const NOTIFICATION_CAPACITY: usize = 64;

#[derive(Clone)]
pub struct FieldStore {
    storage: Arc<dyn StorageArea>,
    notifications: broadcast::Sender<StoreNotification>,
}

impl FieldStore {
    pub fn new(storage: Arc<dyn StorageArea>) -> Self {
        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        Self {
            storage,
            notifications,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    /// Receive a notification after every successful mutation.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreNotification> {
        self.notifications.subscribe()
    }

    /// The stored profile, with defaults for anything never written.
    pub async fn get_profile(&self) -> Result<Profile, FieldmarkError> {
        let items = self.storage.get(PROFILE_KEYS).await?;
        Ok(serde_json::from_value(Value::Object(items))?)
    }

    pub async fn target_origin(&self) -> Result<String, FieldmarkError> {
        let items = self.storage.get(&[TARGET_URL_KEY]).await?;
        match items.get(TARGET_URL_KEY) {
            Some(value) => Ok(serde_json::from_value(value.clone())?),
            None => Ok(String::new()),
        }
    }

    pub async fn append_captured(&self, field: FieldDescriptor) -> Result<(), FieldmarkError> {
        let mut profile = self.get_profile().await?;
        debug!("Capturing field {:?}", field.identifier);
        profile.captured.push(field);
        self.write(&profile, StoreNotification::FieldCaptured).await
    }

    pub async fn append_ignored(&self, field: FieldDescriptor) -> Result<(), FieldmarkError> {
        let mut profile = self.get_profile().await?;
        debug!("Ignoring field {:?}", field.identifier);
        profile.ignored.push(field);
        self.write(&profile, StoreNotification::FieldIgnored).await
    }

    /// Remove the captured field at `index` of the caller's latest snapshot.
    /// An out-of-range index leaves the list unchanged.
    pub async fn delete_captured(&self, index: usize) -> Result<(), FieldmarkError> {
        let mut profile = self.get_profile().await?;
        profile.captured = without_index(profile.captured, index);
        self.write(&profile, StoreNotification::CapturedFieldDeleted { index })
            .await
    }

    pub async fn delete_ignored(&self, index: usize) -> Result<(), FieldmarkError> {
        let mut profile = self.get_profile().await?;
        profile.ignored = without_index(profile.ignored, index);
        self.write(&profile, StoreNotification::IgnoredFieldDeleted { index })
            .await
    }

    pub async fn set_target_origin(&self, origin: &str) -> Result<(), FieldmarkError> {
        let origin = origin.trim();
        if origin.is_empty() {
            return Err(FieldmarkError::InvalidOrigin(origin.to_string()));
        }
        let mut profile = self.get_profile().await?;
        profile.target_origin = origin.to_string();
        self.write(&profile, StoreNotification::TargetOriginChanged)
            .await
    }

    /// Replace the profile with defaults.
    pub async fn reset(&self) -> Result<(), FieldmarkError> {
        self.write(&Profile::default(), StoreNotification::ProfileReset)
            .await
    }

    async fn write(
        &self,
        profile: &Profile,
        notification: StoreNotification,
    ) -> Result<(), FieldmarkError> {
        let Value::Object(items) = serde_json::to_value(profile)? else {
            return Err(FieldmarkError::Serialization(
                "profile did not serialize to an object".into(),
            ));
        };
        self.storage.set(items).await?;
        // No subscribers is not an error.
        let _ = self.notifications.send(notification);
        Ok(())
    }
}

fn without_index(fields: Vec<FieldDescriptor>, index: usize) -> Vec<FieldDescriptor> {
    if index >= fields.len() {
        debug!("Delete index {} out of range ({} fields)", index, fields.len());
    }
    fields
        .into_iter()
        .enumerate()
        .filter(|(i, _)| *i != index)
        .map(|(_, f)| f)
        .collect()
}
