use async_trait::async_trait;
use fieldmark_engine::error::FieldmarkError;
use fieldmark_engine::protocol::{FieldDescriptor, Profile, StoreNotification};
use fieldmark_engine::store::{FieldStore, JsonFileStorage, StorageArea};
use serde_json::{Map, Value};
use std::sync::Arc;

fn email() -> FieldDescriptor {
    FieldDescriptor::new("Email", "email", "input-email")
}

#[tokio::test]
async fn test_fresh_store_has_defaults() {
    let store = FieldStore::in_memory();
    assert_eq!(store.get_profile().await.unwrap(), Profile::default());
    assert_eq!(store.target_origin().await.unwrap(), "");
}

#[tokio::test]
async fn test_capture_then_delete_restores_empty() {
    let store = FieldStore::in_memory();
    store.append_captured(email()).await.unwrap();
    assert_eq!(store.get_profile().await.unwrap().captured, vec![email()]);

    store.delete_captured(0).await.unwrap();
    assert!(store.get_profile().await.unwrap().captured.is_empty());
}

#[tokio::test]
async fn test_recapture_appends_duplicate() {
    let store = FieldStore::in_memory();
    store.append_captured(email()).await.unwrap();
    store.append_captured(email()).await.unwrap();
    assert_eq!(store.get_profile().await.unwrap().captured.len(), 2);
}

#[tokio::test]
async fn test_delete_out_of_range_is_noop() {
    let store = FieldStore::in_memory();
    store
        .append_ignored(FieldDescriptor::new("", "promo", "input-text"))
        .await
        .unwrap();
    store.delete_ignored(5).await.unwrap();
    assert_eq!(store.get_profile().await.unwrap().ignored.len(), 1);
}

#[tokio::test]
async fn test_delete_keeps_order_of_rest() {
    let store = FieldStore::in_memory();
    for id in ["a", "b", "c"] {
        store
            .append_captured(FieldDescriptor::new("", id, "input-text"))
            .await
            .unwrap();
    }
    store.delete_captured(1).await.unwrap();
    let ids: Vec<String> = store
        .get_profile()
        .await
        .unwrap()
        .captured
        .into_iter()
        .map(|f| f.identifier)
        .collect();
    assert_eq!(ids, vec!["a", "c"]);
}

#[tokio::test]
async fn test_target_origin_validation() {
    let store = FieldStore::in_memory();
    let err = store.set_target_origin("   ").await.unwrap_err();
    assert_eq!(err.code(), "INVALID_ORIGIN");

    store.set_target_origin(" https://x.test ").await.unwrap();
    assert_eq!(store.target_origin().await.unwrap(), "https://x.test");
}

#[tokio::test]
async fn test_reset_replaces_profile() {
    let store = FieldStore::in_memory();
    store.set_target_origin("https://x.test").await.unwrap();
    store.append_captured(email()).await.unwrap();
    store.reset().await.unwrap();
    assert_eq!(store.get_profile().await.unwrap(), Profile::default());
}

#[tokio::test]
async fn test_every_mutation_notifies() {
    let store = FieldStore::in_memory();
    let mut rx = store.subscribe();

    store.append_captured(email()).await.unwrap();
    store.append_ignored(email()).await.unwrap();
    store.delete_captured(0).await.unwrap();
    store.delete_ignored(0).await.unwrap();
    store.set_target_origin("https://x.test").await.unwrap();
    store.reset().await.unwrap();

    let mut seen = Vec::new();
    while let Ok(n) = rx.try_recv() {
        seen.push(n);
    }
    assert_eq!(
        seen,
        vec![
            StoreNotification::FieldCaptured,
            StoreNotification::FieldIgnored,
            StoreNotification::CapturedFieldDeleted { index: 0 },
            StoreNotification::IgnoredFieldDeleted { index: 0 },
            StoreNotification::TargetOriginChanged,
            StoreNotification::ProfileReset,
        ]
    );
}

#[tokio::test]
async fn test_file_storage_persists_across_instances() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("profile.json");

    let store = FieldStore::new(Arc::new(JsonFileStorage::new(&path)));
    store.set_target_origin("https://x.test").await.unwrap();
    store.append_captured(email()).await.unwrap();

    let reopened = FieldStore::new(Arc::new(JsonFileStorage::new(&path)));
    let profile = reopened.get_profile().await.unwrap();
    assert_eq!(profile.target_origin, "https://x.test");
    assert_eq!(profile.captured, vec![email()]);

    let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["capturedFields"][0]["type"], "input-email");
    assert_eq!(raw["ignoredFields"], serde_json::json!([]));
}

#[tokio::test]
async fn test_file_storage_keeps_foreign_keys() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("profile.json");
    std::fs::write(&path, r#"{"theme":"dark"}"#).unwrap();

    let store = FieldStore::new(Arc::new(JsonFileStorage::new(&path)));
    store.append_captured(email()).await.unwrap();

    let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["theme"], "dark");
}

#[tokio::test]
async fn test_file_storage_replaces_file_whole() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("profile.json");
    let storage = Arc::new(JsonFileStorage::new(&path));
    let staging = storage.staging_path();
    assert_eq!(staging, dir.path().join("profile.json.tmp"));

    // Debris from an interrupted write is neither read nor left behind.
    std::fs::write(&staging, "{\"capturedFi").unwrap();
    let store = FieldStore::new(storage.clone());
    assert_eq!(store.get_profile().await.unwrap(), Profile::default());

    store.set_target_origin("https://x.test").await.unwrap();
    assert!(!staging.exists());
    let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["targetUrl"], "https://x.test");
}

struct BrokenStorage;

#[async_trait]
impl StorageArea for BrokenStorage {
    async fn get(&self, _keys: &[&str]) -> Result<Map<String, Value>, FieldmarkError> {
        Err(FieldmarkError::StoreUnavailable("offline".into()))
    }

    async fn set(&self, _items: Map<String, Value>) -> Result<(), FieldmarkError> {
        Err(FieldmarkError::StoreUnavailable("offline".into()))
    }
}

#[tokio::test]
async fn test_unavailable_store_surfaces_error_without_notifying() {
    let store = FieldStore::new(Arc::new(BrokenStorage));
    let mut rx = store.subscribe();
    let err = store.append_captured(email()).await.unwrap_err();
    assert_eq!(err.code(), "STORE_UNAVAILABLE");
    assert!(rx.try_recv().is_err());
}
