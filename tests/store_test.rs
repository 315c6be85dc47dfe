//! Tests for the key-value stores behind the response cache.

use tessera::{FileStore, KeyValueStore, MemoryStore};

async fn exercise(store: &dyn KeyValueStore) {
    assert_eq!(store.get("ns:cache:a").await.unwrap(), None);

    store.set("ns:cache:a", "one".into()).await.unwrap();
    store.set("ns:cache:b", "two".into()).await.unwrap();
    store.set("ns:context", "ctx".into()).await.unwrap();
    assert_eq!(store.get("ns:cache:a").await.unwrap().as_deref(), Some("one"));

    store.set("ns:cache:a", "uno".into()).await.unwrap();
    assert_eq!(store.get("ns:cache:a").await.unwrap().as_deref(), Some("uno"));

    let mut keys = store.keys_with_prefix("ns:cache:").await.unwrap();
    keys.sort();
    assert_eq!(keys, vec!["ns:cache:a", "ns:cache:b"]);

    store.remove("ns:cache:a").await.unwrap();
    store.remove("ns:cache:a").await.unwrap();
    assert_eq!(store.get("ns:cache:a").await.unwrap(), None);
    assert_eq!(store.keys_with_prefix("ns:cache:").await.unwrap().len(), 1);
}

#[tokio::test]
async fn memory_store_contract() {
    exercise(&MemoryStore::new()).await;
}

#[tokio::test]
async fn file_store_contract() {
    let dir = tempfile::tempdir().unwrap();
    exercise(&FileStore::new(dir.path())).await;
}

#[tokio::test]
async fn file_store_missing_directory_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path().join("not-yet-created"));
    assert!(store.keys_with_prefix("").await.unwrap().is_empty());
    assert_eq!(store.get("k").await.unwrap(), None);
    store.remove("k").await.unwrap();
}

#[tokio::test]
async fn file_store_persists_across_instances() {
    let dir = tempfile::tempdir().unwrap();
    FileStore::new(dir.path())
        .set("key with / odd: chars", "v".into())
        .await
        .unwrap();
    let reopened = FileStore::new(dir.path());
    assert_eq!(
        reopened.get("key with / odd: chars").await.unwrap().as_deref(),
        Some("v")
    );
}

#[tokio::test]
async fn file_store_skips_foreign_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("README.txt"), "hello").unwrap();
    std::fs::write(dir.path().join("zz-not-hex.json"), "{}").unwrap();
    let store = FileStore::new(dir.path());
    store.set("real", "1".into()).await.unwrap();
    assert_eq!(store.keys_with_prefix("").await.unwrap(), vec!["real"]);
}

#[tokio::test]
async fn bounded_memory_store_accepts_writes() {
    let store = MemoryStore::with_max_entries(10);
    store.set("a", "1".into()).await.unwrap();
    assert_eq!(store.get("a").await.unwrap().as_deref(), Some("1"));
}
