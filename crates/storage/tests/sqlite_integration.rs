use storage::repository::{KeyValueRepository, Storage, StorageKey};
use storage::sqlite::SqliteRepository;

#[tokio::test]
async fn sqlite_upserts_and_removes_values() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_kv_roundtrip?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    assert_eq!(repo.get(StorageKey::UserProgress).await.unwrap(), None);

    repo.set(StorageKey::UserProgress, r#"{"Networking":{}}"#)
        .await
        .unwrap();
    repo.set(StorageKey::UserProgress, r#"{"Files":{}}"#)
        .await
        .unwrap();
    assert_eq!(
        repo.get(StorageKey::UserProgress).await.unwrap().as_deref(),
        Some(r#"{"Files":{}}"#)
    );

    repo.remove(StorageKey::UserProgress).await.unwrap();
    assert_eq!(repo.get(StorageKey::UserProgress).await.unwrap(), None);
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_kv_migrate?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("first migrate");
    repo.set(StorageKey::LastUpdated, "2023-11-14T22:13:20Z")
        .await
        .unwrap();
    repo.migrate().await.expect("second migrate");

    assert_eq!(
        repo.get(StorageKey::LastUpdated).await.unwrap().as_deref(),
        Some("2023-11-14T22:13:20Z")
    );
}

#[tokio::test]
async fn storage_sqlite_keys_are_independent() {
    let storage = Storage::sqlite("sqlite:file:memdb_kv_storage?mode=memory&cache=shared")
        .await
        .expect("storage");

    for key in StorageKey::ALL {
        storage.kv.set(key, key.as_str()).await.unwrap();
    }
    storage.kv.remove(StorageKey::FlashcardData).await.unwrap();

    assert_eq!(storage.kv.get(StorageKey::FlashcardData).await.unwrap(), None);
    assert_eq!(
        storage
            .kv
            .get(StorageKey::UserProgress)
            .await
            .unwrap()
            .as_deref(),
        Some("user_progress")
    );
}
