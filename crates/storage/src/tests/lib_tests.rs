use super::*;

use tempfile::TempDir;

async fn file_backed_storage() -> (TempDir, Storage) {
    let temp_root = TempDir::new().expect("temp dir");
    let db_path = temp_root.path().join("client.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));
    let storage = Storage::new(&database_url).await.expect("db");
    (temp_root, storage)
}

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let (_root, storage) = file_backed_storage().await;
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn loads_none_before_any_login() {
    let (_root, storage) = file_backed_storage().await;
    let token = storage.load_token().await.expect("load");
    assert_eq!(token, None);
}

#[tokio::test]
async fn round_trips_session_token() {
    let (_root, storage) = file_backed_storage().await;

    storage
        .save_token(&SessionToken("tok-abc".into()))
        .await
        .expect("save");

    let loaded = storage.load_token().await.expect("load");
    assert_eq!(loaded, Some(SessionToken("tok-abc".into())));

    storage.clear_token().await.expect("clear");
    assert_eq!(storage.load_token().await.expect("load"), None);
}

#[tokio::test]
async fn saving_again_replaces_the_single_row() {
    let (_root, storage) = file_backed_storage().await;

    storage
        .save_token(&SessionToken("first".into()))
        .await
        .expect("save first");
    storage
        .save_token(&SessionToken("second".into()))
        .await
        .expect("save second");

    let loaded = storage.load_token().await.expect("load");
    assert_eq!(loaded, Some(SessionToken("second".into())));

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM client_settings")
        .fetch_one(storage.pool())
        .await
        .expect("count");
    assert_eq!(count, 1);
}

#[tokio::test]
async fn token_survives_reopening_the_database() {
    let temp_root = TempDir::new().expect("temp dir");
    let db_path = temp_root.path().join("client.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    {
        let storage = Storage::new(&database_url).await.expect("db");
        storage
            .save_token(&SessionToken("persisted".into()))
            .await
            .expect("save");
    }

    let reopened = Storage::new(&database_url).await.expect("reopen");
    let loaded = reopened.load_token().await.expect("load");
    assert_eq!(loaded, Some(SessionToken("persisted".into())));
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let temp_root = TempDir::new().expect("temp dir");
    let db_path = temp_root.path().join("nested").join("client.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );
}

#[tokio::test]
async fn clearing_without_a_token_is_a_no_op() {
    let (_root, storage) = file_backed_storage().await;
    storage.clear_token().await.expect("clear");
    assert_eq!(storage.load_token().await.expect("load"), None);
}
