use chrono::Duration;
use std::sync::Arc;
use upload_session_api::history::{HistoryEntry, SessionHistory};
use upload_session_api::session::{FileRecord, MemorySessionStore, SessionManager};
use upload_session_api::token::TokenSigner;

fn file(filename: &str, sum: i64) -> FileRecord {
    FileRecord {
        filename: filename.to_string(),
        sum,
    }
}

fn build_manager(history: Arc<SessionHistory>) -> SessionManager {
    SessionManager::new(
        TokenSigner::new("integration-secret", "file-upload"),
        Arc::new(MemorySessionStore::new()),
        history,
        Duration::seconds(3600),
    )
}

/// Full upload flow: a cookie-less request mints a session, subsequent
/// requests with the returned token extend the same record.
#[tokio::test]
async fn test_upload_flow_extends_one_session() {
    let dir = tempfile::tempdir().unwrap();
    let history = Arc::new(SessionHistory::new(dir.path().join("sessions.json"), 100));
    let manager = build_manager(history);

    let first = manager
        .process_upload(None, file("a.json", 10))
        .await
        .unwrap();
    assert_eq!(first.record.files, vec![file("a.json", 10)]);

    let second = manager
        .process_upload(Some(&first.token), file("b.json", 5))
        .await
        .unwrap();
    assert_eq!(second.session_id, first.session_id);
    assert_eq!(
        second.record.files,
        vec![file("a.json", 10), file("b.json", 5)]
    );

    // The diagnostic interface sees the same record.
    let stored = manager.get(first.session_id).await.unwrap().unwrap();
    assert_eq!(stored, second.record);

    let all = manager.get_all().await.unwrap();
    assert_eq!(all.len(), 1);
}

/// Every verification failure collapses to "start a new session"; no error
/// reaches the caller and no existing record is touched.
#[tokio::test]
async fn test_bad_credentials_start_fresh_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let history = Arc::new(SessionHistory::new(dir.path().join("sessions.json"), 100));
    let manager = build_manager(history);

    let first = manager
        .process_upload(None, file("a.json", 10))
        .await
        .unwrap();

    // A token signed by someone else.
    let foreign = TokenSigner::new("other-secret", "file-upload").mint(first.session_id);
    let outcome = manager
        .process_upload(Some(&foreign), file("b.json", 5))
        .await
        .unwrap();
    assert_ne!(outcome.session_id, first.session_id);

    // Structurally broken credentials.
    let outcome = manager
        .process_upload(Some("garbage"), file("c.json", 7))
        .await
        .unwrap();
    assert!(!outcome.reused_session);

    let original = manager.get(first.session_id).await.unwrap().unwrap();
    assert_eq!(original.files, vec![file("a.json", 10)]);
    assert_eq!(manager.get_all().await.unwrap().len(), 3);
}

/// Uploads are recorded into the history log and the saved file is bounded
/// to the most recent 100 entries.
#[tokio::test]
async fn test_history_records_uploads_and_stays_bounded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sessions.json");
    let history = Arc::new(SessionHistory::new(&path, 100));
    let manager = build_manager(history.clone());

    let seed = manager
        .process_upload(None, file("f0.json", 0))
        .await
        .unwrap();
    for i in 1..150 {
        manager
            .process_upload(Some(&seed.token), file(&format!("f{}.json", i), i))
            .await
            .unwrap();
    }

    assert_eq!(history.len().await, 150);
    history.save().await.unwrap();

    let saved: Vec<HistoryEntry> =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(saved.len(), 100);
    assert_eq!(saved[0].filename, "f50.json");
    assert_eq!(saved[99].filename, "f149.json");
    assert!(saved.iter().all(|e| e.session_id == seed.session_id.to_string()));

    // A restart picks the log back up.
    let reopened = SessionHistory::new(&path, 100);
    reopened.open().await;
    assert_eq!(reopened.len().await, 100);
}
