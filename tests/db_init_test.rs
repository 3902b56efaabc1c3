use recollect::db;
use recollect::db::migrations::CURRENT_SCHEMA_VERSION;
use tempfile::TempDir;

#[test]
fn open_creates_new_db_at_nonexistent_path() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("subdir").join("new.db");
    assert!(!db_path.exists());

    let conn = db::open_database(&db_path).unwrap();
    assert!(db_path.exists());

    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM memories", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 0);
}

#[test]
fn health_check_passes_on_fresh_db() {
    let conn = db::open_memory_database().unwrap();
    let report = db::check_database_health(&conn).unwrap();
    assert!(report.integrity_ok);
    assert_eq!(report.schema_version, CURRENT_SCHEMA_VERSION);
    assert_eq!(report.collections, 0);
    assert_eq!(report.documents, 0);
    assert_eq!(report.chunks, 0);
    assert_eq!(report.memories, 0);
    assert_eq!(report.sessions, 0);
}

#[test]
fn pragmas_are_applied() {
    let tmp = TempDir::new().unwrap();
    let conn = db::open_database(tmp.path().join("test.db")).unwrap();

    let timeout: i64 = conn
        .pragma_query_value(None, "busy_timeout", |row| row.get(0))
        .unwrap();
    assert_eq!(timeout, 5000);

    let fk: i64 = conn
        .pragma_query_value(None, "foreign_keys", |row| row.get(0))
        .unwrap();
    assert_eq!(fk, 1);
}

#[test]
fn reopening_preserves_data() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("persist.db");
    {
        let conn = db::open_database(&path).unwrap();
        conn.execute(
            "INSERT INTO sessions (id, agent_id, started_at, last_active_at, message_count, metadata)
             VALUES ('session_1', NULL, '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z', 0, '{}')",
            [],
        )
        .unwrap();
    }
    let conn = db::open_database(&path).unwrap();
    let report = db::check_database_health(&conn).unwrap();
    assert_eq!(report.sessions, 1);
    assert_eq!(report.schema_version, CURRENT_SCHEMA_VERSION);
}
