use cmetrack_core::db::migrations::{applied_migrations, known_migrations};
use cmetrack_core::model::person::NewPerson;
use cmetrack_core::repo::person_repo::SqlitePersonRepository;
use cmetrack_core::{open_pool, CoreConfig, PoolSettings, ResourceRepository};
use std::time::Duration;

#[test]
fn pooled_connections_share_one_migrated_file() {
    let dir = tempfile::tempdir().unwrap();
    let settings = PoolSettings::new(dir.path().join("pool.db"));
    let pool = open_pool(&settings).unwrap();

    let writer = pool.get().unwrap();
    assert_eq!(applied_migrations(&writer).unwrap(), known_migrations());
    let created = SqlitePersonRepository::new(&writer)
        .create(&NewPerson::new("Ann", "Lee"))
        .unwrap();

    let reader = pool.get().unwrap();
    let found = SqlitePersonRepository::new(&reader).find(created.id).unwrap();
    assert!(found.is_some());

    let foreign_keys: i64 = reader
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .unwrap();
    let journal_mode: String = reader
        .query_row("PRAGMA journal_mode;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(foreign_keys, 1);
    assert_eq!(journal_mode.to_ascii_lowercase(), "wal");
}

#[test]
fn pool_ceiling_times_out_waiting_callers() {
    let dir = tempfile::tempdir().unwrap();
    let settings = PoolSettings {
        max_size: 1,
        connection_timeout: Duration::from_millis(100),
        ..PoolSettings::new(dir.path().join("pool.db"))
    };
    let pool = open_pool(&settings).unwrap();

    let held = pool.get().unwrap();
    assert!(pool.get().is_err());
    drop(held);
    assert!(pool.get().is_ok());
}

#[test]
fn config_drives_pool_settings() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("configured.db");
    let path_text = db_path.to_str().unwrap().to_string();
    let config = CoreConfig::from_lookup(|key| match key {
        "CMETRACK_DB_PATH" => Some(path_text.clone()),
        "CMETRACK_POOL_MAX_SIZE" => Some("2".to_string()),
        _ => None,
    })
    .unwrap();

    let pool = open_pool(&config.pool_settings()).unwrap();
    assert_eq!(pool.max_size(), 2);
    assert!(db_path.exists());
}
