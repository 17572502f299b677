#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use tempfile::TempDir;

use messenger::config::MessengerConfig;
use messenger::contract::client::MessengerApi;
use messenger::domain::service::Service;
use messenger::Messenger;

/// A migrated in-memory database plus a wired module with its own asset dir.
pub struct TestEnv {
    pub db: DatabaseConnection,
    pub module: Messenger,
    pub client: Arc<dyn MessengerApi>,
    pub service: Arc<Service>,
    pub home: TempDir,
}

/// Create a fresh test database for each test
pub async fn create_test_db() -> DatabaseConnection {
    // Every in-memory connection is a separate database, so keep exactly one.
    let mut opts = ConnectOptions::new("sqlite::memory:");
    opts.max_connections(1).min_connections(1).sqlx_logging(false);

    let db = Database::connect(opts)
        .await
        .expect("Failed to connect to test database");

    Messenger::migrate(&db)
        .await
        .expect("Failed to run migrations");

    db
}

/// A sqlite file under `home` behind a pool of `max_conns` connections, so
/// concurrent callers really race each other.
pub async fn create_pooled_file_db(home: &TempDir, max_conns: u32) -> DatabaseConnection {
    let path = home.path().join("messenger.db");
    let dsn = format!("sqlite://{}?mode=rwc", path.to_string_lossy().replace('\\', "/"));

    let mut opts = ConnectOptions::new(dsn);
    opts.max_connections(max_conns).sqlx_logging(false);
    opts.map_sqlx_sqlite_opts(|o| o.busy_timeout(Duration::from_secs(10)));

    let db = Database::connect(opts)
        .await
        .expect("Failed to connect to file database");

    Messenger::migrate(&db)
        .await
        .expect("Failed to run migrations");

    db
}

pub async fn create_test_env() -> TestEnv {
    let db = create_test_db().await;
    let home = tempfile::tempdir().expect("Failed to create temp dir");
    env_with(db, home).await
}

pub async fn create_pooled_test_env(max_conns: u32) -> TestEnv {
    let home = tempfile::tempdir().expect("Failed to create temp dir");
    let db = create_pooled_file_db(&home, max_conns).await;
    env_with(db, home).await
}

async fn env_with(db: DatabaseConnection, home: TempDir) -> TestEnv {

    let module = Messenger::init(db.clone(), MessengerConfig::default(), home.path())
        .await
        .expect("Failed to init messenger module");

    TestEnv {
        client: module.client(),
        service: module.service(),
        db,
        module,
        home,
    }
}
