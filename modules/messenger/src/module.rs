use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use sea_orm::DatabaseConnection;
use sea_orm_migration::MigratorTrait;
use tracing::{debug, info};

use crate::config::MessengerConfig;
use crate::contract::client::MessengerApi;
use crate::domain::repo::Repositories;
use crate::domain::service::Service;
use crate::gateways::local::MessengerLocalClient;
use crate::infra::assets::LocalFsAssetStore;
use crate::infra::events::TracingEventPublisher;
use crate::infra::storage::migrations::Migrator;
use crate::infra::storage::SeaOrmMessengerRepository;

/// The wired messenger module: domain service over SeaORM storage and a
/// local-filesystem asset store.
#[derive(Clone)]
pub struct Messenger {
    service: Arc<Service>,
    assets_root: PathBuf,
}

impl Messenger {
    /// Run the messenger schema migrations.
    pub async fn migrate(db: &DatabaseConnection) -> anyhow::Result<()> {
        info!("Running messenger database migrations");
        Migrator::up(db, None)
            .await
            .context("messenger migrations failed")?;
        info!("Messenger database migrations completed successfully");
        Ok(())
    }

    /// Wire repositories, asset store and event publisher into the service.
    ///
    /// A relative `assets_dir` is resolved against `home_dir`. The schema is
    /// expected to be migrated already.
    pub async fn init(
        db: DatabaseConnection,
        cfg: MessengerConfig,
        home_dir: &Path,
    ) -> anyhow::Result<Self> {
        info!("Initializing messenger module");
        debug!(
            "Loaded messenger config: assets_dir={}, avatar_prefix={}, max_link_length={}",
            cfg.assets_dir, cfg.avatar_prefix, cfg.max_link_length
        );

        let assets_root = resolve_assets_dir(&cfg.assets_dir, home_dir);
        tokio::fs::create_dir_all(&assets_root)
            .await
            .with_context(|| format!("failed to create assets dir {}", assets_root.display()))?;

        let repo = Arc::new(SeaOrmMessengerRepository::new(db));
        let service = Service::new(
            Repositories::shared(repo),
            Arc::new(LocalFsAssetStore::new(&assets_root)),
            Arc::new(TracingEventPublisher),
            cfg.service_config(),
        );

        info!(assets = %assets_root.display(), "Messenger module ready");
        Ok(Self {
            service: Arc::new(service),
            assets_root,
        })
    }

    pub fn service(&self) -> Arc<Service> {
        self.service.clone()
    }

    /// In-process client for other modules.
    pub fn client(&self) -> Arc<dyn MessengerApi> {
        Arc::new(MessengerLocalClient::new(self.service.clone()))
    }

    pub fn assets_root(&self) -> &Path {
        &self.assets_root
    }
}

fn resolve_assets_dir(assets_dir: &str, home_dir: &Path) -> PathBuf {
    let path = PathBuf::from(assets_dir);
    if path.is_absolute() {
        path
    } else {
        home_dir.join(path)
    }
}
