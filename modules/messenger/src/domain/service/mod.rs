use std::sync::Arc;

use crate::domain::error::DomainError;
use crate::domain::events::MessengerEvent;
use crate::domain::ports::{AssetStore, EventPublisher};
use crate::domain::repo::Repositories;

mod messages;
mod profiles;
mod threads;
mod users;

/// Domain service with the messaging business rules.
/// Depends only on the repository and asset ports, not on infra types.
#[derive(Clone)]
pub struct Service {
    repos: Repositories,
    assets: Arc<dyn AssetStore>,
    events: Arc<dyn EventPublisher<MessengerEvent>>,
    config: ServiceConfig,
}

/// Configuration for the domain service
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Asset-store directory under which avatars are kept.
    pub avatar_prefix: String,
    pub max_link_length: usize,
    pub max_username_length: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            avatar_prefix: "profiles".to_string(),
            max_link_length: 200,
            max_username_length: 150,
        }
    }
}

impl Service {
    /// Create a service with dependencies.
    pub fn new(
        repos: Repositories,
        assets: Arc<dyn AssetStore>,
        events: Arc<dyn EventPublisher<MessengerEvent>>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            repos,
            assets,
            events,
            config,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }
}

fn db_err(e: anyhow::Error) -> DomainError {
    // {:#} keeps the context chain on one line
    DomainError::database(format!("{e:#}"))
}

fn asset_err(e: anyhow::Error) -> DomainError {
    DomainError::asset(format!("{e:#}"))
}
