//! Study module
//!
//! Student authorization, quota metering, pluggable problem processing and
//! recordbook tracking for the language-learning backend.
//!
//! ## Public API
//!
//! Models, errors, the security context and collaborator traits live in the
//! `study-sdk` crate and are re-exported here. [`Service`] is the
//! transactional entry point transports call; [`bootstrap`] wires it from a
//! [`StudyConfig`].

pub use study_sdk::{
    ClientError, CorpusClient, PluginErrorKind, SecurityContext, StudyError, SynthesizerClient,
    TranslationClient,
};

pub mod config;
pub mod processors;
pub mod telemetry;

// Exposed for integration tests; transports should only need `Service`.
#[doc(hidden)]
pub mod domain;
#[doc(hidden)]
pub mod infra;

#[cfg(test)]
mod test_support;

pub use config::StudyConfig;
pub use domain::error::DomainError;
pub use domain::model::{ProblemSelector, PropertyCondition};
pub use domain::processor::{
    ProblemAddParameter, ProblemUpdateParameter, ProcessorRegistry, QuotaPolicy, UpdateCounts,
};
pub use domain::service::{Service, ServiceConfig};
pub use processors::ProcessorClients;

use std::sync::Arc;

use anyhow::Context;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;

use crate::config::DatabaseConfig;
use crate::domain::clock::SystemClock;
use crate::infra::storage::migrations::Migrator;

/// Opens the pool and applies pending migrations when configured to.
pub async fn connect(config: &DatabaseConfig) -> anyhow::Result<DatabaseConnection> {
    let mut options = ConnectOptions::new(config.url.clone());
    options.sqlx_logging(false);
    if let Some(max) = config.max_connections {
        options.max_connections(max);
    }
    let db = Database::connect(options)
        .await
        .with_context(|| format!("failed to connect to {}", config.url))?;

    if config.migrate {
        Migrator::up(&db, None)
            .await
            .context("failed to apply study migrations")?;
        tracing::info!("study migrations applied");
    }
    Ok(db)
}

/// Builds a ready [`Service`] from configuration and collaborator clients.
pub async fn bootstrap(
    config: &StudyConfig,
    clients: &ProcessorClients,
) -> anyhow::Result<Service> {
    config.validate()?;
    let db = connect(&config.database).await?;
    let registry = processors::default_registry(&config.quotas, clients);
    Ok(Service::new(
        db,
        Arc::new(registry),
        Arc::new(SystemClock),
        config.service.clone(),
    ))
}
