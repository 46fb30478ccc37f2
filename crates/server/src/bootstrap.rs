use std::sync::Arc;

use funil_core::config::{AppConfig, ConfigError, LoadOptions};
use funil_core::followup::tracking::FollowupTrackingService;
use funil_core::pipeline::StageTransitionService;
use funil_core::store::{ActivityLog, DealStore, FollowupStageSource};
use funil_core::sweep::StagnationSweeper;
use funil_db::repositories::{
    SqlActivityLog, SqlDealStore, SqlFollowupStageSource, SqlTrackingStore,
};
use funil_db::{connect_with_settings, migrations, DbPool};
use thiserror::Error;
use tracing::info;

use crate::notify::WebhookNotifier;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub deals: Arc<dyn DealStore>,
    pub followup_stages: Arc<dyn FollowupStageSource>,
    pub transitions: Arc<StageTransitionService>,
    pub tracking: Arc<FollowupTrackingService>,
    pub sweeper: Arc<StagnationSweeper>,
    pub notifier: Option<Arc<WebhookNotifier>>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        deal_id = "unknown",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        deal_id = "unknown",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        deal_id = "unknown",
        "database migrations applied"
    );

    let deals: Arc<dyn DealStore> = Arc::new(SqlDealStore::new(db_pool.clone()));
    let followup_stages: Arc<dyn FollowupStageSource> =
        Arc::new(SqlFollowupStageSource::new(db_pool.clone()));
    let activity: Arc<dyn ActivityLog> = Arc::new(SqlActivityLog::new(db_pool.clone()));
    let tracking_store = Arc::new(SqlTrackingStore::new(db_pool.clone()));

    let transitions = Arc::new(StageTransitionService::new(deals.clone(), activity.clone()));
    let tracking = Arc::new(FollowupTrackingService::new(tracking_store, activity.clone()));
    let sweeper = Arc::new(StagnationSweeper::new(deals.clone(), transitions.clone()));
    let notifier = WebhookNotifier::from_config(&config.notify).map(Arc::new);

    Ok(Application {
        config,
        db_pool,
        deals,
        followup_stages,
        transitions,
        tracking,
        sweeper,
        notifier,
    })
}
