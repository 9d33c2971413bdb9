pub mod catalog;
pub mod db;
pub mod privileged;
pub mod rpc;
pub mod settings;
pub mod surface;
pub mod sync;
pub mod utils;

use std::{path::Path, sync::Arc, time::Duration};

use anyhow::Context;
use catalog::CatalogService;
use db::Database;
use privileged::{CompanionLauncher, DisabledLauncher, PrivilegedContext, UrlSchemeLauncher};
use rpc::{stdio::serve_lines, FocusedSurface};
use settings::SettingsStore;
use sync::{PayloadAcquirer, SyncEngine};
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;

/// Everything the privileged side owns, wired together.
pub struct AppState {
    pub settings: SettingsStore,
    pub catalog: CatalogService,
    pub focused: FocusedSurface,
    pub privileged: Arc<PrivilegedContext>,
}

impl AppState {
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data dir {}", data_dir.display()))?;

        let settings = SettingsStore::new(data_dir.join("settings.json"))?;
        let config = settings.get();

        let database = Database::new(data_dir.join("catalog.sqlite3"))?;
        let catalog = CatalogService::new(database);

        let focused = FocusedSurface::default();
        let acquirer = PayloadAcquirer::from_settings(&config, focused.clone());
        let sync = SyncEngine::new(catalog.clone(), acquirer);

        let launcher: Arc<dyn CompanionLauncher> = if config.launch_companion {
            Arc::new(
                UrlSchemeLauncher::new(config.companion_scheme.clone())
                    .with_timeout(Duration::from_millis(config.acquire_timeout_ms)),
            )
        } else {
            Arc::new(DisabledLauncher)
        };

        let privileged = Arc::new(PrivilegedContext::new(
            config.extension_id,
            catalog.clone(),
            sync,
            launcher,
        ));

        Ok(Self {
            settings,
            catalog,
            focused,
            privileged,
        })
    }
}

/// Host entry point: serve the privileged context over stdio until EOF.
pub async fn run() -> anyhow::Result<()> {
    let level = if settings::debug_enabled() {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    let data_dir = settings::data_dir();
    log::info!("watchlater starting up with data dir {}", data_dir.display());

    let state = AppState::open(&data_dir)?;
    let database = state.catalog.database();
    log::info!(
        "catalog at {} holds {} videos",
        database.path().unwrap_or(data_dir.as_path()).display(),
        database.count_videos().await?
    );

    let cancel_token = CancellationToken::new();
    let shutdown = cancel_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("interrupt received");
            shutdown.cancel();
        }
    });

    serve_lines(
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        state.privileged.clone(),
        cancel_token,
    )
    .await?;

    log::info!("watchlater shut down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::rpc::RequestHandler;

    #[tokio::test]
    async fn app_state_opens_fresh_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        let state = AppState::open(&data_dir).unwrap();

        assert!(data_dir.join("catalog.sqlite3").exists());
        assert_eq!(state.settings.get().extension_id, "watchlater");

        let response = state
            .privileged
            .handle(json!({"sender": {"extensionId": "watchlater"}, "action": "getAllVideos"}))
            .await;
        assert!(response.success);
        assert_eq!(response.videos, Some(vec![]));
    }
}
