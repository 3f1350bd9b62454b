// src/main.rs

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use timesheet_core::config::{Config, StoreBackend};
use timesheet_core::hrms_client::{HrmsClient, HrmsConfig};
use timesheet_core::server::{router, AppState};
use timesheet_core::store::{MemoryStore, TimesheetStore};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("timesheet_core=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env().context("failed to load configuration")?;

    let store: Arc<dyn TimesheetStore> = match config.backend {
        StoreBackend::Memory => {
            info!("using in-memory store backend");
            Arc::new(MemoryStore::new())
        }
        StoreBackend::Hrms => {
            let base_url = config
                .hrms_base_url
                .clone()
                .context("HRMS_BASE_URL is required for the hrms backend")?;
            info!(%base_url, "using HRMS REST store backend");
            Arc::new(
                HrmsClient::new(HrmsConfig {
                    base_url,
                    api_token: config.hrms_api_token.clone(),
                })
                .context("failed to build HRMS client")?,
            )
        }
    };

    let app = router(AppState { store });

    info!(addr = %config.bind_addr, "timesheet service listening");
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
