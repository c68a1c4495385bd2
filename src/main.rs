use anyhow::Result;
use chrono::TimeDelta;
use std::sync::Arc;
use tempo_sync::config::Config;
use tempo_sync::logging::init_logging;
use tempo_sync::poller::SharedResult;
use tempo_sync::{ApiClient, TempoPoller, TokenManager};
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Config path override
const ENV_CONFIG_PATH: &str = "TEMPO_SYNC_CONFIG";

fn load_config() -> Result<Config> {
    let mut config = match std::env::var(ENV_CONFIG_PATH) {
        Ok(path) if !path.trim().is_empty() => Config::from_file(path.trim())
            .map_err(|e| anyhow::anyhow!("Failed to load config from {}: {}", path, e))?,
        _ => Config::load().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?,
    };
    config.apply_env_overrides();
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;
    Ok(config)
}

async fn report_updates(mut rx: watch::Receiver<SharedResult>, tz: chrono_tz::Tz) {
    while rx.changed().await.is_ok() {
        let Some(data) = rx.borrow_and_update().clone() else {
            continue;
        };
        let today = chrono::Utc::now().with_timezone(&tz).date_naive();
        let color = |date| {
            data.color_on(date)
                .map(|c| c.to_string())
                .unwrap_or_else(|| "unknown".to_string())
        };
        info!(
            days = data.date_aligned_days.len(),
            today = %color(today),
            tomorrow = %color(today + TimeDelta::days(1)),
            "Tempo calendar updated"
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config()?;
    init_logging(&config.logging).map_err(|e| anyhow::anyhow!("Failed to init logging: {}", e))?;

    info!("Tempo-Sync {} starting up", tempo_sync::APP_VERSION);
    if !config.has_credentials() {
        return Err(anyhow::anyhow!(
            "Missing API credentials: set api.client_id/api.client_secret or TEMPO_CLIENT_ID/TEMPO_CLIENT_SECRET"
        ));
    }

    // One transport shared by the token manager and the calendar client
    let http = reqwest::Client::builder()
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;
    let tokens = Arc::new(TokenManager::new(http.clone(), &config.api));
    let client = Arc::new(
        ApiClient::new(http, tokens, &config)
            .map_err(|e| anyhow::anyhow!("Failed to create API client: {}", e))?,
    );

    if let Err(e) = client.test_credentials().await {
        error!("Credential check failed: {}", e);
        return Err(anyhow::anyhow!("Credential check failed: {}", e));
    }

    let mut poller = TempoPoller::new(Arc::clone(&client), &config.schedule)
        .map_err(|e| anyhow::anyhow!("Failed to create poller: {}", e))?;
    let reporter = tokio::spawn(report_updates(poller.subscribe(), poller.timezone()));

    let shutdown = poller.shutdown_handle();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            return;
        }
        info!("Ctrl-C received, shutting down");
        shutdown.shutdown();
    });

    let outcome = poller.run().await;
    reporter.abort();
    match outcome {
        Ok(()) => {
            info!("Tempo-Sync shutdown complete");
            Ok(())
        }
        Err(e) => {
            error!("Poller failed with error: {}", e);
            Err(anyhow::anyhow!("Poller error: {}", e))
        }
    }
}
