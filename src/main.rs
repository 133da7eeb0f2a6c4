use anyhow::Result;
use chargewatch::backend::HttpBackend;
use chargewatch::web::AppState;
use chargewatch::{Config, Monitor};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;
    config.validate()?;

    chargewatch::logging::init_logging(&config.logging)?;
    info!("ChargeWatch {} starting up", env!("APP_VERSION"));

    let backend = Arc::new(HttpBackend::new(config.backend.clone())?);
    let (handle, monitor_task) = Monitor::spawn(config.clone(), backend);

    let web_task = if config.web.enabled {
        let state = AppState {
            monitor: handle.clone(),
            currency_symbol: config.pricing.currency_symbol.clone(),
        };
        let host = config.web.host.clone();
        let port = config.web.port;
        Some(tokio::spawn(async move {
            if let Err(e) = chargewatch::web::serve(state, &host, port).await {
                error!("Web server error: {}", e);
            }
        }))
    } else {
        None
    };

    tokio::signal::ctrl_c().await?;
    info!("Interrupt received; shutting down");
    let _ = handle.shutdown();

    let outcome = monitor_task.await;
    if let Some(task) = web_task {
        task.abort();
    }
    match outcome {
        Ok(Ok(())) => {
            info!("Monitor shutdown complete");
            Ok(())
        }
        Ok(Err(e)) => Err(anyhow::anyhow!("Monitor error: {}", e)),
        Err(e) => Err(anyhow::anyhow!("Monitor task failed: {}", e)),
    }
}
