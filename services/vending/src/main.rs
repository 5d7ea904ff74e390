//! Credential vending HTTP service entry point.
//!
//! # Purpose
//! Wires configuration, signing credentials and vendors into the HTTP router,
//! then serves the API and the Prometheus metrics endpoint.
use std::future::Future;
use vending::app::{AppState, build_router};
use vending::config::VendingConfig;
use vending::observability;
use std::sync::Arc;
use warden_vendor::aws::CredentialsChain;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = VendingConfig::from_env_or_yaml()?;
    run_with_shutdown(config, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}

async fn run_with_shutdown<F>(config: VendingConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let metrics_handle = observability::init_observability("warden-vending")?;
    let credentials = CredentialsChain::standard(reqwest::Client::new());
    let state = AppState::from_config(&config, Some(Arc::new(credentials)))?;
    let metrics_task = tokio::spawn(observability::serve_metrics(
        metrics_handle,
        config.metrics_bind,
    ));

    let app = build_router(state.clone());
    let addr = config.bind_addr;
    tracing::info!(%addr, variants = ?state.variants(), "vending service listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tokio::pin!(shutdown);
    tokio::select! {
        result = axum::serve(listener, app.into_make_service()) => {
            result?;
        }
        _ = &mut shutdown => {}
    }

    metrics_task.abort();
    let _ = metrics_task.await;
    Ok(())
}
