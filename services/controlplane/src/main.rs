//! Guestflag control-plane HTTP service entry point.
//!
//! # Purpose
//! Loads configuration, wires the in-memory store and the four services,
//! optionally applies the standard stack, then serves the API and the
//! Prometheus endpoint until shutdown.
//!
//! # Notes
//! The `build_state` helper keeps wiring testable and minimizes main setup logic.
use anyhow::Context;
use controlplane::app::{AppState, build_router};
use controlplane::clock::{Clock, SystemClock};
use controlplane::config::ControlPlaneConfig;
use controlplane::observability;
use controlplane::provision::standard::{StandardStackParams, standard_template};
use controlplane::store::GuestflagStore;
use controlplane::store::memory::InMemoryStore;
use std::future::Future;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ControlPlaneConfig::from_env_or_yaml().context("load control plane config")?;
    run_with_shutdown(config, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}

async fn run_with_shutdown<F>(config: ControlPlaneConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let metrics_handle = observability::init_observability(&config);
    let state = build_state(config.clone()).await?;
    let metrics_task = tokio::spawn(observability::serve_metrics(
        metrics_handle,
        config.metrics_bind,
    ));

    let app = build_router(state);

    let addr = config.bind_addr;
    tracing::info!(%addr, region = %config.region, "control plane listening");
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

async fn build_state(config: ControlPlaneConfig) -> anyhow::Result<AppState> {
    let store: Arc<dyn GuestflagStore> = Arc::new(InMemoryStore::new());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let bootstrap_stack = config.bootstrap_stack.clone();
    let state = AppState::build(config, store, clock.clone())?;

    if let Some(stack) = bootstrap_stack {
        let template = standard_template(&StandardStackParams::default(), clock.now())
            .context("build standard stack template")?;
        let outcome = state
            .provisioner
            .apply(&stack, template)
            .await
            .with_context(|| format!("apply bootstrap stack {stack}"))?;
        for (key, value) in &outcome.outputs {
            tracing::info!(stack = %stack, output = %key, value = %value, "stack output");
        }
    }
    Ok(state)
}
