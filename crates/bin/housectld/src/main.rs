//! # housectld — housectl daemon
//!
//! Composition root that wires all adapters together and runs the
//! controller.
//!
//! ## Responsibilities
//! - Load configuration (config file, env vars)
//! - Initialise `tracing` from the configured filter
//! - Open the broker session with its last will
//! - Start the controller on the hardware backend
//! - Optionally serve the HTTP bridge
//! - Handle graceful shutdown (SIGTERM/SIGINT)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;

use std::sync::Arc;
use std::time::Duration;

use housectl_adapter_http_axum::state::AppState;
use housectl_adapter_mqtt::MqttTransport;
use housectl_adapter_virtual::VirtualHardware;
use housectl_app::controller::{Controller, ShutdownTrigger};
use housectl_app::publisher::last_will;
use housectl_app::topics::Topics;
use housectl_domain::lifecycle::ShutdownReason;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// Inbound messages buffered between the broker session and the controller.
const INBOUND_CAPACITY: usize = 128;

/// Time the broker session gets to flush the clean disconnect.
const SESSION_DRAIN: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .init();

    // Broker session
    let topics = Topics::new(&config.controller.base_topic);
    let will = last_will(&topics)?;
    let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CAPACITY);
    let (transport, session) = MqttTransport::connect(&config.mqtt, &will, inbound_tx);
    let transport = Arc::new(transport);

    // Controller
    let hardware = Arc::new(VirtualHardware::new());
    let mut controller =
        Controller::start(&config.controller, hardware, Arc::clone(&transport), inbound_rx)
            .await?;
    let trigger = controller.shutdown_trigger();
    tokio::spawn(watch_signals(trigger.clone()));

    // HTTP
    let http = config.http.enabled.then(|| {
        let state = AppState::new(Arc::clone(&transport), controller.status_feed());
        let app = housectl_adapter_http_axum::router::build(state);
        tokio::spawn(serve(config.bind_addr(), app, trigger.clone()))
    });

    let reason = controller.run().await;
    tracing::info!(%reason, "controller stopped");

    if let Some(http) = http
        && let Err(err) = http.await
    {
        tracing::warn!(error = %err, "http bridge ended abnormally");
    }
    drain(session).await;
    Ok(())
}

async fn serve(bind_addr: String, app: axum::Router, trigger: ShutdownTrigger) {
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(%bind_addr, error = %err, "failed to bind http bridge");
            trigger.trigger(ShutdownReason::Fatal(format!(
                "failed to bind http bridge on {bind_addr}: {err}"
            )));
            return;
        }
    };
    tracing::info!(%bind_addr, "http bridge listening");

    let shutdown = async move {
        trigger.triggered().await;
    };
    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
    {
        tracing::error!(error = %err, "http bridge failed");
    }
}

async fn watch_signals(trigger: ShutdownTrigger) {
    let interrupt = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };
    tokio::select! {
        () = interrupt => {}
        () = terminate() => {}
    }
    trigger.trigger(ShutdownReason::Signal);
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(err) => {
            tracing::warn!(error = %err, "cannot listen for SIGTERM");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}

async fn drain(mut session: JoinHandle<()>) {
    if tokio::time::timeout(SESSION_DRAIN, &mut session)
        .await
        .is_err()
    {
        tracing::warn!("broker session did not close in time");
        session.abort();
    }
}
