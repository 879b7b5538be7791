// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::process::ExitCode;
use std::sync::Arc;

use consensus_relay::{
    api::router,
    config::{AppConfig, LogFormat},
    ingestion::{IngestionStatus, Ingestor},
    ledger::{LocalLedger, LogSource},
    state::AppState,
    store::CorrelationStore,
    telemetry::init_tracing,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing(LogFormat::from_env());

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let store = Arc::new(CorrelationStore::new(
        config.store_capacity,
        config.store_ttl,
    ));
    let ingestion = IngestionStatus::default();
    let ledger = Arc::new(LocalLedger::new(
        config.topic_id.clone(),
        config.operator_id.clone(),
        config.finality_delay,
    ));

    // Subscribe before serving so no submission can precede the subscription.
    let stream = match ledger.subscribe(&config.topic_id).await {
        Ok(stream) => stream,
        Err(e) => {
            error!(error = %e, topic = %config.topic_id, "Failed to subscribe to log topic");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = CancellationToken::new();
    let ingestor = Ingestor::new(
        Arc::clone(&store),
        config.cipher_key.clone(),
        ingestion.clone(),
    );
    let ingestion_task = tokio::spawn(ingestor.run(stream, shutdown.clone()));

    let state = AppState::new(&config, ledger, store, ingestion);
    let app = router(state);

    let listener = match tokio::net::TcpListener::bind(config.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(error = %e, addr = %config.bind_addr, "Failed to bind");
            return ExitCode::FAILURE;
        }
    };

    info!(
        addr = %config.bind_addr,
        topic = %config.topic_id,
        "Consensus relay listening (docs at /docs)"
    );

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await;

    shutdown.cancel();
    if let Err(e) = ingestion_task.await {
        warn!(error = %e, "Ingestion task did not exit cleanly");
    }

    match served {
        Ok(()) => {
            info!("Consensus relay stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "HTTP server failed");
            ExitCode::FAILURE
        }
    }
}

/// Resolves on Ctrl-C, SIGTERM, or when `shutdown` is cancelled elsewhere.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
        _ = shutdown.cancelled() => {},
    }

    info!("Shutdown signal received");
    shutdown.cancel();
}
