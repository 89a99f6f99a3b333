// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::Result;
use arman_controller::{
    cache::KubeCache,
    client::KubeApiClient,
    config::{ControllerArgs, LogFormat},
    context::Context,
    controller::Controller,
    events::KubeEventRecorder,
    metrics,
    queue::rate_limiter::controller_rate_limiter,
};
use clap::Parser;
use kube::Client;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info};

fn main() -> Result<()> {
    let args = ControllerArgs::parse();

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("arman-controller")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(args))
}

fn init_logging(format: LogFormat) {
    // Format: timestamp file:line LEVEL message
    // Respects RUST_LOG if set, otherwise defaults to INFO level
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }
}

async fn async_main(args: ControllerArgs) -> Result<()> {
    init_logging(args.log_format);
    args.validate()?;

    info!("Starting Arman controller");
    debug!(?args, "Loaded configuration");

    debug!("Initializing Kubernetes client");
    let client = Client::try_default().await?;
    debug!("Kubernetes client initialized successfully");

    let (cache, informers) = KubeCache::new(client.clone(), args.namespace.clone());
    let ctx = Arc::new(Context::new(
        Arc::new(cache),
        Arc::new(KubeApiClient::new(client.clone())),
        Arc::new(KubeEventRecorder::new(
            client,
            std::env::var("POD_NAME").ok(),
        )),
    ));
    let controller = Controller::new(ctx, controller_rate_limiter(&args.rate_limiter_settings()));

    // One signal stops the metrics server and the workers
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    let metrics_addr = args.metrics_addr;
    let metrics_shutdown = wait_for_shutdown(shutdown_rx.clone());
    tokio::spawn(async move {
        if let Err(e) = metrics::serve_metrics(metrics_addr, metrics_shutdown).await {
            error!("Metrics server failed: {e}");
        }
    });

    let _informers = informers.start(controller.event_handler());

    controller
        .run(args.workers, wait_for_shutdown(shutdown_rx))
        .await?;

    info!("Arman controller stopped");
    Ok(())
}

async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    // A dropped sender also means shutdown
    let _ = rx.wait_for(|stop| *stop).await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
