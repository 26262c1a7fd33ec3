use std::{
    net::{Ipv4Addr, SocketAddrV4},
    sync::Arc,
};

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use feed::TcpFeed;
use server::AppState;
use store::LiveStore;

mod config;
mod feed;
mod ingest;
mod record;
mod server;
mod store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Config::load(std::env::args().skip(1))?;
    let store = Arc::new(LiveStore::new());

    let feed = TcpFeed::connect(&config.feed_addr, config.topic.clone())
        .await
        .with_context(|| format!("failed to connect to feed at {}", config.feed_addr))?;
    info!(feed = %config.feed_addr, topic = %config.topic, "feed connected");

    let ingestion = tokio::spawn(ingest::run(feed, Arc::clone(&store)));

    let app = server::router(AppState {
        store,
        token: config.token,
    });
    let listener = TcpListener::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, config.port))
        .await
        .with_context(|| format!("failed to bind to port {}", config.port))?;
    info!(port = config.port, "read endpoint listening");

    tokio::select! {
        result = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()) => {
            result.context("server error")?;
            info!("shutdown signal received, stopping");
        }
        result = ingestion => {
            result.context("ingestion task panicked")??;
            info!("ingestion finished, shutting down");
        }
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("feature_cache=debug,info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "unable to install Ctrl+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "unable to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
