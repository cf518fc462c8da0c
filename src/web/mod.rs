pub mod page;
pub mod server;
pub mod session;

use crate::{config::Config, media::MediaService};
use anyhow::{Context, Result};
use server::AppState;
use session::SessionStore;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

pub struct WebApp {
    state: AppState,
    bind: String,
}

impl WebApp {
    pub async fn new(config: &Config) -> Result<Self> {
        let media = MediaService::new(&config.ytdlp);

        // Test the extractor setup; the page still works for info lookups without ffmpeg
        if !media.test_setup().await {
            warn!("Media extractor test failed, downloads may not work");
        }

        Ok(Self {
            state: AppState {
                media: Arc::new(media),
                sessions: Arc::new(SessionStore::new(config.server.session_idle())),
            },
            bind: config.server.bind.clone(),
        })
    }

    pub async fn run(self) -> Result<()> {
        let listener = TcpListener::bind(&self.bind)
            .await
            .with_context(|| format!("Failed to bind {}", self.bind))?;
        info!("Listening on http://{}", listener.local_addr()?);

        axum::serve(listener, server::router(self.state))
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("HTTP server error")?;

        info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

pub async fn run(config: Config) -> Result<()> {
    WebApp::new(&config).await?.run().await
}
