//! HTTP surface
//!
//! Thin handlers over the channel directory, the guide store and the
//! renderers. Logos are served straight from the logo directory.

use anyhow::Result;
use axum::{Router, routing::get};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::info;

use crate::config::Config;
use crate::directory::ChannelDirectory;
use crate::epg::GuideStore;
use crate::sources::LogoDirectory;

pub mod handlers;
pub mod responses;

pub use responses::handle_error;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub directory: Arc<ChannelDirectory>,
    /// Absent when the guide is disabled
    pub guide: Option<Arc<GuideStore>>,
    pub logos: Arc<LogoDirectory>,
}

pub fn create_router(state: AppState) -> Router {
    let logo_files = ServeDir::new(state.logos.root().to_path_buf());

    let router = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/channel/m3u", get(handlers::playlist::serve_m3u))
        .route("/channel/txt", get(handlers::playlist::serve_txt))
        .route("/epg/xmltv", get(handlers::guide::serve_xmltv));

    #[cfg(feature = "compression-gzip")]
    let router = router.route("/epg/xmltv.gz", get(handlers::guide::serve_xmltv_gz));

    router
        .nest_service("/logo", logo_files)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub struct WebServer {
    app: Router,
    addr: SocketAddr,
}

impl WebServer {
    pub fn new(config: &Config, state: AppState) -> Result<Self> {
        let addr: SocketAddr = format!("{}:{}", config.web.host, config.web.port).parse()?;
        Ok(Self {
            app: create_router(state),
            addr,
        })
    }

    /// Serve until `cancel` fires
    pub async fn serve_with_cancellation(self, cancel: CancellationToken) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(&self.addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", self.addr, e))?;
        info!("Listening on http://{}", self.addr);

        axum::serve(listener, self.app)
            .with_graceful_shutdown(async move {
                cancel.cancelled().await;
                info!("Web server received cancellation signal, shutting down gracefully");
            })
            .await?;
        Ok(())
    }
}
