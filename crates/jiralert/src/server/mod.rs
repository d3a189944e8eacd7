mod routes;

use axum::{
    routing::{get, post},
    Router,
};
use std::{path::PathBuf, sync::Arc};
use tokio::net::TcpListener;
use tower_http::{services::ServeFile, trace::TraceLayer};
use tracing::info;

use crate::{cache::LookupCache, config::SnapshotHandle, jira::TicketGateway, Result};

/// Name of the log file inside the data directory.
pub const LOG_FILE_NAME: &str = "logfile.log";

/// Shared by every request handler.
pub struct AppState {
    pub snapshot: Arc<SnapshotHandle>,
    pub gateway: Arc<dyn TicketGateway>,
    pub cache: LookupCache,
}

pub struct Server {
    state: Arc<AppState>,
    log_file: Option<PathBuf>,
}

impl Server {
    pub fn new(snapshot: Arc<SnapshotHandle>, gateway: Arc<dyn TicketGateway>, cache: LookupCache) -> Self {
        Self {
            state: Arc::new(AppState {
                snapshot,
                gateway,
                cache,
            }),
            log_file: None,
        }
    }

    /// Serves `path` on `/logs`. Without it the route answers 404.
    pub fn with_log_file(mut self, path: PathBuf) -> Self {
        self.log_file = Some(path);
        self
    }

    pub fn build_router(self) -> Router {
        let mut router = Router::new()
            .route("/", get(routes::home))
            .route("/alert", post(routes::alert))
            .route("/healthz", get(routes::health))
            .route("/metrics", get(routes::metrics))
            .route("/config", get(routes::config))
            .route("/reload", get(routes::reload).post(routes::reload));
        if let Some(path) = self.log_file {
            router = router.route_service("/logs", ServeFile::new(path));
        }
        router
            .layer(TraceLayer::new_for_http())
            .with_state(self.state)
    }

    pub async fn start(self, addr: &str) -> Result<()> {
        let listener = TcpListener::bind(addr).await?;
        info!("Listening on {}", listener.local_addr()?);
        axum::serve(listener, self.build_router()).await?;
        Ok(())
    }
}
