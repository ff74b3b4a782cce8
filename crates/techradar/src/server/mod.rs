//! HTTP server for the technology catalog.
//!
//! A thin axum layer over [`catalog`](crate::catalog) and
//! [`lifecycle`](crate::lifecycle). Store calls are synchronous `SQLite`
//! work, so handlers hand them to the blocking pool through
//! [`AppState::with_storage`].

pub mod error;
pub mod routes;

use std::sync::{Arc, Mutex};

use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::{Config, CorsConfig};
use crate::error::{Error, Result};
use crate::storage::Storage;

pub use error::{ApiError, ErrorBody};
pub use routes::APP_NAME;

/// State shared by all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    storage: Arc<Mutex<Storage>>,
    max_update_attempts: u32,
}

impl AppState {
    /// Wrap an open store.
    #[must_use]
    pub fn new(storage: Storage, max_update_attempts: u32) -> Self {
        Self {
            storage: Arc::new(Mutex::new(storage)),
            max_update_attempts,
        }
    }

    /// Run `f` against the store on the blocking thread pool.
    ///
    /// `f` also receives the configured update retry bound.
    ///
    /// # Errors
    ///
    /// Returns whatever `f` returns, or [`Error::Internal`] if the store lock
    /// is poisoned or the blocking task panicked.
    pub async fn with_storage<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Storage, u32) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let storage = Arc::clone(&self.storage);
        let attempts = self.max_update_attempts;

        tokio::task::spawn_blocking(move || {
            let guard = storage
                .lock()
                .map_err(|_| Error::internal("storage lock poisoned"))?;
            f(&guard, attempts)
        })
        .await
        .map_err(|err| Error::internal(format!("storage task failed: {err}")))?
    }
}

/// Build the application router with its middleware.
pub fn router(state: AppState, config: &Config) -> Router {
    let router = Router::new()
        .route("/ping", get(routes::ping))
        .route("/app-name", get(routes::app_name))
        .route(
            "/technologies",
            get(routes::list_technologies).put(routes::create_technology),
        )
        .route(
            "/technologies/",
            get(routes::list_technologies).put(routes::create_technology),
        )
        .route(
            "/technologies/:name",
            post(routes::update_technology).delete(routes::delete_technology),
        )
        .layer(TimeoutLayer::new(config.request_timeout()));

    let router = match build_cors_layer(&config.cors) {
        Some(cors) => router.layer(cors),
        None => router,
    };

    router
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Build the CORS layer, or `None` when no origins are configured.
fn build_cors_layer(cors_config: &CorsConfig) -> Option<CorsLayer> {
    if !cors_config.is_enabled() {
        return None;
    }

    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::AUTHORIZATION])
        .max_age(cors_config.max_age());

    if cors_config.allows_any_origin() {
        return Some(cors.allow_origin(Any));
    }

    let allowed: Vec<HeaderValue> = cors_config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if allowed.is_empty() {
        warn!("All configured CORS origins were invalid; disabling CORS");
        return None;
    }

    info!(origins = ?cors_config.allowed_origins, "CORS configured");
    Some(cors.allow_origin(AllowOrigin::list(allowed)))
}

/// Open the configured store and serve the API until the process exits.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the store cannot be
/// opened, or the listener cannot bind.
pub async fn serve(config: &Config) -> Result<()> {
    config.validate()?;
    let addr = config.bind_addr()?;

    let storage = Storage::open(config.database_path(), config.busy_timeout())?;
    let state = AppState::new(storage, config.lifecycle.max_update_attempts);
    let app = router(state, config);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, database = %config.database_path().display(), "Serving technology radar");

    axum::serve(listener, app).await?;
    Ok(())
}
