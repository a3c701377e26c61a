use std::any::Any;
use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    Router,
    extract::{DefaultBodyLimit, FromRef},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, patch},
};
use banner_api::ApiError;
use banner_storage::DynStorage;
use tower_http::{
    catch_panic::CatchPanicLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};

use crate::cache::OutcomeCache;
use crate::config::AppConfig;
use crate::middleware::AuthState;
use crate::resolver::Resolver;
use crate::service::BannerService;
use crate::{create_cache_backend, create_storage, handlers, middleware as app_middleware};

/// How often expired L1 cache entries are swept.
const CACHE_PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub resolver: Resolver,
    pub service: BannerService,
    pub storage: DynStorage,
    pub cache: OutcomeCache,
    pub auth: AuthState,
}

impl AppState {
    pub fn new(storage: DynStorage, cache: OutcomeCache, auth: AuthState) -> Self {
        Self {
            resolver: Resolver::new(storage.clone(), cache.clone()),
            service: BannerService::new(storage.clone()),
            storage,
            cache,
            auth,
        }
    }
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

pub fn build_app(cfg: &AppConfig, state: AppState) -> Router {
    let body_limit = cfg.server.body_limit_bytes;

    let admin = Router::new()
        .route(
            "/banner",
            get(handlers::list_banners).post(handlers::create_banner),
        )
        .route(
            "/banner/{id}",
            patch(handlers::patch_banner).delete(handlers::delete_banner),
        )
        .route_layer(middleware::from_fn(app_middleware::require_admin));

    let api = Router::new()
        .route("/user_banner", get(handlers::user_banner))
        .merge(admin)
        .route_layer(middleware::from_fn_with_state(
            state.auth.clone(),
            app_middleware::authenticate,
        ));

    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz))
        .nest("/api/v1", api)
        // Layers run bottom-up: request id first so the trace span can read it.
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TimeoutLayer::new(cfg.request_timeout()))
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    use tracing::field::Empty;
                    let req_id = req
                        .extensions()
                        .get::<axum::http::HeaderValue>()
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("")
                        .to_string();
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri(),
                        http.status_code = Empty,
                        request_id = %req_id
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>, latency: Duration, span: &tracing::Span| {
                        span.record(
                            "http.status_code",
                            tracing::field::display(res.status().as_u16()),
                        );
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .layer(middleware::from_fn(app_middleware::request_id))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Turns a handler panic into the generic 500 body.
fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic payload".to_string()
    };
    ApiError::internal(format!("handler panicked: {detail}")).into_response()
}

pub struct BannerServer {
    addr: SocketAddr,
    app: Router,
    cache: OutcomeCache,
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
        }
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    pub async fn build(self) -> anyhow::Result<BannerServer> {
        self.config
            .validate()
            .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;

        let storage = create_storage(&self.config.storage).await?;
        let backend = create_cache_backend(&self.config.redis).await;
        let cache = OutcomeCache::new(backend, self.config.banner_ttl());
        let auth = AuthState::new(&self.config.auth.secret);

        tracing::info!(
            storage = storage.backend_name(),
            cache = cache.backend().mode(),
            ttl_secs = cache.ttl().as_secs(),
            "Banner service initialized"
        );

        let state = AppState::new(storage, cache.clone(), auth);
        let app = build_app(&self.config, state);

        Ok(BannerServer {
            addr: self.addr,
            app,
            cache,
        })
    }
}

impl BannerServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let purge = tokio::spawn(purge_expired_entries(self.cache.clone()));

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        let served = axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await;

        purge.abort();
        served?;
        Ok(())
    }
}

async fn purge_expired_entries(cache: OutcomeCache) {
    let mut ticker = tokio::time::interval(CACHE_PURGE_INTERVAL);
    loop {
        ticker.tick().await;
        let removed = cache.backend().purge_expired();
        if removed > 0 {
            tracing::debug!(removed, "Purged expired cache entries");
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
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
    tracing::info!("shutdown signal received");
}
