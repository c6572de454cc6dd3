//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with all handlers
//! - Wire up middleware (request ID, access log, CORS, security headers,
//!   timeouts, body limit, metrics, rate limit, local-access guard)
//! - Serve on a listener until shutdown
//! - Apply configuration reloads and run periodic upkeep
//!
//! # Layer order (outermost first)
//! ```text
//! /favicon.ico (answered before anything else)
//!     → set request id → access log → propagate request id
//!     → CORS → security headers
//!     → timeout → body limit → metrics
//!     → /hello        (rate limit)
//!       /api/monitor  (local-access guard)
//!       fallback      (embedded assets)
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::{
    middleware,
    routing::{any, get},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::EdgeConfig;
use crate::http::request::MakeRequestUuid;
use crate::http::{assets, handlers};
use crate::observability::{logging, metrics};
use crate::observability::metrics::RequestStats;
use crate::security::cors::cors_layer;
use crate::security::headers::with_security_headers;
use crate::security::local_access::{local_access_middleware, AccessPolicy, LocalAccessGuard};
use crate::security::rate_limit::{rate_limit_middleware, RateLimiter};

/// Request-path state that can be swapped while the server runs.
#[derive(Debug)]
pub struct Runtime {
    pub config: EdgeConfig,
    pub guard: LocalAccessGuard,
    pub limiter: Arc<RateLimiter>,
}

impl Runtime {
    fn from_config(config: EdgeConfig) -> Self {
        Self {
            guard: LocalAccessGuard::new(AccessPolicy::from_entries(&config.monitor.trusted_addresses)),
            limiter: Arc::new(RateLimiter::from_config(&config.rate_limit)),
            config,
        }
    }

    /// Build the runtime for `config`, keeping the current rate-limit
    /// windows when the limiter settings did not change.
    fn reconfigure(&self, config: EdgeConfig) -> Self {
        let limiter = if self.config.rate_limit == config.rate_limit {
            Arc::clone(&self.limiter)
        } else {
            Arc::new(RateLimiter::from_config(&config.rate_limit))
        };

        Self {
            guard: LocalAccessGuard::new(AccessPolicy::from_entries(&config.monitor.trusted_addresses)),
            limiter,
            config,
        }
    }
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<ArcSwap<Runtime>>,
    pub stats: Arc<RequestStats>,
    pub metrics: PrometheusHandle,
}

impl AppState {
    pub fn new(config: EdgeConfig) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(Runtime::from_config(config))),
            stats: Arc::new(RequestStats::new()),
            metrics: metrics::init_metrics(),
        }
    }

    /// Current runtime state.
    pub fn runtime(&self) -> Arc<Runtime> {
        self.inner.load_full()
    }

    /// Swap in a new configuration.
    ///
    /// Client address handling, rate limiting and the monitor policy take
    /// effect immediately. Everything else is fixed when the router is built.
    pub fn apply_config(&self, config: EdgeConfig) {
        let current = self.runtime();
        if requires_restart(&current.config, &config) {
            tracing::warn!(
                "Reloaded config changes listener, timeout, CORS, security, monitor or \
                 observability settings; restart to apply them"
            );
        }

        let next = current.reconfigure(config);
        tracing::info!(
            trusted_addresses = ?next.config.monitor.trusted_addresses,
            rate_limit_enabled = next.config.rate_limit.enabled,
            max_requests = next.config.rate_limit.max_requests,
            window_secs = next.config.rate_limit.window_secs,
            trust_forwarded_header = next.config.client_ip.trust_forwarded_header,
            "Runtime configuration reloaded"
        );
        self.inner.store(Arc::new(next));
    }

    fn upkeep(&self) {
        self.metrics.run_upkeep();
        self.runtime().limiter.purge_expired();
    }
}

fn requires_restart(current: &EdgeConfig, next: &EdgeConfig) -> bool {
    current.listener != next.listener
        || current.timeouts != next.timeouts
        || current.cors != next.cors
        || current.security != next.security
        || current.observability != next.observability
        || current.monitor.enabled != next.monitor.enabled
}

/// HTTP server for the edge service.
pub struct HttpServer {
    router: Router,
    state: AppState,
    config: EdgeConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: EdgeConfig) -> Self {
        let state = AppState::new(config.clone());
        let router = Self::build_router(&config, state.clone());
        Self {
            router,
            state,
            config,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &EdgeConfig, state: AppState) -> Router {
        let mut routes = Router::new().route(
            "/hello",
            get(handlers::hello)
                .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit_middleware)),
        );

        if config.monitor.enabled {
            routes = routes.route(
                "/api/monitor",
                get(handlers::monitor)
                    .route_layer(middleware::from_fn_with_state(state.clone(), local_access_middleware)),
            );
        }

        let mut app = routes
            .fallback(assets::serve_asset)
            .with_state(state.clone())
            .layer(middleware::from_fn_with_state(
                Arc::clone(&state.stats),
                metrics::track_requests,
            ))
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)));

        if config.security.enable_headers {
            app = with_security_headers(app);
        }
        if config.cors.enabled {
            app = app.layer(cors_layer(&config.cors));
        }

        let app = app
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(logging::make_request_span)
                    .on_response(logging::log_response),
            )
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid));

        Router::new()
            .route("/favicon.ico", any(assets::favicon))
            .merge(app)
    }

    /// Router with every layer applied, for driving the service without a
    /// listener.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// Configurations received on `config_updates` are applied while
    /// serving. Returns once `shutdown` fires and in-flight requests have
    /// finished.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<EdgeConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            monitor_enabled = self.config.monitor.enabled,
            rate_limit_enabled = self.config.rate_limit.enabled,
            "HTTP server starting"
        );

        let state = self.state.clone();
        let upkeep_interval = Duration::from_secs(self.config.observability.upkeep_secs.max(1));
        let mut background_shutdown = shutdown.resubscribe();
        let background = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(upkeep_interval);
            loop {
                tokio::select! {
                    Some(new_config) = config_updates.recv() => state.apply_config(new_config),
                    _ = ticker.tick() => state.upkeep(),
                    _ = background_shutdown.recv() => break,
                }
            }
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await;

        background.abort();
        served?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
