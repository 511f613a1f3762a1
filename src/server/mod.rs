#[cfg(feature = "rustls-tls")]
#[cfg(feature = "native-tls")]
compile_error!("You can only enable one TLS backend");

mod body;
mod http_client;
mod routes;

use anyhow::Result;
use axum::{
    Router, ServiceExt,
    extract::{DefaultBodyLimit, Request},
    http::HeaderValue,
    middleware::{self as axum_middleware, Next},
    response::Response,
    routing::{any, get},
};
use core::{net::SocketAddr, time::Duration};
use http_client::{HttpClient, build_http_client};
use reqwest::header;
use std::sync::Arc;
use tokio::{net::TcpListener, signal};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::CorsLayer,
    normalize_path::NormalizePath,
    timeout::TimeoutLayer,
    trace::{self, TraceLayer},
};
use tracing::{Level, info};
use url::Url;

/// The relay HTTP server, wrapping the fully layered router.
///
/// Trailing slashes are trimmed before routing, so the router is wrapped
/// rather than layered.
#[derive(Debug)]
pub struct Server {
    router_inner: NormalizePath<Router>,
}

/// Settings to run the relay server with.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Time that can elapse before an incoming request is abandoned for taking too long.
    pub request_timeout: Duration,

    /// The maximum size (in bytes) of an incoming request body.
    pub max_body_size: u64,

    /// See [`UpstreamSettings`].
    pub upstream_settings: UpstreamSettings,
}

/// Configuration options used when relaying a request to an upstream service.
#[derive(Debug, Clone)]
pub struct UpstreamSettings {
    /// Headers that will be passed on from the client to the upstream server verbatim.
    pub forwarded_headers: Box<[String]>,

    /// Time that can elapse after sending a request to an upstream server before it's abandoned
    /// and considered failed.
    pub request_timeout: Duration,

    /// The maximum amount of redirects to follow when making a request to an upstream server before abandoning the request.
    pub max_redirects: usize,

    /// The proxy to use for all outgoing requests.
    pub request_proxy: Option<Url>,

    /// Whether to allow invalid/expired/forged TLS certificates when making upstream requests.
    ///
    /// **Enabling this is dangerous and is usually not necessary.**
    pub allow_invalid_certs: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(90),
            max_body_size: 50_000_000,
            upstream_settings: UpstreamSettings::default(),
        }
    }
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            forwarded_headers: Box::new(["X-Shopify-Access-Token".to_owned()]),
            request_timeout: Duration::from_secs(60),
            max_redirects: 5,
            request_proxy: None,
            allow_invalid_certs: false,
        }
    }
}

#[derive(Debug)]
struct AppState {
    http_client: HttpClient,
    settings: Settings,
}

impl Server {
    /// Create a new server with the provided settings.
    pub fn new(settings: Settings) -> Result<Self> {
        let router = Router::new()
            .route("/", get(routes::index_handler))
            .route("/health", get(routes::health_handler))
            .route("/proxy", any(routes::proxy_handler))
            .layer(DefaultBodyLimit::max(
                usize::try_from(settings.max_body_size).unwrap_or(usize::MAX),
            ))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                    .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
            )
            .layer(TimeoutLayer::new(settings.request_timeout))
            .layer(CatchPanicLayer::new())
            .layer(CorsLayer::very_permissive())
            .layer(axum_middleware::from_fn(Server::header_middleware))
            .with_state(Arc::new(AppState {
                http_client: build_http_client(&settings.upstream_settings)?,
                settings,
            }));

        Ok(Self {
            router_inner: NormalizePath::trim_trailing_slash(router),
        })
    }

    /// Start the server and expose it on the provided [`SocketAddr`].
    pub async fn start(self, address: &SocketAddr) -> Result<()> {
        let tcp_listener = TcpListener::bind(&address).await?;
        info!("Listening on http://{}", tcp_listener.local_addr()?);
        axum::serve(
            tcp_listener,
            ServiceExt::<Request>::into_make_service(self.router_inner),
        )
            .with_graceful_shutdown(Self::shutdown_signal())
            .await?;
        Ok(())
    }

    // https://github.com/tokio-rs/axum/blob/15917c6dbcb4a48707a20e9cfd021992a279a662/examples/graceful-shutdown/src/main.rs#L55
    async fn shutdown_signal() {
        let ctrl_c = async {
            signal::ctrl_c()
                .await
                .expect("failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("failed to install signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
        info!("Shutdown signal received, draining connections");
    }

    async fn header_middleware(request: Request, next: Next) -> Response {
        let mut response = next.run(request).await;
        response.headers_mut().append(
            header::SERVER,
            HeaderValue::from_static(env!("CARGO_PKG_NAME")),
        );
        response
            .headers_mut()
            .append("X-Robots-Tag", HeaderValue::from_static("none"));
        response
    }
}
