//! HTTP server capability implementation.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::to_bytes,
    extract::{ConnectInfo, Request, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{any, post},
};
use tether_core::{
    BoxedRequestHandler, HttpRequest, HttpResponse, HttpServerCapability, ListenConfig,
    ListenerHandle, TransportError, TransportResult,
};
use tokio::sync::oneshot;
use tracing::{debug, error, info, trace, warn};

/// Largest request body accepted.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// HTTP server capability implementation.
pub struct HttpServerCapabilityImpl;

impl HttpServerCapabilityImpl {
    /// Creates a new HTTP server capability.
    pub fn new() -> Self {
        Self
    }
}

impl Default for HttpServerCapabilityImpl {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-route state.
#[derive(Clone)]
struct RouteState {
    handler: BoxedRequestHandler,
    read_timeout: Duration,
    write_timeout: Duration,
}

#[async_trait]
impl HttpServerCapability for HttpServerCapabilityImpl {
    async fn listen(
        &self,
        config: ListenConfig,
        handler: BoxedRequestHandler,
    ) -> TransportResult<ListenerHandle> {
        let path = normalize_path(&config.path);
        let router = build_router(&config, &path, handler);

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let (local_addr, task) = match &config.tls {
            None => serve_plain(&config, router, shutdown_rx).await?,
            Some(tls) => serve_tls(&config, tls, router, shutdown_rx).await?,
        };

        info!(
            addr = %local_addr,
            path = %path,
            tls = config.tls.is_some(),
            "HTTP server listening"
        );

        Ok(
            ListenerHandle::new(format!("http-server-{local_addr}"), shutdown_tx)
                .with_local_addr(local_addr)
                .with_task(task, config.shutdown_timeout),
        )
    }
}

fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

fn build_router(config: &ListenConfig, path: &str, handler: BoxedRequestHandler) -> Router {
    let state = |handler: BoxedRequestHandler| RouteState {
        handler,
        read_timeout: config.read_timeout,
        write_timeout: config.write_timeout,
    };

    let mut router = Router::new()
        .route(path, post(serve_request))
        .with_state(state(handler));

    for extra in &config.extra_routes {
        let route = Router::new()
            .route(&normalize_path(&extra.path), any(serve_request))
            .with_state(state(extra.handler.clone()));
        router = router.merge(route);
    }

    router
}

async fn serve_plain(
    config: &ListenConfig,
    router: Router,
    shutdown_rx: oneshot::Receiver<()>,
) -> TransportResult<(SocketAddr, tokio::task::JoinHandle<()>)> {
    let listener = tokio::net::TcpListener::bind(&config.addr)
        .await
        .map_err(|e| TransportError::ConnectionFailed {
            url: config.addr.clone(),
            reason: format!("failed to bind: {e}"),
        })?;
    let local_addr = listener.local_addr()?;

    let task = tokio::spawn(async move {
        let server = axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
            info!("HTTP server shutting down");
        });

        if let Err(e) = server.await {
            error!(error = %e, "HTTP server error");
        }
    });

    Ok((local_addr, task))
}

#[cfg(feature = "tls")]
async fn serve_tls(
    config: &ListenConfig,
    tls: &tether_core::TlsConfig,
    router: Router,
    shutdown_rx: oneshot::Receiver<()>,
) -> TransportResult<(SocketAddr, tokio::task::JoinHandle<()>)> {
    use axum_server::tls_rustls::RustlsConfig;

    let addr: SocketAddr = config.addr.parse().map_err(|e| {
        TransportError::InvalidConfig(format!("invalid listen address '{}': {e}", config.addr))
    })?;
    let rustls = RustlsConfig::from_pem_file(&tls.cert_file, &tls.key_file)
        .await
        .map_err(|e| TransportError::InvalidConfig(format!("failed to load TLS material: {e}")))?;

    let handle = axum_server::Handle::new();
    let server = axum_server::bind_rustls(addr, rustls).handle(handle.clone());

    let grace = config.shutdown_timeout;
    let shutdown_handle = handle.clone();
    tokio::spawn(async move {
        let _ = shutdown_rx.await;
        info!("HTTPS server shutting down");
        shutdown_handle.graceful_shutdown(Some(grace));
    });

    let task = tokio::spawn(async move {
        if let Err(e) = server
            .serve(router.into_make_service_with_connect_info::<SocketAddr>())
            .await
        {
            error!(error = %e, "HTTPS server error");
        }
    });

    let local_addr = handle
        .listening()
        .await
        .ok_or_else(|| TransportError::ConnectionFailed {
            url: config.addr.clone(),
            reason: "failed to bind".into(),
        })?;

    Ok((local_addr, task))
}

#[cfg(not(feature = "tls"))]
async fn serve_tls(
    _config: &ListenConfig,
    _tls: &tether_core::TlsConfig,
    _router: Router,
    _shutdown_rx: oneshot::Receiver<()>,
) -> TransportResult<(SocketAddr, tokio::task::JoinHandle<()>)> {
    Err(TransportError::NotAvailable { transport: "https" })
}

/// Reads the request fully and hands it to the route's handler.
///
/// A body that cannot be read in full is answered with `500`, like any
/// other request the handler would reject.
async fn serve_request(
    State(route): State<RouteState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
) -> Response {
    let (parts, body) = request.into_parts();

    let body = match tokio::time::timeout(route.read_timeout, to_bytes(body, MAX_BODY_BYTES)).await
    {
        Ok(Ok(bytes)) => bytes,
        Ok(Err(e)) => {
            warn!(remote_addr = %addr, error = %e, "Failed to read request body");
            return (StatusCode::INTERNAL_SERVER_ERROR, "failed to read body").into_response();
        }
        Err(_) => {
            warn!(remote_addr = %addr, "Timed out reading request body");
            return (StatusCode::INTERNAL_SERVER_ERROR, "request timeout").into_response();
        }
    };

    let headers = parts
        .headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
        })
        .collect();

    let request = HttpRequest {
        method: parts.method.as_str().to_string(),
        path: parts.uri.path().to_string(),
        headers,
        body: body.to_vec(),
        remote_addr: Some(addr.to_string()),
    };

    trace!(remote_addr = %addr, path = %request.path, len = request.body.len(), "Received HTTP request");

    match tokio::time::timeout(route.write_timeout, route.handler.handle(request)).await {
        Ok(response) => {
            debug!(remote_addr = %addr, status = response.status, "Responding");
            into_axum_response(response)
        }
        Err(_) => {
            warn!(remote_addr = %addr, "Request handler timed out");
            (StatusCode::SERVICE_UNAVAILABLE, "handler timeout").into_response()
        }
    }
}

fn into_axum_response(response: HttpResponse) -> Response {
    let status =
        StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut out = (status, response.body).into_response();

    let headers = out.headers_mut();
    match response
        .content_type
        .as_deref()
        .and_then(|ct| HeaderValue::from_str(ct).ok())
    {
        Some(ct) => {
            headers.insert(header::CONTENT_TYPE, ct);
        }
        None => {
            headers.remove(header::CONTENT_TYPE);
        }
    }
    out
}
