//! HTTP server implementation for MCP
//!
//! Serves the streamable HTTP transport at `/mcp` for multiple concurrent
//! clients, each with its own [`JqServer`](super::JqServer) instance and
//! notification listener. `/health` answers without authentication.

#[cfg(feature = "http-server")]
use std::sync::Arc;

#[cfg(feature = "http-server")]
use axum::{
    Router,
    body::Body,
    extract::State,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
#[cfg(feature = "http-server")]
use tokio_util::sync::CancellationToken;

use crate::config::Settings;
use crate::registry::FileRegistry;

use super::notifications::NotificationBroadcaster;

/// Build the `/health` and `/mcp` routes.
///
/// Session listeners and the MCP service stop when `ct` is cancelled.
#[cfg(feature = "http-server")]
pub fn router(
    registry: Arc<FileRegistry>,
    settings: Arc<Settings>,
    broadcaster: Arc<NotificationBroadcaster>,
    ct: CancellationToken,
) -> Router {
    use rmcp::transport::streamable_http_server::{
        StreamableHttpServerConfig, StreamableHttpService, session::local::LocalSessionManager,
    };
    use std::time::Duration;

    use super::JqServer;

    let token: Option<Arc<str>> = settings
        .server
        .token
        .as_deref()
        .filter(|t| !t.is_empty())
        .map(Arc::from);
    if token.is_some() {
        crate::log_event!("http", "auth", "bearer token required for /mcp");
    }

    let ct_for_service = ct.clone();
    let mcp_service = StreamableHttpService::new(
        move || {
            crate::debug_event!("mcp", "creating server instance");
            let server = JqServer::new(Arc::clone(&registry), Arc::clone(&settings));

            // The listener drops events until this session's initialize stores a peer
            let listener = server.clone();
            let receiver = broadcaster.subscribe();
            let listener_ct = ct_for_service.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = listener.start_notification_listener(receiver) => {
                        crate::debug_event!("mcp", "notification listener ended");
                    }
                    _ = listener_ct.cancelled() => {
                        crate::debug_event!("mcp", "notification listener stopped");
                    }
                }
            });

            Ok(server)
        },
        LocalSessionManager::default().into(),
        StreamableHttpServerConfig::default()
            .with_cancellation_token(ct.child_token())
            .with_sse_keep_alive(Some(Duration::from_secs(15)))
            .with_stateful_mode(true),
    );

    let protected_mcp_router = Router::new()
        .nest_service("/mcp", mcp_service)
        .layer(axum::middleware::from_fn_with_state(
            token,
            validate_bearer_token,
        ));

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .merge(protected_mcp_router)
}

#[cfg(feature = "http-server")]
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(feature = "http-server")]
async fn validate_bearer_token(
    State(expected): State<Option<Arc<str>>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let presented = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    if super::auth::authorize(expected.as_deref(), presented) {
        return next.run(req).await;
    }

    crate::debug_event!("http", "unauthorized", "{} {}", req.method(), req.uri());
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, super::auth::challenge())],
        "Unauthorized",
    )
        .into_response()
}

#[cfg(feature = "http-server")]
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("[http] failed to listen for ctrl+c: {e}");
        std::future::pending::<()>().await;
    }
}

#[cfg(feature = "http-server")]
pub async fn serve_http(
    registry: Arc<FileRegistry>,
    settings: Arc<Settings>,
    broadcaster: Arc<NotificationBroadcaster>,
    bind: String,
) -> anyhow::Result<()> {
    crate::log_event!("http", "starting", "MCP server on {bind}");

    let ct = CancellationToken::new();
    let app = router(Arc::clone(&registry), settings, broadcaster, ct.clone());

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    crate::log_event!("http", "listening", "http://{bind}/mcp");
    eprintln!("HTTP MCP server listening on http://{bind}");
    eprintln!("MCP endpoint: http://{bind}/mcp");
    eprintln!("Health check: http://{bind}/health");
    eprintln!("Press Ctrl+C to stop the server");

    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            result?;
        }
        _ = shutdown_signal() => {
            eprintln!("Shutting down HTTP server...");
            ct.cancel();
        }
    }

    registry.close();
    eprintln!("HTTP server shut down gracefully");
    Ok(())
}

#[cfg(not(feature = "http-server"))]
pub async fn serve_http(
    _registry: std::sync::Arc<FileRegistry>,
    _settings: std::sync::Arc<Settings>,
    _broadcaster: std::sync::Arc<NotificationBroadcaster>,
    _bind: String,
) -> anyhow::Result<()> {
    anyhow::bail!(
        "HTTP server support is not compiled in. Rebuild with: cargo build --features http-server"
    )
}

#[cfg(all(test, feature = "http-server"))]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn app(temp: &TempDir, token: Option<&str>) -> Router {
        let mut settings = Settings::default();
        settings.server.token = token.map(str::to_string);
        router(
            Arc::new(FileRegistry::new(temp.path()).unwrap()),
            Arc::new(settings),
            Arc::new(NotificationBroadcaster::new(4)),
            CancellationToken::new(),
        )
    }

    fn post_mcp(authorization: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/mcp")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "application/json, text/event-stream");
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(Body::from("{}")).unwrap()
    }

    #[tokio::test]
    async fn test_health_needs_no_token() {
        let temp = TempDir::new().unwrap();
        let response = app(&temp, Some("secret"))
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"OK");
    }

    #[tokio::test]
    async fn test_mcp_rejects_missing_or_wrong_token() {
        let temp = TempDir::new().unwrap();

        for authorization in [None, Some("Bearer wrong"), Some("Basic secret")] {
            let response = app(&temp, Some("secret"))
                .oneshot(post_mcp(authorization))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            assert_eq!(
                response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
                "Bearer realm=\"jqdex\""
            );
        }
    }

    #[tokio::test]
    async fn test_mcp_accepts_valid_token() {
        let temp = TempDir::new().unwrap();
        let response = app(&temp, Some("secret"))
            .oneshot(post_mcp(Some("bearer secret")))
            .await
            .unwrap();

        assert_ne!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_mcp_open_without_configured_token() {
        let temp = TempDir::new().unwrap();
        let response = app(&temp, None).oneshot(post_mcp(None)).await.unwrap();

        assert_ne!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
