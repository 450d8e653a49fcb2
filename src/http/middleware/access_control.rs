//! IP access-control middleware.
//! Runs the gate before any handler and answers denied requests with 403.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::access::{AccessGate, RequestContext};

pub async fn access_control_middleware(
    State(gate): State<Arc<AccessGate>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    // No connection info means no trustworthy address: fail closed.
    let remote_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_default();

    let path = servlet_path(request.uri().path()).to_string();
    let context = RequestContext {
        remote_addr: &remote_addr,
        path: &path,
    };
    let verdict = gate.decide(&context).await;

    if verdict.is_allowed() {
        next.run(request).await
    } else {
        // Nothing about the matching rules leaks into the response.
        StatusCode::FORBIDDEN.into_response()
    }
}

/// Route root of a request path, used for exemption lookups.
///
/// `/static/css/app.css` maps to `/static`. Paths with dot segments, path
/// parameters (`;`) or encoded separators are returned whole so they can
/// never hit an exemption.
pub fn servlet_path(path: &str) -> &str {
    let rest = path.strip_prefix('/').unwrap_or(path);
    if rest.split('/').any(is_suspicious_segment) {
        return path;
    }
    match rest.find('/') {
        Some(end) if path.starts_with('/') => &path[..end + 1],
        _ => path,
    }
}

fn is_suspicious_segment(segment: &str) -> bool {
    let lower = segment.to_ascii_lowercase();
    // Servers that drop `;params` would read `..;` as `..`.
    if lower.contains(';') || lower.contains("%3b") {
        return true;
    }
    lower == "."
        || lower == ".."
        || lower.contains('\\')
        || lower.contains("%2e")
        || lower.contains("%2f")
        || lower.contains("%5c")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{PathExemptionSet, StaticResolver, TracingLog};
    use axum::{middleware, routing::get, Router};
    use tower::ServiceExt;

    #[test]
    fn test_servlet_path() {
        assert_eq!(servlet_path("/"), "/");
        assert_eq!(servlet_path("/error"), "/error");
        assert_eq!(servlet_path("/static/css/app.css"), "/static");
        assert_eq!(servlet_path("/admin/users"), "/admin");
        assert_eq!(servlet_path("/static/../admin"), "/static/../admin");
        assert_eq!(servlet_path("/static/%2e%2e/admin"), "/static/%2e%2e/admin");
        assert_eq!(servlet_path("/static/..%2Fadmin"), "/static/..%2Fadmin");
        assert_eq!(servlet_path("//static"), "/");
        assert_eq!(servlet_path("/static/..;/admin"), "/static/..;/admin");
        assert_eq!(servlet_path("/static/.;x/admin"), "/static/.;x/admin");
        assert_eq!(servlet_path("/static;v=1/app.css"), "/static;v=1/app.css");
        assert_eq!(servlet_path("/static/..%3B/admin"), "/static/..%3B/admin");
    }

    fn app(allowed: &str) -> Router {
        let gate = Arc::new(
            AccessGate::new(
                Some(allowed),
                PathExemptionSet::default(),
                Arc::new(StaticResolver::default()),
                Arc::new(TracingLog),
            )
            .unwrap(),
        );
        Router::new()
            .route("/{*path}", get(|| async { "admin" }))
            .layer(middleware::from_fn_with_state(gate, access_control_middleware))
    }

    async fn status(router: Router, remote: &str, path: &str) -> StatusCode {
        let remote: SocketAddr = remote.parse().unwrap();
        let request = Request::builder()
            .uri(path)
            .extension(ConnectInfo(remote))
            .body(Body::empty())
            .unwrap();
        router
            .oneshot(request)
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_allowed_remote_passes() {
        assert_eq!(
            status(app("127.0.0.1,10.0.0.0/8"), "10.1.2.3:5000", "/admin").await,
            StatusCode::OK
        );
    }

    #[tokio::test]
    async fn test_denied_remote_gets_forbidden() {
        assert_eq!(
            status(app("127.0.0.1,10.0.0.0/8"), "8.8.8.8:5000", "/admin").await,
            StatusCode::FORBIDDEN
        );
    }

    #[tokio::test]
    async fn test_exempt_paths_pass_for_anyone() {
        let router = app("10.0.0.0/8");
        assert_eq!(status(router.clone(), "8.8.8.8:1", "/error").await, StatusCode::OK);
        assert_eq!(status(router.clone(), "8.8.8.8:1", "/static/app.css").await, StatusCode::OK);
        assert_eq!(
            status(router.clone(), "8.8.8.8:1", "/static/../admin").await,
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status(router, "8.8.8.8:1", "/static/..;/admin").await,
            StatusCode::FORBIDDEN
        );
    }

    #[tokio::test]
    async fn test_missing_connect_info_fails_closed() {
        let response = app("*")
            .oneshot(Request::builder().uri("/admin").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
