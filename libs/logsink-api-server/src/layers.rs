use std::any::Any;
use std::panic::AssertUnwindSafe;

use axum::extract::Request;
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ACCESS_CONTROL_MAX_AGE,
};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use futures::FutureExt;

use crate::error::ApiError;

// ═══════════════════════════════════════════════════════════════
//  CORS: open policy, preflight answered before routing
// ═══════════════════════════════════════════════════════════════

pub(crate) async fn cors(request: Request, next: Next) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(request).await
    };
    apply_cors_headers(response.headers_mut());
    response
}

fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("authorization, content-type"),
    );
    headers.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("86400"));
}

// ═══════════════════════════════════════════════════════════════
//  Panic boundary
// ═══════════════════════════════════════════════════════════════

/// A panicking handler answers 500 JSON instead of dropping the connection.
pub(crate) async fn catch_panic(request: Request, next: Next) -> Response {
    let path = request.uri().path().to_owned();
    match AssertUnwindSafe(next.run(request)).catch_unwind().await {
        Ok(response) => response,
        Err(payload) => {
            tracing::error!(path = %path, panic = %panic_message(payload.as_ref()), "handler panicked");
            ApiError::Internal("handler panicked".into()).into_response()
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic>"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    use axum::Router;
    use axum::middleware::from_fn;
    use axum::routing::get;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    async fn spawn(app: Router) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        addr
    }

    async fn raw(addr: SocketAddr, method: &str, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!("{method} {path} HTTP/1.1\r\nHost: test\r\nConnection: close\r\n\r\n");
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();
        String::from_utf8(out).unwrap()
    }

    async fn boom() -> &'static str {
        panic!("boom")
    }

    fn app() -> Router {
        Router::new()
            .route("/boom", get(boom))
            .route("/ok", get(|| async { "ok" }))
            .layer(from_fn(catch_panic))
            .layer(from_fn(cors))
    }

    #[tokio::test]
    async fn panic_becomes_json_500() {
        let addr = spawn(app()).await;
        let response = raw(addr, "GET", "/boom").await;
        assert!(response.starts_with("HTTP/1.1 500"), "{response}");
        assert!(response.ends_with(r#"{"error":"Internal Server Error"}"#), "{response}");

        // The server keeps serving afterwards.
        assert!(raw(addr, "GET", "/ok").await.starts_with("HTTP/1.1 200"));
    }

    #[tokio::test]
    async fn preflight_short_circuits_with_cors_headers() {
        let addr = spawn(app()).await;
        let response = raw(addr, "OPTIONS", "/boom").await.to_ascii_lowercase();
        assert!(response.starts_with("http/1.1 204"), "{response}");
        assert!(response.contains("access-control-allow-origin: *"));
        assert!(response.contains("access-control-allow-methods: get, post, options"));
    }

    #[tokio::test]
    async fn regular_responses_carry_cors_headers() {
        let addr = spawn(app()).await;
        let response = raw(addr, "GET", "/ok").await.to_ascii_lowercase();
        assert!(response.contains("access-control-allow-origin: *"));
    }

    #[test]
    fn panic_payloads_render() {
        let s: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(s.as_ref()), "static");
        let s: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(s.as_ref()), "owned");
        let s: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(s.as_ref()), "<non-string panic>");
    }
}
