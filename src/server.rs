// src/server.rs

use crate::config::Settings;
use crate::core::models::{ErrorBody, ScanRequest};
use crate::core::scanner::Scanner;
use crate::core::validation::Target;
use crate::error::{ScanError, ValidationError};
use hyper::header::{
    HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE,
};
use hyper::body::HttpBody;
use hyper::server::conn::AddrIncoming;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use serde::Serialize;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub const SCAN_PATH: &str = "/api/security-scan";
pub const HEALTH_PATH: &str = "/health";

fn with_cors(mut response: Response<Body>) -> Response<Body> {
    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, OPTIONS"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization"),
    );
    response
}

fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response<Body> {
    let (status, body) = match serde_json::to_vec(value) {
        Ok(body) => (status, body),
        Err(e) => {
            error!(error = %e, "Failed to serialize response body.");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                br#"{"error":"Failed to perform security scan"}"#.to_vec(),
            )
        }
    };
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    with_cors(response)
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response<Body> {
    json_response(
        status,
        &ErrorBody {
            error: message.into(),
        },
    )
}

fn scan_error_response(err: &ScanError) -> Response<Body> {
    match err {
        ScanError::Validation(e) => error_response(StatusCode::BAD_REQUEST, e.to_string()),
        ScanError::Timeout(_) => error_response(StatusCode::GATEWAY_TIMEOUT, err.to_string()),
        ScanError::Transport(_)
        | ScanError::RemoteStatus { .. }
        | ScanError::ResponseTooLarge(_) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("MCP tool error: {err}"),
        ),
    }
}

/// Extracts the opaque token from `Authorization: Bearer <token>`.
fn bearer_token(req: &Request<Body>) -> Option<String> {
    let value = req.headers().get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();
    (!token.is_empty()).then(|| token.to_string())
}

fn body_too_large(limit: usize) -> Response<Body> {
    let err = ValidationError::BodyTooLarge(limit);
    warn!(error = %err, "Rejected scan request.");
    error_response(StatusCode::PAYLOAD_TOO_LARGE, err.to_string())
}

/// Reads the request body, refusing anything over `limit` bytes.
async fn read_body(req: Request<Body>, limit: usize) -> Result<Vec<u8>, Response<Body>> {
    let declared = req
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > limit) {
        return Err(body_too_large(limit));
    }

    let mut body = req.into_body();
    let mut bytes = Vec::new();
    while let Some(chunk) = body.data().await {
        let chunk = chunk.map_err(|e| {
            warn!(error = %e, "Failed to read request body.");
            error_response(StatusCode::BAD_REQUEST, "Failed to read request body")
        })?;
        if bytes.len() + chunk.len() > limit {
            return Err(body_too_large(limit));
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

async fn handle_scan(req: Request<Body>, gateway: Arc<Gateway>) -> Response<Body> {
    let token = bearer_token(&req);
    let bytes = match read_body(req, gateway.max_request_bytes).await {
        Ok(bytes) => bytes,
        Err(response) => return response,
    };

    let request: ScanRequest = match serde_json::from_slice(&bytes) {
        Ok(request) => request,
        Err(e) => {
            let err = ValidationError::InvalidBody(e.to_string());
            warn!(error = %err, "Rejected scan request.");
            return error_response(StatusCode::BAD_REQUEST, err.to_string());
        }
    };

    let target = match Target::parse(&request.target) {
        Ok(target) => target,
        Err(err) => {
            warn!(error = %err, "Rejected scan request.");
            return error_response(StatusCode::BAD_REQUEST, err.to_string());
        }
    };

    let options = request.advanced.unwrap_or_default();
    match gateway
        .scanner
        .run_scan(&target, &request.scan_type, token.as_deref(), &options)
        .await
    {
        Ok(result) => json_response(StatusCode::OK, &result),
        Err(err) => {
            error!(error = %err, %target, "Security scan failed.");
            scan_error_response(&err)
        }
    }
}

async fn route(req: Request<Body>, gateway: Arc<Gateway>) -> Result<Response<Body>, Infallible> {
    debug!(method = %req.method(), path = %req.uri().path(), "Incoming request.");
    let response = match (req.method(), req.uri().path()) {
        (&Method::POST, SCAN_PATH) => handle_scan(req, gateway).await,
        (&Method::OPTIONS, SCAN_PATH) => {
            let mut response = Response::new(Body::empty());
            *response.status_mut() = StatusCode::NO_CONTENT;
            with_cors(response)
        }
        (&Method::GET, HEALTH_PATH) => {
            json_response(StatusCode::OK, &serde_json::json!({ "status": "ok" }))
        }
        (_, SCAN_PATH) | (_, HEALTH_PATH) => {
            error_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
        }
        _ => error_response(StatusCode::NOT_FOUND, "Not found"),
    };
    Ok(response)
}

/// State shared by every connection.
struct Gateway {
    scanner: Scanner,
    max_request_bytes: usize,
}

/// Binds `settings.bind_addr` and returns the bound address with the future that serves it.
pub fn bind(
    settings: &Settings,
    scanner: Scanner,
) -> Result<(SocketAddr, impl Future<Output = Result<(), hyper::Error>> + use<>), hyper::Error> {
    let gateway = Arc::new(Gateway {
        scanner,
        max_request_bytes: settings.max_request_bytes,
    });
    let make_svc = make_service_fn(move |_| {
        let gateway = gateway.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req| route(req, gateway.clone())))
        }
    });

    let incoming = AddrIncoming::bind(&settings.bind_addr)?;
    let local_addr = incoming.local_addr();
    let server = Server::builder(incoming).serve(make_svc);
    info!(addr = %local_addr, "Listening for scan requests.");
    Ok((local_addr, server))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scanner::remote::test_support::spawn_stub;
    use serde_json::{json, Value};
    use std::time::Duration;

    fn settings_for(remote_url: String, timeout: Duration) -> Settings {
        let mut settings = Settings::from_lookup(|_| None).unwrap();
        settings.bind_addr = ([127, 0, 0, 1], 0).into();
        settings.remote_url = remote_url;
        settings.remote_timeout = timeout;
        settings
    }

    fn serve(settings: &Settings) -> SocketAddr {
        let scanner = Scanner::new(settings).unwrap();
        let (addr, server) = bind(settings, scanner).unwrap();
        tokio::spawn(server);
        addr
    }

    async fn spawn_gateway(remote_url: String, timeout: Duration) -> SocketAddr {
        serve(&settings_for(remote_url, timeout))
    }

    async fn post(addr: SocketAddr, body: Value, token: Option<&str>) -> (u16, Value) {
        let mut request = reqwest::Client::new()
            .post(format!("http://{addr}{SCAN_PATH}"))
            .json(&body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap())
    }

    #[tokio::test]
    async fn scan_round_trip_forwards_token() {
        let stub = spawn_stub(
            200,
            r#"{"stdout":"{\"host\":\"example.com\",\"port\":3389}"}"#,
            Duration::ZERO,
        )
        .await;
        let addr = spawn_gateway(stub.url(), Duration::from_secs(5)).await;

        let (status, body) = post(
            addr,
            json!({"target": "example.com", "scanType": "ports", "advanced": {"ports": "3389"}}),
            Some("abc123"),
        )
        .await;

        assert_eq!(status, 200);
        assert_eq!(body["target"], "example.com");
        assert_eq!(body["scanType"], "ports");
        assert_eq!(body["vulnerabilities"][0]["name"], "Open Port 3389 (RDP)");
        assert_eq!(body["vulnerabilities"][0]["severity"], "high");
        assert_eq!(body["summary"]["high"], 1);
        assert!(body["htmlReport"].as_str().unwrap().contains("Security Audit Report"));

        let received = stub.received.lock().unwrap();
        let sent: Value = serde_json::from_str(&received[0].1).unwrap();
        assert_eq!(sent["auth_token"], "abc123");
        assert_eq!(sent["args"], "-host example.com -p 3389 -silent");
    }

    #[tokio::test]
    async fn invalid_target_is_rejected_without_remote_call() {
        let stub = spawn_stub(200, "{}", Duration::ZERO).await;
        let addr = spawn_gateway(stub.url(), Duration::from_secs(5)).await;

        let (status, body) =
            post(addr, json!({"target": "not a host", "scanType": "http"}), None).await;
        assert_eq!(status, 400);
        assert!(body["error"].as_str().unwrap().contains("Invalid target format"));

        let (status, _) = post(addr, json!({"scanType": "http"}), None).await;
        assert_eq!(status, 400);
        assert!(stub.received.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn remote_errors_map_to_distinct_statuses() {
        let failing = spawn_stub(503, "busy", Duration::ZERO).await;
        let addr = spawn_gateway(failing.url(), Duration::from_secs(5)).await;
        let (status, body) =
            post(addr, json!({"target": "example.com", "scanType": "dns"}), None).await;
        assert_eq!(status, 500);
        assert_eq!(
            body["error"],
            "MCP tool error: MCP server responded with status: 503: busy"
        );

        let slow = spawn_stub(200, "{}", Duration::from_secs(3)).await;
        let addr = spawn_gateway(slow.url(), Duration::from_millis(200)).await;
        let (status, body) =
            post(addr, json!({"target": "example.com", "scanType": "dns"}), None).await;
        assert_eq!(status, 504);
        assert!(body["error"].as_str().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn oversized_bodies_are_refused() {
        let stub = spawn_stub(200, "{}", Duration::ZERO).await;
        let mut settings = settings_for(stub.url(), Duration::from_secs(5));
        settings.max_request_bytes = 64;
        let addr = serve(&settings);

        let (status, body) = post(
            addr,
            json!({"target": "example.com", "scanType": "dns", "advanced": {"resolver": "x".repeat(100)}}),
            None,
        )
        .await;
        assert_eq!(status, 413);
        assert_eq!(body["error"], "Request body exceeds 64 bytes");
        assert!(stub.received.lock().unwrap().is_empty());

        let (status, _) =
            post(addr, json!({"target": "example.com", "scanType": "dns"}), None).await;
        assert_eq!(status, 200);
    }

    #[tokio::test]
    async fn oversized_remote_reply_is_a_tool_error() {
        let stub = spawn_stub(200, r#"{"stdout":"api.example.com mail.example.com"}"#, Duration::ZERO).await;
        let mut settings = settings_for(stub.url(), Duration::from_secs(5));
        settings.max_response_bytes = 8;
        let addr = serve(&settings);

        let (status, body) =
            post(addr, json!({"target": "example.com", "scanType": "dns"}), None).await;
        assert_eq!(status, 500);
        assert_eq!(body["error"], "MCP tool error: MCP server response exceeds 8 bytes");
    }

    #[tokio::test]
    async fn preflight_health_and_unknown_paths() {
        let stub = spawn_stub(200, "{}", Duration::ZERO).await;
        let addr = spawn_gateway(stub.url(), Duration::from_secs(5)).await;
        let client = reqwest::Client::new();

        let preflight = client
            .request(reqwest::Method::OPTIONS, format!("http://{addr}{SCAN_PATH}"))
            .send()
            .await
            .unwrap();
        assert_eq!(preflight.status().as_u16(), 204);
        assert_eq!(preflight.headers()["access-control-allow-origin"], "*");

        let health = client
            .get(format!("http://{addr}{HEALTH_PATH}"))
            .send()
            .await
            .unwrap();
        assert_eq!(health.status().as_u16(), 200);

        let missing = client
            .get(format!("http://{addr}/nope"))
            .send()
            .await
            .unwrap();
        assert_eq!(missing.status().as_u16(), 404);

        let wrong_method = client
            .get(format!("http://{addr}{SCAN_PATH}"))
            .send()
            .await
            .unwrap();
        assert_eq!(wrong_method.status().as_u16(), 405);
    }

    #[test]
    fn bearer_prefix_is_stripped() {
        let req = Request::builder()
            .header(AUTHORIZATION, "Bearer tok-1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(bearer_token(&req).as_deref(), Some("tok-1"));

        let req = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(bearer_token(&req), None);
    }
}
