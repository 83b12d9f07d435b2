// src/core/scanner/remote.rs

use crate::config::Settings;
use crate::core::models::{RawToolOutput, Tool, ToolInvocation};
use crate::error::ScanError;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};

const REQUEST_SOURCE_HEADER: &str = "x-request-source";

#[derive(Debug, Serialize)]
struct RunRequest<'a> {
    tool: Tool,
    args: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    auth_token: Option<&'a str>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RunResponse {
    stdout: Option<String>,
    raw_output: Option<String>,
    stderr: Option<String>,
    returncode: Option<i64>,
}

impl From<RunResponse> for RawToolOutput {
    fn from(response: RunResponse) -> Self {
        let stdout = response
            .stdout
            .filter(|s| !s.is_empty())
            .or(response.raw_output)
            .unwrap_or_default();
        Self {
            stdout,
            stderr: response.stderr.unwrap_or_default(),
            return_code: response.returncode,
        }
    }
}

/// HTTP client for the remote execution service that actually runs the tools.
#[derive(Debug, Clone)]
pub struct RemoteClient {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
    max_response_bytes: usize,
}

impl RemoteClient {
    pub fn new(settings: &Settings) -> Result<Self, ScanError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Ok(source) = HeaderValue::from_str(&settings.request_source) {
            headers.insert(REQUEST_SOURCE_HEADER, source);
        } else {
            warn!(source = %settings.request_source, "Request source is not a valid header value, omitting it.");
        }

        let client = reqwest::Client::builder()
            .user_agent(concat!("VanguardRS/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(settings.remote_timeout)
            .build()
            .map_err(|e| {
                error!(error = %e, "Failed to build HTTP client for remote execution.");
                ScanError::Transport(e)
            })?;

        Ok(Self {
            client,
            endpoint: settings.remote_url.clone(),
            timeout: settings.remote_timeout,
            max_response_bytes: settings.max_response_bytes,
        })
    }

    /// Runs one invocation remotely.
    ///
    /// A non-zero return code is logged and otherwise ignored; the output is still parsed.
    pub async fn run(
        &self,
        invocation: ToolInvocation,
        auth_token: Option<&str>,
    ) -> Result<RawToolOutput, ScanError> {
        let body = RunRequest {
            tool: invocation.tool,
            args: &invocation.args,
            auth_token,
        };
        info!(tool = %invocation.tool, endpoint = %self.endpoint, "Calling remote execution service.");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let detail = self
                .read_capped(response)
                .await
                .ok()
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| "No error details available".to_string());
            error!(%status, %detail, "Remote execution service returned an error.");
            return Err(ScanError::RemoteStatus {
                status: status.as_u16(),
                detail,
            });
        }

        let text = self.read_capped(response).await?;
        let output: RawToolOutput = match serde_json::from_str::<RunResponse>(&text) {
            Ok(parsed) => parsed.into(),
            Err(e) => {
                debug!(error = %e, "Response is not JSON, treating it as plain stdout.");
                RawToolOutput {
                    stdout: text,
                    stderr: String::new(),
                    return_code: Some(0),
                }
            }
        };

        debug!(tool = %invocation.tool, stdout = %output.stdout, "Tool output received.");
        if !output.stderr.is_empty() {
            debug!(tool = %invocation.tool, stderr = %output.stderr, "Tool wrote to stderr.");
        }
        if let Some(code) = output.return_code.filter(|code| *code != 0) {
            warn!(tool = %invocation.tool, code, "Tool execution returned non-zero code.");
        }
        Ok(output)
    }

    /// Reads the reply body, giving up once it grows past `max_response_bytes`.
    async fn read_capped(&self, mut response: reqwest::Response) -> Result<String, ScanError> {
        let limit = self.max_response_bytes;
        if response.content_length().is_some_and(|len| len > limit as u64) {
            return Err(self.too_large());
        }
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| self.transport_error(e))? {
            if body.len() + chunk.len() > limit {
                return Err(self.too_large());
            }
            body.extend_from_slice(&chunk);
        }
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    fn too_large(&self) -> ScanError {
        error!(limit = self.max_response_bytes, "Remote reply is too large, dropping it.");
        ScanError::ResponseTooLarge(self.max_response_bytes)
    }

    fn transport_error(&self, e: reqwest::Error) -> ScanError {
        if e.is_timeout() {
            error!(timeout_secs = self.timeout.as_secs(), "Remote execution timed out.");
            ScanError::Timeout(self.timeout.as_secs())
        } else {
            error!(error = %e, "Remote execution request failed.");
            ScanError::Transport(e)
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use hyper::service::{make_service_fn, service_fn};
    use hyper::{Body, Request, Response, Server, StatusCode};
    use std::convert::Infallible;
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// A throw-away execution service that answers every request with one canned reply
    /// and remembers the bodies it received.
    pub struct StubExecutor {
        pub addr: SocketAddr,
        pub received: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl StubExecutor {
        pub fn url(&self) -> String {
            format!("http://{}/api/run", self.addr)
        }
    }

    pub async fn spawn_stub(status: u16, body: &'static str, delay: Duration) -> StubExecutor {
        let received = Arc::new(Mutex::new(Vec::new()));
        let seen = received.clone();
        let make_svc = make_service_fn(move |_| {
            let seen = seen.clone();
            async move {
                Ok::<_, Infallible>(service_fn(move |req: Request<Body>| {
                    let seen = seen.clone();
                    async move {
                        let source = req
                            .headers()
                            .get("x-request-source")
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or_default()
                            .to_string();
                        let bytes = hyper::body::to_bytes(req.into_body()).await.unwrap();
                        seen.lock()
                            .unwrap()
                            .push((source, String::from_utf8_lossy(&bytes).into_owned()));
                        tokio::time::sleep(delay).await;
                        Ok::<_, Infallible>(
                            Response::builder()
                                .status(StatusCode::from_u16(status).unwrap())
                                .body(Body::from(body))
                                .unwrap(),
                        )
                    }
                }))
            }
        });

        let server = Server::bind(&([127, 0, 0, 1], 0).into()).serve(make_svc);
        let addr = server.local_addr();
        tokio::spawn(server);
        StubExecutor { addr, received }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::spawn_stub;
    use super::*;
    use std::time::Duration;

    fn settings_for(url: String, timeout: Duration) -> Settings {
        let mut settings = Settings::from_lookup(|_| None).unwrap();
        settings.remote_url = url;
        settings.remote_timeout = timeout;
        settings
    }

    fn invocation() -> ToolInvocation {
        ToolInvocation {
            tool: Tool::Tlsx,
            args: "-u example.com -silent -json".to_string(),
        }
    }

    #[tokio::test]
    async fn posts_tool_and_args_and_reads_json_reply() {
        let stub = spawn_stub(
            200,
            r#"{"stdout":"line","stderr":"warn","returncode":2}"#,
            Duration::ZERO,
        )
        .await;
        let client = RemoteClient::new(&settings_for(stub.url(), Duration::from_secs(5))).unwrap();

        let output = client.run(invocation(), Some("tok")).await.unwrap();
        assert_eq!(output.stdout, "line");
        assert_eq!(output.stderr, "warn");
        assert_eq!(output.return_code, Some(2));

        let received = stub.received.lock().unwrap();
        let (source, body) = &received[0];
        assert_eq!(source, "vanguard-rs-gateway");
        let body: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(body["tool"], "tlsx");
        assert_eq!(body["args"], "-u example.com -silent -json");
        assert_eq!(body["auth_token"], "tok");
    }

    #[tokio::test]
    async fn raw_output_is_used_when_stdout_is_missing() {
        let stub = spawn_stub(200, r#"{"raw_output":"fallback"}"#, Duration::ZERO).await;
        let client = RemoteClient::new(&settings_for(stub.url(), Duration::from_secs(5))).unwrap();
        let output = client.run(invocation(), None).await.unwrap();
        assert_eq!(output.stdout, "fallback");
        assert_eq!(output.return_code, None);

        let received = stub.received.lock().unwrap();
        assert!(!received[0].1.contains("auth_token"));
    }

    #[tokio::test]
    async fn plain_text_reply_becomes_stdout() {
        let stub = spawn_stub(200, "api.example.com\n", Duration::ZERO).await;
        let client = RemoteClient::new(&settings_for(stub.url(), Duration::from_secs(5))).unwrap();
        let output = client.run(invocation(), None).await.unwrap();
        assert_eq!(output.stdout, "api.example.com\n");
        assert_eq!(output.stderr, "");
        assert_eq!(output.return_code, Some(0));
    }

    #[tokio::test]
    async fn non_success_status_is_a_hard_failure() {
        let stub = spawn_stub(502, "tool crashed", Duration::ZERO).await;
        let client = RemoteClient::new(&settings_for(stub.url(), Duration::from_secs(5))).unwrap();
        match client.run(invocation(), None).await {
            Err(ScanError::RemoteStatus { status, detail }) => {
                assert_eq!(status, 502);
                assert_eq!(detail, "tool crashed");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn oversized_reply_is_refused() {
        let stub = spawn_stub(200, r#"{"stdout":"0123456789abcdef0123456789"}"#, Duration::ZERO).await;
        let mut settings = settings_for(stub.url(), Duration::from_secs(5));
        settings.max_response_bytes = 16;
        let client = RemoteClient::new(&settings).unwrap();

        let err = client.run(invocation(), None).await.unwrap_err();
        assert!(matches!(err, ScanError::ResponseTooLarge(16)), "{err:?}");
    }

    #[tokio::test]
    async fn slow_service_surfaces_timeout() {
        let stub = spawn_stub(200, "{}", Duration::from_secs(3)).await;
        let client =
            RemoteClient::new(&settings_for(stub.url(), Duration::from_millis(200))).unwrap();
        let err = client.run(invocation(), None).await.unwrap_err();
        assert!(matches!(err, ScanError::Timeout(_)), "{err:?}");
    }
}
