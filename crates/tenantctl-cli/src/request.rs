//! Authenticated HTTP access to tenant APIs and upstream error normalization.
//!
//! # Design
//! - Every request carries the bearer token cached for its URL origin; a
//!   missing or expired token fails before anything is sent.
//! - There are no retries and no token refresh. A 401 is surfaced as is.
//! - Upstream failures of any shape are reduced to one [`NormalizedError`].

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::header::{ACCEPT, HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tenantctl_auth::{SessionContext, resource_for};
use tracing::{debug, warn};
use url::Url;

use crate::error::{CliError, CliResult, NormalizedError};

/// Accept header sent when the caller does not choose one.
pub const DEFAULT_ACCEPT: &str = "application/json;odata=nometadata";

/// Method, target and payload of one API call.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    /// HTTP method.
    pub method: Method,
    /// Absolute target URL; its origin selects the token.
    pub url: Url,
    /// Extra headers; `authorization` is always overwritten.
    pub headers: HeaderMap,
    /// Optional JSON payload.
    pub body: Option<Value>,
}

impl RequestDescriptor {
    /// Request with `method` to `url` and no payload.
    #[must_use]
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// `GET url`.
    #[must_use]
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// `POST url`.
    #[must_use]
    pub fn post(url: Url) -> Self {
        Self::new(Method::POST, url)
    }

    /// `PATCH url`.
    #[must_use]
    pub fn patch(url: Url) -> Self {
        Self::new(Method::PATCH, url)
    }

    /// `DELETE url`.
    #[must_use]
    pub fn delete(url: Url) -> Self {
        Self::new(Method::DELETE, url)
    }

    /// Add `name: value` to the request headers.
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Attach a JSON payload.
    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// HTTP client bound to a session's token cache.
#[derive(Debug, Clone)]
pub struct RequestClient {
    http: Client,
    session: Arc<SessionContext>,
}

impl RequestClient {
    /// Client with a fresh connection pool and the given per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Failure`] when the TLS backend cannot be initialised.
    pub fn new(session: Arc<SessionContext>, timeout: Duration) -> CliResult<Self> {
        let mut default_headers = HeaderMap::new();
        let agent = HeaderValue::from_str(&format!("tenantctl/{}", env!("CARGO_PKG_VERSION")))
            .map_err(|err| CliError::failure(anyhow::anyhow!("invalid user agent: {err}")))?;
        default_headers.insert(USER_AGENT, agent);

        let http = Client::builder()
            .timeout(timeout)
            .default_headers(default_headers)
            .build()
            .map_err(|err| CliError::failure(anyhow::anyhow!("failed to build HTTP client: {err}")))?;
        Ok(Self { http, session })
    }

    /// Client reusing an existing connection pool.
    #[must_use]
    pub const fn with_http(http: Client, session: Arc<SessionContext>) -> Self {
        Self { http, session }
    }

    /// Session whose tokens authenticate requests.
    #[must_use]
    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    fn bearer_for(&self, url: &Url) -> CliResult<&str> {
        let resource = resource_for(url);
        let Some(entry) = self.session.access_tokens.entry_for(&resource) else {
            return Err(if self.session.connected {
                CliError::Authentication(format!("no access token cached for {resource}"))
            } else {
                CliError::Authentication(
                    "not connected; log in before running this command".to_string(),
                )
            });
        };
        if entry.is_expired_at(Utc::now()) {
            return Err(CliError::Authentication(format!(
                "access token for {resource} expired at {}; log in again",
                entry.expires_on.to_rfc3339()
            )));
        }
        Ok(&entry.access_token)
    }

    /// Send `request` and return the parsed response body.
    ///
    /// An empty success body yields `null`; a body that is not JSON is
    /// returned as a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Authentication`] before dispatch when no valid token
    /// is cached for the target, and [`CliError::Upstream`] when the transport
    /// fails or the service answers with an error status.
    pub async fn send(&self, request: RequestDescriptor) -> CliResult<Value> {
        let token = self.bearer_for(&request.url)?;
        let RequestDescriptor {
            method,
            url,
            mut headers,
            body,
        } = request;

        if !headers.contains_key(ACCEPT) {
            headers.insert(ACCEPT, HeaderValue::from_static(DEFAULT_ACCEPT));
        }

        debug!(method = %method, url = %url, "sending request");
        let mut builder = self
            .http
            .request(method.clone(), url.clone())
            .headers(headers)
            .bearer_auth(token);
        if let Some(body) = &body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|err| {
            let transient = err.is_timeout() || err.is_connect();
            CliError::Upstream(
                normalize_error(&UpstreamFailure::Native(&err)).transient(transient),
            )
        })?;

        let status = response.status();
        debug!(method = %method, url = %url, status = status.as_u16(), "received response");
        let text = response.text().await.map_err(|err| {
            CliError::Upstream(NormalizedError::with_status(
                normalize_error(&UpstreamFailure::Native(&err)).message,
                status.as_u16(),
            ))
        })?;

        if status.is_success() {
            return Ok(parse_body(&text));
        }

        if status == StatusCode::UNAUTHORIZED {
            warn!(url = %url, "request was rejected as unauthorized; the cached token may be revoked");
        }
        Err(CliError::Upstream(error_from_response(status, &text)))
    }

    /// Send `request` and deserialize the response body into `T`.
    ///
    /// # Errors
    ///
    /// Same as [`RequestClient::send`], plus [`CliError::Failure`] when the
    /// body does not have the expected shape.
    pub async fn send_as<T: DeserializeOwned>(&self, request: RequestDescriptor) -> CliResult<T> {
        let url = request.url.clone();
        let body = self.send(request).await?;
        serde_json::from_value(body).map_err(|err| {
            CliError::failure(anyhow::Error::new(err).context(format!("unexpected response from {url}")))
        })
    }
}

fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

fn error_from_response(status: StatusCode, text: &str) -> NormalizedError {
    if text.trim().is_empty() {
        return NormalizedError::with_status(
            format!("request failed with status {status}"),
            status.as_u16(),
        );
    }
    let payload = serde_json::json!({ "error": parse_body(text) });
    NormalizedError::with_status(
        normalize_error(&UpstreamFailure::Payload(&payload)).message,
        status.as_u16(),
    )
}

/// Shapes in which an upstream failure can arrive.
#[derive(Debug, Clone, Copy)]
pub enum UpstreamFailure<'a> {
    /// JSON payload wrapping the service's error under `error`.
    Payload(&'a Value),
    /// Error raised by the HTTP stack itself.
    Native(&'a (dyn std::error::Error + 'static)),
    /// Bare message.
    Text(&'a str),
}

const ODATA_MESSAGE_POINTERS: [&str; 2] = ["/odata.error/message/value", "/message/value"];

fn odata_message(value: &Value) -> Option<String> {
    ODATA_MESSAGE_POINTERS
        .iter()
        .find_map(|pointer| value.pointer(pointer))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Reduce an upstream failure to a single message (first match wins):
///
/// 1. an OData message under `error` (`odata.error.message.value` or
///    `message.value`), also when `error` is a string holding such JSON;
/// 2. any other `error` string, verbatim;
/// 3. any other `error` value, re-serialized as JSON;
/// 4. a native error's message;
/// 5. a bare string, verbatim.
#[must_use]
pub fn normalize_error(failure: &UpstreamFailure<'_>) -> NormalizedError {
    match failure {
        UpstreamFailure::Payload(payload) => {
            let error = payload.get("error").unwrap_or(payload);
            if let Some(message) = odata_message(error) {
                return NormalizedError::new(message);
            }
            match error {
                Value::String(text) => {
                    let embedded = serde_json::from_str::<Value>(text)
                        .ok()
                        .and_then(|value| odata_message(&value));
                    NormalizedError::new(embedded.unwrap_or_else(|| text.clone()))
                }
                other => NormalizedError::new(other.to_string()),
            }
        }
        UpstreamFailure::Native(error) => NormalizedError::new(error.to_string()),
        UpstreamFailure::Text(text) => NormalizedError::new(*text),
    }
}

#[cfg(test)]
mod tests {
    use anyhow::{Result, anyhow};
    use httpmock::prelude::*;
    use serde_json::json;
    use tenantctl_auth::{AccessTokenEntry, TokenCache};
    use tenantctl_test_support::fixtures::{fresh_expiry, stale_expiry};

    use super::*;

    fn session_for(server: &MockServer, token: &str, expires: chrono::DateTime<Utc>) -> Result<Arc<SessionContext>> {
        let url = Url::parse(&server.base_url()).map_err(|_| anyhow!("valid URL"))?;
        Ok(Arc::new(SessionContext::connected(TokenCache::new().with_entry(
            resource_for(&url),
            AccessTokenEntry {
                access_token: token.to_string(),
                expires_on: expires,
            },
        ))))
    }

    fn client(session: Arc<SessionContext>) -> RequestClient {
        RequestClient::with_http(Client::new(), session)
    }

    #[test]
    fn odata_messages_win() {
        let payload = json!({"error": {"odata.error": {"code": "-1", "message": {"lang": "en-US", "value": "List does not exist"}}}});
        assert_eq!(
            normalize_error(&UpstreamFailure::Payload(&payload)).message,
            "List does not exist"
        );

        let graph = json!({"error": {"code": "x", "message": {"value": "Nested message"}}});
        assert_eq!(
            normalize_error(&UpstreamFailure::Payload(&graph)).message,
            "Nested message"
        );
    }

    #[test]
    fn odata_messages_inside_error_strings_are_extracted() {
        let payload = json!({"error": "{\"odata.error\":{\"message\":{\"value\":\"Access denied\"}}}"});
        assert_eq!(
            normalize_error(&UpstreamFailure::Payload(&payload)).message,
            "Access denied"
        );
    }

    #[test]
    fn other_shapes_fall_through_in_order() {
        let json_error = json!({"error": {"code": 42, "detail": "boom"}});
        assert_eq!(
            normalize_error(&UpstreamFailure::Payload(&json_error)).message,
            r#"{"code":42,"detail":"boom"}"#
        );

        let string_error = json!({"error": "{\"status\":\"nope\"}"});
        assert_eq!(
            normalize_error(&UpstreamFailure::Payload(&string_error)).message,
            r#"{"status":"nope"}"#
        );

        let native = std::io::Error::other("connection reset");
        assert_eq!(
            normalize_error(&UpstreamFailure::Native(&native)).message,
            "connection reset"
        );
        assert_eq!(
            normalize_error(&UpstreamFailure::Text("plain failure")).message,
            "plain failure"
        );
    }

    #[tokio::test]
    async fn injects_bearer_and_default_accept() -> Result<()> {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/_api/web")
                    .header("authorization", "Bearer secret-token")
                    .header("accept", DEFAULT_ACCEPT);
                then.status(200).json_body(json!({"Title": "Team"}));
            })
            .await;

        let client = client(session_for(&server, "secret-token", fresh_expiry())?);
        let body = client
            .send(RequestDescriptor::get(Url::parse(&server.url("/_api/web"))?))
            .await?;
        mock.assert_async().await;
        assert_eq!(body, json!({"Title": "Team"}));
        Ok(())
    }

    #[tokio::test]
    async fn caller_accept_header_is_kept() -> Result<()> {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/_api/web/lists")
                    .header("accept", "application/json;odata=verbose");
                then.status(204);
            })
            .await;

        let client = client(session_for(&server, "t", fresh_expiry())?);
        let body = client
            .send(
                RequestDescriptor::post(Url::parse(&server.url("/_api/web/lists"))?)
                    .header(ACCEPT, HeaderValue::from_static("application/json;odata=verbose"))
                    .json(json!({"Title": "x"})),
            )
            .await?;
        mock.assert_async().await;
        assert_eq!(body, Value::Null);
        Ok(())
    }

    #[tokio::test]
    async fn missing_and_expired_tokens_fail_before_dispatch() -> Result<()> {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.any_request();
                then.status(200);
            })
            .await;
        let url = Url::parse(&server.url("/_api/web"))?;

        let disconnected = client(Arc::new(SessionContext::disconnected()));
        let err = disconnected
            .send(RequestDescriptor::get(url.clone()))
            .await
            .expect_err("no session");
        assert!(matches!(err, CliError::Authentication(_)));
        assert!(err.to_string().starts_with("not connected"));

        let other_host = client(Arc::new(SessionContext::connected(
            TokenCache::new().with_entry(
                "https://contoso.sharepoint.com",
                AccessTokenEntry {
                    access_token: "t".into(),
                    expires_on: fresh_expiry(),
                },
            ),
        )));
        let err = other_host
            .send(RequestDescriptor::get(url.clone()))
            .await
            .expect_err("no token for host");
        assert_eq!(
            err.to_string(),
            format!("no access token cached for {}", resource_for(&url))
        );

        let expired = client(session_for(&server, "t", stale_expiry())?);
        let err = expired
            .send(RequestDescriptor::get(url))
            .await
            .expect_err("expired");
        assert!(err.to_string().ends_with("log in again"));

        mock.assert_calls_async(0).await;
        Ok(())
    }

    #[tokio::test]
    async fn error_responses_are_normalized() -> Result<()> {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.path("/odata");
                then.status(404).json_body(json!({
                    "odata.error": {"code": "-1", "message": {"value": "List 'Docs' does not exist"}}
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.path("/empty");
                then.status(503);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.path("/text");
                then.status(401).body("Unauthorized");
            })
            .await;

        let client = client(session_for(&server, "t", fresh_expiry())?);

        let err = client
            .send(RequestDescriptor::get(Url::parse(&server.url("/odata"))?))
            .await
            .expect_err("404");
        let CliError::Upstream(normalized) = err else {
            return Err(anyhow!("expected upstream error"));
        };
        assert_eq!(normalized.message, "List 'Docs' does not exist");
        assert_eq!(normalized.status, Some(404));
        assert!(!normalized.is_transient());

        let err = client
            .send(RequestDescriptor::get(Url::parse(&server.url("/empty"))?))
            .await
            .expect_err("503");
        let CliError::Upstream(normalized) = err else {
            return Err(anyhow!("expected upstream error"));
        };
        assert_eq!(normalized.message, "request failed with status 503 Service Unavailable");
        assert!(normalized.is_transient());

        let err = client
            .send(RequestDescriptor::get(Url::parse(&server.url("/text"))?))
            .await
            .expect_err("401");
        assert_eq!(err.to_string(), "Unauthorized");
        Ok(())
    }

    #[tokio::test]
    async fn send_as_reports_shape_mismatches() -> Result<()> {
        #[derive(Debug, serde::Deserialize)]
        struct Web {
            #[serde(rename = "Title")]
            _title: String,
        }

        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.path("/_api/web");
                then.status(200).body("not json");
            })
            .await;
        let client = client(session_for(&server, "t", fresh_expiry())?);
        let err = client
            .send_as::<Web>(RequestDescriptor::get(Url::parse(&server.url("/_api/web"))?))
            .await
            .expect_err("string is not a web");
        assert!(matches!(err, CliError::Failure(_)));
        Ok(())
    }
}
