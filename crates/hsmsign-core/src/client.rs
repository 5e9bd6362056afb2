//! Signing client: validates input, frames a sign request, runs the exchange
//! under the retry policy and maps the outcome to a base64 signature.

use crate::config::{SignerConfig, DEFAULT_API_VERSION};
use crate::endpoint::Endpoint;
use crate::error::SignError;
use crate::protocol::{self, SignOutcome, SignRequest, SignResponse};
use crate::retry::{is_transient_status, run_with_retry, RetryPolicy};
use crate::transport::{Connect, EndpointConnector};
use anyhow::Result;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::future::Future;
use std::io;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Default bound on a single exchange attempt.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Anything that can produce a signature for `data` with a named key.
pub trait SignatureProvider {
    /// Returns the base64-encoded signature.
    fn sign(&self, key_name: &str, data: &[u8]) -> impl Future<Output = Result<String, SignError>> + Send;
}

/// Client for the HSM workload sign API.
///
/// Each attempt opens its own channel through `C`, so concurrent calls never
/// share a reader. Configuration is fixed at construction.
#[derive(Debug)]
pub struct SigningClient<C = EndpointConnector> {
    connector: C,
    endpoint: Endpoint,
    api_version: String,
    retry: RetryPolicy,
    request_timeout: Duration,
}

impl SigningClient<EndpointConnector> {
    /// Client for a `unix://` or `http://` endpoint with the default API version.
    pub fn connect_to(endpoint: &str) -> Result<Self> {
        let endpoint = Endpoint::parse(endpoint)?;
        Ok(Self::new(EndpointConnector::new(&endpoint), endpoint))
    }

    pub fn from_config(cfg: &SignerConfig) -> Result<Self> {
        cfg.validate()?;
        let endpoint = Endpoint::parse(&cfg.endpoint)?;
        Ok(Self::new(EndpointConnector::new(&endpoint), endpoint)
            .with_api_version(cfg.api_version.clone())
            .with_retry_policy(cfg.retry_policy()?)
            .with_request_timeout(cfg.request_timeout()))
    }
}

impl<C: Connect> SigningClient<C> {
    pub fn new(connector: C, endpoint: Endpoint) -> Self {
        Self {
            connector,
            endpoint,
            api_version: DEFAULT_API_VERSION.to_string(),
            retry: RetryPolicy::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Signs `data` with HMAC-SHA-256 under `key_name`; returns the base64 digest.
    pub async fn sign(&self, key_name: &str, data: &[u8]) -> Result<String, SignError> {
        self.sign_with_cancel(key_name, data, &CancellationToken::new())
            .await
    }

    /// Like [`sign`](Self::sign), abandoning the call as soon as `cancel` fires.
    pub async fn sign_with_cancel(
        &self,
        key_name: &str,
        data: &[u8],
        cancel: &CancellationToken,
    ) -> Result<String, SignError> {
        if key_name.is_empty() {
            return Err(SignError::Validation("key name must not be empty"));
        }
        if data.is_empty() {
            return Err(SignError::Validation("data to sign must not be empty"));
        }

        let request = SignRequest::hmac_sha256(key_name, data);
        let body = serde_json::to_vec(&request)?;
        let target = self.endpoint.sign_target(key_name, &self.api_version);
        let host = self.endpoint.host_header();
        let (host, target, body) = (host.as_str(), target.as_str(), body.as_slice());

        let response = run_with_retry(&self.retry, is_transient_status, cancel, move |attempt| {
            tracing::debug!(key = key_name, attempt, "sending sign request");
            self.attempt(host, target, body)
        })
        .await
        .map_err(|e| {
            tracing::debug!(key = key_name, "sign request failed: {}", e);
            e.into_terminal()
        })?;

        Ok(STANDARD.encode(response.digest))
    }

    /// One exchange bounded by the request timeout.
    async fn attempt(&self, host: &str, target: &str, body: &[u8]) -> Result<SignResponse, SignError> {
        match tokio::time::timeout(self.request_timeout, self.exchange_once(host, target, body)).await {
            Ok(result) => result,
            Err(_) => Err(SignError::Io(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("no response within {:?}", self.request_timeout),
            ))),
        }
    }

    async fn exchange_once(&self, host: &str, target: &str, body: &[u8]) -> Result<SignResponse, SignError> {
        let stream = self.connector.connect().await?;
        let raw = protocol::exchange(stream, host, target, body).await?;
        tracing::debug!(status = raw.status, "sign response received");
        match protocol::decode_sign_outcome(raw)? {
            SignOutcome::Signed(response) => Ok(response),
            SignOutcome::Failed {
                status,
                payload,
                body,
            } => {
                // Prefer the structured message, then the raw body text.
                let message = payload
                    .message
                    .filter(|m| !m.is_empty())
                    .or_else(|| Some(body).filter(|b| !b.is_empty()))
                    .unwrap_or_else(|| format!("HSM returned HTTP {}", status));
                Err(SignError::from_status(status, message))
            }
        }
    }
}

impl<C: Connect> SignatureProvider for SigningClient<C> {
    fn sign(&self, key_name: &str, data: &[u8]) -> impl Future<Output = Result<String, SignError>> + Send {
        SigningClient::sign(self, key_name, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::retry::ExponentialBackoff;
    use crate::testing::{ScriptedConnector, ScriptedStream};
    use std::sync::Arc;
    use tokio::time::Instant;

    const OK_123: &str = "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 17\r\n\r\n{\"digest\":\"AQID\"}";
    const UNAVAILABLE: &str = "HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\n\r\n";

    fn client(connector: ScriptedConnector) -> SigningClient<ScriptedConnector> {
        SigningClient::new(connector, Endpoint::parse("unix:///run/hsm.sock").unwrap())
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_two_unavailable_responses() {
        let c = client(ScriptedConnector::responses([UNAVAILABLE, UNAVAILABLE, OK_123]));
        let start = Instant::now();
        let sig = c.sign("module-key", b"payload").await.unwrap();
        assert_eq!(sig, "AQID");
        assert_eq!(c.connector().connect_count(), 3);
        // Backoff 2s then 5s.
        let waited = start.elapsed();
        assert!(waited >= Duration::from_secs(7) && waited < Duration::from_millis(7100));
    }

    #[tokio::test(start_paused = true)]
    async fn not_found_fails_immediately_with_payload_message() {
        let c = client(ScriptedConnector::responses([
            "HTTP/1.1 404 Not Found\r\nContent-Length: 23\r\n\r\n{\"message\":\"not found\"}",
        ]));
        let err = c.sign("missing", b"payload").await.unwrap_err();
        match err {
            SignError::PermanentCommunication {
                ref message,
                status_code,
            } => {
                assert_eq!(message, "not found");
                assert_eq!(status_code, 404);
            }
            ref other => panic!("unexpected {:?}", other),
        }
        assert_eq!(err.kind(), ErrorKind::PermanentCommunication);
        assert_eq!(c.connector().connect_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn status_line_then_close_is_framing_error_without_retry() {
        let c = client(ScriptedConnector::responses(["HTTP/1.1 200 OK\r\n", OK_123]));
        let err = c.sign("k", b"payload").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Framing);
        assert_eq!(c.connector().connect_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_surface_permanent_error() {
        let c = client(ScriptedConnector::responses([
            "HTTP/1.1 500 Internal Server Error\r\n\r\n{\"message\":\"hsm busy\"}",
            "HTTP/1.1 500 Internal Server Error\r\n\r\n{\"message\":\"hsm busy\"}",
            "HTTP/1.1 502 Bad Gateway\r\n\r\n{\"message\":\"still busy\"}",
            OK_123,
        ]));
        let err = c.sign("k", b"payload").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermanentCommunication);
        assert_eq!(err.status_code(), Some(502));
        assert!(err.to_string().contains("still busy"));
        assert_eq!(c.connector().connect_count(), 3);
    }

    #[tokio::test]
    async fn empty_input_fails_without_touching_channel() {
        let c = client(ScriptedConnector::responses([OK_123]));
        let err = c.sign("", b"payload").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        let err = c.sign("k", b"").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(c.connector().connect_count(), 0);
        assert!(c.connector().written_text().is_empty());
    }

    #[tokio::test]
    async fn sends_expected_request() {
        let c = client(ScriptedConnector::responses([OK_123])).with_api_version("2020-10-10");
        c.sign("edge/module", b"hello").await.unwrap();
        let sent = c.connector().written_text();
        assert!(sent.starts_with(
            "POST /modules/edge%2Fmodule/sign?api-version=2020-10-10 HTTP/1.1\r\n"
        ));
        assert!(sent.contains("\r\nHost: localhost\r\n"));
        assert!(sent.ends_with(r#"{"keyId":"edge/module","algo":"HMACSHA256","data":"aGVsbG8="}"#));
    }

    #[tokio::test]
    async fn error_message_falls_back_to_body_then_generic() {
        let c = client(ScriptedConnector::responses([
            "HTTP/1.1 400 Bad Request\r\nContent-Length: 11\r\n\r\nbad request",
            "HTTP/1.1 403 Forbidden\r\nContent-Length: 0\r\n\r\n",
        ]));
        let err = c.sign("k", b"x").await.unwrap_err();
        assert_eq!(err.to_string(), "error calling sign: bad request (HTTP 400)");
        let err = c.sign("k", b"x").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "error calling sign: HSM returned HTTP 403 (HTTP 403)"
        );
    }

    #[tokio::test]
    async fn connection_refused_propagates_as_io() {
        let c = client(ScriptedConnector::default());
        let err = c.sign("k", b"x").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(c.connector().connect_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_mid_exchange_is_not_retried() {
        let c = client(ScriptedConnector::new([ScriptedStream::stalling()]))
            .with_request_timeout(Duration::from_secs(60));
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });
        let err = c.sign_with_cancel("k", b"x", &token).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancellation);
        assert_eq!(c.connector().connect_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_exchange_times_out_as_io() {
        let c = client(ScriptedConnector::new([ScriptedStream::stalling()]))
            .with_request_timeout(Duration::from_secs(1));
        let err = c.sign("k", b"x").await.unwrap_err();
        match err {
            SignError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::TimedOut),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(c.connector().connect_count(), 1);
    }

    #[tokio::test]
    async fn single_attempt_policy_does_not_retry_5xx() {
        let c = client(ScriptedConnector::responses([UNAVAILABLE, OK_123]))
            .with_retry_policy(RetryPolicy::new(1, ExponentialBackoff::default()));
        let err = c.sign("k", b"x").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermanentCommunication);
        assert_eq!(err.status_code(), Some(503));
        assert_eq!(c.connector().connect_count(), 1);
    }

    #[tokio::test]
    async fn works_through_provider_trait() {
        async fn sign_via<P: SignatureProvider>(p: &P) -> Result<String, SignError> {
            p.sign("k", b"x").await
        }
        let c = client(ScriptedConnector::responses([OK_123]));
        assert_eq!(sign_via(&c).await.unwrap(), "AQID");
    }

    fn assert_send<T: Send>(_: T) {}

    #[test]
    fn provider_and_connector_futures_are_send() {
        fn check<P: SignatureProvider, C: Connect>(p: &P, c: &C) {
            assert_send(p.sign("k", b"x"));
            assert_send(c.connect());
        }
        let c = client(ScriptedConnector::default());
        check(&c, c.connector());
        assert_send(c.sign_with_cancel("k", b"x", &CancellationToken::new()));
        let endpoint = Endpoint::parse("http://127.0.0.1:1").unwrap();
        assert_send(EndpointConnector::new(&endpoint).connect());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn shared_client_signs_from_spawned_tasks() {
        let c = Arc::new(client(ScriptedConnector::responses([OK_123, OK_123])));
        let tasks: Vec<_> = (0..2)
            .map(|_| {
                let c = Arc::clone(&c);
                tokio::spawn(async move { c.sign("k", b"x").await })
            })
            .collect();
        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap(), "AQID");
        }
        assert_eq!(c.connector().connect_count(), 2);
    }

    #[test]
    fn from_config_applies_values() {
        let mut cfg = SignerConfig::default();
        cfg.endpoint = "http://127.0.0.1:15580".into();
        cfg.api_version = "2019-01-30".into();
        cfg.request_timeout_secs = 3;
        let c = SigningClient::from_config(&cfg).unwrap();
        assert_eq!(c.api_version(), "2019-01-30");
        assert_eq!(c.retry_policy(), &RetryPolicy::default());
        assert_eq!(c.endpoint().host_header(), "127.0.0.1:15580");

        cfg.endpoint = "ftp://nope".into();
        assert!(SigningClient::from_config(&cfg).is_err());
    }
}
