use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, Method, Request, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use tokio::time::{sleep, timeout};
use tracing::{debug, info_span, warn, Instrument};

use crate::config::ConfigSource;
use crate::error::ClientError;
use crate::options::{FieldValue, Options};
use crate::request::{self, PreparedRequest};
use crate::response::Response;
use crate::retry::RetryDecision;
use crate::util::{classify_transport_error, truncate_body};
use crate::wrapper::{compose, Sender};
use crate::EnvxResult;

type HttpsConnector = hyper_rustls::HttpsConnector<HttpConnector>;
type HyperClient = hyper_util::client::legacy::Client<HttpsConnector, Full<Bytes>>;

/// The request engine. Cheap to clone: clones share the pooled transport
/// and the defaults snapshot.
///
/// A client is stateless across calls. Every call builds its own
/// [`PreparedRequest`] from the defaults plus the per-call overlay, so
/// concurrent calls never observe each other's configuration.
#[derive(Clone)]
pub struct Client {
    defaults: Arc<Options>,
    transport: HyperClient,
}

impl Client {
    /// Builds a client over a pooled HTTPS-capable transport.
    pub fn new(defaults: Options) -> EnvxResult<Self> {
        let https = hyper_rustls::HttpsConnectorBuilder::new()
            .with_provider_and_webpki_roots(rustls::crypto::ring::default_provider())
            .map_err(|error| ClientError::TlsInit {
                message: error.to_string(),
            })?
            .https_or_http()
            .enable_http1()
            .enable_http2()
            .build();
        let transport =
            hyper_util::client::legacy::Client::builder(TokioExecutor::new()).build(https);

        Ok(Self {
            defaults: Arc::new(defaults),
            transport,
        })
    }

    /// Builds a client seeded from a configuration store entry, then
    /// overlaid with `overrides`. A missing entry is soft: the client is
    /// still built from `overrides` alone and the gap is logged.
    pub fn from_config(
        source: &dyn ConfigSource,
        group: &str,
        service: &str,
        overrides: Options,
    ) -> EnvxResult<Self> {
        let mut defaults = Options::default();
        match source.service(group, service) {
            Some(config) => {
                if !config.base_uri.is_empty() {
                    defaults = defaults.base_uri(config.base_uri);
                }
                if config.timeout > 0 {
                    defaults = defaults.timeout(Duration::from_millis(config.timeout));
                }
                for (name, value) in config.headers {
                    defaults = defaults.header(name, FieldValue::One(value));
                }
            }
            None => {
                warn!(group, service, "service config missing, using defaults");
            }
        }
        defaults.merge(overrides);
        Self::new(defaults)
    }

    pub async fn get(&self, uri: &str, overrides: Option<Options>) -> EnvxResult<Response> {
        self.send(Method::GET, uri, overrides).await
    }

    pub async fn post(&self, uri: &str, overrides: Option<Options>) -> EnvxResult<Response> {
        self.send(Method::POST, uri, overrides).await
    }

    pub async fn put(&self, uri: &str, overrides: Option<Options>) -> EnvxResult<Response> {
        self.send(Method::PUT, uri, overrides).await
    }

    pub async fn patch(&self, uri: &str, overrides: Option<Options>) -> EnvxResult<Response> {
        self.send(Method::PATCH, uri, overrides).await
    }

    pub async fn delete(&self, uri: &str, overrides: Option<Options>) -> EnvxResult<Response> {
        self.send(Method::DELETE, uri, overrides).await
    }

    pub async fn options(&self, uri: &str, overrides: Option<Options>) -> EnvxResult<Response> {
        self.send(Method::OPTIONS, uri, overrides).await
    }

    /// Builds the per-call snapshot, composes the wrapper chain around the
    /// retrying terminal sender, and runs it.
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        overrides: Option<Options>,
    ) -> EnvxResult<Response> {
        let mut prepared = request::build(&self.defaults, method, uri, overrides)?;
        let wrappers = std::mem::take(&mut prepared.wrappers);

        let transport = self.transport.clone();
        let terminal: Sender = Arc::new(move |prepared| {
            let transport = transport.clone();
            Box::pin(execute_with_retry(transport, prepared))
        });

        let chain = compose(&wrappers, terminal);
        chain(prepared).await
    }
}

/// The retry/backoff loop around the actual network call. Each attempt is
/// bounded by the per-call timeout; when it fires the attempt future is
/// dropped, which cancels the in-flight request.
async fn execute_with_retry(
    transport: HyperClient,
    prepared: PreparedRequest,
) -> EnvxResult<Response> {
    let mut attempt: usize = 0;

    loop {
        let wait = prepared.backoff.delay(attempt)?;
        if !wait.is_zero() {
            sleep(wait).await;
        }

        let span = info_span!(
            "envx.request",
            method = %prepared.method(),
            uri = %prepared.uri(),
            attempt = attempt + 1,
            max_attempts = prepared.retries,
        );
        let (error, status) = match run_attempt(&transport, &prepared).instrument(span).await {
            Ok(response) => return Ok(response),
            Err(outcome) => outcome,
        };

        let decision = RetryDecision {
            attempt,
            max_attempts: prepared.retries,
            method: prepared.method().clone(),
            uri: prepared.uri().to_string(),
            status,
            transport: match &error {
                ClientError::Transport { kind, .. } => Some(*kind),
                _ => None,
            },
        };
        let should_retry = prepared.retry.should_retry(&decision)?;
        if !should_retry || attempt + 1 >= prepared.retries {
            return Err(error);
        }

        warn!(
            attempt = attempt + 1,
            max_attempts = prepared.retries,
            error = %error,
            "retrying request"
        );
        attempt += 1;
    }
}

/// One round trip: send, await within the timeout, read the body. A
/// non-success status is a failure carrying the status for the retry
/// policy; transport failures and timeouts carry none.
async fn run_attempt(
    transport: &HyperClient,
    prepared: &PreparedRequest,
) -> Result<Response, (ClientError, Option<StatusCode>)> {
    let request = build_http_request(prepared).map_err(|error| (error, None))?;

    let round_trip = async {
        let response: http::Response<Incoming> = transport.request(request).await.map_err(|source| {
            let kind = classify_transport_error(&source);
            ClientError::Transport {
                kind,
                method: prepared.method().clone(),
                uri: prepared.uri().to_string(),
                source: Box::new(source),
            }
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|source| ClientError::ReadBody {
                source: Box::new(source),
            })?
            .to_bytes();
        Ok::<_, ClientError>((status, headers, body))
    };

    let (status, headers, body) = match timeout(prepared.timeout, round_trip).await {
        Ok(Ok(parts)) => parts,
        Ok(Err(error)) => return Err((error, None)),
        Err(_elapsed) => {
            return Err((
                ClientError::Timeout {
                    timeout_ms: prepared.timeout.as_millis(),
                    method: prepared.method().clone(),
                    uri: prepared.uri().to_string(),
                },
                None,
            ));
        }
    };

    if prepared.debug {
        debug!(
            target: "envx::dump",
            "response dump:\nHTTP/1.1 {status}\n{}",
            dump_headers_and_body(&headers, &body)
        );
    }

    if !status.is_success() {
        return Err((
            ClientError::HttpStatus {
                status: status.as_u16(),
                method: prepared.method().clone(),
                uri: prepared.uri().to_string(),
                body: truncate_body(&body),
            },
            Some(status),
        ));
    }

    let cost = prepared.started_at.elapsed();
    debug!(host = %prepared.uri(), cost_ms = cost.as_millis() as u64, "client response");

    Ok(Response::new(
        status,
        headers,
        body,
        prepared.method().clone(),
        prepared.uri().to_string(),
        cost,
    ))
}

fn build_http_request(prepared: &PreparedRequest) -> EnvxResult<Request<Full<Bytes>>> {
    let mut request = Request::builder()
        .method(prepared.method().clone())
        .uri(prepared.uri().clone())
        .body(Full::new(prepared.body().clone()))
        .map_err(|source| ClientError::RequestBuild { source })?;
    *request.headers_mut() = prepared.headers().clone();
    Ok(request)
}

fn dump_headers_and_body(headers: &HeaderMap, body: &Bytes) -> String {
    let mut dump = String::new();
    for (name, value) in headers {
        dump.push_str(name.as_str());
        dump.push_str(": ");
        dump.push_str(value.to_str().unwrap_or("<binary>"));
        dump.push('\n');
    }
    if !body.is_empty() {
        dump.push('\n');
        dump.push_str(&String::from_utf8_lossy(body));
    }
    dump
}
