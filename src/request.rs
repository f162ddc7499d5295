use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue, Method, Uri};
use tracing::{debug, warn};

use crate::backoff::{BackoffPolicy, ExponentialBackoff};
use crate::error::ClientError;
use crate::options::{FieldValue, Options, Query, DEFAULT_RETRIES, DEFAULT_TIMEOUT};
use crate::retry::{RetryOnStatus, RetryPolicy};
use crate::util::{is_absolute_http_uri, join_base_path, parse_header_name, parse_header_value};
use crate::wrapper::Wrapper;
use crate::EnvxResult;

/// One in-flight call: the fully resolved, immutable per-call snapshot
/// handed through the wrapper chain to the terminal sender.
///
/// Built fresh for every call; nothing here is shared with the client or
/// with other calls, so wrappers may mutate it freely.
pub struct PreparedRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    pub(crate) timeout: Duration,
    pub(crate) retries: usize,
    pub(crate) backoff: Arc<dyn BackoffPolicy>,
    pub(crate) retry: Arc<dyn RetryPolicy>,
    pub(crate) wrappers: Vec<Arc<dyn Wrapper>>,
    pub(crate) debug: bool,
    pub(crate) started_at: Instant,
}

impl std::fmt::Debug for PreparedRequest {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("PreparedRequest")
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("headers", &self.headers)
            .field("body", &self.body)
            .field("timeout", &self.timeout)
            .field("retries", &self.retries)
            .field("backoff", &"<policy>")
            .field("retry", &"<policy>")
            .field("wrappers", &self.wrappers.len())
            .field("debug", &self.debug)
            .field("started_at", &self.started_at)
            .finish()
    }
}

impl PreparedRequest {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Replaces the target URI (wrapper-level redirects, endpoint rewrites).
    pub fn set_uri(&mut self, uri: Uri) {
        self.uri = uri;
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn set_header(&mut self, name: &str, value: &str) -> EnvxResult<()> {
        let name = parse_header_name(name)?;
        let value = parse_header_value(name.as_str(), value)?;
        self.headers.insert(name, value);
        Ok(())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn retries(&self) -> usize {
        self.retries
    }

    #[cfg(test)]
    pub(crate) fn stub(method: Method, uri: &str) -> Self {
        Self {
            method,
            uri: uri.parse().expect("stub uri should parse"),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            timeout: DEFAULT_TIMEOUT,
            retries: DEFAULT_RETRIES,
            backoff: Arc::new(ExponentialBackoff),
            retry: Arc::new(RetryOnStatus),
            wrappers: Vec::new(),
            debug: false,
            started_at: Instant::now(),
        }
    }
}

/// Runs the construction phase: merges the per-call overlay onto the
/// client defaults, resolves the URI, serializes the verb-dependent body,
/// reconciles headers and query parameters, and emits the pre-call
/// diagnostics.
pub(crate) fn build(
    defaults: &Options,
    method: Method,
    uri: &str,
    overrides: Option<Options>,
) -> EnvxResult<PreparedRequest> {
    let mut opts = defaults.clone();
    if let Some(overlay) = overrides {
        opts.merge(overlay);
    }

    let uri_text = resolve_uri_text(&opts, uri)?;

    let mut headers = HeaderMap::new();
    let body = match method {
        Method::GET | Method::DELETE => Bytes::new(),
        Method::POST | Method::PUT | Method::PATCH | Method::OPTIONS => {
            serialize_body(&opts, &mut headers)?
        }
        other => return Err(ClientError::InvalidMethod { method: other }),
    };

    apply_headers(&mut headers, &opts.headers)?;
    fill_default_headers(&mut headers, &defaults.headers)?;

    let uri = apply_query(&uri_text, opts.query.as_ref())?;

    debug!(host = %uri, method = %method, "client request");
    if opts.debug {
        debug!(
            target: "envx::dump",
            "request dump:\n{}",
            dump_request(&method, &uri, &headers, &body)
        );
    }

    Ok(PreparedRequest {
        method,
        uri,
        headers,
        body,
        timeout: opts.timeout.unwrap_or(DEFAULT_TIMEOUT).max(Duration::from_millis(1)),
        retries: opts.retries.unwrap_or(DEFAULT_RETRIES).max(1),
        backoff: opts
            .backoff
            .unwrap_or_else(|| Arc::new(ExponentialBackoff)),
        retry: opts.retry.unwrap_or_else(|| Arc::new(RetryOnStatus)),
        wrappers: opts.wrappers,
        debug: opts.debug,
        started_at: Instant::now(),
    })
}

fn resolve_uri_text(opts: &Options, uri: &str) -> EnvxResult<String> {
    if is_absolute_http_uri(uri) {
        return Ok(uri.to_owned());
    }
    let base = opts
        .base_uri
        .as_deref()
        .filter(|base| !base.is_empty())
        .ok_or_else(|| ClientError::InvalidUri {
            uri: uri.to_owned(),
        })?;
    Ok(join_base_path(base, uri))
}

fn serialize_body(opts: &Options, headers: &mut HeaderMap) -> EnvxResult<Bytes> {
    if let Some(form_params) = &opts.form_params {
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        return Ok(Bytes::from(encode_form(form_params)));
    }
    if let Some(json) = &opts.json {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let body = serde_json::to_vec(json).map_err(|source| ClientError::Serialize { source })?;
        return Ok(Bytes::from(body));
    }
    Ok(Bytes::new())
}

fn encode_form(params: &[(String, FieldValue)]) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (name, value) in params {
        match value {
            FieldValue::One(value) => {
                serializer.append_pair(name, value);
            }
            FieldValue::Many(values) => {
                for value in values {
                    serializer.append_pair(name, value);
                }
            }
            FieldValue::Other(value) => {
                warn!(param = %name, value = %value, "form param is not a string");
                serializer.append_pair(name, &FieldValue::stringify_other(value));
            }
        }
    }
    serializer.finish()
}

fn apply_headers(headers: &mut HeaderMap, fields: &[(String, FieldValue)]) -> EnvxResult<()> {
    for (name, value) in fields {
        let name = parse_header_name(name)?;
        match value {
            FieldValue::One(value) => {
                headers.insert(name.clone(), parse_header_value(name.as_str(), value)?);
            }
            FieldValue::Many(values) => {
                for value in values {
                    headers.append(name.clone(), parse_header_value(name.as_str(), value)?);
                }
            }
            FieldValue::Other(value) => {
                warn!(header = %name, value = %value, "header value is not a string");
                let text = FieldValue::stringify_other(value);
                headers.insert(name.clone(), parse_header_value(name.as_str(), &text)?);
            }
        }
    }
    Ok(())
}

/// Defaults never override an explicitly set header; they only fill gaps.
fn fill_default_headers(
    headers: &mut HeaderMap,
    defaults: &[(String, FieldValue)],
) -> EnvxResult<()> {
    for (name, value) in defaults {
        let parsed = parse_header_name(name)?;
        if headers.contains_key(&parsed) {
            continue;
        }
        apply_headers(headers, std::slice::from_ref(&(name.clone(), value.clone())))?;
    }
    Ok(())
}

fn apply_query(uri_text: &str, query: Option<&Query>) -> EnvxResult<Uri> {
    let invalid = || ClientError::InvalidUri {
        uri: uri_text.to_owned(),
    };
    let mut url = url::Url::parse(uri_text).map_err(|_| invalid())?;

    match query {
        None => {}
        Some(Query::Raw(raw)) => {
            url.set_query(if raw.is_empty() { None } else { Some(raw) });
        }
        Some(Query::Pairs(incoming)) => {
            let mut pairs: Vec<(String, String)> = url
                .query_pairs()
                .map(|(name, value)| (name.into_owned(), value.into_owned()))
                .collect();
            for (name, value) in incoming {
                match value {
                    FieldValue::One(value) => {
                        pairs.retain(|(existing, _)| existing != name);
                        pairs.push((name.clone(), value.clone()));
                    }
                    FieldValue::Many(values) => {
                        for value in values {
                            pairs.push((name.clone(), value.clone()));
                        }
                    }
                    FieldValue::Other(value) => {
                        warn!(param = %name, value = %value, "query param is not a string");
                        pairs.retain(|(existing, _)| existing != name);
                        pairs.push((name.clone(), FieldValue::stringify_other(value)));
                    }
                }
            }
            if pairs.is_empty() {
                url.set_query(None);
            } else {
                let mut serializer = url::form_urlencoded::Serializer::new(String::new());
                for (name, value) in &pairs {
                    serializer.append_pair(name, value);
                }
                let encoded = serializer.finish();
                url.set_query(Some(&encoded));
            }
        }
    }

    url.as_str().parse().map_err(|_| invalid())
}

pub(crate) fn dump_request(
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
    body: &Bytes,
) -> String {
    let mut dump = format!("{method} {uri} HTTP/1.1\n");
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
