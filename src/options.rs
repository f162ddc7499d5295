use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::backoff::BackoffPolicy;
use crate::error::ClientError;
use crate::retry::RetryPolicy;
use crate::wrapper::Wrapper;
use crate::EnvxResult;

pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub(crate) const DEFAULT_RETRIES: usize = 1;

/// A header, query, or form value: a single string, a repeated string, or
/// an arbitrary JSON value that is stringified with default formatting
/// (and a diagnostic logged) when it reaches the wire.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    One(String),
    Many(Vec<String>),
    Other(serde_json::Value),
}

impl FieldValue {
    /// Stringifies an `Other` value the way the wire assembly does.
    pub(crate) fn stringify_other(value: &serde_json::Value) -> String {
        match value {
            serde_json::Value::String(text) => text.clone(),
            other => other.to_string(),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::One(value.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::One(value)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(values: Vec<String>) -> Self {
        Self::Many(values)
    }
}

impl From<Vec<&str>> for FieldValue {
    fn from(values: Vec<&str>) -> Self {
        Self::Many(values.into_iter().map(ToOwned::to_owned).collect())
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(text) => Self::One(text),
            other => Self::Other(other),
        }
    }
}

macro_rules! field_value_from_scalar {
    ($($scalar:ty),*) => {
        $(
            impl From<$scalar> for FieldValue {
                fn from(value: $scalar) -> Self {
                    Self::Other(serde_json::Value::from(value))
                }
            }
        )*
    };
}

field_value_from_scalar!(i64, u64, i32, u32, f64, bool);

/// Query configuration: a raw string applied verbatim, or pairs merged
/// key-by-key onto whatever query the resolved URI already carries.
#[derive(Clone, Debug, PartialEq)]
pub enum Query {
    Raw(String),
    Pairs(Vec<(String, FieldValue)>),
}

/// Immutable-intent configuration snapshot for a call.
///
/// `Options::default()` leaves every field unset; effective defaults
/// (30s timeout, one attempt, [`ExponentialBackoff`], [`RetryOnStatus`])
/// are applied when a request is built. Builder methods play the role of
/// override functions: later calls win.
///
/// [`ExponentialBackoff`]: crate::backoff::ExponentialBackoff
/// [`RetryOnStatus`]: crate::retry::RetryOnStatus
#[derive(Clone, Default)]
pub struct Options {
    pub(crate) base_uri: Option<String>,
    pub(crate) query: Option<Query>,
    pub(crate) headers: Vec<(String, FieldValue)>,
    pub(crate) form_params: Option<Vec<(String, FieldValue)>>,
    pub(crate) json: Option<serde_json::Value>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) retries: Option<usize>,
    pub(crate) backoff: Option<Arc<dyn BackoffPolicy>>,
    pub(crate) retry: Option<Arc<dyn RetryPolicy>>,
    pub(crate) wrappers: Vec<Arc<dyn Wrapper>>,
    pub(crate) debug: bool,
}

impl std::fmt::Debug for Options {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Options")
            .field("base_uri", &self.base_uri)
            .field("query", &self.query)
            .field("headers", &self.headers)
            .field("form_params", &self.form_params)
            .field("json", &self.json)
            .field("timeout", &self.timeout)
            .field("retries", &self.retries)
            .field("backoff", &self.backoff.as_ref().map(|_| "<policy>"))
            .field("retry", &self.retry.as_ref().map(|_| "<policy>"))
            .field("wrappers", &self.wrappers.len())
            .field("debug", &self.debug)
            .finish()
    }
}

impl Options {
    /// The request base URI; relative call paths are appended to it.
    pub fn base_uri(mut self, base_uri: impl Into<String>) -> Self {
        self.base_uri = Some(base_uri.into());
        self
    }

    /// Sets the URL query verbatim.
    pub fn query_raw(mut self, query: impl Into<String>) -> Self {
        self.query = Some(Query::Raw(query.into()));
        self
    }

    /// Query pairs merged key-by-key onto the resolved URI's query.
    pub fn query_pairs<K, V, I>(mut self, pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<FieldValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        self.query = Some(Query::Pairs(
            pairs
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        ));
        self
    }

    /// Adds one request header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Replaces the request headers wholesale.
    pub fn headers<K, V, I>(mut self, headers: I) -> Self
    where
        K: Into<String>,
        V: Into<FieldValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        self.headers = headers
            .into_iter()
            .map(|(name, value)| (name.into(), value.into()))
            .collect();
        self
    }

    /// URL-encoded form body for the mutating verbs. Takes precedence over
    /// a JSON body when both are set.
    pub fn form_params<K, V, I>(mut self, params: I) -> Self
    where
        K: Into<String>,
        V: Into<FieldValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        self.form_params = Some(
            params
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        );
        self
    }

    /// JSON body for the mutating verbs, serialized when the request is
    /// built.
    pub fn json<T>(self, payload: &T) -> EnvxResult<Self>
    where
        T: Serialize + ?Sized,
    {
        let value =
            serde_json::to_value(payload).map_err(|source| ClientError::Serialize { source })?;
        Ok(self.json_value(value))
    }

    /// JSON body from an already-built value.
    pub fn json_value(mut self, payload: serde_json::Value) -> Self {
        self.json = Some(payload);
        self
    }

    /// Per-attempt request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout.max(Duration::from_millis(1)));
        self
    }

    /// Total attempt budget (>= 1), first try included.
    pub fn retries(mut self, retries: usize) -> Self {
        self.retries = Some(retries.max(1));
        self
    }

    /// Backoff policy consulted before every attempt.
    pub fn backoff(mut self, backoff: Arc<dyn BackoffPolicy>) -> Self {
        self.backoff = Some(backoff);
        self
    }

    /// Retry policy consulted after every failed attempt.
    pub fn retry(mut self, retry: Arc<dyn RetryPolicy>) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Appends a wrapper to the middleware chain. The first wrapper added
    /// ends up outermost.
    pub fn wrap(mut self, wrapper: impl Wrapper + 'static) -> Self {
        self.wrappers.push(Arc::new(wrapper));
        self
    }

    /// Dump the full outgoing request and raw response to the diagnostic
    /// log stream.
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Right-biased sparse overlay: only fields set on `other` override
    /// the base; wrappers are concatenated after the existing ones.
    pub fn merge(&mut self, other: Options) {
        let Options {
            base_uri,
            query,
            headers,
            form_params,
            json,
            timeout,
            retries,
            backoff,
            retry,
            wrappers,
            debug,
        } = other;

        if let Some(base_uri) = base_uri {
            self.base_uri = Some(base_uri);
        }
        if let Some(query) = query {
            self.query = Some(query);
        }
        if !headers.is_empty() {
            self.headers = headers;
        }
        if let Some(form_params) = form_params {
            self.form_params = Some(form_params);
        }
        if let Some(json) = json {
            self.json = Some(json);
        }
        if let Some(timeout) = timeout {
            self.timeout = Some(timeout);
        }
        if let Some(retries) = retries {
            self.retries = Some(retries);
        }
        if let Some(backoff) = backoff {
            self.backoff = Some(backoff);
        }
        if let Some(retry) = retry {
            self.retry = Some(retry);
        }
        self.wrappers.extend(wrappers);
        if debug {
            self.debug = true;
        }
    }
}
