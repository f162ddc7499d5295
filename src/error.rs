use http::Method;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Coarse classification of a transport-level failure, used by retry
/// policies and diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum TransportErrorKind {
    Dns,
    Connect,
    Tls,
    Read,
    Other,
}

impl std::fmt::Display for TransportErrorKind {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::Dns => "dns",
            Self::Connect => "connect",
            Self::Tls => "tls",
            Self::Read => "read",
            Self::Other => "other",
        };
        formatter.write_str(text)
    }
}

/// Stable machine-readable code for every [`ClientError`] variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorCode {
    InvalidUri,
    InvalidMethod,
    SerializeBody,
    RequestBuild,
    TlsInit,
    Transport,
    Timeout,
    BackoffPolicy,
    ReadBody,
    HttpStatus,
    UnexpectedStatus,
    Deserialize,
    Envelope,
    InvalidHeaderName,
    InvalidHeaderValue,
}

impl ErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidUri => "invalid_uri",
            Self::InvalidMethod => "invalid_method",
            Self::SerializeBody => "serialize_body",
            Self::RequestBuild => "request_build",
            Self::TlsInit => "tls_init",
            Self::Transport => "transport",
            Self::Timeout => "timeout",
            Self::BackoffPolicy => "backoff_policy",
            Self::ReadBody => "read_body",
            Self::HttpStatus => "http_status",
            Self::UnexpectedStatus => "unexpected_status",
            Self::Deserialize => "deserialize",
            Self::Envelope => "envelope",
            Self::InvalidHeaderName => "invalid_header_name",
            Self::InvalidHeaderValue => "invalid_header_value",
        }
    }
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    #[error("invalid request uri: {uri}")]
    InvalidUri { uri: String },
    #[error("invalid request method: {method}")]
    InvalidMethod { method: Method },
    #[error("failed to serialize request body: {source}")]
    Serialize {
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to build http request: {source}")]
    RequestBuild {
        #[source]
        source: http::Error,
    },
    #[error("failed to initialize tls: {message}")]
    TlsInit { message: String },
    #[error("http transport error ({kind}) for {method} {uri}: {source}")]
    Transport {
        kind: TransportErrorKind,
        method: Method,
        uri: String,
        #[source]
        source: BoxError,
    },
    #[error("http request timed out after {timeout_ms}ms for {method} {uri}")]
    Timeout {
        timeout_ms: u128,
        method: Method,
        uri: String,
    },
    #[error("backoff policy failed on attempt {attempt}: {message}")]
    BackoffPolicy { attempt: usize, message: String },
    #[error("failed to read response body: {source}")]
    ReadBody {
        #[source]
        source: BoxError,
    },
    #[error("http status error {status} for {method} {uri}: {body}")]
    HttpStatus {
        status: u16,
        method: Method,
        uri: String,
        body: String,
    },
    #[error("unexpected http status {status} while parsing response for {method} {uri}")]
    UnexpectedStatus {
        status: u16,
        method: Method,
        uri: String,
    },
    #[error("failed to decode response json: {source}; body={body}")]
    Deserialize {
        #[source]
        source: serde_json::Error,
        body: String,
    },
    #[error("call api fail: {code} {message}")]
    Envelope { code: i64, message: String },
    #[error("invalid header name {name}: {source}")]
    InvalidHeaderName {
        name: String,
        #[source]
        source: http::header::InvalidHeaderName,
    },
    #[error("invalid header value for {name}: {source}")]
    InvalidHeaderValue {
        name: String,
        #[source]
        source: http::header::InvalidHeaderValue,
    },
}

impl ClientError {
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidUri { .. } => ErrorCode::InvalidUri,
            Self::InvalidMethod { .. } => ErrorCode::InvalidMethod,
            Self::Serialize { .. } => ErrorCode::SerializeBody,
            Self::RequestBuild { .. } => ErrorCode::RequestBuild,
            Self::TlsInit { .. } => ErrorCode::TlsInit,
            Self::Transport { .. } => ErrorCode::Transport,
            Self::Timeout { .. } => ErrorCode::Timeout,
            Self::BackoffPolicy { .. } => ErrorCode::BackoffPolicy,
            Self::ReadBody { .. } => ErrorCode::ReadBody,
            Self::HttpStatus { .. } => ErrorCode::HttpStatus,
            Self::UnexpectedStatus { .. } => ErrorCode::UnexpectedStatus,
            Self::Deserialize { .. } => ErrorCode::Deserialize,
            Self::Envelope { .. } => ErrorCode::Envelope,
            Self::InvalidHeaderName { .. } => ErrorCode::InvalidHeaderName,
            Self::InvalidHeaderValue { .. } => ErrorCode::InvalidHeaderValue,
        }
    }

    /// True when the call failed on a network-level timeout.
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Envelope code and message when the error is a domain failure
    /// (`code != 1` from the strict parse path).
    pub fn envelope_failure(&self) -> Option<(i64, &str)> {
        match self {
            Self::Envelope { code, message } => Some((*code, message.as_str())),
            _ => None,
        }
    }
}
