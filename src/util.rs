use http::header::{HeaderName, HeaderValue};

use crate::error::{ClientError, TransportErrorKind};

const MAX_ERROR_BODY_LEN: usize = 2048;

/// An absolute `http`/`https` URI with a host is used verbatim; anything
/// else is treated as a path relative to the configured base URI.
pub(crate) fn is_absolute_http_uri(uri: &str) -> bool {
    let Ok(parsed) = url::Url::parse(uri) else {
        return false;
    };
    matches!(parsed.scheme(), "http" | "https") && parsed.has_host()
}

pub(crate) fn join_base_path(base_uri: &str, path: &str) -> String {
    let base = base_uri.trim_end_matches('/');
    let relative = path.trim_start_matches('/');
    match (base.is_empty(), relative.is_empty()) {
        (true, true) => String::new(),
        (true, false) => relative.to_owned(),
        (false, true) => base.to_owned(),
        (false, false) => format!("{base}/{relative}"),
    }
}

pub(crate) fn parse_header_name(name: &str) -> Result<HeaderName, ClientError> {
    name.parse()
        .map_err(|source| ClientError::InvalidHeaderName {
            name: name.to_owned(),
            source,
        })
}

pub(crate) fn parse_header_value(name: &str, value: &str) -> Result<HeaderValue, ClientError> {
    value
        .parse()
        .map_err(|source| ClientError::InvalidHeaderValue {
            name: name.to_owned(),
            source,
        })
}

pub(crate) fn classify_transport_error(
    error: &hyper_util::client::legacy::Error,
) -> TransportErrorKind {
    if error.is_connect() {
        let text = error.to_string().to_ascii_lowercase();
        if text.contains("dns")
            || text.contains("name or service not known")
            || text.contains("failed to lookup address")
        {
            return TransportErrorKind::Dns;
        }
        if text.contains("tls") || text.contains("certificate") || text.contains("handshake") {
            return TransportErrorKind::Tls;
        }
        return TransportErrorKind::Connect;
    }

    let text = error.to_string().to_ascii_lowercase();
    if text.contains("read")
        || text.contains("connection reset")
        || text.contains("broken pipe")
        || text.contains("unexpected eof")
    {
        return TransportErrorKind::Read;
    }

    TransportErrorKind::Other
}

pub(crate) fn truncate_body(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    if text.chars().count() <= MAX_ERROR_BODY_LEN {
        return text.into_owned();
    }

    let truncated: String = text.chars().take(MAX_ERROR_BODY_LEN).collect();
    format!("{truncated}...(truncated)")
}

#[cfg(test)]
mod tests {
    use super::{is_absolute_http_uri, join_base_path, truncate_body};

    #[test]
    fn absolute_http_uris_are_recognized() {
        assert!(is_absolute_http_uri("http://api.example.com/v1"));
        assert!(is_absolute_http_uri("https://api.example.com"));
        assert!(!is_absolute_http_uri("/v1/items"));
        assert!(!is_absolute_http_uri("ftp://api.example.com/v1"));
        assert!(!is_absolute_http_uri(""));
    }

    #[test]
    fn join_base_path_handles_slashes() {
        assert_eq!(
            join_base_path("http://api.example.com/", "/v1/x"),
            "http://api.example.com/v1/x"
        );
        assert_eq!(
            join_base_path("http://api.example.com", "/v1/x"),
            "http://api.example.com/v1/x"
        );
    }

    #[test]
    fn truncate_body_caps_long_payloads() {
        let long = "x".repeat(4096);
        let text = truncate_body(long.as_bytes());
        assert!(text.ends_with("...(truncated)"));
        assert!(text.chars().count() < 4096);
    }
}
