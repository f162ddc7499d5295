use std::time::Duration;

use bytes::Bytes;
use http::header::AsHeaderName;
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;
use crate::util::truncate_body;
use crate::EnvxResult;

/// The sole success sentinel of the generic response envelope.
pub const SUCCESS_CODE: i64 = 1;

/// The generic `{code, data, message, timestamp}` wrapper all conforming
/// backends answer with. `data` carries an arbitrary payload type; the
/// strict parse path decodes it in a second pass so the envelope stays
/// payload-agnostic.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope<T = serde_json::Value> {
    pub code: i64,
    pub data: T,
    pub message: String,
    pub timestamp: i64,
}

impl<T> Envelope<T> {
    pub fn is_success(&self) -> bool {
        self.code == SUCCESS_CODE
    }

    /// The domain error this envelope carries, if any.
    pub fn domain_error(&self) -> Option<ClientError> {
        if self.is_success() {
            return None;
        }
        Some(ClientError::Envelope {
            code: self.code,
            message: self.message.clone(),
        })
    }
}

/// First-pass decode target: `data` stays an opaque JSON value.
#[derive(Debug, Deserialize)]
struct RawEnvelope {
    code: i64,
    #[serde(default)]
    data: serde_json::Value,
    #[serde(default)]
    message: String,
    #[serde(default)]
    timestamp: i64,
}

/// A completed call: status, headers, and the body bytes.
///
/// The body is read from the transport exactly once by the executor and
/// cached here; every [`Response::body`] call returns the same bytes, so
/// repeated reads never touch the network stream again.
#[derive(Clone, Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    method: Method,
    uri: String,
    cost: Duration,
}

impl Response {
    pub(crate) fn new(
        status: StatusCode,
        headers: HeaderMap,
        body: Bytes,
        method: Method,
        uri: String,
        cost: Duration,
    ) -> Self {
        Self {
            status,
            headers,
            body,
            method,
            uri,
            cost,
        }
    }

    #[cfg(test)]
    pub(crate) fn stub(status: StatusCode, method: Method, uri: String) -> Self {
        Self::new(
            status,
            HeaderMap::new(),
            Bytes::new(),
            method,
            uri,
            Duration::ZERO,
        )
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// True when the status is exactly 200.
    pub fn is_ok(&self) -> bool {
        self.status == StatusCode::OK
    }

    pub fn reason_phrase(&self) -> &'static str {
        self.status.canonical_reason().unwrap_or("")
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Case-insensitive single-header lookup; the first value when the
    /// header is repeated.
    pub fn header(&self, name: impl AsHeaderName) -> Option<&HeaderValue> {
        self.headers.get(name)
    }

    /// Every value of a repeated header, in insertion order.
    pub fn header_all(&self, name: impl AsHeaderName) -> Vec<&HeaderValue> {
        self.headers.get_all(name).iter().collect()
    }

    /// The cached body bytes; identical on every call.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Wall-clock time from request build to body read.
    pub fn cost(&self) -> Duration {
        self.cost
    }

    fn decode_envelope(&self) -> EnvxResult<RawEnvelope> {
        if self.status != StatusCode::OK {
            return Err(ClientError::UnexpectedStatus {
                status: self.status.as_u16(),
                method: self.method.clone(),
                uri: self.uri.clone(),
            });
        }
        serde_json::from_slice(&self.body).map_err(|source| ClientError::Deserialize {
            source,
            body: truncate_body(&self.body),
        })
    }

    fn decode_data<T>(&self, data: serde_json::Value) -> EnvxResult<T>
    where
        T: DeserializeOwned,
    {
        serde_json::from_value(data).map_err(|source| ClientError::Deserialize {
            source,
            body: truncate_body(&self.body),
        })
    }

    /// Decodes the generic envelope and, in a second pass, its `data`
    /// payload into `T`. Requires the transport status to be exactly 200;
    /// the envelope `code` is not checked.
    pub fn parse_body<T>(&self) -> EnvxResult<Envelope<T>>
    where
        T: DeserializeOwned,
    {
        let raw = self.decode_envelope()?;
        let data = self.decode_data(raw.data)?;
        Ok(Envelope {
            code: raw.code,
            data,
            message: raw.message,
            timestamp: raw.timestamp,
        })
    }

    /// Like [`Response::parse_body`], but additionally requires the
    /// envelope `code` to be the success sentinel. The code is checked
    /// before the inner `data` decode, so a failure envelope with a null
    /// payload still surfaces the domain error.
    pub fn must_parse_body<T>(&self) -> EnvxResult<Envelope<T>>
    where
        T: DeserializeOwned,
    {
        let raw = self.decode_envelope()?;
        if raw.code != SUCCESS_CODE {
            return Err(ClientError::Envelope {
                code: raw.code,
                message: raw.message,
            });
        }
        let data = self.decode_data(raw.data)?;
        Ok(Envelope {
            code: raw.code,
            data,
            message: raw.message,
            timestamp: raw.timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use http::{HeaderMap, HeaderValue, Method, StatusCode};
    use serde::Deserialize;
    use std::time::Duration;

    use super::{Envelope, Response, SUCCESS_CODE};
    use crate::error::ClientError;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Payload {
        x: i64,
    }

    fn response_with(status: StatusCode, body: &str) -> Response {
        Response::new(
            status,
            HeaderMap::new(),
            Bytes::from(body.to_owned()),
            Method::GET,
            "http://api.example.com/v1/x".to_owned(),
            Duration::from_millis(3),
        )
    }

    #[test]
    fn envelope_round_trip_decodes_the_inner_payload() {
        let encoded = serde_json::to_string(&Envelope {
            code: SUCCESS_CODE,
            data: serde_json::json!({"x": 5}),
            message: String::new(),
            timestamp: 1_700_000_000,
        })
        .expect("envelope should encode");

        let envelope = response_with(StatusCode::OK, &encoded)
            .must_parse_body::<Payload>()
            .expect("strict parse should succeed");

        assert_eq!(envelope.data, Payload { x: 5 });
        assert_eq!(envelope.timestamp, 1_700_000_000);
        assert!(envelope.is_success());
    }

    #[test]
    fn failure_envelope_surfaces_code_and_message() {
        let body = r#"{"code":-1,"data":null,"message":"bad"}"#;
        let error = response_with(StatusCode::OK, body)
            .must_parse_body::<Payload>()
            .expect_err("strict parse must fail on code != 1");

        match &error {
            ClientError::Envelope { code, message } => {
                assert_eq!(*code, -1);
                assert_eq!(message, "bad");
            }
            other => panic!("unexpected error variant: {other}"),
        }
        assert!(error.to_string().contains("-1"));
        assert!(error.to_string().contains("bad"));
    }

    #[test]
    fn lenient_parse_skips_the_code_check() {
        let body = r#"{"code":-1,"data":{"x":9},"message":"bad"}"#;
        let envelope = response_with(StatusCode::OK, body)
            .parse_body::<Payload>()
            .expect("lenient parse should succeed");

        assert_eq!(envelope.code, -1);
        assert_eq!(envelope.data, Payload { x: 9 });
        assert!(envelope.domain_error().is_some());
    }

    #[test]
    fn non_200_status_is_a_hard_parse_error() {
        let body = r#"{"code":1,"data":{"x":5},"message":""}"#;
        let error = response_with(StatusCode::CREATED, body)
            .parse_body::<Payload>()
            .expect_err("parse must reject non-200 statuses");
        assert!(matches!(
            error,
            ClientError::UnexpectedStatus { status: 201, .. }
        ));
    }

    #[test]
    fn malformed_envelope_json_is_a_decode_error() {
        let error = response_with(StatusCode::OK, "{not json")
            .parse_body::<Payload>()
            .expect_err("parse must reject malformed json");
        assert!(matches!(error, ClientError::Deserialize { .. }));
    }

    #[test]
    fn repeated_body_reads_return_identical_bytes() {
        let response = response_with(StatusCode::OK, "cached-bytes");
        let first = response.body().clone();
        let second = response.body().clone();
        assert_eq!(first, second);
        assert_eq!(first.as_ref(), b"cached-bytes");
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Request-Id", HeaderValue::from_static("abc"));
        let response = Response::new(
            StatusCode::OK,
            headers,
            Bytes::new(),
            Method::GET,
            "http://api.example.com".to_owned(),
            Duration::ZERO,
        );

        assert_eq!(
            response.header("x-request-id").and_then(|v| v.to_str().ok()),
            Some("abc")
        );
        assert_eq!(
            response.header("X-REQUEST-ID").and_then(|v| v.to_str().ok()),
            Some("abc")
        );
    }

    #[test]
    fn repeated_headers_are_all_returned() {
        let mut headers = HeaderMap::new();
        headers.append("set-cookie", HeaderValue::from_static("a=1"));
        headers.append("set-cookie", HeaderValue::from_static("b=2"));
        let response = Response::new(
            StatusCode::OK,
            headers,
            Bytes::new(),
            Method::GET,
            "http://api.example.com".to_owned(),
            Duration::ZERO,
        );

        assert_eq!(
            response.header("set-cookie").and_then(|v| v.to_str().ok()),
            Some("a=1")
        );
        let all: Vec<&str> = response
            .header_all("Set-Cookie")
            .into_iter()
            .filter_map(|value| value.to_str().ok())
            .collect();
        assert_eq!(all, vec!["a=1", "b=2"]);
    }
}
