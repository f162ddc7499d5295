//! `envx` is an outbound HTTP request engine for API SDKs whose backends
//! answer with the generic `{code, data, message, timestamp}` JSON envelope.
//!
//! A [`Client`] holds an immutable [`Options`] snapshot (base URI, timeout,
//! retry budget, backoff/retry policies, wrapper middleware). Every call
//! resolves a fresh per-call snapshot, runs the wrapper chain around the
//! terminal sender, and the terminal sender drives the retry/backoff loop
//! around the actual network call.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use envx::prelude::{Client, Options};
//! use serde::Deserialize;
//!
//! #[derive(Debug, Deserialize)]
//! struct Profile {
//!     id: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::new(
//!         Options::default()
//!             .base_uri("https://api.example.com")
//!             .timeout(Duration::from_secs(3))
//!             .retries(2),
//!     )?;
//!
//!     let response = client.get("/v1/profile", None).await?;
//!     let envelope = response.must_parse_body::<Profile>()?;
//!     println!("profile id={}", envelope.data.id);
//!     Ok(())
//! }
//! ```
//!
//! # Recommended Defaults
//!
//! - Keep the default [`RetryOnStatus`] policy for envelope-speaking
//!   backends: it retries only completed round trips that came back
//!   408 or 500, never connection-level failures.
//! - Set a per-request timeout on every client; the attempt future is
//!   cancelled when it fires, nothing keeps running in the background.

mod backoff;
mod client;
mod config;
mod error;
mod options;
mod request;
mod response;
mod retry;
mod util;
mod wrapper;

pub use crate::backoff::{BackoffPolicy, ExponentialBackoff};
pub use crate::client::Client;
pub use crate::config::{ConfigSource, ServiceConfig};
pub use crate::error::{ClientError, ErrorCode, TransportErrorKind};
pub use crate::options::{FieldValue, Options, Query};
pub use crate::request::PreparedRequest;
pub use crate::response::{Envelope, Response, SUCCESS_CODE};
pub use crate::retry::{RetryDecision, RetryOnStatus, RetryPolicy};
pub use crate::wrapper::{Sender, Wrapper};

/// Crate-wide result alias.
pub type EnvxResult<T> = std::result::Result<T, ClientError>;

pub mod prelude {
    pub use crate::backoff::{BackoffPolicy, ExponentialBackoff};
    pub use crate::client::Client;
    pub use crate::config::{ConfigSource, ServiceConfig};
    pub use crate::error::{ClientError, ErrorCode, TransportErrorKind};
    pub use crate::options::{FieldValue, Options, Query};
    pub use crate::response::{Envelope, Response};
    pub use crate::retry::{RetryDecision, RetryOnStatus, RetryPolicy};
    pub use crate::wrapper::{Sender, Wrapper};
    pub use crate::EnvxResult;
}
