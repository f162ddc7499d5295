use std::sync::Arc;

use futures_core::future::BoxFuture;

use crate::request::PreparedRequest;
use crate::response::Response;
use crate::EnvxResult;

/// A request-sending function: the terminal sender, or a wrapped version
/// of it produced by a [`Wrapper`].
pub type Sender =
    Arc<dyn Fn(PreparedRequest) -> BoxFuture<'static, EnvxResult<Response>> + Send + Sync>;

/// A middleware transform: given the next sender in the chain, produce a
/// wrapped sender with before/after behavior.
///
/// The wrapped sender may mutate the outgoing [`PreparedRequest`] (headers
/// in particular) before handing it to `next`, and may inspect or replace
/// the response or error on the way out. A wrapper that never invokes
/// `next` short-circuits the pipeline: the network call is skipped
/// entirely.
///
/// ```
/// use std::sync::Arc;
/// use envx::{Sender, Options};
///
/// let options = Options::default().wrap(|next: Sender| -> Sender {
///     Arc::new(move |mut request| {
///         let next = next.clone();
///         Box::pin(async move {
///             request.set_header("x-trace-id", "abc123")?;
///             next(request).await
///         })
///     })
/// });
/// ```
pub trait Wrapper: Send + Sync {
    fn wrap(&self, next: Sender) -> Sender;
}

impl<F> Wrapper for F
where
    F: Fn(Sender) -> Sender + Send + Sync,
{
    fn wrap(&self, next: Sender) -> Sender {
        self(next)
    }
}

/// Folds the wrapper list from last to first around the terminal sender,
/// so the first-registered wrapper is outermost: it runs first on the way
/// in and last on the way out.
pub(crate) fn compose(wrappers: &[Arc<dyn Wrapper>], terminal: Sender) -> Sender {
    let mut root = terminal;
    for wrapper in wrappers.iter().rev() {
        root = wrapper.wrap(root);
    }
    root
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use http::{Method, StatusCode};

    use super::{compose, Sender, Wrapper};
    use crate::request::PreparedRequest;
    use crate::response::Response;

    fn recording_wrapper(log: Arc<Mutex<Vec<&'static str>>>, tag: &'static str) -> impl Wrapper {
        move |next: Sender| -> Sender {
            let log = Arc::clone(&log);
            Arc::new(move |request| {
                let log = Arc::clone(&log);
                let next = next.clone();
                Box::pin(async move {
                    log.lock().expect("lock order log").push(tag);
                    let result = next(request).await;
                    log.lock().expect("lock order log").push(tag);
                    result
                })
            })
        }
    }

    fn stub_terminal(log: Arc<Mutex<Vec<&'static str>>>) -> Sender {
        Arc::new(move |request| {
            let log = Arc::clone(&log);
            Box::pin(async move {
                log.lock().expect("lock order log").push("terminal");
                Ok(Response::stub(
                    StatusCode::OK,
                    request.method().clone(),
                    request.uri().to_string(),
                ))
            })
        })
    }

    fn prepared() -> PreparedRequest {
        PreparedRequest::stub(Method::GET, "http://api.example.com/v1/x")
    }

    #[tokio::test]
    async fn first_registered_wrapper_is_outermost() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let wrappers: Vec<Arc<dyn Wrapper>> = vec![
            Arc::new(recording_wrapper(Arc::clone(&log), "outer")),
            Arc::new(recording_wrapper(Arc::clone(&log), "inner")),
        ];

        let chain = compose(&wrappers, stub_terminal(Arc::clone(&log)));
        chain(prepared()).await.expect("chain should succeed");

        let order = log.lock().expect("lock order log").clone();
        assert_eq!(order, vec!["outer", "inner", "terminal", "inner", "outer"]);
    }

    #[tokio::test]
    async fn a_wrapper_that_skips_next_short_circuits_the_pipeline() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let short_circuit: Arc<dyn Wrapper> = Arc::new(|_next: Sender| -> Sender {
            Arc::new(|request: PreparedRequest| {
                Box::pin(async move {
                    Ok(Response::stub(
                        StatusCode::OK,
                        request.method().clone(),
                        request.uri().to_string(),
                    ))
                })
            })
        });

        let chain = compose(
            std::slice::from_ref(&short_circuit),
            stub_terminal(Arc::clone(&log)),
        );
        let response = chain(prepared()).await.expect("chain should succeed");

        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            log.lock().expect("lock order log").is_empty(),
            "terminal sender must not run"
        );
    }

    #[tokio::test]
    async fn wrappers_can_mutate_outgoing_headers() {
        let mutator: Arc<dyn Wrapper> = Arc::new(|next: Sender| -> Sender {
            Arc::new(move |mut request: PreparedRequest| {
                let next = next.clone();
                Box::pin(async move {
                    request.set_header("x-injected", "yes")?;
                    next(request).await
                })
            })
        });
        let seen = Arc::new(Mutex::new(None));
        let seen_clone = Arc::clone(&seen);
        let terminal: Sender = Arc::new(move |request: PreparedRequest| {
            let seen = Arc::clone(&seen_clone);
            Box::pin(async move {
                *seen.lock().expect("lock header slot") = request
                    .headers()
                    .get("x-injected")
                    .and_then(|value| value.to_str().ok())
                    .map(ToOwned::to_owned);
                Ok(Response::stub(
                    StatusCode::OK,
                    request.method().clone(),
                    request.uri().to_string(),
                ))
            })
        });

        let chain = compose(std::slice::from_ref(&mutator), terminal);
        chain(prepared()).await.expect("chain should succeed");

        assert_eq!(
            seen.lock().expect("lock header slot").as_deref(),
            Some("yes")
        );
    }
}
