//! Outermost guard that turns escaping failures on API paths into JSON.
//!
//! [`ApiErrorLayer`] wraps the whole service stack. When a request under the
//! configured prefix panics (while the inner service is called or while its
//! future is polled) or the inner service returns `Err`, the client receives
//! a 500 with `{"error": ..., "trace": ...}` and the failure is logged. For
//! any other path the panic is resumed and the error returned unchanged, so
//! the server's default error handling applies.
//!
//! Panic traces are captured at the panic site by a process-wide panic hook
//! (installed once, chained to the previous hook) and handed over through a
//! thread-local slot; the panicking poll and the `catch_unwind` around it run
//! on the same thread.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::{Arc, Once};
use std::task::{Context, Poll};

use axum::http::Request;
use axum::response::{IntoResponse, Response};
use pin_project_lite::pin_project;
use tower::{Layer, Service};

use crate::api_error::ApiError;
use crate::metrics::record_api_exception;
use crate::middleware::{extract_or_generate_request_id, RequestId};

thread_local! {
    static LAST_PANIC_TRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

static PANIC_HOOK: Once = Once::new();

/// Install the trace-capturing panic hook. Idempotent.
pub fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let location = info
                .location()
                .map(|l| l.to_string())
                .unwrap_or_else(|| "<unknown>".to_string());
            let trace = format!("panicked at {}\n{}", location, Backtrace::force_capture());
            LAST_PANIC_TRACE.with(|slot| *slot.borrow_mut() = Some(trace));
            previous(info);
        }));
    });
}

fn take_panic_trace() -> Option<String> {
    LAST_PANIC_TRACE.with(|slot| slot.borrow_mut().take())
}

/// Best-effort message from a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// `source()` chain of an error, one cause per line.
fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut trace = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        trace.push_str("\n  caused by: ");
        trace.push_str(&cause.to_string());
        source = cause.source();
    }
    trace
}

/// Build and log the JSON response for a caught failure.
fn exception_response(
    kind: &'static str,
    message: String,
    trace: String,
    request_id: &RequestId,
) -> Response {
    tracing::error!(
        request_id = %request_id,
        kind,
        error = %message,
        trace = %trace,
        "API exception"
    );
    record_api_exception(kind);
    ApiError::internal_error(message)
        .with_trace(trace)
        .into_response()
}

fn panic_response(payload: &(dyn Any + Send), request_id: &RequestId) -> Response {
    let message = panic_message(payload);
    let trace = take_panic_trace().unwrap_or_else(|| format!("panicked: {}", message));
    exception_response("panic", message, trace, request_id)
}

/// Tower layer converting escaping failures under `prefix` into JSON 500s.
#[derive(Debug, Clone)]
pub struct ApiErrorLayer {
    prefix: Arc<str>,
}

impl ApiErrorLayer {
    pub fn new(prefix: impl Into<String>) -> Self {
        install_panic_hook();
        Self {
            prefix: Arc::from(prefix.into()),
        }
    }
}

impl<S> Layer<S> for ApiErrorLayer {
    type Service = ApiErrorService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ApiErrorService {
            inner,
            prefix: self.prefix.clone(),
        }
    }
}

/// Service produced by [`ApiErrorLayer`].
#[derive(Debug, Clone)]
pub struct ApiErrorService<S> {
    inner: S,
    prefix: Arc<str>,
}

impl<S, ReqBody> Service<Request<ReqBody>> for ApiErrorService<S>
where
    S: Service<Request<ReqBody>, Response = Response>,
    S::Error: std::error::Error + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = ApiErrorFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let is_api = req.uri().path().starts_with(&*self.prefix);
        let request_id = extract_or_generate_request_id(req.headers());

        let inner = &mut self.inner;
        match panic::catch_unwind(AssertUnwindSafe(move || inner.call(req))) {
            Ok(future) => ApiErrorFuture::Running {
                future,
                is_api,
                request_id,
            },
            Err(payload) if is_api => ApiErrorFuture::Caught {
                response: Some(panic_response(payload.as_ref(), &request_id)),
            },
            Err(payload) => panic::resume_unwind(payload),
        }
    }
}

pin_project! {
    /// Response future of [`ApiErrorService`].
    #[project = ApiErrorFutureProj]
    pub enum ApiErrorFuture<F> {
        Running {
            #[pin]
            future: F,
            is_api: bool,
            request_id: RequestId,
        },
        Caught {
            response: Option<Response>,
        },
    }
}

impl<F, E> Future for ApiErrorFuture<F>
where
    F: Future<Output = Result<Response, E>>,
    E: std::error::Error + 'static,
{
    type Output = Result<Response, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.project() {
            ApiErrorFutureProj::Caught { response } => Poll::Ready(Ok(response
                .take()
                .expect("ApiErrorFuture polled after completion"))),
            ApiErrorFutureProj::Running {
                future,
                is_api,
                request_id,
            } => match panic::catch_unwind(AssertUnwindSafe(|| future.poll(cx))) {
                Ok(Poll::Pending) => Poll::Pending,
                Ok(Poll::Ready(Ok(response))) => Poll::Ready(Ok(response)),
                Ok(Poll::Ready(Err(error))) if *is_api => {
                    let trace = error_chain(&error);
                    Poll::Ready(Ok(exception_response(
                        "error",
                        error.to_string(),
                        trace,
                        request_id,
                    )))
                }
                Ok(Poll::Ready(Err(error))) => Poll::Ready(Err(error)),
                Err(payload) if *is_api => {
                    Poll::Ready(Ok(panic_response(payload.as_ref(), request_id)))
                }
                Err(payload) => panic::resume_unwind(payload),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;
    use std::convert::Infallible;
    use std::fmt::Display;
    use tower::ServiceExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn request(path: &str) -> Request<Body> {
        Request::builder().uri(path).body(Body::empty()).unwrap()
    }

    #[derive(Debug)]
    struct Outer(std::io::Error);

    impl Display for Outer {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "storage failed")
        }
    }

    impl std::error::Error for Outer {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            Some(&self.0)
        }
    }

    #[tokio::test]
    async fn passes_success_through() {
        let service = ApiErrorLayer::new("/api/").layer(tower::service_fn(|_req: Request<Body>| async {
            Ok::<_, Infallible>((StatusCode::CREATED, "made").into_response())
        }));

        let response = service.oneshot(request("/api/thing")).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn panic_in_future_on_api_path_becomes_json() {
        let service = ApiErrorLayer::new("/api/").layer(tower::service_fn(|_req: Request<Body>| async {
            if true {
                panic!("database exploded");
            }
            Ok::<_, Infallible>(StatusCode::OK.into_response())
        }));

        let response = service.oneshot(request("/api/route/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(response).await;
        assert_eq!(json["error"], "database exploded");
        let trace = json["trace"].as_str().unwrap();
        assert!(trace.contains("error_wrapper.rs"), "trace: {trace}");
    }

    #[tokio::test]
    async fn panic_in_call_on_api_path_becomes_json() {
        #[derive(Clone)]
        struct PanicsOnCall;

        impl Service<Request<Body>> for PanicsOnCall {
            type Response = Response;
            type Error = Infallible;
            type Future = std::future::Ready<Result<Response, Infallible>>;

            fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Infallible>> {
                Poll::Ready(Ok(()))
            }

            fn call(&mut self, _req: Request<Body>) -> Self::Future {
                panic!("router misconfigured")
            }
        }

        let service = ApiErrorLayer::new("/api/").layer(PanicsOnCall);
        let response = service.oneshot(request("/api/profile/")).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["error"], "router misconfigured");
        assert!(!json["trace"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn panic_on_other_path_propagates() {
        let service = ApiErrorLayer::new("/api/").layer(tower::service_fn(|_req: Request<Body>| async {
            if true {
                panic!("page exploded");
            }
            Ok::<_, Infallible>(StatusCode::OK.into_response())
        }));

        let handle = tokio::spawn(service.oneshot(request("/about")));
        let err = handle.await.unwrap_err();
        assert!(err.is_panic());
        let payload = err.into_panic();
        assert_eq!(panic_message(payload.as_ref()), "page exploded");
    }

    #[tokio::test]
    async fn inner_error_on_api_path_becomes_json_with_chain() {
        let service = ApiErrorLayer::new("/api/").layer(tower::service_fn(|_req: Request<Body>| async {
            Err::<Response, _>(Outer(std::io::Error::other("disk full")))
        }));

        let response = service.oneshot(request("/api/route/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(response).await;
        assert_eq!(json["error"], "storage failed");
        assert!(json["trace"].as_str().unwrap().contains("caused by: disk full"));
    }

    #[tokio::test]
    async fn inner_error_on_other_path_is_returned() {
        let service = ApiErrorLayer::new("/api/").layer(tower::service_fn(|_req: Request<Body>| async {
            Err::<Response, _>(Outer(std::io::Error::other("disk full")))
        }));

        let result = service.oneshot(request("/index.html")).await;
        assert!(result.is_err());
    }

    #[test]
    fn panic_message_handles_string_payloads() {
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}
