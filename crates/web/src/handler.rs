//! Request handlers.
//!
//! A handler receives the request and returns the response; it never closes the connection,
//! the dispatcher writes the returned response and closes the sink exactly once.

use std::error::Error;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};

use crate::responder::Responder;

pub type HandlerError = Box<dyn Error + Send + Sync>;

/// Something that answers a request.
///
/// Credentials presented with the request are available through
/// `request.extensions().get::<Credentials>()`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn invoke(&self, req: Request<Bytes>) -> Result<Response<Bytes>, HandlerError>;
}

#[async_trait]
impl<H: RequestHandler + ?Sized> RequestHandler for Arc<H> {
    async fn invoke(&self, req: Request<Bytes>) -> Result<Response<Bytes>, HandlerError> {
        self.as_ref().invoke(req).await
    }
}

/// A [`RequestHandler`] made from an async function.
pub struct FnHandler<F> {
    f: F,
}

/// Wraps an async function returning any [`Responder`] into a [`RequestHandler`].
///
/// ```
/// use bytes::Bytes;
/// use http::Request;
/// use nano_web::handler_fn;
///
/// async fn status(_req: Request<Bytes>) -> &'static str {
///     "ok"
/// }
///
/// let handler = handler_fn(status);
/// ```
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Request<Bytes>) -> Fut,
    Fut: Future,
    Fut::Output: Responder,
{
    FnHandler { f }
}

#[async_trait]
impl<F, Fut> RequestHandler for FnHandler<F>
where
    F: Fn(Request<Bytes>) -> Fut + Send + Sync,
    Fut: Future + Send,
    Fut::Output: Responder,
{
    async fn invoke(&self, req: Request<Bytes>) -> Result<Response<Bytes>, HandlerError> {
        let responder = (self.f)(req).await;
        Ok(responder.into_response())
    }
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").field("f", &std::any::type_name::<F>()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    fn assert_is_handler<T: RequestHandler>(_handler: &T) {
        // no op
    }

    #[test]
    fn async_fn_is_handler() {
        async fn get(_req: Request<Bytes>) -> String {
            "hello".to_string()
        }

        let handler = handler_fn(get);
        assert_is_handler(&handler);
        assert_is_handler(&Arc::new(handler));
    }

    #[tokio::test]
    async fn invoke_fn_handler() {
        let handler = handler_fn(|req: Request<Bytes>| async move { (StatusCode::ACCEPTED, req.uri().path().to_string()) });

        let response = handler.invoke(Request::builder().uri("/led/on").body(Bytes::new()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(response.body(), &Bytes::from_static(b"/led/on"));
    }

    #[tokio::test]
    async fn shared_handler_through_arc() {
        let handler: Arc<dyn RequestHandler> = Arc::new(handler_fn(|_req| async { StatusCode::NO_CONTENT }));

        let response = handler.invoke(Request::new(Bytes::new())).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }
}
