//! Per-request dispatch: route lookup, authentication, handler invocation.
//!
//! Every request ends with exactly one response written to its sink and the sink closed,
//! whatever the outcome.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use bytes::Bytes;
use futures::FutureExt;
use http::{Response, StatusCode};
use nano_http::protocol::{RequestContext, ResponseSink};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::auth::AuthDefaults;
use crate::handler::RequestHandler;
use crate::responder;
use crate::router::{Route, RouteTable};

/// How a request was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A route handler answered.
    Handled,
    /// No route matched, the catch-all handler answered.
    CatchAll,
    /// No route matched and there is no catch-all: `404`.
    NotFound,
    /// The route's policy rejected the request: `401`.
    Unauthorized,
    /// The handler failed or panicked: `500`.
    HandlerFault,
    /// The server was stopping before the handler ran: `503`.
    Cancelled,
}

pub struct Dispatcher {
    table: Arc<RouteTable>,
    catch_all: Option<Arc<dyn RequestHandler>>,
    defaults: Arc<AuthDefaults>,
}

impl Dispatcher {
    pub fn new(table: Arc<RouteTable>, catch_all: Option<Arc<dyn RequestHandler>>, defaults: Arc<AuthDefaults>) -> Self {
        Self { table, catch_all, defaults }
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    pub async fn dispatch(&self, mut ctx: RequestContext, token: &CancellationToken) -> DispatchOutcome {
        let (handler, outcome) = match self.table.find(ctx.method(), ctx.raw_path()) {
            Some(route) => {
                if !self.is_authorized(route, &ctx) {
                    debug!(method = %ctx.method(), path = ctx.raw_path(), "unauthorized");
                    let realm = route.authentication().filter(|policy| policy.challenges()).map(|_| realm(route));
                    send(ctx.response_mut(), responder::unauthorized(realm.as_deref())).await;
                    return DispatchOutcome::Unauthorized;
                }
                (route.handler(), DispatchOutcome::Handled)
            }
            None => match self.catch_all.as_deref() {
                Some(catch_all) => (catch_all, DispatchOutcome::CatchAll),
                None => {
                    debug!(method = %ctx.method(), path = ctx.raw_path(), "no route");
                    send(ctx.response_mut(), responder::status(StatusCode::NOT_FOUND)).await;
                    return DispatchOutcome::NotFound;
                }
            },
        };

        if token.is_cancelled() {
            debug!(method = %ctx.method(), path = ctx.raw_path(), "server stopping, request not handled");
            send(ctx.response_mut(), responder::status(StatusCode::SERVICE_UNAVAILABLE)).await;
            return DispatchOutcome::Cancelled;
        }

        let (request, mut sink) = ctx.into_parts();
        let method = request.method().clone();
        let uri = request.uri().clone();

        let invocation = async move { handler.invoke(request).await };
        let (response, outcome) = match AssertUnwindSafe(invocation).catch_unwind().await {
            Ok(Ok(response)) => (response, outcome),
            Ok(Err(e)) => {
                error!(%method, %uri, cause = %e, "handler failed");
                (responder::status(StatusCode::INTERNAL_SERVER_ERROR), DispatchOutcome::HandlerFault)
            }
            Err(panic) => {
                error!(%method, %uri, cause = panic_message(panic.as_ref()), "handler panicked");
                (responder::status(StatusCode::INTERNAL_SERVER_ERROR), DispatchOutcome::HandlerFault)
            }
        };

        debug!(%method, %uri, status = %response.status(), ?outcome, "dispatched");
        send(&mut sink, response).await;
        outcome
    }

    fn is_authorized(&self, route: &Route, ctx: &RequestContext) -> bool {
        route.authentication().is_none_or(|policy| policy.is_authorized(ctx, &self.defaults))
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("routes", &self.table.len())
            .field("catch_all", &self.catch_all.is_some())
            .finish_non_exhaustive()
    }
}

fn realm(route: &Route) -> String {
    format!("Access to {}", route.pattern())
}

async fn send(sink: &mut ResponseSink, response: Response<Bytes>) {
    if let Err(e) = sink.write(response) {
        warn!(cause = %e, "response already written");
    }
    if let Err(e) = sink.close().await {
        error!(cause = %e, "failed to send response");
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&'static str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
