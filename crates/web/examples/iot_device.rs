//! A device exposing a status page, an LED behind basic auth and a sensor behind an API key.
//!
//! ```text
//! cargo run --example iot_device
//! curl -u admin:1234 -X POST 'http://127.0.0.1:8080/led?state=on'
//! curl -H 'ApiKey: device-key' http://127.0.0.1:8080/sensor
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use http::{Request, StatusCode};
use nano_http::protocol::Credentials;
use nano_web::router::{HandlerSource, RouteBuilder, get, post};
use nano_web::{Server, UrlParams, handler_fn};
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

struct Led {
    on: Arc<AtomicBool>,
}

impl HandlerSource for Led {
    fn authentication(&self) -> Option<&str> {
        Some("Basic")
    }

    fn routes(&self) -> Vec<RouteBuilder> {
        let read = Arc::clone(&self.on);
        let write = Arc::clone(&self.on);

        vec![
            get(
                "/led",
                handler_fn(move |_req| {
                    let on = read.load(Ordering::Relaxed);
                    async move { if on { "on" } else { "off" } }
                }),
            ),
            post(
                "/led",
                handler_fn(move |req: Request<Bytes>| {
                    let state = UrlParams::from_request(&req).get("state").map(str::to_string);
                    let on = Arc::clone(&write);
                    async move {
                        match state.as_deref() {
                            Some("on") => on.store(true, Ordering::Relaxed),
                            Some("off") => on.store(false, Ordering::Relaxed),
                            _ => return (StatusCode::BAD_REQUEST, "state must be 'on' or 'off'"),
                        }
                        (StatusCode::OK, "done")
                    }
                }),
            ),
        ]
    }
}

async fn sensor(_req: Request<Bytes>) -> &'static str {
    "21.5"
}

async fn not_found(req: Request<Bytes>) -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, format!("nothing at {}", req.uri().path()))
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::DEBUG).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let server = Server::builder()
        .port(8080)
        .default_credential(Credentials::new("admin", "1234"))
        .default_api_key("device-key")
        .route(get("/", handler_fn(|_req| async { "nano-web device" })))
        .route(get("/sensor", handler_fn(sensor)).authentication("ApiKey"))
        .source(Led { on: Arc::new(AtomicBool::new(false)) })
        .catch_all(handler_fn(not_found))
        .build();

    let mut server = match server {
        Ok(server) => server,
        Err(e) => {
            error!(cause = %e, "invalid configuration");
            return;
        }
    };

    if let Err(e) = server.start().await {
        error!(cause = %e, "failed to start");
        return;
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(cause = %e, "failed to wait for ctrl-c");
    }
    info!("shutting down");
    server.stop().await;
}
