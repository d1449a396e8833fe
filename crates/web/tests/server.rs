use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use bytes::Bytes;
use http::{Request, StatusCode};
use nano_http::protocol::Credentials;
use nano_web::router::{HandlerSource, RouteBuilder, get, post, route};
use nano_web::{Server, ServerStatus, UrlParams, handler_fn};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

struct Led;

impl HandlerSource for Led {
    fn authentication(&self) -> Option<&str> {
        Some("Basic")
    }

    fn routes(&self) -> Vec<RouteBuilder> {
        let set_level = post(
            "/led",
            handler_fn(|req: Request<Bytes>| async move {
                match UrlParams::from_request(&req).get("level") {
                    Some(level) => (StatusCode::OK, format!("level {level}")),
                    None => (StatusCode::BAD_REQUEST, "missing level".to_string()),
                }
            }),
        );
        vec![set_level.clone(), set_level.with_pattern("/light")]
    }
}

async fn broken_sensor(_req: Request<Bytes>) -> &'static str {
    panic!("sensor failure")
}

fn device() -> Server {
    Server::builder()
        .bind_address(IpAddr::V4(Ipv4Addr::LOCALHOST))
        .port(0)
        .read_timeout(Duration::from_secs(5))
        .default_credential(Credentials::new("admin", "1234"))
        .route(get("/status", handler_fn(|_req| async { "ok" })))
        .route(route("/panic", handler_fn(broken_sensor)))
        .route(get("/key", handler_fn(|_req| async { "key ok" })).authentication("ApiKey:k1"))
        .source(Led)
        .build()
        .unwrap()
}

async fn call(addr: SocketAddr, request: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut raw = String::new();
    stream.read_to_string(&mut raw).await.unwrap();
    raw
}

#[tokio::test]
async fn serve_routes_over_tcp() {
    let mut server = device();
    server.start().await.unwrap();
    let addr = server.local_addr().unwrap();

    let raw = call(addr, "GET /STATUS HTTP/1.1\r\nHost: device\r\n\r\n").await;
    assert!(raw.starts_with("HTTP/1.1 200 OK\r\n"), "{raw}");
    assert!(raw.ends_with("ok"), "{raw}");

    let raw = call(addr, "GET /nothing HTTP/1.1\r\n\r\n").await;
    assert!(raw.starts_with("HTTP/1.1 404 Not Found\r\n"), "{raw}");
    assert!(raw.contains("content-length: 0\r\n"), "{raw}");

    let raw = call(addr, "GET /status/extra HTTP/1.1\r\n\r\n").await;
    assert!(raw.starts_with("HTTP/1.1 404 Not Found\r\n"), "{raw}");

    server.stop().await;
    assert_eq!(server.status(), ServerStatus::Stopped);
}

#[tokio::test]
async fn basic_authentication_from_source() {
    let mut server = device();
    server.start().await.unwrap();
    let addr = server.local_addr().unwrap();

    // admin:1234
    let raw = call(addr, "POST /led?level=7 HTTP/1.1\r\nAuthorization: Basic YWRtaW46MTIzNA==\r\n\r\n").await;
    assert!(raw.ends_with("level 7"), "{raw}");

    let raw = call(addr, "POST /light?level=2 HTTP/1.1\r\nAuthorization: Basic YWRtaW46MTIzNA==\r\n\r\n").await;
    assert!(raw.ends_with("level 2"), "{raw}");

    // admin:4321
    let raw = call(addr, "POST /led?level=7 HTTP/1.1\r\nAuthorization: Basic YWRtaW46NDMyMQ==\r\n\r\n").await;
    assert!(raw.starts_with("HTTP/1.1 401 Unauthorized\r\n"), "{raw}");
    assert!(raw.contains("www-authenticate: Basic realm=\"Access to /led\"\r\n"), "{raw}");

    let raw = call(addr, "POST /led?level=7 HTTP/1.1\r\n\r\n").await;
    assert!(raw.starts_with("HTTP/1.1 401 Unauthorized\r\n"), "{raw}");

    server.set_default_credential(Some(Credentials::new("admin", "4321")));
    let raw = call(addr, "POST /led?level=1 HTTP/1.1\r\nAuthorization: Basic YWRtaW46NDMyMQ==\r\n\r\n").await;
    assert!(raw.ends_with("level 1"), "{raw}");

    server.stop().await;
}

#[tokio::test]
async fn api_key_authentication() {
    let mut server = device();
    server.start().await.unwrap();
    let addr = server.local_addr().unwrap();

    let raw = call(addr, "GET /key HTTP/1.1\r\nApiKey: k1\r\n\r\n").await;
    assert!(raw.ends_with("key ok"), "{raw}");

    let raw = call(addr, "GET /key HTTP/1.1\r\nApiKey: k2\r\n\r\n").await;
    assert!(raw.starts_with("HTTP/1.1 401 Unauthorized\r\n"), "{raw}");
    assert!(!raw.contains("www-authenticate"), "{raw}");

    server.stop().await;
}

#[tokio::test]
async fn panic_is_isolated() {
    let mut server = device();
    server.start().await.unwrap();
    let addr = server.local_addr().unwrap();

    let raw = call(addr, "GET /panic HTTP/1.1\r\n\r\n").await;
    assert!(raw.starts_with("HTTP/1.1 500 Internal Server Error\r\n"), "{raw}");

    let raw = call(addr, "GET /status HTTP/1.1\r\n\r\n").await;
    assert!(raw.starts_with("HTTP/1.1 200 OK\r\n"), "{raw}");

    server.stop().await;
}

#[tokio::test]
async fn malformed_request_is_bad_request() {
    let mut server = device();
    server.start().await.unwrap();
    let addr = server.local_addr().unwrap();

    let raw = call(addr, "POST /led HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n").await;
    assert!(raw.starts_with("HTTP/1.1 400 Bad Request\r\n"), "{raw}");

    server.stop().await;
}

#[tokio::test]
async fn stop_then_start_serves_again() {
    let mut server = device();
    server.start().await.unwrap();
    server.stop().await;
    assert!(server.local_addr().is_none());

    server.start().await.unwrap();
    let addr = server.local_addr().unwrap();
    let raw = call(addr, "GET /status HTTP/1.1\r\n\r\n").await;
    assert!(raw.ends_with("ok"), "{raw}");

    server.stop().await;
}
