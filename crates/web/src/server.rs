//! The server: accept loop, task per request, cooperative stop.
//!
//! ```no_run
//! use nano_web::router::get;
//! use nano_web::{handler_fn, Server};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = Server::builder()
//!     .port(8080)
//!     .route(get("/led", handler_fn(|_req| async { "on" })).authentication("Basic:admin 1234"))
//!     .build()?;
//!
//! server.start().await?;
//! tokio::signal::ctrl_c().await?;
//! server.stop().await;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use nano_http::listener::{DEFAULT_READ_TIMEOUT, HttpListener, Listener, ListenerConfig};
use nano_http::protocol::{Credentials, ListenError};
use nano_http::tls::TlsConfig;
use tokio::select;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::auth::AuthDefaults;
use crate::dispatcher::Dispatcher;
use crate::handler::RequestHandler;
use crate::router::{HandlerSource, RouteBuilder, RouteTableBuilder};
use crate::{ConfigurationError, RouteTable, ServerError};

/// How long [`Server::stop`] waits for the accept loop, then again for in-flight requests.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Protocol {
    #[default]
    Http,
    Https,
}

impl Protocol {
    pub fn default_port(self) -> u16 {
        match self {
            Protocol::Http => 80,
            Protocol::Https => 443,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerStatus {
    Stopped,
    Starting,
    Running,
    Stopping,
}

pub struct ServerBuilder {
    port: Option<u16>,
    bind_address: IpAddr,
    protocol: Protocol,
    tls: Option<TlsConfig>,
    read_timeout: Duration,
    default_credential: Option<Credentials>,
    default_api_key: Option<String>,
    catch_all: Option<Arc<dyn RequestHandler>>,
    shutdown_grace: Duration,
    routes: RouteTableBuilder,
}

impl ServerBuilder {
    fn new() -> Self {
        Self {
            port: None,
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            protocol: Protocol::Http,
            tls: None,
            read_timeout: DEFAULT_READ_TIMEOUT,
            default_credential: None,
            default_api_key: None,
            catch_all: None,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            routes: RouteTable::builder(),
        }
    }

    /// Defaults to 80, or 443 for [`Protocol::Https`]. Port 0 binds any free port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn bind_address(mut self, bind_address: IpAddr) -> Self {
        self.bind_address = bind_address;
        self
    }

    pub fn protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// Certificate and key for [`Protocol::Https`]; also switches the protocol to HTTPS.
    pub fn tls(mut self, tls: TlsConfig) -> Self {
        self.tls = Some(tls);
        self.protocol = Protocol::Https;
        self
    }

    pub fn read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    pub fn default_credential(mut self, credential: Credentials) -> Self {
        self.default_credential = Some(credential);
        self
    }

    pub fn default_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.default_api_key = Some(api_key.into());
        self
    }

    /// Answers requests no route matches, instead of `404`.
    pub fn catch_all(mut self, handler: impl RequestHandler + 'static) -> Self {
        self.catch_all = Some(Arc::new(handler));
        self
    }

    pub fn shutdown_grace(mut self, shutdown_grace: Duration) -> Self {
        self.shutdown_grace = shutdown_grace;
        self
    }

    pub fn route(mut self, route: RouteBuilder) -> Self {
        self.routes = self.routes.route(route);
        self
    }

    pub fn source(mut self, source: impl HandlerSource) -> Self {
        self.routes = self.routes.source(source);
        self
    }

    /// Replaces every route registered so far.
    pub fn routes(mut self, routes: RouteTableBuilder) -> Self {
        self.routes = routes;
        self
    }

    fn address(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port.unwrap_or_else(|| self.protocol.default_port()))
    }

    /// Builds a server listening over TCP, with TLS for [`Protocol::Https`].
    pub fn build(self) -> Result<Server, ConfigurationError> {
        let config = match (self.protocol, &self.tls) {
            (Protocol::Http, _) => ListenerConfig::plain(self.address()),
            (Protocol::Https, Some(tls)) => ListenerConfig::secure(self.address(), tls.clone()),
            (Protocol::Https, None) => return Err(ConfigurationError::MissingCertificate),
        };

        let listener = HttpListener::new(config.read_timeout(self.read_timeout));
        self.build_with_listener(listener)
    }

    /// Builds a server accepting requests from `listener`; address, protocol and TLS settings
    /// are left to the listener.
    pub fn build_with_listener(self, listener: impl Listener + 'static) -> Result<Server, ConfigurationError> {
        let table = Arc::new(self.routes.build()?);
        let defaults = Arc::new(AuthDefaults::new(self.default_credential, self.default_api_key));
        let dispatcher = Dispatcher::new(table, self.catch_all, Arc::clone(&defaults));
        let (status, _) = watch::channel(ServerStatus::Stopped);

        Ok(Server {
            dispatcher: Arc::new(dispatcher),
            defaults,
            listener: Arc::new(Mutex::new(Box::new(listener))),
            shutdown_grace: self.shutdown_grace,
            status,
            local_addr: None,
            running: None,
        })
    }
}

impl fmt::Debug for ServerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerBuilder")
            .field("address", &self.address())
            .field("protocol", &self.protocol)
            .field("shutdown_grace", &self.shutdown_grace)
            .field("routes", &self.routes)
            .finish_non_exhaustive()
    }
}

type SharedListener = Arc<Mutex<Box<dyn Listener>>>;

pub struct Server {
    dispatcher: Arc<Dispatcher>,
    defaults: Arc<AuthDefaults>,
    listener: SharedListener,
    shutdown_grace: Duration,
    status: watch::Sender<ServerStatus>,
    local_addr: Option<SocketAddr>,
    running: Option<Running>,
}

struct Running {
    token: CancellationToken,
    tracker: TaskTracker,
    acceptor: JoinHandle<()>,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Starts the listener and the accept loop. Starting a running server is a no-op.
    ///
    /// When the listener fails to start the server stays stopped and may be started again.
    pub async fn start(&mut self) -> Result<(), ServerError> {
        if let Some(running) = &self.running {
            if !running.acceptor.is_finished() {
                return Ok(());
            }
            // the listener closed on its own, clean up before starting over
            self.stop().await;
        }

        self.status.send_replace(ServerStatus::Starting);
        let local_addr = {
            let mut listener = self.listener.lock().await;
            if let Err(e) = listener.start().await {
                error!(cause = %e, "failed to start listener");
                self.status.send_replace(ServerStatus::Stopped);
                return Err(e.into());
            }
            listener.local_addr()
        };

        let token = CancellationToken::new();
        let tracker = TaskTracker::new();
        self.status.send_replace(ServerStatus::Running);
        let acceptor = tokio::spawn(accept_requests(
            Arc::clone(&self.listener),
            Arc::clone(&self.dispatcher),
            token.clone(),
            tracker.clone(),
            self.status.clone(),
        ));

        self.local_addr = local_addr;
        self.running = Some(Running { token, tracker, acceptor });
        info!(local_addr = ?self.local_addr, routes = self.dispatcher.table().len(), "server started");
        Ok(())
    }

    /// Stops accepting and waits, up to the shutdown grace each, for the accept loop to exit
    /// and for in-flight requests to finish. Stopping a stopped server is a no-op.
    pub async fn stop(&mut self) {
        let Some(Running { token, tracker, mut acceptor }) = self.running.take() else {
            return;
        };

        self.status.send_replace(ServerStatus::Stopping);
        token.cancel();

        match tokio::time::timeout(self.shutdown_grace, &mut acceptor).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(cause = %e, "accept loop finished abnormally"),
            Err(_elapsed) => {
                warn!(grace = ?self.shutdown_grace, "accept loop did not stop in time, aborting");
                acceptor.abort();
                if let Err(e) = acceptor.await
                    && !e.is_cancelled()
                {
                    warn!(cause = %e, "accept loop finished abnormally");
                }
                self.listener.lock().await.stop().await;
            }
        }

        tracker.close();
        if tokio::time::timeout(self.shutdown_grace, tracker.wait()).await.is_err() {
            warn!(remaining = tracker.len(), "requests still in flight after shutdown grace");
        }

        self.local_addr = None;
        self.status.send_replace(ServerStatus::Stopped);
        info!("server stopped");
    }

    pub fn status(&self) -> ServerStatus {
        *self.status.borrow()
    }

    /// Receives every status change.
    pub fn subscribe(&self) -> watch::Receiver<ServerStatus> {
        self.status.subscribe()
    }

    /// The address the listener bound, while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn routes(&self) -> &RouteTable {
        self.dispatcher.table()
    }

    /// Replaces the credential `Basic` routes without their own credential check against.
    pub fn set_default_credential(&self, credential: Option<Credentials>) {
        self.defaults.set_credential(credential);
    }

    /// Replaces the key `ApiKey` routes without their own key check against.
    pub fn set_default_api_key(&self, api_key: Option<String>) {
        self.defaults.set_api_key(api_key);
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if let Some(running) = &self.running {
            running.token.cancel();
        }
    }
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("status", &self.status())
            .field("local_addr", &self.local_addr)
            .field("routes", &self.dispatcher.table().len())
            .finish_non_exhaustive()
    }
}

async fn accept_requests(
    listener: SharedListener,
    dispatcher: Arc<Dispatcher>,
    token: CancellationToken,
    tracker: TaskTracker,
    status: watch::Sender<ServerStatus>,
) {
    let mut listener = listener.lock().await;

    loop {
        let ctx = select! {
            biased;
            () = token.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(ctx) => ctx,
                Err(ListenError::Closed) => {
                    warn!("listener closed");
                    status.send_replace(ServerStatus::Stopped);
                    break;
                }
                Err(e) => {
                    warn!(cause = %e, "failed to accept");
                    continue;
                }
            },
        };

        debug!(method = %ctx.method(), path = ctx.raw_path(), "accepted request");
        let dispatcher = Arc::clone(&dispatcher);
        let token = token.child_token();
        tracker.spawn(async move {
            dispatcher.dispatch(ctx, &token).await;
        });
    }

    listener.stop().await;
}
