//! The listener abstraction and its TCP implementation.
//!
//! A [`Listener`] hands out one [`RequestContext`] per accepted connection. [`HttpListener`]
//! accepts TCP connections (optionally wrapped in TLS), reads each connection's request on its
//! own task and queues complete requests for [`Listener::accept`], so a slow client never holds
//! up the others.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use http::StatusCode;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::select;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::connection::HttpConnection;
use crate::protocol::{ListenError, ParseError, RequestContext};
use crate::tls::TlsConfig;

/// Default time a client gets to send its complete request.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// A source of accepted, fully read requests.
#[async_trait]
pub trait Listener: Send {
    /// Starts listening. Starting a started listener is a no-op.
    async fn start(&mut self) -> Result<(), ListenError>;

    /// Waits for the next request.
    ///
    /// Returns [`ListenError::Closed`] when the listener is not started or has been stopped.
    async fn accept(&mut self) -> Result<RequestContext, ListenError>;

    /// Stops listening. Stopping a stopped listener is a no-op.
    async fn stop(&mut self);

    /// The address actually bound, while started.
    fn local_addr(&self) -> Option<SocketAddr>;
}

#[derive(Debug, Clone)]
pub struct ListenerConfig {
    address: SocketAddr,
    tls: Option<TlsConfig>,
    read_timeout: Duration,
}

impl ListenerConfig {
    pub fn plain(address: SocketAddr) -> Self {
        Self { address, tls: None, read_timeout: DEFAULT_READ_TIMEOUT }
    }

    pub fn secure(address: SocketAddr, tls: TlsConfig) -> Self {
        Self { address, tls: Some(tls), read_timeout: DEFAULT_READ_TIMEOUT }
    }

    pub fn read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    pub fn is_secure(&self) -> bool {
        self.tls.is_some()
    }
}

/// A [`Listener`] over a tokio `TcpListener`.
#[derive(Debug)]
pub struct HttpListener {
    config: ListenerConfig,
    running: Option<Running>,
}

#[derive(Debug)]
struct Running {
    local_addr: SocketAddr,
    receiver: mpsc::UnboundedReceiver<RequestContext>,
    token: CancellationToken,
    acceptor: JoinHandle<()>,
}

impl HttpListener {
    pub fn new(config: ListenerConfig) -> Self {
        Self { config, running: None }
    }

    pub fn config(&self) -> &ListenerConfig {
        &self.config
    }
}

#[async_trait]
impl Listener for HttpListener {
    async fn start(&mut self) -> Result<(), ListenError> {
        if self.running.is_some() {
            return Ok(());
        }

        let tcp_listener = TcpListener::bind(self.config.address).await?;
        let local_addr = tcp_listener.local_addr()?;
        info!(%local_addr, secure = self.config.is_secure(), "start listening");

        let (sender, receiver) = mpsc::unbounded_channel();
        let token = CancellationToken::new();
        let acceptor = tokio::spawn(accept_connections(
            tcp_listener,
            self.config.tls.as_ref().map(TlsConfig::acceptor),
            self.config.read_timeout,
            sender,
            token.clone(),
        ));

        self.running = Some(Running { local_addr, receiver, token, acceptor });
        Ok(())
    }

    async fn accept(&mut self) -> Result<RequestContext, ListenError> {
        let running = self.running.as_mut().ok_or(ListenError::Closed)?;
        running.receiver.recv().await.ok_or(ListenError::Closed)
    }

    async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        let Running { local_addr, mut receiver, token, acceptor } = running;
        token.cancel();
        if let Err(e) = acceptor.await {
            warn!(cause = %e, "acceptor task finished abnormally");
        }

        // requests read but never accepted still get an answer
        receiver.close();
        while let Ok(ctx) = receiver.try_recv() {
            reject(ctx).await;
        }
        info!(%local_addr, "stop listening");
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|running| running.local_addr)
    }
}

async fn accept_connections(
    tcp_listener: TcpListener,
    tls_acceptor: Option<TlsAcceptor>,
    read_timeout: Duration,
    sender: mpsc::UnboundedSender<RequestContext>,
    token: CancellationToken,
) {
    loop {
        let (tcp_stream, remote_addr) = select! {
            biased;
            () = token.cancelled() => break,
            accepted = tcp_listener.accept() => match accepted {
                Ok(stream_and_addr) => stream_and_addr,
                Err(e) => {
                    warn!(cause = %e, "failed to accept");
                    continue;
                }
            },
        };

        let sender = sender.clone();
        let tls_acceptor = tls_acceptor.clone();
        tokio::spawn(async move {
            let result = match tls_acceptor {
                Some(tls_acceptor) => read_secure(tls_acceptor, tcp_stream, read_timeout).await,
                None => read_request(tcp_stream, read_timeout).await,
            };

            match result {
                Ok(ctx) => forward(&sender, ctx).await,
                Err(ParseError::ConnectionClosed) => debug!(%remote_addr, "connection closed without request"),
                Err(e) => warn!(%remote_addr, cause = %e, "failed to read request"),
            }
        });
    }
}

async fn read_secure(
    tls_acceptor: TlsAcceptor,
    tcp_stream: TcpStream,
    read_timeout: Duration,
) -> Result<RequestContext, ParseError> {
    let tls_stream = tokio::time::timeout(read_timeout, tls_acceptor.accept(tcp_stream))
        .await
        .map_err(|_elapsed| ParseError::Timeout)??;
    read_request(tls_stream, read_timeout).await
}

async fn read_request<S>(stream: S, read_timeout: Duration) -> Result<RequestContext, ParseError>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    HttpConnection::new(stream).read_request(read_timeout).await
}

/// Queues a request for `accept`; once the listener is gone the client gets a 503 instead.
async fn forward(sender: &mpsc::UnboundedSender<RequestContext>, ctx: RequestContext) {
    if let Err(mpsc::error::SendError(ctx)) = sender.send(ctx) {
        reject(ctx).await;
    }
}

/// Answers `503 Service Unavailable` to a request the stopped listener won't hand out.
async fn reject(mut ctx: RequestContext) {
    debug!(path = ctx.raw_path(), "listener stopped, rejecting request");
    let response = ctx.response_mut();
    if let Err(e) = response.write_status(StatusCode::SERVICE_UNAVAILABLE) {
        warn!(cause = %e, "can't write rejection");
    }
    if let Err(e) = response.close().await {
        warn!(cause = %e, "can't send rejection");
    }
}
