//! Accept loop for both listener modes.
//!
//! Connections are driven by hyper's HTTP/1.1 connection builder directly, so
//! neither mode ever speaks HTTP/2. Every socket is wrapped in a
//! [`TimeoutStream`] so a read or write that stalls past the deadline closes
//! the connection; hyper's header-read timer bounds the request head and
//! keep-alive idle time, and the router's timeout layer bounds the handler.

use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use hyper::server::conn::http1;
use hyper_util::rt::{TokioIo, TokioTimer};
use hyper_util::service::TowerToHyperService;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio_io_timeout::TimeoutStream;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, info, warn};

use super::mode::{ServerMode, CONNECTION_TIMEOUT, TLS_PORT};
use super::tls;

/// Bind the listener chosen by `mode` and serve `router` until a fatal
/// listener error.
///
/// Plaintext binds `ip:port`; TLS binds `ip:443` with the certificate pair
/// from `data_dir`.
///
/// # Errors
///
/// Returns an error if the certificate material cannot be loaded or the
/// socket cannot be bound.
pub async fn run(
    mode: ServerMode,
    ip: IpAddr,
    port: u16,
    data_dir: &Path,
    router: Router,
) -> Result<()> {
    match mode {
        ServerMode::Plaintext => {
            let addr = SocketAddr::new(ip, port);
            let listener = TcpListener::bind(addr)
                .await
                .with_context(|| format!("failed to bind {addr}"))?;
            info!(addr = %addr, "HTTP server listening");
            serve(listener, None, router).await
        }
        ServerMode::TlsHardened => {
            let config = tls::load_server_config(data_dir)?;
            let addr = SocketAddr::new(ip, TLS_PORT);
            let listener = TcpListener::bind(addr)
                .await
                .with_context(|| format!("failed to bind {addr}"))?;
            info!(addr = %addr, "HTTPS server listening");
            serve(listener, Some(TlsAcceptor::from(config)), router).await
        }
    }
}

/// Accept connections forever, spawning one task per connection.
///
/// Per-connection failures (handshake, timeouts, protocol errors) are logged
/// and affect only that connection.
pub async fn serve(
    listener: TcpListener,
    acceptor: Option<TlsAcceptor>,
    router: Router,
) -> Result<()> {
    accept_loop(listener, acceptor, router, CONNECTION_TIMEOUT).await
}

async fn accept_loop(
    listener: TcpListener,
    acceptor: Option<TlsAcceptor>,
    router: Router,
    timeout: Duration,
) -> Result<()> {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!(error = %e, "failed to accept connection");
                continue;
            }
        };

        let acceptor = acceptor.clone();
        let router = router.clone();
        tokio::spawn(async move {
            match acceptor {
                Some(acceptor) => {
                    if let Some(tls) = handshake(&acceptor, stream, peer, timeout).await {
                        serve_connection(tls, router, peer, timeout).await;
                    }
                }
                None => serve_connection(stream, router, peer, timeout).await,
            }
        });
    }
}

async fn handshake(
    acceptor: &TlsAcceptor,
    stream: TcpStream,
    peer: SocketAddr,
    timeout: Duration,
) -> Option<tokio_rustls::server::TlsStream<TcpStream>> {
    match tokio::time::timeout(timeout, acceptor.accept(stream)).await {
        Ok(Ok(tls)) => Some(tls),
        Ok(Err(e)) => {
            debug!(peer = %peer, error = %e, "TLS handshake failed");
            None
        }
        Err(_) => {
            debug!(peer = %peer, "TLS handshake timed out");
            None
        }
    }
}

async fn serve_connection<I>(io: I, router: Router, peer: SocketAddr, timeout: Duration)
where
    I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let mut io = TimeoutStream::new(io);
    io.set_read_timeout(Some(timeout));
    io.set_write_timeout(Some(timeout));

    let service = TowerToHyperService::new(router);
    let result = http1::Builder::new()
        .timer(TokioTimer::new())
        .header_read_timeout(timeout)
        .keep_alive(true)
        .serve_connection(TokioIo::new(Box::pin(io)), service)
        .await;
    if let Err(e) = result {
        debug!(peer = %peer, error = %e, "connection closed with error");
    }
}
