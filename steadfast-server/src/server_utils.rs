use anyhow::{Context, Result};
use listenfd::ListenFd;
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{IpAddr, SocketAddr};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

const LISTEN_BACKLOG: i32 = 1024;

/// Listener for the API. A socket handed over by systemd (fd 3) wins over
/// binding `host:port`.
pub async fn create_listener(host: &str, port: u16) -> Result<TcpListener> {
    if let Some(inherited) = ListenFd::from_env().take_tcp_listener(0)? {
        info!(fd = 3, "Serving on inherited socket");
        inherited.set_nonblocking(true)?;
        return Ok(TcpListener::from_std(inherited)?);
    }

    let ip: IpAddr = host.parse().with_context(|| format!("invalid bind address '{}'", host))?;
    bind_reusable(SocketAddr::new(ip, port))
}

/// Bind with SO_REUSEPORT so a replacement process can take over the port
/// before this one exits.
fn bind_reusable(addr: SocketAddr) -> Result<TcpListener> {
    let domain = match addr {
        SocketAddr::V4(_) => Domain::IPV4,
        SocketAddr::V6(_) => Domain::IPV6,
    };
    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into()).with_context(|| format!("failed to bind {}", addr))?;
    socket.listen(LISTEN_BACKLOG)?;

    info!(%addr, backlog = LISTEN_BACKLOG, "Bound API socket");
    Ok(TcpListener::from_std(socket.into())?)
}

/// Resolves on Ctrl+C or SIGTERM. A handler that cannot be installed is
/// logged and never fires.
pub async fn shutdown_signal() {
    let interrupt = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            },
            Err(err) => {
                warn!(error = %err, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let signal_name = tokio::select! {
        () = interrupt => "SIGINT",
        () = terminate => "SIGTERM",
    };
    info!(signal = signal_name, "🛑 Shutting down, draining in-flight requests");
}
