//! # Transport Layer
//!
//! Provides the `tcp://` and `inproc://` endpoints the rest of the crate runs on.
//! A [`Connection`] is a duplex channel over which whole messages ("frames") are
//! exchanged; a [`Listener`] accepts incoming connections. Both transports share
//! the same interface so [`crate::server::Server`] and [`crate::loadbalancer::LoadBalancer`]
//! don't need to know which one they're using.

mod inproc;
mod tcp;

use crate::error::TransportError;

/// Maximum frame size accepted by either transport. Mirrors the teacher crate's
/// Unix-domain-socket and TCP transports, which both reject messages over 16MB.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// A parsed transport address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// `tcp://host:port`
    Tcp(String),
    /// `inproc://name`
    Inproc(String),
}

impl Endpoint {
    /// Parse an address string with a scheme prefix.
    pub fn parse(addr: &str) -> Result<Self, TransportError> {
        if let Some(rest) = addr.strip_prefix("tcp://") {
            if rest.is_empty() {
                return Err(TransportError::InvalidAddress(addr.to_string()));
            }
            Ok(Endpoint::Tcp(rest.to_string()))
        } else if let Some(rest) = addr.strip_prefix("inproc://") {
            if rest.is_empty() {
                return Err(TransportError::InvalidAddress(addr.to_string()));
            }
            Ok(Endpoint::Inproc(rest.to_string()))
        } else {
            Err(TransportError::InvalidAddress(addr.to_string()))
        }
    }
}

/// A duplex connection over which whole frames are exchanged.
pub enum Connection {
    Tcp(tcp::TcpConnection),
    Inproc(inproc::InprocConnection),
}

impl Connection {
    /// Send one whole frame. For `tcp://`, length-prefixes the payload on the
    /// wire; for `inproc://`, the underlying channel already preserves message
    /// boundaries so the bytes are forwarded as-is.
    pub async fn send_frame(&mut self, bytes: Vec<u8>) -> Result<(), TransportError> {
        if bytes.len() > MAX_FRAME_SIZE {
            return Err(TransportError::FrameTooLarge(bytes.len()));
        }
        match self {
            Connection::Tcp(c) => c.send_frame(bytes).await,
            Connection::Inproc(c) => c.send_frame(bytes).await,
        }
    }

    /// Receive one whole frame, or `Err(TransportError::Closed)` if the peer
    /// disconnected / the `inproc` endpoint was torn down.
    pub async fn recv_frame(&mut self) -> Result<Vec<u8>, TransportError> {
        match self {
            Connection::Tcp(c) => c.recv_frame().await,
            Connection::Inproc(c) => c.recv_frame().await,
        }
    }
}

/// Accepts incoming connections on a bound endpoint.
pub enum Listener {
    Tcp(tcp::TcpListenerHandle),
    Inproc(inproc::InprocListener),
}

impl Listener {
    pub async fn accept(&mut self) -> Result<Connection, TransportError> {
        match self {
            Listener::Tcp(l) => Ok(Connection::Tcp(l.accept().await?)),
            Listener::Inproc(l) => Ok(Connection::Inproc(l.accept().await?)),
        }
    }

    /// The concrete address this listener ended up bound to (useful for `tcp://`
    /// endpoints bound to port 0).
    pub fn local_addr(&self) -> String {
        match self {
            Listener::Tcp(l) => format!("tcp://{}", l.local_addr()),
            Listener::Inproc(l) => format!("inproc://{}", l.name()),
        }
    }
}

/// Bind `addr`, returning a [`Listener`] ready to [`Listener::accept`] connections.
pub async fn bind(addr: &str) -> Result<Listener, TransportError> {
    match Endpoint::parse(addr)? {
        Endpoint::Tcp(host_port) => Ok(Listener::Tcp(tcp::TcpListenerHandle::bind(&host_port).await?)),
        Endpoint::Inproc(name) => Ok(Listener::Inproc(inproc::InprocListener::bind(&name)?)),
    }
}

/// Connect to `addr`, returning a [`Connection`].
pub async fn connect(addr: &str) -> Result<Connection, TransportError> {
    match Endpoint::parse(addr)? {
        Endpoint::Tcp(host_port) => Ok(Connection::Tcp(tcp::TcpConnection::connect(&host_port).await?)),
        Endpoint::Inproc(name) => Ok(Connection::Inproc(inproc::InprocConnection::connect(&name).await?)),
    }
}
