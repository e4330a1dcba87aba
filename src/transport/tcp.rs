//! `tcp://` transport: length-prefixed framing over `tokio::net::TcpStream`,
//! following the same 4-byte-little-endian-length-then-payload scheme the
//! teacher crate's TCP and Unix-domain-socket transports use.

use super::MAX_FRAME_SIZE;
use crate::error::TransportError;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::debug;

pub struct TcpListenerHandle {
    inner: TcpListener,
}

impl TcpListenerHandle {
    pub async fn bind(host_port: &str) -> Result<Self, TransportError> {
        let inner = TcpListener::bind(host_port).await?;
        debug!("tcp listener bound on {}", host_port);
        Ok(Self { inner })
    }

    pub async fn accept(&mut self) -> Result<TcpConnection, TransportError> {
        let (stream, peer) = self.inner.accept().await?;
        debug!("tcp accepted connection from {}", peer);
        Ok(TcpConnection { stream })
    }

    pub fn local_addr(&self) -> String {
        self.inner
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "<unknown>".to_string())
    }
}

pub struct TcpConnection {
    stream: TcpStream,
}

impl TcpConnection {
    pub async fn connect(host_port: &str) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(host_port).await?;
        stream.set_nodelay(true).ok();
        Ok(Self { stream })
    }

    pub async fn send_frame(&mut self, bytes: Vec<u8>) -> Result<(), TransportError> {
        let len = bytes.len() as u32;
        self.stream.write_all(&len.to_le_bytes()).await?;
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;
        Ok(())
    }

    pub async fn recv_frame(&mut self) -> Result<Vec<u8>, TransportError> {
        let mut len_bytes = [0u8; 4];
        match self.stream.read_exact(&mut len_bytes).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(TransportError::Closed)
            }
            Err(e) => return Err(TransportError::Io(e)),
        }
        let len = u32::from_le_bytes(len_bytes) as usize;
        if len > MAX_FRAME_SIZE {
            return Err(TransportError::FrameTooLarge(len));
        }
        let mut buf = vec![0u8; len];
        self.stream.read_exact(&mut buf).await?;
        Ok(buf)
    }
}
