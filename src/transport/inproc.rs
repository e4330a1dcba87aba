//! `inproc://` transport: a purely in-process channel with no underlying OS
//! socket. `bind` registers a name in a process-wide table; `connect` looks the
//! name up and hands back one end of a freshly created duplex channel pair,
//! delivering the other end to the bound listener's `accept` queue.
//!
//! Message boundaries are already preserved by `tokio::sync::mpsc`, so unlike
//! the `tcp://` transport, no length-prefix framing is needed here.

use crate::error::TransportError;
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};
use tokio::sync::mpsc;

/// Depth of the per-endpoint accept/message channels. Generous enough that a
/// burst of connects/sends doesn't spuriously stall, bounded so a runaway
/// producer can't grow memory without limit.
const CHANNEL_DEPTH: usize = 1024;

type NameRegistry = Mutex<HashMap<String, mpsc::Sender<InprocConnection>>>;

fn registry() -> &'static NameRegistry {
    static REGISTRY: OnceLock<NameRegistry> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

pub struct InprocListener {
    name: String,
    accept_rx: mpsc::Receiver<InprocConnection>,
}

impl InprocListener {
    pub fn bind(name: &str) -> Result<Self, TransportError> {
        let mut reg = registry().lock().expect("inproc registry poisoned");
        if reg.contains_key(name) {
            return Err(TransportError::AlreadyBound(name.to_string()));
        }
        let (accept_tx, accept_rx) = mpsc::channel(CHANNEL_DEPTH);
        reg.insert(name.to_string(), accept_tx);
        Ok(Self {
            name: name.to_string(),
            accept_rx,
        })
    }

    pub async fn accept(&mut self) -> Result<InprocConnection, TransportError> {
        self.accept_rx.recv().await.ok_or(TransportError::Closed)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for InprocListener {
    fn drop(&mut self) {
        if let Ok(mut reg) = registry().lock() {
            reg.remove(&self.name);
        }
    }
}

pub struct InprocConnection {
    tx: mpsc::Sender<Vec<u8>>,
    rx: mpsc::Receiver<Vec<u8>>,
}

impl InprocConnection {
    pub async fn connect(name: &str) -> Result<Self, TransportError> {
        let accept_tx = {
            let reg = registry().lock().expect("inproc registry poisoned");
            reg.get(name)
                .cloned()
                .ok_or_else(|| TransportError::NotBound(name.to_string()))?
        };

        let (local_tx, remote_rx) = mpsc::channel(CHANNEL_DEPTH);
        let (remote_tx, local_rx) = mpsc::channel(CHANNEL_DEPTH);
        let remote_end = InprocConnection {
            tx: remote_tx,
            rx: remote_rx,
        };

        accept_tx
            .send(remote_end)
            .await
            .map_err(|_| TransportError::NotBound(name.to_string()))?;

        Ok(InprocConnection {
            tx: local_tx,
            rx: local_rx,
        })
    }

    pub async fn send_frame(&mut self, bytes: Vec<u8>) -> Result<(), TransportError> {
        self.tx.send(bytes).await.map_err(|_| TransportError::Closed)
    }

    pub async fn recv_frame(&mut self) -> Result<Vec<u8>, TransportError> {
        self.rx.recv().await.ok_or(TransportError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rebinding_after_drop_succeeds() {
        let name = format!("test-rebind-{}", uuid::Uuid::new_v4().simple());
        {
            let _listener = InprocListener::bind(&name).unwrap();
            assert!(InprocListener::bind(&name).is_err());
        }
        // Listener dropped, name should be free again.
        let _second = InprocListener::bind(&name).unwrap();
    }

    #[tokio::test]
    async fn connect_without_bind_fails() {
        let name = format!("test-missing-{}", uuid::Uuid::new_v4().simple());
        let err = InprocConnection::connect(&name).await.unwrap_err();
        assert!(matches!(err, TransportError::NotBound(_)));
    }
}
