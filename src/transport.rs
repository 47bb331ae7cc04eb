//! Thin TCP transport used by the binary.
//!
//! The codec never touches sockets; this module only moves byte sequences.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("not connected to any server")]
    NotConnected,

    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Client side of the transport: connect, send, receive, close.
#[derive(Debug, Default)]
pub struct TcpClient {
    stream: Option<TcpStream>,
}

impl TcpClient {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    pub async fn connect(&mut self, host: &str, port: u16) -> Result<(), TransportError> {
        let addr = format!("{host}:{port}");
        match TcpStream::connect(&addr).await {
            Ok(stream) => {
                debug!(%addr, "connected");
                self.stream = Some(stream);
                Ok(())
            }
            Err(source) => {
                error!(%addr, error = %source, "failed to connect");
                Err(TransportError::Connect { addr, source })
            }
        }
    }

    /// Write all of `data`. A write failure drops the connection.
    pub async fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;
        if let Err(e) = stream.write_all(data).await {
            error!(error = %e, "failed to send data");
            self.stream = None;
            return Err(e.into());
        }
        Ok(())
    }

    /// Read up to `max_size` bytes. An empty result means the peer closed.
    pub async fn receive(&mut self, max_size: usize) -> Result<Vec<u8>, TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;
        let mut buf = vec![0u8; max_size];
        let n = match stream.read(&mut buf).await {
            Ok(n) => n,
            Err(e) => {
                error!(error = %e, "failed to receive data");
                self.stream = None;
                return Err(e.into());
            }
        };
        if n == 0 {
            info!("connection closed by server");
            self.stream = None;
        }
        buf.truncate(n);
        Ok(buf)
    }

    pub async fn close(&mut self) -> Result<(), TransportError> {
        if let Some(mut stream) = self.stream.take() {
            stream.shutdown().await?;
        }
        Ok(())
    }
}

/// Listening side of the transport.
#[derive(Debug)]
pub struct TcpServer {
    listener: TcpListener,
}

impl TcpServer {
    pub async fn bind(host: &str, port: u16) -> Result<Self, TransportError> {
        let listener = TcpListener::bind((host, port)).await?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.listener.local_addr()?)
    }

    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr), TransportError> {
        let (stream, peer) = self.listener.accept().await?;
        info!(%peer, "accepted connection");
        Ok((stream, peer))
    }
}
