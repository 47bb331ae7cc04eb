//! Drives the deframers over an async byte stream.
//!
//! No handshake state machine lives here: the connection only turns bytes
//! into records and records into handshake messages, and the reverse.

use std::io;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace, warn};

use crate::error::Error;
use crate::handshake::HandshakeMessage;
use crate::record::{ContentType, TLSPlaintext, MAX_FRAGMENT_LEN};
use crate::stream::{HandshakeDeframer, RecordDeframer};

/// Receive buffer size when none is configured.
pub const DEFAULT_RECV_SIZE: usize = 4096;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("codec error: {0}")]
    Codec(#[from] Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("connection closed by peer")]
    ConnectionClosed,

    #[error("connection closed in the middle of a record")]
    UnexpectedEof,

    #[error("unexpected {0:?} record")]
    UnexpectedContentType(ContentType),

    #[error("alert received: level {level}, description {description}")]
    Alert { level: u8, description: u8 },
}

/// One connection's accumulation buffers plus the stream they read from.
#[derive(Debug)]
pub struct Connection<S> {
    stream: S,
    records: RecordDeframer,
    handshakes: HandshakeDeframer,
    recv_size: usize,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self::with_recv_size(stream, DEFAULT_RECV_SIZE)
    }

    pub fn with_recv_size(stream: S, recv_size: usize) -> Self {
        Self {
            stream,
            records: RecordDeframer::new(),
            handshakes: HandshakeDeframer::new(),
            recv_size: recv_size.max(1),
        }
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Next complete record, or `None` when the peer closed cleanly between records.
    pub async fn read_record(&mut self) -> Result<Option<TLSPlaintext>, SessionError> {
        let mut buf = vec![0u8; self.recv_size];
        loop {
            if let Some(record) = self.records.next_record()? {
                if record.fragment.len() > MAX_FRAGMENT_LEN {
                    return Err(Error::FragmentTooLarge(record.fragment.len()).into());
                }
                return Ok(Some(record));
            }
            let n = self.stream.read(&mut buf).await?;
            if n == 0 {
                if self.records.buffered() > 0 {
                    return Err(SessionError::UnexpectedEof);
                }
                return Ok(None);
            }
            trace!(n, "read from transport");
            self.records.push(&buf[..n]);
        }
    }

    /// Read records until one whole handshake message is available.
    pub async fn read_handshake(&mut self) -> Result<HandshakeMessage, SessionError> {
        loop {
            if let Some(message) = self.handshakes.next_message()? {
                debug!(msg_type = ?message.msg_type(), "handshake message received");
                return Ok(message);
            }

            let record = self
                .read_record()
                .await?
                .ok_or(SessionError::ConnectionClosed)?;

            match record.content_type {
                ContentType::Handshake => self.handshakes.push_fragment(&record.fragment),
                // Middlebox-compatibility CCS is dropped outside a message.
                ContentType::ChangeCipherSpec
                    if self.handshakes.is_empty() && record.fragment == [0x01] =>
                {
                    trace!("ignoring change_cipher_spec");
                }
                ContentType::Alert if record.fragment.len() == 2 => {
                    warn!(
                        level = record.fragment[0],
                        description = record.fragment[1],
                        "alert received"
                    );
                    return Err(SessionError::Alert {
                        level: record.fragment[0],
                        description: record.fragment[1],
                    });
                }
                other => return Err(SessionError::UnexpectedContentType(other)),
            }
        }
    }

    pub async fn write_record(&mut self, record: &TLSPlaintext) -> Result<(), SessionError> {
        self.stream.write_all(&record.encode()?).await?;
        Ok(())
    }

    /// Frame `message` into as many `Handshake` records as it needs.
    pub async fn write_handshake(&mut self, message: &HandshakeMessage) -> Result<(), SessionError> {
        let bytes = message.encode()?;
        for record in TLSPlaintext::fragment_payload(ContentType::Handshake, &bytes) {
            self.write_record(&record).await?;
        }
        self.stream.flush().await?;
        debug!(msg_type = ?message.msg_type(), len = bytes.len(), "handshake message sent");
        Ok(())
    }
}
