//! Incremental deframing over a byte stream.
//!
//! Transport reads deliver arbitrary chunks. Each deframer keeps one
//! accumulation buffer: bytes are appended, a decode is attempted, and on
//! success only the unread remainder is kept. `Ok(None)` means "wait for
//! more input"; any `Err` is fatal for the connection.

use tracing::trace;

use crate::error::Result;
use crate::handshake::{HandshakeMessage, HandshakeType};
use crate::record::{ContentType, TLSPlaintext};

#[derive(Debug, Default)]
pub struct RecordDeframer {
    buf: Vec<u8>,
}

impl RecordDeframer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Number of bytes waiting for a complete record.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn next_record(&mut self) -> Result<Option<TLSPlaintext>> {
        // A bad type byte is fatal no matter how much follows it.
        if let Some(&first) = self.buf.first() {
            ContentType::try_from(first)?;
        }

        match TLSPlaintext::decode(&self.buf) {
            Ok((record, rest)) => {
                let consumed = self.buf.len() - rest.len();
                self.buf.drain(..consumed);
                trace!(
                    content_type = ?record.content_type,
                    len = record.length(),
                    buffered = self.buf.len(),
                    "record complete"
                );
                Ok(Some(record))
            }
            Err(err) if err.is_recoverable() => Ok(None),
            Err(err) => Err(err),
        }
    }
}

/// Reassembles handshake messages from the fragments of `Handshake` records.
///
/// One message may span several records and one record may carry several
/// messages.
#[derive(Debug, Default)]
pub struct HandshakeDeframer {
    buf: Vec<u8>,
}

impl HandshakeDeframer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_fragment(&mut self, fragment: &[u8]) {
        self.buf.extend_from_slice(fragment);
    }

    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// True when no partial message is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn next_message(&mut self) -> Result<Option<HandshakeMessage>> {
        if let Some(&first) = self.buf.first() {
            HandshakeType::try_from(first)?;
        }

        let total = match HandshakeMessage::peek_length(&self.buf) {
            Some(total) if self.buf.len() >= total => total,
            _ => return Ok(None),
        };

        let (message, _) = HandshakeMessage::decode(&self.buf[..total])?;
        self.buf.drain(..total);
        Ok(Some(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, ErrorKind};
    use crate::handshake::{Finished, KeyUpdate, KeyUpdateRequest};

    #[test]
    fn test_record_deframer_byte_at_a_time() {
        let first = TLSPlaintext::new(ContentType::Handshake, vec![1, 2, 3]);
        let second = TLSPlaintext::new(ContentType::Alert, vec![2, 40]);
        let mut wire = first.encode().unwrap();
        wire.extend(second.encode().unwrap());

        let mut deframer = RecordDeframer::new();
        let mut records = Vec::new();
        for byte in wire {
            deframer.push(&[byte]);
            while let Some(record) = deframer.next_record().unwrap() {
                records.push(record);
            }
        }
        assert_eq!(records, vec![first, second]);
        assert_eq!(deframer.buffered(), 0);
    }

    #[test]
    fn test_record_deframer_keeps_partial_input() {
        let mut deframer = RecordDeframer::new();
        deframer.push(&[22, 3, 3, 0, 10, 1, 2]);
        assert!(deframer.next_record().unwrap().is_none());
        assert_eq!(deframer.buffered(), 7);
    }

    #[test]
    fn test_record_deframer_rejects_bad_type() {
        let mut deframer = RecordDeframer::new();
        deframer.push(&[0x63]);
        let err = deframer.next_record().unwrap_err();
        assert_eq!(err, Error::UnknownContentType(0x63));
        assert_eq!(err.kind(), ErrorKind::UnknownDiscriminant);
    }

    #[test]
    fn test_handshake_spanning_records() {
        let msg = HandshakeMessage::Finished(Finished {
            verify_data: vec![0x5c; 48],
        });
        let bytes = msg.encode().unwrap();

        let mut deframer = HandshakeDeframer::new();
        deframer.push_fragment(&bytes[..3]);
        assert!(deframer.next_message().unwrap().is_none());
        deframer.push_fragment(&bytes[3..30]);
        assert!(deframer.next_message().unwrap().is_none());
        deframer.push_fragment(&bytes[30..]);
        assert_eq!(deframer.next_message().unwrap(), Some(msg));
        assert!(deframer.is_empty());
    }

    #[test]
    fn test_several_messages_in_one_fragment() {
        let update = HandshakeMessage::KeyUpdate(KeyUpdate {
            request_update: KeyUpdateRequest::UpdateNotRequested,
        });
        let mut fragment = HandshakeMessage::EndOfEarlyData.encode().unwrap();
        fragment.extend(update.encode().unwrap());

        let mut deframer = HandshakeDeframer::new();
        deframer.push_fragment(&fragment);
        assert_eq!(
            deframer.next_message().unwrap(),
            Some(HandshakeMessage::EndOfEarlyData)
        );
        assert_eq!(deframer.next_message().unwrap(), Some(update));
        assert_eq!(deframer.next_message().unwrap(), None);
    }

    #[test]
    fn test_handshake_deframer_rejects_bad_type() {
        let mut deframer = HandshakeDeframer::new();
        deframer.push_fragment(&[0x03]);
        assert_eq!(
            deframer.next_message().unwrap_err(),
            Error::UnknownHandshakeType(3)
        );
    }
}
