//! Handshake message framing (RFC 8446 §4).
//!
//! Wire form: `msg_type(1) ‖ length(3) ‖ body`. The body is handed to the
//! parser registered for `msg_type` in a [`HandshakeMessageRegistry`].

use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use tracing::debug;

use crate::client_hello::ClientHello;
use crate::codec::{read_u24, read_u8, write_nested, write_u8, LengthPrefix};
use crate::encrypted_extensions::EncryptedExtensions;
use crate::error::{Error, Result};
use crate::new_session_ticket::NewSessionTicket;
use crate::server_hello::ServerHello;

/// Header: msg_type(1) + length(3).
pub const HANDSHAKE_HEADER_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum HandshakeType {
    ClientHello = 1,
    ServerHello = 2,
    NewSessionTicket = 4,
    EndOfEarlyData = 5,
    EncryptedExtensions = 8,
    Certificate = 11,
    CertificateRequest = 13,
    CertificateVerify = 15,
    Finished = 20,
    KeyUpdate = 24,
    MessageHash = 254,
}

impl TryFrom<u8> for HandshakeType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Self::ClientHello),
            2 => Ok(Self::ServerHello),
            4 => Ok(Self::NewSessionTicket),
            5 => Ok(Self::EndOfEarlyData),
            8 => Ok(Self::EncryptedExtensions),
            11 => Ok(Self::Certificate),
            13 => Ok(Self::CertificateRequest),
            15 => Ok(Self::CertificateVerify),
            20 => Ok(Self::Finished),
            24 => Ok(Self::KeyUpdate),
            254 => Ok(Self::MessageHash),
            _ => Err(Error::UnknownHandshakeType(value)),
        }
    }
}

/// `Finished.verify_data`; its length is the transcript hash length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finished {
    pub verify_data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum KeyUpdateRequest {
    UpdateNotRequested = 0,
    UpdateRequested = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyUpdate {
    pub request_update: KeyUpdateRequest,
}

impl KeyUpdate {
    fn parse(body: &[u8]) -> Result<Self> {
        let (value, rest) = read_u8(body)?;
        if !rest.is_empty() {
            return Err(Error::Malformed("trailing bytes after key_update"));
        }
        let request_update = match value {
            0 => KeyUpdateRequest::UpdateNotRequested,
            1 => KeyUpdateRequest::UpdateRequested,
            _ => return Err(Error::Malformed("invalid key_update request")),
        };
        Ok(Self { request_update })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeMessage {
    ClientHello(ClientHello),
    ServerHello(ServerHello),
    NewSessionTicket(NewSessionTicket),
    EndOfEarlyData,
    EncryptedExtensions(EncryptedExtensions),
    Finished(Finished),
    KeyUpdate(KeyUpdate),
}

impl HandshakeMessage {
    #[must_use]
    pub fn msg_type(&self) -> HandshakeType {
        match self {
            Self::ClientHello(_) => HandshakeType::ClientHello,
            Self::ServerHello(_) => HandshakeType::ServerHello,
            Self::NewSessionTicket(_) => HandshakeType::NewSessionTicket,
            Self::EndOfEarlyData => HandshakeType::EndOfEarlyData,
            Self::EncryptedExtensions(_) => HandshakeType::EncryptedExtensions,
            Self::Finished(_) => HandshakeType::Finished,
            Self::KeyUpdate(_) => HandshakeType::KeyUpdate,
        }
    }

    fn encode_body(&self, out: &mut Vec<u8>) -> Result<()> {
        match self {
            Self::ClientHello(hello) => hello.encode_body(out),
            Self::ServerHello(hello) => hello.encode_body(out),
            Self::NewSessionTicket(ticket) => ticket.encode_body(out),
            Self::EndOfEarlyData => Ok(()),
            Self::EncryptedExtensions(ee) => ee.encode_body(out),
            Self::Finished(finished) => {
                out.extend_from_slice(&finished.verify_data);
                Ok(())
            }
            Self::KeyUpdate(update) => {
                write_u8(out, update.request_update as u8);
                Ok(())
            }
        }
    }

    /// Append `msg_type ‖ length(3) ‖ body` to `out`.
    pub fn encode_into(&self, out: &mut Vec<u8>) -> Result<()> {
        write_u8(out, self.msg_type() as u8);
        write_nested(out, LengthPrefix::U24, |out| self.encode_body(out))
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.encode_into(&mut out)?;
        Ok(out)
    }

    /// Decode one message with the process-wide registry.
    pub fn decode(data: &[u8]) -> Result<(Self, &[u8])> {
        HandshakeMessageRegistry::global().decode(data)
    }

    /// Total framed length of the message at the front of `data`, once the
    /// header is available.
    #[must_use]
    pub fn peek_length(data: &[u8]) -> Option<usize> {
        if data.len() < HANDSHAKE_HEADER_LEN {
            return None;
        }
        let (len, _) = read_u24(&data[1..]).ok()?;
        Some(HANDSHAKE_HEADER_LEN + len as usize)
    }
}

/// Body parser for one handshake type.
pub type MessageParser = fn(&[u8]) -> Result<HandshakeMessage>;

/// Maps handshake types to body parsers.
///
/// Like the extension registry, the process-wide instance is filled in
/// once at startup and only read afterwards.
#[derive(Clone, Default)]
pub struct HandshakeMessageRegistry {
    parsers: HashMap<HandshakeType, MessageParser>,
}

impl fmt::Debug for HandshakeMessageRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.parsers.keys()).finish()
    }
}

static GLOBAL_MESSAGES: OnceLock<HandshakeMessageRegistry> = OnceLock::new();

impl HandshakeMessageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry wired with every message body this crate can parse.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(HandshakeType::ClientHello, |body| {
            ClientHello::parse(body).map(HandshakeMessage::ClientHello)
        });
        registry.register(HandshakeType::ServerHello, |body| {
            ServerHello::parse(body).map(HandshakeMessage::ServerHello)
        });
        registry.register(HandshakeType::NewSessionTicket, |body| {
            NewSessionTicket::parse(body).map(HandshakeMessage::NewSessionTicket)
        });
        registry.register(HandshakeType::EndOfEarlyData, |body| {
            if body.is_empty() {
                Ok(HandshakeMessage::EndOfEarlyData)
            } else {
                Err(Error::Malformed("end_of_early_data carries no body"))
            }
        });
        registry.register(HandshakeType::EncryptedExtensions, |body| {
            EncryptedExtensions::parse(body).map(HandshakeMessage::EncryptedExtensions)
        });
        registry.register(HandshakeType::Finished, |body| {
            Ok(HandshakeMessage::Finished(Finished {
                verify_data: body.to_vec(),
            }))
        });
        registry.register(HandshakeType::KeyUpdate, |body| {
            KeyUpdate::parse(body).map(HandshakeMessage::KeyUpdate)
        });
        registry
    }

    /// Install `registry` as the process-wide instance; see
    /// [`crate::extensions::ExtensionRegistry::install`].
    pub fn install(registry: Self) -> std::result::Result<(), Self> {
        GLOBAL_MESSAGES.set(registry)
    }

    pub fn global() -> &'static Self {
        GLOBAL_MESSAGES.get_or_init(Self::with_defaults)
    }

    pub fn register(&mut self, msg_type: HandshakeType, parser: MessageParser) {
        self.parsers.insert(msg_type, parser);
    }

    pub fn contains(&self, msg_type: HandshakeType) -> bool {
        self.parsers.contains_key(&msg_type)
    }

    /// Decode one framed message from the front of `data`.
    pub fn decode<'a>(&self, data: &'a [u8]) -> Result<(HandshakeMessage, &'a [u8])> {
        if data.len() < HANDSHAKE_HEADER_LEN {
            return Err(Error::truncated(HANDSHAKE_HEADER_LEN, data.len()));
        }
        let (tag, rest) = read_u8(data)?;
        let msg_type = HandshakeType::try_from(tag)?;
        let (length, rest) = read_u24(rest)?;
        let length = length as usize;
        if rest.len() < length {
            return Err(Error::truncated(HANDSHAKE_HEADER_LEN + length, data.len()));
        }

        let parser = self
            .parsers
            .get(&msg_type)
            .ok_or(Error::NoHandlerRegistered(msg_type))?;
        let (body, rest) = rest.split_at(length);
        let message =
            parser(body).map_err(|e| e.within_frame("handshake body shorter than its fields"))?;
        debug!(?msg_type, len = length, "decoded handshake message");
        Ok((message, rest))
    }
}
