//! tls13-codec: TLS 1.3 wire codec (RFC 8446).
//!
//! Layers, leaf first:
//!
//! - [`codec`]: big-endian integers and length-prefixed vectors
//! - [`record`]: `TLSPlaintext` and `TLSInnerPlaintext`
//! - [`extensions`]: extension TLVs and their type registry
//! - [`handshake`]: handshake header framing and message dispatch
//! - [`client_hello`], [`server_hello`], [`encrypted_extensions`],
//!   [`new_session_ticket`]: concrete message bodies
//! - [`stream`]: incremental deframing over arbitrary chunks
//!
//! [`transport`], [`session`] and [`config`] are the thin runtime used by
//! the binary. Nothing here encrypts or authenticates; the codec only
//! produces and consumes the structures a full TLS stack would protect.
//!
//! # Registries
//!
//! [`ExtensionRegistry::global`] and [`HandshakeMessageRegistry::global`]
//! are filled once, either by an explicit `install` at startup or lazily
//! with the defaults on first use, and are read-only afterwards.

pub mod client_hello;
pub mod codec;
pub mod config;
pub mod encrypted_extensions;
pub mod error;
pub mod extensions;
pub mod handshake;
pub mod new_session_ticket;
pub mod record;
pub mod server_hello;
pub mod session;
pub mod stream;
pub mod transport;

pub use client_hello::ClientHello;
pub use encrypted_extensions::EncryptedExtensions;
pub use error::{Error, ErrorKind, Result};
pub use extensions::{Extension, ExtensionRegistry, ExtensionType};
pub use handshake::{HandshakeMessage, HandshakeMessageRegistry, HandshakeType};
pub use new_session_ticket::NewSessionTicket;
pub use record::{ContentType, ProtocolVersion, TLSInnerPlaintext, TLSPlaintext};
pub use server_hello::ServerHello;

/// Crate version, reported by `--help`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// TLS 1.3 suites the demo server is willing to pick.
pub const TLS13_CIPHER_SUITES: [u16; 3] = [
    0x1301, // TLS_AES_128_GCM_SHA256
    0x1302, // TLS_AES_256_GCM_SHA384
    0x1303, // TLS_CHACHA20_POLY1305_SHA256
];
