//! ServerHello body (RFC 8446 §4.1.3).

use crate::codec::{
    read_array, read_length_prefixed, read_u16, read_u8, write_length_prefixed, write_u16,
    write_u8, LengthPrefix,
};
use crate::error::{Error, Result};
use crate::extensions::{
    check_unique, encode_block, find_extension, Extension, ExtensionRegistry, ExtensionType,
    KeyShare, SupportedVersions,
};
use crate::record::ProtocolVersion;

/// version(2) + random(32) + session id length(1) + suite(2) + compression(1).
pub const SERVER_HELLO_MIN_LEN: usize = 38;

/// A TLS 1.3 server echoes at most a 32-byte session id.
pub const MAX_SESSION_ID_ECHO_LEN: usize = 32;

/// `random` value that marks a ServerHello as a HelloRetryRequest
/// (SHA-256 of "HelloRetryRequest").
pub const HELLO_RETRY_REQUEST_RANDOM: [u8; 32] = [
    0xcf, 0x21, 0xad, 0x74, 0xe5, 0x9a, 0x61, 0x11, 0xbe, 0x1d, 0x8c, 0x02, 0x1e, 0x65, 0xb8,
    0x91, 0xc2, 0xa2, 0x11, 0x16, 0x7a, 0xbb, 0x8c, 0x5e, 0x07, 0x9e, 0x09, 0xe2, 0xc8, 0xa8,
    0x33, 0x9c,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerHello {
    // TLS 1.3 still puts 0x0303 here; the real version is in supported_versions.
    pub legacy_version: ProtocolVersion,
    pub random: [u8; 32],
    pub legacy_session_id_echo: Vec<u8>,
    pub cipher_suite: u16,
    pub legacy_compression_method: u8,
    pub extensions: Vec<Extension>,
}

impl ServerHello {
    pub fn new(
        random: [u8; 32],
        legacy_session_id_echo: Vec<u8>,
        cipher_suite: u16,
        extensions: Vec<Extension>,
    ) -> Self {
        Self {
            legacy_version: ProtocolVersion::Tls12,
            random,
            legacy_session_id_echo,
            cipher_suite,
            legacy_compression_method: 0,
            extensions,
        }
    }

    pub fn parse(body: &[u8]) -> Result<Self> {
        Self::parse_with(body, ExtensionRegistry::global())
    }

    pub fn parse_with(body: &[u8], registry: &ExtensionRegistry) -> Result<Self> {
        if body.len() < SERVER_HELLO_MIN_LEN {
            return Err(Error::TooShort {
                len: body.len(),
                min: SERVER_HELLO_MIN_LEN,
            });
        }

        let (legacy_version, rest) = ProtocolVersion::decode(body)?;
        let (random, rest) = read_array::<32>(rest)?;
        let (session_id, rest) = read_length_prefixed(rest, LengthPrefix::U8)?;
        let (cipher_suite, rest) = read_u16(rest)?;
        let (legacy_compression_method, rest) = read_u8(rest)?;

        let extensions = if rest.is_empty() {
            Vec::new()
        } else {
            let (extensions, tail) = registry.decode_block(rest)?;
            if !tail.is_empty() {
                return Err(Error::Malformed("trailing bytes after server_hello extensions"));
            }
            extensions
                .into_iter()
                .map(server_key_share)
                .collect::<Result<Vec<_>>>()?
        };

        Ok(Self {
            legacy_version,
            random,
            legacy_session_id_echo: session_id.to_vec(),
            cipher_suite,
            legacy_compression_method,
            extensions,
        })
    }

    pub fn encode_body(&self, out: &mut Vec<u8>) -> Result<()> {
        out.extend_from_slice(&self.legacy_version.to_bytes());
        out.extend_from_slice(&self.random);
        write_length_prefixed(out, LengthPrefix::U8, &self.legacy_session_id_echo)?;
        write_u16(out, self.cipher_suite);
        write_u8(out, self.legacy_compression_method);
        encode_block(&self.extensions, out)
    }

    pub fn validate(&self) -> Result<()> {
        if self.legacy_session_id_echo.len() > MAX_SESSION_ID_ECHO_LEN {
            return Err(Error::Validation(format!(
                "legacy_session_id_echo of {} bytes",
                self.legacy_session_id_echo.len()
            )));
        }
        if self.legacy_compression_method != 0 {
            return Err(Error::Validation(format!(
                "compression method {}",
                self.legacy_compression_method
            )));
        }
        check_unique(&self.extensions)
    }

    #[must_use]
    pub fn is_hello_retry_request(&self) -> bool {
        self.random == HELLO_RETRY_REQUEST_RANDOM
    }

    pub fn extension(&self, extension_type: ExtensionType) -> Option<&Extension> {
        find_extension(&self.extensions, extension_type)
    }

    /// The version picked through `supported_versions`, if any.
    #[must_use]
    pub fn selected_version(&self) -> Option<u16> {
        match self.extension(ExtensionType::SupportedVersions) {
            Some(Extension::SupportedVersions(SupportedVersions::Selected(v))) => Some(*v),
            _ => None,
        }
    }
}

// The context-free parser prefers the client list when the bytes allow it.
fn server_key_share(ext: Extension) -> Result<Extension> {
    match ext {
        Extension::KeyShare(KeyShare::ClientShares(_)) => {
            let payload = ext.payload()?;
            KeyShare::decode_server(&payload)
                .map(Extension::KeyShare)
                .map_err(|e| e.within_frame("key_share shorter than its fields"))
        }
        other => Ok(other),
    }
}
