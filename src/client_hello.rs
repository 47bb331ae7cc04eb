//! ClientHello body (RFC 8446 §4.1.2).

use crate::codec::{
    read_array, read_length_prefixed, read_u16, write_length_prefixed, write_nested, write_u16,
    LengthPrefix,
};
use crate::error::{Error, Result};
use crate::extensions::{
    check_unique, encode_block, find_extension, Extension, ExtensionRegistry, ExtensionType,
    SupportedVersions,
};
use crate::record::ProtocolVersion;

/// version(2) + random(32) + three empty length prefixes (1 + 2 + 1).
pub const CLIENT_HELLO_MIN_LEN: usize = 38;

/// Longest `legacy_session_id` a ClientHello may carry.
pub const MAX_SESSION_ID_LEN: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHello {
    pub legacy_version: ProtocolVersion,
    pub random: [u8; 32],
    pub legacy_session_id: Vec<u8>,
    pub cipher_suites: Vec<u16>,
    pub legacy_compression_methods: Vec<u8>,
    pub extensions: Vec<Extension>,
}

impl ClientHello {
    pub fn new(random: [u8; 32], cipher_suites: Vec<u16>, extensions: Vec<Extension>) -> Self {
        Self {
            legacy_version: ProtocolVersion::Tls12,
            random,
            legacy_session_id: Vec::new(),
            cipher_suites,
            legacy_compression_methods: vec![0],
            extensions,
        }
    }

    /// Parse a body using the process-wide extension registry.
    pub fn parse(body: &[u8]) -> Result<Self> {
        Self::parse_with(body, ExtensionRegistry::global())
    }

    pub fn parse_with(body: &[u8], registry: &ExtensionRegistry) -> Result<Self> {
        if body.len() < CLIENT_HELLO_MIN_LEN {
            return Err(Error::TooShort {
                len: body.len(),
                min: CLIENT_HELLO_MIN_LEN,
            });
        }

        let (legacy_version, rest) = ProtocolVersion::decode(body)?;
        let (random, rest) = read_array::<32>(rest)?;
        let (session_id, rest) = read_length_prefixed(rest, LengthPrefix::U8)?;

        let (mut suites, rest) = read_length_prefixed(rest, LengthPrefix::U16)?;
        if suites.len() % 2 != 0 {
            return Err(Error::OddCipherSuiteLength(suites.len()));
        }
        let mut cipher_suites = Vec::with_capacity(suites.len() / 2);
        while !suites.is_empty() {
            let (suite, tail) = read_u16(suites)?;
            cipher_suites.push(suite);
            suites = tail;
        }

        let (compression, rest) = read_length_prefixed(rest, LengthPrefix::U8)?;

        // The extensions block is optional on the wire.
        let extensions = if rest.is_empty() {
            Vec::new()
        } else {
            let (extensions, tail) = registry.decode_block(rest)?;
            if !tail.is_empty() {
                return Err(Error::Malformed("trailing bytes after client_hello extensions"));
            }
            extensions
        };

        Ok(Self {
            legacy_version,
            random,
            legacy_session_id: session_id.to_vec(),
            cipher_suites,
            legacy_compression_methods: compression.to_vec(),
            extensions,
        })
    }

    /// Append the body. The extensions block is always written, even when empty.
    pub fn encode_body(&self, out: &mut Vec<u8>) -> Result<()> {
        out.extend_from_slice(&self.legacy_version.to_bytes());
        out.extend_from_slice(&self.random);
        write_length_prefixed(out, LengthPrefix::U8, &self.legacy_session_id)?;
        write_nested(out, LengthPrefix::U16, |out| {
            self.cipher_suites.iter().for_each(|s| write_u16(out, *s));
            Ok(())
        })?;
        write_length_prefixed(out, LengthPrefix::U8, &self.legacy_compression_methods)?;
        encode_block(&self.extensions, out)
    }

    /// Check the invariants that construction leaves open.
    pub fn validate(&self) -> Result<()> {
        if self.legacy_session_id.len() > MAX_SESSION_ID_LEN {
            return Err(Error::Validation(format!(
                "legacy_session_id of {} bytes",
                self.legacy_session_id.len()
            )));
        }
        if self.cipher_suites.is_empty() {
            return Err(Error::Validation("no cipher suites offered".into()));
        }
        if self.legacy_compression_methods.is_empty() {
            return Err(Error::Validation("no compression methods".into()));
        }
        check_unique(&self.extensions)
    }

    pub fn extension(&self, extension_type: ExtensionType) -> Option<&Extension> {
        find_extension(&self.extensions, extension_type)
    }

    /// Whether `supported_versions` lists TLS 1.3.
    #[must_use]
    pub fn offers_tls13(&self) -> bool {
        matches!(
            self.extension(ExtensionType::SupportedVersions),
            Some(Extension::SupportedVersions(SupportedVersions::Offered(versions)))
                if versions.contains(&u16::from(ProtocolVersion::Tls13))
        )
    }
}
