//! Hello-message extensions (RFC 8446 §4.2).
//!
//! Each extension is a TLV: `type(2) ‖ length(2) ‖ payload`. Typed payloads
//! are decoded through an [`ExtensionRegistry`]; anything without a
//! registered parser survives as [`Extension::Opaque`] and is re-emitted
//! byte-for-byte.

use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use tracing::trace;

use crate::codec::{
    read_length_prefixed, read_u16, read_u32, read_u8, write_length_prefixed, write_nested,
    write_u16, write_u32, write_u8, LengthPrefix,
};
use crate::error::{Error, Result};

/// TLV header: type(2) + length(2).
pub const EXTENSION_HEADER_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtensionType {
    ServerName,
    MaxFragmentLength,
    StatusRequest,
    SupportedGroups,
    SignatureAlgorithms,
    UseSrtp,
    Heartbeat,
    ApplicationLayerProtocolNegotiation,
    SignedCertificateTimestamp,
    ClientCertificateType,
    ServerCertificateType,
    Padding,
    PreSharedKey,
    EarlyData,
    SupportedVersions,
    Cookie,
    PskKeyExchangeModes,
    CertificateAuthorities,
    OidFilters,
    PostHandshakeAuth,
    SignatureAlgorithmsCert,
    KeyShare,
    /// Any code point this build has no name for (GREASE, private use, ...).
    Unknown(u16),
}

impl From<u16> for ExtensionType {
    fn from(value: u16) -> Self {
        match value {
            0 => Self::ServerName,
            1 => Self::MaxFragmentLength,
            5 => Self::StatusRequest,
            10 => Self::SupportedGroups,
            13 => Self::SignatureAlgorithms,
            14 => Self::UseSrtp,
            15 => Self::Heartbeat,
            16 => Self::ApplicationLayerProtocolNegotiation,
            18 => Self::SignedCertificateTimestamp,
            19 => Self::ClientCertificateType,
            20 => Self::ServerCertificateType,
            21 => Self::Padding,
            41 => Self::PreSharedKey,
            42 => Self::EarlyData,
            43 => Self::SupportedVersions,
            44 => Self::Cookie,
            45 => Self::PskKeyExchangeModes,
            47 => Self::CertificateAuthorities,
            48 => Self::OidFilters,
            49 => Self::PostHandshakeAuth,
            50 => Self::SignatureAlgorithmsCert,
            51 => Self::KeyShare,
            other => Self::Unknown(other),
        }
    }
}

impl From<ExtensionType> for u16 {
    fn from(value: ExtensionType) -> Self {
        match value {
            ExtensionType::ServerName => 0,
            ExtensionType::MaxFragmentLength => 1,
            ExtensionType::StatusRequest => 5,
            ExtensionType::SupportedGroups => 10,
            ExtensionType::SignatureAlgorithms => 13,
            ExtensionType::UseSrtp => 14,
            ExtensionType::Heartbeat => 15,
            ExtensionType::ApplicationLayerProtocolNegotiation => 16,
            ExtensionType::SignedCertificateTimestamp => 18,
            ExtensionType::ClientCertificateType => 19,
            ExtensionType::ServerCertificateType => 20,
            ExtensionType::Padding => 21,
            ExtensionType::PreSharedKey => 41,
            ExtensionType::EarlyData => 42,
            ExtensionType::SupportedVersions => 43,
            ExtensionType::Cookie => 44,
            ExtensionType::PskKeyExchangeModes => 45,
            ExtensionType::CertificateAuthorities => 47,
            ExtensionType::OidFilters => 48,
            ExtensionType::PostHandshakeAuth => 49,
            ExtensionType::SignatureAlgorithmsCert => 50,
            ExtensionType::KeyShare => 51,
            ExtensionType::Unknown(other) => other,
        }
    }
}

/// One `ServerName` entry; `name_type` 0 is `host_name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerName {
    pub name_type: u8,
    pub name: Vec<u8>,
}

impl ServerName {
    pub fn host_name(host: &str) -> Self {
        Self {
            name_type: 0,
            name: host.as_bytes().to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupportedVersions {
    /// ClientHello: versions the client offers, most preferred first.
    Offered(Vec<u16>),
    /// ServerHello / HelloRetryRequest: the version the server picked.
    Selected(u16),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyShareEntry {
    pub group: u16,
    pub key_exchange: Vec<u8>,
}

impl KeyShareEntry {
    fn decode(buf: &[u8]) -> Result<(Self, &[u8])> {
        let (group, rest) = read_u16(buf)?;
        let (key_exchange, rest) = read_length_prefixed(rest, LengthPrefix::U16)?;
        Ok((
            Self {
                group,
                key_exchange: key_exchange.to_vec(),
            },
            rest,
        ))
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        write_u16(out, self.group);
        write_length_prefixed(out, LengthPrefix::U16, &self.key_exchange)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyShare {
    ClientShares(Vec<KeyShareEntry>),
    ServerShare(KeyShareEntry),
    /// HelloRetryRequest carries only the group the server wants.
    SelectedGroup(u16),
}

impl KeyShare {
    /// Decode the ServerHello layouts only: a bare group in a
    /// HelloRetryRequest, otherwise the one selected share.
    pub fn decode_server(payload: &[u8]) -> Result<Self> {
        if payload.len() == 2 {
            let (group, _) = read_u16(payload)?;
            return Ok(Self::SelectedGroup(group));
        }
        let (entry, rest) = KeyShareEntry::decode(payload)?;
        finish(rest, "trailing bytes after key_share entry")?;
        Ok(Self::ServerShare(entry))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extension {
    ServerName(Vec<ServerName>),
    /// Empty `server_name` sent back by a server that used the name.
    ServerNameAck,
    SupportedGroups(Vec<u16>),
    SignatureAlgorithms(Vec<u16>),
    SignatureAlgorithmsCert(Vec<u16>),
    SupportedVersions(SupportedVersions),
    KeyShare(KeyShare),
    PskKeyExchangeModes(Vec<u8>),
    Alpn(Vec<Vec<u8>>),
    Cookie(Vec<u8>),
    /// `max_early_data_size` is only present inside NewSessionTicket.
    EarlyData(Option<u32>),
    PostHandshakeAuth,
    Opaque {
        extension_type: ExtensionType,
        data: Vec<u8>,
    },
}

impl Extension {
    #[must_use]
    pub fn extension_type(&self) -> ExtensionType {
        match self {
            Self::ServerName(_) | Self::ServerNameAck => ExtensionType::ServerName,
            Self::SupportedGroups(_) => ExtensionType::SupportedGroups,
            Self::SignatureAlgorithms(_) => ExtensionType::SignatureAlgorithms,
            Self::SignatureAlgorithmsCert(_) => ExtensionType::SignatureAlgorithmsCert,
            Self::SupportedVersions(_) => ExtensionType::SupportedVersions,
            Self::KeyShare(_) => ExtensionType::KeyShare,
            Self::PskKeyExchangeModes(_) => ExtensionType::PskKeyExchangeModes,
            Self::Alpn(_) => ExtensionType::ApplicationLayerProtocolNegotiation,
            Self::Cookie(_) => ExtensionType::Cookie,
            Self::EarlyData(_) => ExtensionType::EarlyData,
            Self::PostHandshakeAuth => ExtensionType::PostHandshakeAuth,
            Self::Opaque { extension_type, .. } => *extension_type,
        }
    }

    fn write_payload(&self, out: &mut Vec<u8>) -> Result<()> {
        match self {
            Self::ServerName(names) => write_nested(out, LengthPrefix::U16, |out| {
                for entry in names {
                    write_u8(out, entry.name_type);
                    write_length_prefixed(out, LengthPrefix::U16, &entry.name)?;
                }
                Ok(())
            }),
            Self::ServerNameAck | Self::PostHandshakeAuth | Self::EarlyData(None) => Ok(()),
            Self::SupportedGroups(codes)
            | Self::SignatureAlgorithms(codes)
            | Self::SignatureAlgorithmsCert(codes) => write_u16_list(out, codes),
            Self::SupportedVersions(SupportedVersions::Offered(versions)) => {
                write_nested(out, LengthPrefix::U8, |out| {
                    versions.iter().for_each(|v| write_u16(out, *v));
                    Ok(())
                })
            }
            Self::SupportedVersions(SupportedVersions::Selected(version)) => {
                write_u16(out, *version);
                Ok(())
            }
            Self::KeyShare(KeyShare::ClientShares(entries)) => {
                write_nested(out, LengthPrefix::U16, |out| {
                    entries.iter().try_for_each(|entry| entry.encode(out))
                })
            }
            Self::KeyShare(KeyShare::ServerShare(entry)) => entry.encode(out),
            Self::KeyShare(KeyShare::SelectedGroup(group)) => {
                write_u16(out, *group);
                Ok(())
            }
            Self::PskKeyExchangeModes(modes) => write_length_prefixed(out, LengthPrefix::U8, modes),
            Self::Alpn(protocols) => write_nested(out, LengthPrefix::U16, |out| {
                protocols
                    .iter()
                    .try_for_each(|p| write_length_prefixed(out, LengthPrefix::U8, p))
            }),
            Self::Cookie(cookie) => write_length_prefixed(out, LengthPrefix::U16, cookie),
            Self::EarlyData(Some(max_size)) => {
                write_u32(out, *max_size);
                Ok(())
            }
            Self::Opaque { data, .. } => {
                out.extend_from_slice(data);
                Ok(())
            }
        }
    }

    /// Serialized payload without the TLV header.
    pub fn payload(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write_payload(&mut out)?;
        Ok(out)
    }

    /// Append `type(2) ‖ len(2) ‖ payload` to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        write_u16(out, self.extension_type().into());
        write_nested(out, LengthPrefix::U16, |out| self.write_payload(out))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.encode(&mut out)?;
        Ok(out)
    }
}

/// Return the first extension of the given type.
pub fn find_extension(extensions: &[Extension], extension_type: ExtensionType) -> Option<&Extension> {
    extensions
        .iter()
        .find(|ext| ext.extension_type() == extension_type)
}

/// Reject a list that carries the same extension type twice.
pub fn check_unique(extensions: &[Extension]) -> Result<()> {
    for (i, ext) in extensions.iter().enumerate() {
        let ty = ext.extension_type();
        if extensions[..i].iter().any(|prev| prev.extension_type() == ty) {
            return Err(Error::Validation(format!(
                "duplicate extension {}",
                u16::from(ty)
            )));
        }
    }
    Ok(())
}

/// Write a Hello-style extensions block: `total_len(2) ‖ TLV*`.
///
/// An empty list still produces the two zero length bytes.
pub fn encode_block(extensions: &[Extension], out: &mut Vec<u8>) -> Result<()> {
    write_nested(out, LengthPrefix::U16, |out| {
        extensions.iter().try_for_each(|ext| ext.encode(out))
    })
}

/// Payload parser for one extension type.
pub type ExtensionParser = fn(&[u8]) -> Result<Extension>;

/// Maps extension types to payload parsers.
///
/// The process-wide instance behind [`ExtensionRegistry::global`] is
/// populated once, before any decoding, and never mutated afterwards.
#[derive(Clone, Default)]
pub struct ExtensionRegistry {
    parsers: HashMap<ExtensionType, ExtensionParser>,
}

impl fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.parsers.keys()).finish()
    }
}

static GLOBAL_EXTENSIONS: OnceLock<ExtensionRegistry> = OnceLock::new();

impl ExtensionRegistry {
    /// An empty registry: every extension decodes as opaque.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with a parser for every typed [`Extension`] variant.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(ExtensionType::ServerName, parse_server_name);
        registry.register(ExtensionType::SupportedGroups, |p| {
            parse_u16_list(p).map(Extension::SupportedGroups)
        });
        registry.register(ExtensionType::SignatureAlgorithms, |p| {
            parse_u16_list(p).map(Extension::SignatureAlgorithms)
        });
        registry.register(ExtensionType::SignatureAlgorithmsCert, |p| {
            parse_u16_list(p).map(Extension::SignatureAlgorithmsCert)
        });
        registry.register(ExtensionType::SupportedVersions, parse_supported_versions);
        registry.register(ExtensionType::KeyShare, parse_key_share);
        registry.register(ExtensionType::PskKeyExchangeModes, parse_psk_modes);
        registry.register(ExtensionType::ApplicationLayerProtocolNegotiation, parse_alpn);
        registry.register(ExtensionType::Cookie, parse_cookie);
        registry.register(ExtensionType::EarlyData, parse_early_data);
        registry.register(ExtensionType::PostHandshakeAuth, parse_post_handshake_auth);
        registry
    }

    /// Install `registry` as the process-wide instance.
    ///
    /// Must run before the first call to [`ExtensionRegistry::global`];
    /// afterwards the registry is frozen and the argument is handed back.
    pub fn install(registry: Self) -> std::result::Result<(), Self> {
        GLOBAL_EXTENSIONS.set(registry)
    }

    /// The process-wide registry, defaulting to [`ExtensionRegistry::with_defaults`].
    pub fn global() -> &'static Self {
        GLOBAL_EXTENSIONS.get_or_init(Self::with_defaults)
    }

    /// Register `parser` for `extension_type`; a later call replaces an earlier one.
    pub fn register(&mut self, extension_type: ExtensionType, parser: ExtensionParser) {
        self.parsers.insert(extension_type, parser);
    }

    pub fn get(&self, extension_type: ExtensionType) -> Option<ExtensionParser> {
        self.parsers.get(&extension_type).copied()
    }

    pub fn contains(&self, extension_type: ExtensionType) -> bool {
        self.parsers.contains_key(&extension_type)
    }

    /// Parse one TLV from the front of `data`.
    ///
    /// Returns `(None, data)` untouched when the TLV is not complete yet;
    /// that is the caller's cue to wait for more bytes.
    pub fn parse<'a>(&self, data: &'a [u8]) -> Result<(Option<Extension>, &'a [u8])> {
        if data.len() < EXTENSION_HEADER_LEN {
            return Ok((None, data));
        }
        let (raw_type, rest) = read_u16(data)?;
        let (length, rest) = read_u16(rest)?;
        let length = length as usize;
        if rest.len() < length {
            return Ok((None, data));
        }

        let (payload, rest) = rest.split_at(length);
        let extension_type = ExtensionType::from(raw_type);
        let extension = match self.get(extension_type) {
            Some(parser) => parser(payload)
                .map_err(|e| e.within_frame("extension payload shorter than its fields"))?,
            None => {
                trace!(extension_type = raw_type, len = length, "opaque extension");
                Extension::Opaque {
                    extension_type,
                    data: payload.to_vec(),
                }
            }
        };
        Ok((Some(extension), rest))
    }

    /// Decode a Hello-style extensions block from the front of `data`.
    pub fn decode_block<'a>(&self, data: &'a [u8]) -> Result<(Vec<Extension>, &'a [u8])> {
        let (mut block, rest) = read_length_prefixed(data, LengthPrefix::U16)?;

        let mut extensions = Vec::new();
        while !block.is_empty() {
            match self.parse(block)? {
                (Some(ext), tail) => {
                    extensions.push(ext);
                    block = tail;
                }
                (None, tail) => {
                    // Inside a declared span, an incomplete TLV is a hard error.
                    let needed = match read_u16(tail.get(2..).unwrap_or_default()) {
                        Ok((len, _)) => EXTENSION_HEADER_LEN + len as usize,
                        Err(_) => EXTENSION_HEADER_LEN,
                    };
                    return Err(Error::truncated(needed, tail.len()));
                }
            }
        }
        Ok((extensions, rest))
    }
}

fn finish(rest: &[u8], what: &'static str) -> Result<()> {
    if rest.is_empty() {
        Ok(())
    } else {
        Err(Error::Malformed(what))
    }
}

fn write_u16_list(out: &mut Vec<u8>, codes: &[u16]) -> Result<()> {
    write_nested(out, LengthPrefix::U16, |out| {
        codes.iter().for_each(|c| write_u16(out, *c));
        Ok(())
    })
}

fn read_u16_vec(mut list: &[u8]) -> Result<Vec<u16>> {
    if list.len() % 2 != 0 {
        return Err(Error::Malformed("odd length in u16 list"));
    }
    let mut codes = Vec::with_capacity(list.len() / 2);
    while !list.is_empty() {
        let (code, rest) = read_u16(list)?;
        codes.push(code);
        list = rest;
    }
    Ok(codes)
}

fn parse_u16_list(payload: &[u8]) -> Result<Vec<u16>> {
    let (list, rest) = read_length_prefixed(payload, LengthPrefix::U16)?;
    finish(rest, "trailing bytes after u16 list")?;
    read_u16_vec(list)
}

fn parse_server_name(payload: &[u8]) -> Result<Extension> {
    if payload.is_empty() {
        return Ok(Extension::ServerNameAck);
    }
    let (mut list, rest) = read_length_prefixed(payload, LengthPrefix::U16)?;
    finish(rest, "trailing bytes after server_name list")?;

    let mut names = Vec::new();
    while !list.is_empty() {
        let (name_type, rest) = read_u8(list)?;
        let (name, rest) = read_length_prefixed(rest, LengthPrefix::U16)?;
        names.push(ServerName {
            name_type,
            name: name.to_vec(),
        });
        list = rest;
    }
    Ok(Extension::ServerName(names))
}

fn parse_supported_versions(payload: &[u8]) -> Result<Extension> {
    if payload.len() == 2 {
        let (version, _) = read_u16(payload)?;
        return Ok(Extension::SupportedVersions(SupportedVersions::Selected(
            version,
        )));
    }
    let (list, rest) = read_length_prefixed(payload, LengthPrefix::U8)?;
    finish(rest, "trailing bytes after supported_versions")?;
    Ok(Extension::SupportedVersions(SupportedVersions::Offered(
        read_u16_vec(list)?,
    )))
}

fn parse_client_shares(payload: &[u8]) -> Result<Vec<KeyShareEntry>> {
    let (mut list, rest) = read_length_prefixed(payload, LengthPrefix::U16)?;
    finish(rest, "trailing bytes after client_shares")?;

    let mut entries = Vec::new();
    while !list.is_empty() {
        let (entry, rest) = KeyShareEntry::decode(list)?;
        entries.push(entry);
        list = rest;
    }
    Ok(entries)
}

fn parse_key_share(payload: &[u8]) -> Result<Extension> {
    // A two-byte payload is either an empty client list or an HRR group.
    if payload.len() == 2 {
        let (group, _) = read_u16(payload)?;
        let share = if group == 0 {
            KeyShare::ClientShares(Vec::new())
        } else {
            KeyShare::SelectedGroup(group)
        };
        return Ok(Extension::KeyShare(share));
    }
    if let Ok(entries) = parse_client_shares(payload) {
        return Ok(Extension::KeyShare(KeyShare::ClientShares(entries)));
    }
    let (entry, rest) = KeyShareEntry::decode(payload)?;
    finish(rest, "trailing bytes after key_share entry")?;
    Ok(Extension::KeyShare(KeyShare::ServerShare(entry)))
}

fn parse_psk_modes(payload: &[u8]) -> Result<Extension> {
    let (modes, rest) = read_length_prefixed(payload, LengthPrefix::U8)?;
    finish(rest, "trailing bytes after psk_key_exchange_modes")?;
    Ok(Extension::PskKeyExchangeModes(modes.to_vec()))
}

fn parse_alpn(payload: &[u8]) -> Result<Extension> {
    let (mut list, rest) = read_length_prefixed(payload, LengthPrefix::U16)?;
    finish(rest, "trailing bytes after alpn list")?;

    let mut protocols = Vec::new();
    while !list.is_empty() {
        let (name, rest) = read_length_prefixed(list, LengthPrefix::U8)?;
        if name.is_empty() {
            return Err(Error::Malformed("empty alpn protocol name"));
        }
        protocols.push(name.to_vec());
        list = rest;
    }
    Ok(Extension::Alpn(protocols))
}

fn parse_cookie(payload: &[u8]) -> Result<Extension> {
    let (cookie, rest) = read_length_prefixed(payload, LengthPrefix::U16)?;
    finish(rest, "trailing bytes after cookie")?;
    Ok(Extension::Cookie(cookie.to_vec()))
}

fn parse_early_data(payload: &[u8]) -> Result<Extension> {
    if payload.is_empty() {
        return Ok(Extension::EarlyData(None));
    }
    let (max_size, rest) = read_u32(payload)?;
    finish(rest, "trailing bytes after early_data")?;
    Ok(Extension::EarlyData(Some(max_size)))
}

fn parse_post_handshake_auth(payload: &[u8]) -> Result<Extension> {
    finish(payload, "post_handshake_auth carries no payload")?;
    Ok(Extension::PostHandshakeAuth)
}
