//! TLS record layer (RFC 8446 §5.1 and §5.2).

use tracing::warn;

use crate::codec::{read_length_prefixed, read_u8, write_length_prefixed, write_u8, LengthPrefix};
use crate::error::{Error, Result};

/// Largest plaintext fragment a record may carry (2^14).
pub const MAX_FRAGMENT_LEN: usize = 16384;

/// Record header: type(1) + version(2) + length(2).
pub const RECORD_HEADER_LEN: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ContentType {
    Invalid = 0,
    ChangeCipherSpec = 20,
    Alert = 21,
    Handshake = 22,
    ApplicationData = 23,
}

impl TryFrom<u8> for ContentType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Invalid),
            20 => Ok(Self::ChangeCipherSpec),
            21 => Ok(Self::Alert),
            22 => Ok(Self::Handshake),
            23 => Ok(Self::ApplicationData),
            _ => Err(Error::UnknownContentType(value)),
        }
    }
}

/// Wire-visible protocol version, `(major, minor)` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolVersion {
    Tls10,
    Tls11,
    Tls12,
    Tls13,
}

impl ProtocolVersion {
    #[must_use]
    pub const fn to_bytes(self) -> [u8; 2] {
        match self {
            Self::Tls10 => [3, 1],
            Self::Tls11 => [3, 2],
            Self::Tls12 => [3, 3],
            Self::Tls13 => [3, 4],
        }
    }

    pub fn from_bytes(major: u8, minor: u8) -> Result<Self> {
        match (major, minor) {
            (3, 1) => Ok(Self::Tls10),
            (3, 2) => Ok(Self::Tls11),
            (3, 3) => Ok(Self::Tls12),
            (3, 4) => Ok(Self::Tls13),
            _ => Err(Error::UnknownVersion(major, minor)),
        }
    }

    /// Read the two version bytes at the front of `buf`.
    pub fn decode(buf: &[u8]) -> Result<(Self, &[u8])> {
        let (major, rest) = read_u8(buf)?;
        let (minor, rest) = read_u8(rest)?;
        Ok((Self::from_bytes(major, minor)?, rest))
    }
}

impl From<ProtocolVersion> for u16 {
    fn from(value: ProtocolVersion) -> Self {
        u16::from_be_bytes(value.to_bytes())
    }
}

impl TryFrom<u16> for ProtocolVersion {
    type Error = Error;

    fn try_from(value: u16) -> Result<Self> {
        let [major, minor] = value.to_be_bytes();
        Self::from_bytes(major, minor)
    }
}

/// One record as it appears on the wire before protection.
///
/// The length field is not stored; it is always `fragment.len()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TLSPlaintext {
    pub content_type: ContentType,
    pub legacy_record_version: ProtocolVersion,
    pub fragment: Vec<u8>,
}

impl TLSPlaintext {
    pub fn new(content_type: ContentType, fragment: Vec<u8>) -> Self {
        Self {
            content_type,
            legacy_record_version: ProtocolVersion::Tls12,
            fragment,
        }
    }

    #[must_use]
    pub fn length(&self) -> usize {
        self.fragment.len()
    }

    pub fn validate(&self) -> Result<()> {
        if self.fragment.len() > MAX_FRAGMENT_LEN {
            return Err(Error::FragmentTooLarge(self.fragment.len()));
        }
        Ok(())
    }

    /// Serialize the record. Fragments over 16384 bytes are refused.
    pub fn encode(&self) -> Result<Vec<u8>> {
        self.validate()?;

        let mut out = Vec::with_capacity(RECORD_HEADER_LEN + self.fragment.len());
        write_u8(&mut out, self.content_type as u8);
        out.extend_from_slice(&self.legacy_record_version.to_bytes());
        write_length_prefixed(&mut out, LengthPrefix::U16, &self.fragment)?;
        Ok(out)
    }

    /// Parse one record from the front of `data`, returning the unread tail.
    ///
    /// The 16384-byte cap is not enforced here; [`crate::session::Connection`]
    /// refuses larger fragments from a peer.
    pub fn decode(data: &[u8]) -> Result<(Self, &[u8])> {
        if data.len() < RECORD_HEADER_LEN {
            return Err(Error::truncated(RECORD_HEADER_LEN, data.len()));
        }

        let (type_byte, rest) = read_u8(data)?;
        let content_type = ContentType::try_from(type_byte)?;
        let (legacy_record_version, rest) = ProtocolVersion::decode(rest)?;
        let (fragment, rest) = read_length_prefixed(rest, LengthPrefix::U16)?;

        if fragment.len() > MAX_FRAGMENT_LEN {
            warn!(
                len = fragment.len(),
                "record fragment exceeds 16384 bytes"
            );
        }

        Ok((
            Self {
                content_type,
                legacy_record_version,
                fragment: fragment.to_vec(),
            },
            rest,
        ))
    }

    /// Split `payload` into as many records as needed to respect the
    /// fragment cap. An empty payload still yields one empty record.
    pub fn fragment_payload(content_type: ContentType, payload: &[u8]) -> Vec<Self> {
        if payload.is_empty() {
            return vec![Self::new(content_type, Vec::new())];
        }
        payload
            .chunks(MAX_FRAGMENT_LEN)
            .map(|chunk| Self::new(content_type, chunk.to_vec()))
            .collect()
    }
}

/// Decrypted TLS 1.3 record content: `content ‖ type ‖ zeros`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TLSInnerPlaintext {
    pub content: Vec<u8>,
    pub content_type: ContentType,
    pub zero_padding_length: usize,
}

impl TLSInnerPlaintext {
    pub fn new(content_type: ContentType, content: Vec<u8>) -> Self {
        Self {
            content,
            content_type,
            zero_padding_length: 0,
        }
    }

    /// Recover the real content type by scanning back over the zero padding.
    ///
    /// A non-zero byte that is not a known content type cannot be the
    /// boundary, so the scan keeps moving left past it.
    pub fn decode(data: &[u8]) -> Result<Self> {
        for (i, &byte) in data.iter().enumerate().rev() {
            if byte == 0 {
                continue;
            }
            if let Ok(content_type) = ContentType::try_from(byte) {
                return Ok(Self {
                    content: data[..i].to_vec(),
                    content_type,
                    zero_padding_length: data.len() - i - 1,
                });
            }
        }
        Err(Error::NoContentTypeFound)
    }

    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.content.len() + 1 + self.zero_padding_length);
        out.extend_from_slice(&self.content);
        out.push(self.content_type as u8);
        out.resize(out.len() + self.zero_padding_length, 0);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_record_round_trip() {
        let record = TLSPlaintext::new(ContentType::Handshake, vec![0x01, 0x00, 0x00, 0x00]);
        let bytes = record.encode().unwrap();
        assert_eq!(bytes, vec![22, 3, 3, 0, 4, 0x01, 0x00, 0x00, 0x00]);

        let (decoded, rest) = TLSPlaintext::decode(&bytes).unwrap();
        assert_eq!(decoded, record);
        assert!(rest.is_empty());
    }

    #[test]
    fn test_record_empty_fragment() {
        let record = TLSPlaintext::new(ContentType::Alert, Vec::new());
        let bytes = record.encode().unwrap();
        assert_eq!(bytes, vec![21, 3, 3, 0, 0]);
        let (decoded, rest) = TLSPlaintext::decode(&bytes).unwrap();
        assert_eq!(decoded, record);
        assert!(rest.is_empty());
    }

    #[test]
    fn test_record_returns_remainder() {
        let mut bytes = TLSPlaintext::new(ContentType::ApplicationData, b"abc".to_vec())
            .encode()
            .unwrap();
        bytes.extend_from_slice(&[23, 3, 3]);

        let (decoded, rest) = TLSPlaintext::decode(&bytes).unwrap();
        assert_eq!(decoded.fragment, b"abc");
        assert_eq!(rest, &[23, 3, 3]);
    }

    #[test]
    fn test_record_fragment_boundary() {
        let max = TLSPlaintext::new(ContentType::ApplicationData, vec![0xab; MAX_FRAGMENT_LEN]);
        let bytes = max.encode().unwrap();
        assert_eq!(bytes.len(), RECORD_HEADER_LEN + MAX_FRAGMENT_LEN);
        let (decoded, rest) = TLSPlaintext::decode(&bytes).unwrap();
        assert_eq!(decoded, max);
        assert!(rest.is_empty());

        let over = TLSPlaintext::new(ContentType::ApplicationData, vec![0; MAX_FRAGMENT_LEN + 1]);
        let err = over.encode().unwrap_err();
        assert_eq!(err, Error::FragmentTooLarge(MAX_FRAGMENT_LEN + 1));
        assert_eq!(err.kind(), ErrorKind::LengthPolicyViolation);
    }

    #[test]
    fn test_record_decode_tolerates_oversize() {
        let len = MAX_FRAGMENT_LEN + 1;
        let mut bytes = vec![23, 3, 3, (len >> 8) as u8, (len & 0xff) as u8];
        bytes.resize(RECORD_HEADER_LEN + len, 0);
        let (decoded, _) = TLSPlaintext::decode(&bytes).unwrap();
        assert_eq!(decoded.length(), len);
    }

    #[test]
    fn test_record_truncated() {
        let err = TLSPlaintext::decode(&[22, 3, 3, 0]).unwrap_err();
        assert!(err.is_recoverable());

        let err = TLSPlaintext::decode(&[22, 3, 3, 0, 4, 1, 0]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Truncated);
    }

    #[test]
    fn test_record_unknown_content_type() {
        let err = TLSPlaintext::decode(&[0x63, 3, 3, 0, 0]).unwrap_err();
        assert_eq!(err, Error::UnknownContentType(0x63));
        assert_eq!(err.kind(), ErrorKind::UnknownDiscriminant);
    }

    #[test]
    fn test_record_unknown_version() {
        let err = TLSPlaintext::decode(&[22, 3, 9, 0, 0]).unwrap_err();
        assert_eq!(err, Error::UnknownVersion(3, 9));
    }

    #[test]
    fn test_protocol_version_u16() {
        assert_eq!(u16::from(ProtocolVersion::Tls13), 0x0304);
        assert_eq!(ProtocolVersion::try_from(0x0301).unwrap(), ProtocolVersion::Tls10);
        assert!(ProtocolVersion::try_from(0x0a0a).is_err());
    }

    #[test]
    fn test_fragment_payload() {
        let payload = vec![7u8; MAX_FRAGMENT_LEN * 2 + 10];
        let records = TLSPlaintext::fragment_payload(ContentType::Handshake, &payload);
        assert_eq!(records.len(), 3);
        assert_eq!(records[2].length(), 10);
        assert!(records.iter().all(|r| r.validate().is_ok()));

        let records = TLSPlaintext::fragment_payload(ContentType::Handshake, &[]);
        assert_eq!(records.len(), 1);
        assert!(records[0].fragment.is_empty());
    }

    #[test]
    fn test_inner_plaintext_scan() {
        let inner = TLSInnerPlaintext::decode(b"\x01\x02\x16\x00\x00").unwrap();
        assert_eq!(inner.content, vec![0x01, 0x02]);
        assert_eq!(inner.content_type, ContentType::Handshake);
        assert_eq!(inner.zero_padding_length, 2);
        assert_eq!(inner.to_bytes(), b"\x01\x02\x16\x00\x00".to_vec());
    }

    #[test]
    fn test_inner_plaintext_skips_invalid_type_bytes() {
        // 0x63 is not a content type, so 0x17 is the boundary.
        let inner = TLSInnerPlaintext::decode(&[0xaa, 0x17, 0x63, 0x00]).unwrap();
        assert_eq!(inner.content, vec![0xaa]);
        assert_eq!(inner.content_type, ContentType::ApplicationData);
        assert_eq!(inner.zero_padding_length, 2);
    }

    #[test]
    fn test_inner_plaintext_no_padding() {
        let inner = TLSInnerPlaintext::decode(&[0x15]).unwrap();
        assert!(inner.content.is_empty());
        assert_eq!(inner.content_type, ContentType::Alert);
        assert_eq!(inner.zero_padding_length, 0);
    }

    #[test]
    fn test_inner_plaintext_no_content_type() {
        assert_eq!(
            TLSInnerPlaintext::decode(b"\x00\x00\x00"),
            Err(Error::NoContentTypeFound)
        );
        assert_eq!(TLSInnerPlaintext::decode(&[]), Err(Error::NoContentTypeFound));
        assert_eq!(
            TLSInnerPlaintext::decode(&[0x63, 0x00]),
            Err(Error::NoContentTypeFound)
        );
    }

    #[test]
    fn test_inner_plaintext_to_bytes() {
        let inner = TLSInnerPlaintext {
            content: b"hi".to_vec(),
            content_type: ContentType::ApplicationData,
            zero_padding_length: 3,
        };
        assert_eq!(inner.to_bytes(), vec![b'h', b'i', 23, 0, 0, 0]);
    }
}
