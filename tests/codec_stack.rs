//! End-to-end checks across the record, handshake and extension layers.

use tls13_codec::extensions::{KeyShare, KeyShareEntry, ServerName, SupportedVersions};
use tls13_codec::stream::{HandshakeDeframer, RecordDeframer};
use tls13_codec::{
    ClientHello, ContentType, EncryptedExtensions, Error, ErrorKind, Extension, ExtensionType,
    HandshakeMessage, ProtocolVersion, ServerHello, TLSInnerPlaintext, TLSPlaintext,
};

fn browser_like_client_hello() -> ClientHello {
    let mut hello = ClientHello::new(
        [0x0c; 32],
        vec![0x5a5a, 0x1301, 0x1302, 0x1303, 0xc02b, 0xc02f],
        vec![
            Extension::Opaque {
                extension_type: ExtensionType::Unknown(0x3a3a),
                data: Vec::new(),
            },
            Extension::ServerName(vec![ServerName::host_name("www.example.org")]),
            Extension::SupportedGroups(vec![0x2a2a, 0x001d, 0x0017, 0x0018]),
            Extension::SignatureAlgorithms(vec![0x0403, 0x0804, 0x0401, 0x0503]),
            Extension::Alpn(vec![b"h2".to_vec(), b"http/1.1".to_vec()]),
            Extension::PskKeyExchangeModes(vec![1]),
            Extension::SupportedVersions(SupportedVersions::Offered(vec![
                0x7a7a, 0x0304, 0x0303,
            ])),
            Extension::KeyShare(KeyShare::ClientShares(vec![
                KeyShareEntry {
                    group: 0x2a2a,
                    key_exchange: vec![0],
                },
                KeyShareEntry {
                    group: 0x001d,
                    key_exchange: (0..32).collect(),
                },
            ])),
            Extension::Opaque {
                extension_type: ExtensionType::Padding,
                data: vec![0; 200],
            },
        ],
    );
    hello.legacy_session_id = (0..32).rev().collect();
    hello
}

#[test]
fn client_hello_survives_record_and_handshake_layers() {
    let hello = browser_like_client_hello();
    assert!(hello.validate().is_ok());
    assert!(hello.offers_tls13());

    let message = HandshakeMessage::ClientHello(hello);
    let handshake_bytes = message.encode().unwrap();
    let record = TLSPlaintext::new(ContentType::Handshake, handshake_bytes.clone());
    let wire = record.encode().unwrap();

    let (decoded_record, rest) = TLSPlaintext::decode(&wire).unwrap();
    assert!(rest.is_empty());
    assert_eq!(decoded_record.fragment, handshake_bytes);

    let (decoded, rest) = HandshakeMessage::decode(&decoded_record.fragment).unwrap();
    assert!(rest.is_empty());
    assert_eq!(decoded, message);
    assert_eq!(decoded.encode().unwrap(), handshake_bytes);
}

#[test]
fn deframing_works_for_every_chunk_size() {
    let hello = HandshakeMessage::ClientHello(browser_like_client_hello());
    let mut ee = EncryptedExtensions::new();
    ee.add_extension(Extension::Alpn(vec![b"h2".to_vec()]));
    let ee = HandshakeMessage::EncryptedExtensions(ee);

    // Both messages in one handshake stream, split across two records at an
    // arbitrary point inside the first message.
    let mut stream = hello.encode().unwrap();
    stream.extend(ee.encode().unwrap());
    let (a, b) = stream.split_at(100);
    let mut wire = TLSPlaintext::new(ContentType::Handshake, a.to_vec())
        .encode()
        .unwrap();
    wire.extend(
        TLSPlaintext::new(ContentType::Handshake, b.to_vec())
            .encode()
            .unwrap(),
    );

    for chunk_size in [1, 2, 3, 5, 64, 333, wire.len()] {
        let mut records = RecordDeframer::new();
        let mut handshakes = HandshakeDeframer::new();
        let mut messages = Vec::new();

        for chunk in wire.chunks(chunk_size) {
            records.push(chunk);
            while let Some(record) = records.next_record().unwrap() {
                assert_eq!(record.content_type, ContentType::Handshake);
                handshakes.push_fragment(&record.fragment);
                while let Some(message) = handshakes.next_message().unwrap() {
                    messages.push(message);
                }
            }
        }

        assert_eq!(messages, vec![hello.clone(), ee.clone()], "chunk size {chunk_size}");
        assert_eq!(records.buffered(), 0);
        assert!(handshakes.is_empty());
    }
}

#[test]
fn server_hello_record_layout() {
    let hello = ServerHello::new(
        [0xee; 32],
        vec![0xab; 32],
        0x1301,
        vec![Extension::SupportedVersions(SupportedVersions::Selected(
            ProtocolVersion::Tls13.into(),
        ))],
    );
    let body_len = 2 + 32 + 1 + 32 + 2 + 1 + 2 + 6;
    let bytes = HandshakeMessage::ServerHello(hello).encode().unwrap();
    assert_eq!(bytes.len(), 4 + body_len);
    assert_eq!(&bytes[..4], &[0x02, 0x00, 0x00, body_len as u8]);
    assert_eq!(&bytes[bytes.len() - 6..], &[0x00, 0x2b, 0x00, 0x02, 0x03, 0x04]);

    let wire = TLSPlaintext::new(ContentType::Handshake, bytes).encode().unwrap();
    assert_eq!(&wire[..5], &[0x16, 0x03, 0x03, 0x00, (4 + body_len) as u8]);
}

#[test]
fn inner_plaintext_wraps_handshake_message() {
    let finished = HandshakeMessage::decode(&[20, 0, 0, 2, 0xaa, 0xbb]).unwrap().0;
    let inner = TLSInnerPlaintext {
        content: finished.encode().unwrap(),
        content_type: ContentType::Handshake,
        zero_padding_length: 7,
    };
    let bytes = inner.to_bytes();
    assert_eq!(bytes.len(), 6 + 1 + 7);

    let decoded = TLSInnerPlaintext::decode(&bytes).unwrap();
    assert_eq!(decoded, inner);
    assert_eq!(HandshakeMessage::decode(&decoded.content).unwrap().0, finished);
}

#[test]
fn errors_are_classified() {
    let err = TLSPlaintext::decode(&[0x63, 0x03, 0x03, 0x00, 0x00]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownDiscriminant);

    let err = TLSPlaintext::new(ContentType::ApplicationData, vec![0; 16385])
        .encode()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LengthPolicyViolation);

    let err = HandshakeMessage::decode(&[15, 0, 0, 0]).unwrap_err();
    assert!(matches!(err, Error::NoHandlerRegistered(_)));
    assert!(!err.is_recoverable());

    let err = HandshakeMessage::decode(&[1, 0, 0, 40]).unwrap_err();
    assert!(err.is_recoverable());
}
