use anyhow::{bail, Context, Result};
use ring::rand::{SecureRandom, SystemRandom};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use tls13_codec::config::{usage, Config, ConfigError, Mode};
use tls13_codec::extensions::{KeyShare, ServerName, SupportedVersions};
use tls13_codec::session::Connection;
use tls13_codec::stream::{HandshakeDeframer, RecordDeframer};
use tls13_codec::transport::{TcpClient, TcpServer};
use tls13_codec::{
    ClientHello, ContentType, Extension, ExtensionRegistry, HandshakeMessage,
    HandshakeMessageRegistry, ProtocolVersion, ServerHello, TLSPlaintext, TLS13_CIPHER_SUITES,
};

fn init_logging(config: &Config) {
    // RUST_LOG wins over the configured level.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn hello_random(rng: &SystemRandom) -> Result<[u8; 32]> {
    let mut random = [0u8; 32];
    rng.fill(&mut random)
        .map_err(|e| anyhow::anyhow!("failed to generate hello random: {:?}", e))?;
    Ok(random)
}

/// Accept one connection, read its ClientHello and answer with a ServerHello.
async fn serve(config: &Config, rng: &SystemRandom) -> Result<()> {
    let server = TcpServer::bind(&config.host, config.port)
        .await
        .context("failed to start server")?;
    info!(addr = %server.local_addr()?, "listening");

    let (socket, _) = server.accept().await.context("failed to accept connection")?;
    let mut conn = Connection::with_recv_size(socket, config.recv_size);
    answer_client_hello(&mut conn, rng).await
}

/// Read one ClientHello from `conn` and reply with a ServerHello.
async fn answer_client_hello<S>(conn: &mut Connection<S>, rng: &SystemRandom) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let client_hello = match conn.read_handshake().await? {
        HandshakeMessage::ClientHello(hello) => hello,
        other => bail!("expected ClientHello, got {:?}", other.msg_type()),
    };
    info!(
        suites = ?client_hello.cipher_suites,
        extensions = client_hello.extensions.len(),
        tls13 = client_hello.offers_tls13(),
        "received ClientHello"
    );
    client_hello.validate().context("invalid ClientHello")?;

    // First offered suite we support, in the client's preference order.
    let selected_cipher_suite = client_hello
        .cipher_suites
        .iter()
        .copied()
        .find(|suite| TLS13_CIPHER_SUITES.contains(suite))
        .context("no supported TLS 1.3 cipher suite")?;

    let server_hello = ServerHello::new(
        hello_random(rng)?,
        client_hello.legacy_session_id.clone(),
        selected_cipher_suite,
        vec![Extension::SupportedVersions(SupportedVersions::Selected(
            ProtocolVersion::Tls13.into(),
        ))],
    );
    server_hello.validate()?;
    conn.write_handshake(&HandshakeMessage::ServerHello(server_hello))
        .await?;
    info!(
        cipher_suite = format_args!("0x{selected_cipher_suite:04x}"),
        "sent ServerHello"
    );
    Ok(())
}

/// Send a ClientHello and decode whatever ServerHello comes back.
async fn connect(config: &Config, rng: &SystemRandom) -> Result<()> {
    let mut client = TcpClient::new();
    client.connect(&config.host, config.port).await?;

    let hello = ClientHello::new(
        hello_random(rng)?,
        TLS13_CIPHER_SUITES.to_vec(),
        vec![
            Extension::ServerName(vec![ServerName::host_name(config.sni())]),
            Extension::SupportedVersions(SupportedVersions::Offered(vec![
                ProtocolVersion::Tls13.into(),
            ])),
            Extension::SupportedGroups(vec![0x001d, 0x0017]),
            Extension::SignatureAlgorithms(vec![0x0403, 0x0804, 0x0401]),
            Extension::PskKeyExchangeModes(vec![1]),
            // Empty client_shares asks the server for a HelloRetryRequest.
            Extension::KeyShare(KeyShare::ClientShares(Vec::new())),
        ],
    );
    hello.validate()?;

    let bytes = HandshakeMessage::ClientHello(hello).encode()?;
    let mut record = TLSPlaintext::new(ContentType::Handshake, bytes);
    record.legacy_record_version = ProtocolVersion::Tls10;
    client.send(&record.encode()?).await?;
    debug!(len = record.length(), "sent ClientHello");

    let mut records = RecordDeframer::new();
    let mut handshakes = HandshakeDeframer::new();
    loop {
        while let Some(record) = records.next_record()? {
            match record.content_type {
                ContentType::Handshake => handshakes.push_fragment(&record.fragment),
                other => bail!("unexpected {:?} record", other),
            }
        }
        if let Some(message) = handshakes.next_message()? {
            match message {
                HandshakeMessage::ServerHello(server_hello) => {
                    info!(
                        cipher_suite = format_args!("0x{:04x}", server_hello.cipher_suite),
                        version = ?server_hello.selected_version(),
                        hello_retry = server_hello.is_hello_retry_request(),
                        "received ServerHello"
                    );
                }
                other => info!(msg_type = ?other.msg_type(), "received handshake message"),
            }
            break;
        }

        let data = client.receive(config.recv_size).await?;
        if data.is_empty() {
            bail!("connection closed before ServerHello");
        }
        records.push(&data);
    }

    client.close().await?;
    Ok(())
}

/// Returns false when either registry was frozen before this call.
fn install_registries() -> bool {
    let mut fresh = true;
    if ExtensionRegistry::install(ExtensionRegistry::with_defaults()).is_err() {
        warn!("extension registry was already frozen");
        fresh = false;
    }
    if HandshakeMessageRegistry::install(HandshakeMessageRegistry::with_defaults()).is_err() {
        warn!("handshake message registry was already frozen");
        fresh = false;
    }
    fresh
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = match Config::load() {
        Ok(config) => config,
        Err(ConfigError::HelpRequested) => {
            println!("{}", usage());
            return Ok(());
        }
        Err(e) => {
            eprintln!("{e}\n\n{}", usage());
            std::process::exit(2);
        }
    };
    init_logging(&config);

    // Freeze both registries before any bytes are decoded.
    install_registries();

    let rng = SystemRandom::new();
    match config.mode {
        Mode::Serve => serve(&config, &rng).await,
        Mode::Connect => connect(&config, &rng).await,
    }
}
