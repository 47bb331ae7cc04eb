//! Runtime configuration for the `tls13-codec` binary.
//!
//! Values come from, in increasing precedence: built-in defaults,
//! `TLS13_CODEC_*` environment variables, then command-line flags.

use thiserror::Error;

use crate::session::DEFAULT_RECV_SIZE;

pub const ENV_HOST: &str = "TLS13_CODEC_HOST";
pub const ENV_PORT: &str = "TLS13_CODEC_PORT";
pub const ENV_LOG_LEVEL: &str = "TLS13_CODEC_LOG_LEVEL";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing value for {0}")]
    MissingValue(String),

    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: String, value: String },

    #[error("unknown argument: {0}")]
    UnknownArgument(String),

    #[error("help requested")]
    HelpRequested,

    #[error("configuration validation failed: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Accept one connection, read a ClientHello, answer with a ServerHello.
    Serve,
    /// Send a ClientHello and print the ServerHello that comes back.
    Connect,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub mode: Mode,
    pub host: String,
    pub port: u16,
    pub recv_size: usize,
    pub log_level: String,
    /// SNI sent in `connect` mode; defaults to the host.
    pub server_name: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: Mode::Serve,
            host: "127.0.0.1".to_string(),
            port: 4433,
            recv_size: DEFAULT_RECV_SIZE,
            log_level: "info".to_string(),
            server_name: None,
        }
    }
}

fn parse_value<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        name: name.to_string(),
        value: value.to_string(),
    })
}

impl Config {
    /// Build a configuration from the process environment and arguments.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(std::env::args().skip(1), |key| std::env::var(key).ok())
    }

    pub fn load_from<I, F>(args: I, env: F) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = String>,
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        config.apply_env(env)?;
        config.apply_args(args)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env<F>(&mut self, env: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = env(ENV_HOST) {
            self.host = host;
        }
        if let Some(port) = env(ENV_PORT) {
            self.port = parse_value(ENV_PORT, &port)?;
        }
        if let Some(level) = env(ENV_LOG_LEVEL) {
            self.log_level = level;
        }
        Ok(())
    }

    fn apply_args<I>(&mut self, args: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            let mut value = |flag: &str| {
                args.next()
                    .ok_or_else(|| ConfigError::MissingValue(flag.to_string()))
            };
            match arg.as_str() {
                "serve" => self.mode = Mode::Serve,
                "connect" => self.mode = Mode::Connect,
                "--host" => self.host = value("--host")?,
                "-p" | "--port" => self.port = parse_value("--port", &value("--port")?)?,
                "--recv-size" => {
                    self.recv_size = parse_value("--recv-size", &value("--recv-size")?)?;
                }
                "--log-level" => self.log_level = value("--log-level")?,
                "--server-name" => self.server_name = Some(value("--server-name")?),
                "-h" | "--help" => return Err(ConfigError::HelpRequested),
                _ => return Err(ConfigError::UnknownArgument(arg.clone())),
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::Validation("port must be non-zero".into()));
        }
        if self.recv_size == 0 {
            return Err(ConfigError::Validation(
                "receive size must be non-zero".into(),
            ));
        }
        if self.host.is_empty() {
            return Err(ConfigError::Validation("host must not be empty".into()));
        }
        Ok(())
    }

    /// Name placed in the `server_name` extension.
    #[must_use]
    pub fn sni(&self) -> &str {
        self.server_name.as_deref().unwrap_or(&self.host)
    }
}

pub fn usage() -> String {
    format!(
        r#"tls13-codec v{}

TLS 1.3 record and handshake codec demo.

USAGE:
    tls13-codec [serve|connect] [OPTIONS]

OPTIONS:
    --host <HOST>           Address to bind or connect to [default: 127.0.0.1]
    -p, --port <PORT>       Port [default: 4433]
    --recv-size <BYTES>     Transport read size [default: {}]
    --log-level <LEVEL>     trace, debug, info, warn, error [default: info]
    --server-name <NAME>    SNI for connect mode [default: host]
    -h, --help              Print help information

ENVIRONMENT:
    {ENV_HOST}       Override host
    {ENV_PORT}       Override port
    {ENV_LOG_LEVEL}  Override log level
"#,
        crate::VERSION,
        DEFAULT_RECV_SIZE,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults() {
        let config = Config::load_from(Vec::new(), no_env).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.port, 4433);
        assert_eq!(config.sni(), "127.0.0.1");
    }

    #[test]
    fn test_args() {
        let config = Config::load_from(
            args(&[
                "connect",
                "--host",
                "localhost",
                "-p",
                "8443",
                "--recv-size",
                "512",
                "--server-name",
                "example.com",
            ]),
            no_env,
        )
        .unwrap();
        assert_eq!(config.mode, Mode::Connect);
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 8443);
        assert_eq!(config.recv_size, 512);
        assert_eq!(config.sni(), "example.com");
    }

    #[test]
    fn test_env_then_args() {
        let env = |key: &str| match key {
            ENV_PORT => Some("9000".to_string()),
            ENV_LOG_LEVEL => Some("debug".to_string()),
            _ => None,
        };
        let config = Config::load_from(Vec::new(), env).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.log_level, "debug");

        let config = Config::load_from(args(&["--port", "9001"]), env).unwrap();
        assert_eq!(config.port, 9001);
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            Config::load_from(args(&["--port"]), no_env),
            Err(ConfigError::MissingValue("--port".into()))
        );
        assert_eq!(
            Config::load_from(args(&["--port", "http"]), no_env),
            Err(ConfigError::InvalidValue {
                name: "--port".into(),
                value: "http".into()
            })
        );
        assert_eq!(
            Config::load_from(args(&["--bogus"]), no_env),
            Err(ConfigError::UnknownArgument("--bogus".into()))
        );
        assert_eq!(
            Config::load_from(args(&["-h"]), no_env),
            Err(ConfigError::HelpRequested)
        );
        assert!(matches!(
            Config::load_from(args(&["--port", "0"]), no_env),
            Err(ConfigError::Validation(_))
        ));
    }
}
