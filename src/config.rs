//! Command line configuration
//!
//! The server takes an optional port; the client takes either nothing or
//! a username, host and port.

use std::net::SocketAddr;
use std::path::PathBuf;

use rand::Rng;

use crate::error::AppError;
use crate::types::Username;

/// Default TCP port for both server and client
pub const DEFAULT_PORT: u16 = 4615;

/// Default listen backlog, i.e. how many connections may queue at once
pub const DEFAULT_BACKLOG: u32 = 16;

/// Default server bind address
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default host the client connects to
pub const DEFAULT_CLIENT_HOST: &str = "127.0.0.1";

/// Default append-only log file
pub const DEFAULT_LOG_FILE: &str = "server.log";

/// Server settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub backlog: u32,
    pub log_file: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            backlog: DEFAULT_BACKLOG,
            log_file: Some(PathBuf::from(DEFAULT_LOG_FILE)),
        }
    }
}

impl ServerConfig {
    /// Build from positional arguments (program name already stripped)
    pub fn from_args<I>(args: I) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = String>,
    {
        let args: Vec<String> = args.into_iter().collect();
        let mut config = Self::default();
        match args.as_slice() {
            [] => {}
            [port] => config.port = parse_port(port)?,
            _ => {
                return Err(AppError::Usage(format!(
                    "{} arguments provided instead of 1.",
                    args.len()
                )))
            }
        }
        Ok(config)
    }

    /// Socket address to listen on
    pub fn bind_addr(&self) -> Result<SocketAddr, AppError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| AppError::Usage(format!("invalid bind address {}: {}", self.host, e)))
    }
}

/// Client settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub username: Username,
    pub host: String,
    pub port: u16,
}

impl ClientConfig {
    /// Build from positional arguments (program name already stripped)
    ///
    /// With no arguments a random 4-digit username is generated.
    pub fn from_args<I>(args: I) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = String>,
    {
        let args: Vec<String> = args.into_iter().collect();
        match args.as_slice() {
            [] => Ok(Self {
                username: Username::parse(random_username())?,
                host: DEFAULT_CLIENT_HOST.to_string(),
                port: DEFAULT_PORT,
            }),
            [username, host, port] => {
                let port = parse_port(port)?;
                Ok(Self {
                    username: Username::parse(username.as_str())?,
                    host: host.clone(),
                    port,
                })
            }
            _ => Err(AppError::Usage(format!(
                "{} argument(s) provided instead of 3.",
                args.len()
            ))),
        }
    }

    /// `host:port` string for `TcpStream::connect`
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_port(port: &str) -> Result<u16, AppError> {
    port.parse()
        .map_err(|_| AppError::Usage(format!("the specified port {:?} is not an integer.", port)))
}

fn random_username() -> String {
    format!("{:04}", rand::thread_rng().gen_range(0..10_000))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_server_defaults() {
        let config = ServerConfig::from_args(args(&[])).unwrap();
        assert_eq!(config.port, 4615);
        assert_eq!(config.backlog, 16);
        assert_eq!(config.bind_addr().unwrap().port(), 4615);
    }

    #[test]
    fn test_server_port_argument() {
        let config = ServerConfig::from_args(args(&["5000"])).unwrap();
        assert_eq!(config.port, 5000);
    }

    #[test]
    fn test_server_too_many_arguments() {
        let err = ServerConfig::from_args(args(&["5000", "extra"])).unwrap_err();
        assert!(matches!(err, AppError::Usage(msg) if msg == "2 arguments provided instead of 1."));
    }

    #[test]
    fn test_server_non_numeric_port() {
        let err = ServerConfig::from_args(args(&["port"])).unwrap_err();
        assert!(matches!(err, AppError::Usage(_)));
    }

    #[test]
    fn test_client_defaults_generate_name() {
        let config = ClientConfig::from_args(args(&[])).unwrap();
        assert_eq!(config.username.as_str().len(), 4);
        assert!(config.username.as_str().chars().all(|c| c.is_ascii_digit()));
        assert_eq!(config.server_addr(), "127.0.0.1:4615");
    }

    #[test]
    fn test_client_three_arguments() {
        let config = ClientConfig::from_args(args(&["alice", "localhost", "4000"])).unwrap();
        assert_eq!(config.username.as_str(), "alice");
        assert_eq!(config.server_addr(), "localhost:4000");
    }

    #[test]
    fn test_client_rejects_bad_name_before_connecting() {
        let err = ClientConfig::from_args(args(&["al", "localhost", "4000"])).unwrap_err();
        assert!(matches!(err, AppError::NameInvalid(_)));
    }

    #[test]
    fn test_client_wrong_argument_count() {
        let err = ClientConfig::from_args(args(&["alice"])).unwrap_err();
        assert!(matches!(err, AppError::Usage(_)));
    }
}
