//! The thinnest possible substitute for the out-of-scope transport: a unary
//! request/response exchange and a long-lived stream, both carried over
//! length-delimited framed connections on `ipc://` (Unix domain socket) or
//! `tcp://` URIs.

mod envelope;
mod listener;
mod session;

pub use envelope::Envelope;
pub use listener::Listener;
pub use session::Session;

use crate::error::{Error, Result};

/// A parsed `ipc://` or `tcp://` transport URI.
#[derive(Debug, Clone)]
pub enum Address {
    Ipc(String),
    Tcp(String, u16),
}

pub fn parse_uri(uri: &str) -> Result<Address> {
    if let Some(name) = uri.strip_prefix("ipc://") {
        if name.is_empty() {
            return Err(Error::Transport(format!("empty ipc:// path in {uri}")));
        }
        return Ok(Address::Ipc(name.to_string()));
    }
    if let Some(rest) = uri.strip_prefix("tcp://") {
        let (host, port) = rest
            .rsplit_once(':')
            .ok_or_else(|| Error::Transport(format!("missing port in {uri}")))?;
        let port: u16 = port
            .parse()
            .map_err(|_| Error::Transport(format!("invalid port in {uri}")))?;
        return Ok(Address::Tcp(host.to_string(), port));
    }
    Err(Error::Transport(format!("unsupported transport URI: {uri}")))
}

pub async fn connect(uri: &str) -> Result<Session> {
    match parse_uri(uri)? {
        Address::Ipc(path) => {
            let stream = tokio::net::UnixStream::connect(&path)
                .await
                .map_err(|e| Error::Transport(format!("connect {path}: {e}")))?;
            Ok(Session::new(Box::new(stream)))
        }
        Address::Tcp(host, port) => {
            let stream = tokio::net::TcpStream::connect((host.as_str(), port))
                .await
                .map_err(|e| Error::Transport(format!("connect {host}:{port}: {e}")))?;
            Ok(Session::new(Box::new(stream)))
        }
    }
}

pub async fn bind(uri: &str) -> Result<Listener> {
    match parse_uri(uri)? {
        Address::Ipc(path) => {
            let _ = std::fs::remove_file(&path);
            let listener = tokio::net::UnixListener::bind(&path)
                .map_err(|e| Error::Transport(format!("bind {path}: {e}")))?;
            Ok(Listener::Unix(listener))
        }
        Address::Tcp(host, port) => {
            let listener = tokio::net::TcpListener::bind((host.as_str(), port))
                .await
                .map_err(|e| Error::Transport(format!("bind {host}:{port}: {e}")))?;
            Ok(Listener::Tcp(listener))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ipc_uri() {
        match parse_uri("ipc://my-socket").unwrap() {
            Address::Ipc(name) => assert_eq!(name, "my-socket"),
            _ => panic!("expected Ipc"),
        }
    }

    #[test]
    fn parses_tcp_uri() {
        match parse_uri("tcp://127.0.0.1:9000").unwrap() {
            Address::Tcp(host, port) => {
                assert_eq!(host, "127.0.0.1");
                assert_eq!(port, 9000);
            }
            _ => panic!("expected Tcp"),
        }
    }

    #[test]
    fn rejects_unknown_scheme() {
        assert!(parse_uri("http://example.com").is_err());
    }
}
