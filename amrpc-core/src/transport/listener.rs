use crate::error::{Error, Result};

use super::session::Session;

/// A bound endpoint, accepting new connections as `Session`s.
pub enum Listener {
    Unix(tokio::net::UnixListener),
    Tcp(tokio::net::TcpListener),
}

impl Listener {
    pub async fn accept(&self) -> Result<Session> {
        match self {
            Listener::Unix(listener) => {
                let (stream, _addr) = listener
                    .accept()
                    .await
                    .map_err(|e| Error::Transport(format!("accept: {e}")))?;
                Ok(Session::new(Box::new(stream)))
            }
            Listener::Tcp(listener) => {
                let (stream, _addr) = listener
                    .accept()
                    .await
                    .map_err(|e| Error::Transport(format!("accept: {e}")))?;
                Ok(Session::new(Box::new(stream)))
            }
        }
    }
}
