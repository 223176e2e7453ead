use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_stream::StreamExt;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::error::{Error, Result};

use super::envelope::Envelope;

/// Unifies `UnixStream` and `TcpStream` behind one dynamically dispatched
/// duplex, so `Session` doesn't need to be generic over the transport kind.
pub trait AsyncDuplex: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> AsyncDuplex for T {}

/// One open connection: a unary request/response exchange or a long-lived
/// stream, depending on which side is driving it. Mirrors `ecv::net::Session`
/// (`is_open` / `read` / `write` / `close`).
pub struct Session {
    framed: Framed<Box<dyn AsyncDuplex>, LengthDelimitedCodec>,
    open: bool,
}

impl Session {
    pub fn new(stream: Box<dyn AsyncDuplex>) -> Self {
        Session {
            framed: Framed::new(stream, LengthDelimitedCodec::new()),
            open: true,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Read one envelope. Returns `Ok(None)` on clean peer close.
    pub async fn read(&mut self) -> Result<Option<Envelope>> {
        match self.framed.next().await {
            Some(Ok(frame)) => {
                let envelope: Envelope = serde_json::from_slice(&frame)
                    .map_err(|e| Error::Transport(format!("malformed frame: {e}")))?;
                Ok(Some(envelope))
            }
            Some(Err(e)) => {
                self.open = false;
                Err(Error::Transport(e.to_string()))
            }
            None => {
                self.open = false;
                Ok(None)
            }
        }
    }

    pub async fn write(&mut self, envelope: &Envelope) -> Result<()> {
        use futures_util::SinkExt as _;
        let json = serde_json::to_vec(envelope)
            .map_err(|e| Error::Transport(format!("failed to encode envelope: {e}")))?;
        self.framed.send(Bytes::from(json)).await.map_err(|e| {
            self.open = false;
            Error::Transport(e.to_string())
        })
    }

    pub async fn close(&mut self) -> Result<()> {
        self.open = false;
        self.framed
            .get_mut()
            .shutdown()
            .await
            .map_err(Error::from)
    }
}
