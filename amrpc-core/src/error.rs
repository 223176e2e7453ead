use thiserror::Error;

/// All error types produced by amrpc-core.
///
/// Maps to the status/reason contract of the RPC dispatcher and the
/// conversion matrix: every variant here is one of the kinds a
/// `RemoteFunction` or `Data::view` call can surface.
#[derive(Debug, Error)]
pub enum Error {
    /// No RPC registration exists at the requested method path (a 404).
    #[error("remote method not found")]
    NotFound,

    /// The server returned a 500; `reason` is the body's error message.
    #[error("server error: {reason}")]
    ServerError { reason: String },

    /// A `Data::view` conversion was attempted between non-convertible
    /// forms, or a conversion that should succeed failed partway.
    #[error("Data cannot be converted: {0}")]
    DataConvertible(String),

    /// A MessagePack unpack failure while dispatching a typed callback.
    #[error("bad rpc request: {0}")]
    BadRequest(String),

    /// The underlying transport failed (connect, read, write, framing).
    #[error("transport error: {0}")]
    Transport(String),

    /// An HTTP-ish status code this client doesn't know how to interpret.
    #[error("unknown status: {0}")]
    UnknownStatus(u16),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Transport(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formatting() {
        assert_eq!(Error::NotFound.to_string(), "remote method not found");
        assert_eq!(
            Error::ServerError {
                reason: "boom".into()
            }
            .to_string(),
            "server error: boom"
        );
        assert_eq!(Error::UnknownStatus(418).to_string(), "unknown status: 418");
    }

    #[test]
    fn io_error_converts_to_transport() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broke");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Transport(_)));
    }
}
