use std::path::PathBuf;

/// Errors that can occur while opening or using the daemon socket.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to connect to the daemon socket.
    #[error("failed to connect to {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to bind a listening socket.
    #[error("failed to bind to {path}: {source}")]
    Bind {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on an established stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The socket path does not fit in `sockaddr_un`.
    #[error("socket path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },
}

impl TransportError {
    /// The underlying I/O error, if any.
    pub fn io_source(&self) -> Option<&std::io::Error> {
        match self {
            TransportError::Connect { source, .. } | TransportError::Bind { source, .. } => {
                Some(source)
            }
            TransportError::Accept(err) | TransportError::Io(err) => Some(err),
            TransportError::PathTooLong { .. } => None,
        }
    }

    /// True when the failure was a socket timeout.
    pub fn is_timeout(&self) -> bool {
        self.io_source().is_some_and(|err| {
            matches!(
                err.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
            )
        })
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
