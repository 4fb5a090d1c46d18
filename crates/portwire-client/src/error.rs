use std::time::Duration;

use portwire_frame::FrameError;
use portwire_proto::{ProtoError, Response, Status, StatusCategory};
use portwire_transport::TransportError;

/// Errors surfaced by [`crate::Client`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// A connect, send or receive exceeded its timeout.
    #[error("connection timeout: {0}")]
    ConnectionTimeout(String),

    /// The socket failed, was closed by the daemon, or is not usable by
    /// this process.
    #[error("connection error: {0}")]
    Connection(String),

    /// The daemon answered with a failure status.
    #[error("{status}: {message}")]
    Protocol { status: Status, message: String },

    /// A bounded wait elapsed without a matching event.
    #[error("wait timed out after {0:?}")]
    WaitTimeout(Option<Duration>),

    /// A request could not be encoded or a reply could not be parsed.
    #[error(transparent)]
    Proto(#[from] ProtoError),

    /// A reply parsed fine but lacked the section its request asks for.
    #[error("{0} response carries no payload")]
    MissingPayload(&'static str),

    /// Configuration could not be loaded or is invalid.
    #[error("config error: {0}")]
    Config(String),
}

impl ClientError {
    pub(crate) fn from_transport(err: TransportError) -> Self {
        if err.is_timeout() {
            ClientError::ConnectionTimeout(err.to_string())
        } else {
            ClientError::Connection(err.to_string())
        }
    }

    pub(crate) fn from_frame(err: FrameError) -> Self {
        if err.is_timeout() {
            ClientError::ConnectionTimeout(err.to_string())
        } else {
            ClientError::Connection(err.to_string())
        }
    }

    /// True for faults that invalidated the connection.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ClientError::ConnectionTimeout(_) | ClientError::Connection(_)
        )
    }

    /// The daemon status, for protocol failures.
    pub fn status(&self) -> Option<Status> {
        match self {
            ClientError::Protocol { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Coarse failure category, for protocol failures.
    pub fn category(&self) -> Option<StatusCategory> {
        self.status().map(Status::category)
    }
}

/// Turn a non-success response into [`ClientError::Protocol`].
pub(crate) fn check_status(response: Response) -> Result<Response> {
    if response.is_success() {
        return Ok(response);
    }
    Err(ClientError::Protocol {
        status: response.status(),
        message: response.error_msg.unwrap_or_default(),
    })
}

pub type Result<T> = std::result::Result<T, ClientError>;
