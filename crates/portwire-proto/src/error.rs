/// Errors raised while building or parsing envelopes.
#[derive(Debug, thiserror::Error)]
pub enum ProtoError {
    /// The payload is not a valid response envelope.
    #[error("malformed response: {0}")]
    Decode(#[from] prost::DecodeError),

    /// A request envelope without any command set.
    #[error("request carries no command")]
    EmptyRequest,
}

pub type Result<T> = std::result::Result<T, ProtoError>;
