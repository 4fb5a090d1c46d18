//! Wire envelopes exchanged with the daemon.
//!
//! Requests and responses are protobuf messages (proto2 field layout)
//! carried as opaque frame payloads. A response envelope doubles as the
//! push-notification carrier: when its `async_wait` field is set, the
//! frame is an unsolicited state-change event rather than the reply to
//! the pending request.

pub mod error;
pub mod messages;
pub mod status;
pub mod value;

pub use error::{ProtoError, Result};
pub use messages::{
    ContainerEvent, GetPropertyRequest, GetPropertyResponse, ListRequest, ListResponse, Request,
    RequestKind, Response, SetPropertyRequest, VersionRequest, VersionResponse, WaitRequest,
    WaitResponse,
};
pub use status::{Status, StatusCategory};
pub use value::PropertyValue;
