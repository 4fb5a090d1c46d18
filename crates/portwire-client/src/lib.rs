//! Client side of the daemon RPC protocol.
//!
//! One [`Client`] owns one stream connection. Calls are strictly
//! serialized: the protocol has no request identifiers, so a reply is
//! matched to its request purely by order, and at most one request may be
//! on the wire at a time. Push notifications for a registered
//! [`Subscription`] may arrive in front of any reply; they are handed to
//! the subscription's [`PushSink`] and the wait for the reply continues.

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
mod ops;
pub mod push;

pub use client::{CallTimeout, Client};
pub use config::ClientConfig;
pub use connection::{Connection, ConnectionState, PidSource};
pub use error::{ClientError, Result};
pub use push::{PushSink, Subscription};

pub use portwire_proto::{ContainerEvent, PropertyValue, Request, Response, Status, StatusCategory};
