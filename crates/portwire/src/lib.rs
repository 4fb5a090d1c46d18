//! Client transport for the container daemon's RPC protocol.
//!
//! The daemon listens on a Unix stream socket (`/run/portod.socket` by
//! default) and exchanges varint length-prefixed protobuf frames. Calls are
//! strictly serialized on one connection; push notifications for a
//! subscription may arrive in front of any reply.
//!
//! # Crate Structure
//!
//! - [`transport`] - Unix socket connect, listener and peer credentials
//! - [`frame`] - Varint length-prefixed framing (blocking, and async behind `async`)
//! - [`proto`] - Request/response envelopes, status codes, property values
//! - [`client`] - Connection lifecycle, call dispatch and push routing (behind `client` feature)
//!
//! ```no_run
//! use portwire::client::{Client, ClientConfig};
//!
//! let client = Client::new(ClientConfig::default());
//! let (tag, revision) = client.version()?;
//! println!("daemon {tag} ({revision})");
//! # Ok::<(), portwire::client::ClientError>(())
//! ```

/// Re-export transport types.
pub mod transport {
    pub use portwire_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use portwire_frame::*;
}

/// Re-export wire envelope types.
pub mod proto {
    pub use portwire_proto::*;
}

/// Re-export client types (requires `client` feature).
#[cfg(feature = "client")]
pub mod client {
    pub use portwire_client::*;
}
