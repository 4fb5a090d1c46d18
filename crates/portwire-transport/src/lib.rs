//! Unix domain stream socket plumbing for portwire.
//!
//! This is the lowest layer of portwire. It opens close-on-exec stream
//! sockets to the daemon's well-known path and exposes the timeout knobs
//! the upper layers need. A small listener type is provided as well so
//! tests and local tools can stand up a daemon-side endpoint.

pub mod error;

#[cfg(unix)]
pub mod stream;
#[cfg(unix)]
pub mod uds;

pub use error::{Result, TransportError};

#[cfg(unix)]
pub use stream::{IpcStream, PeerCredentials};
#[cfg(unix)]
pub use uds::{connect, LocalListener, DEFAULT_SOCKET_PATH};
