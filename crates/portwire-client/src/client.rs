use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use bytes::Bytes;
use portwire_frame::encode_to_bytes;
use portwire_proto::{Request, Response};
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::connection::{Connection, ConnectionState, PidSource};
use crate::error::{check_status, Result};
use crate::push::Subscription;

/// How long a single call may wait for its reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallTimeout {
    /// The connection's default timeout.
    #[default]
    Default,
    /// The default timeout plus this much.
    Extended(Duration),
    /// Wait for the reply indefinitely.
    Unbounded,
}

impl CallTimeout {
    /// Map an optional extra timeout: `None` waits forever, zero keeps the
    /// default.
    pub fn extra(extra: Option<Duration>) -> Self {
        match extra {
            None => CallTimeout::Unbounded,
            Some(extra) if extra.is_zero() => CallTimeout::Default,
            Some(extra) => CallTimeout::Extended(extra),
        }
    }
}

impl From<Duration> for CallTimeout {
    fn from(extra: Duration) -> Self {
        CallTimeout::extra(Some(extra))
    }
}

/// Thread-safe daemon client.
///
/// Calls from any number of threads are serialized on one connection: a
/// call holds the lock from the moment its request is written until its
/// reply has been read. Share it through an `Arc`.
pub struct Client {
    inner: Mutex<Connection>,
}

impl Client {
    /// Create a client. No connection is made until the first call (or an
    /// explicit [`Client::connect`]).
    pub fn new(config: ClientConfig) -> Self {
        Self::from_connection(Connection::new(config))
    }

    /// Create a client whose ownership check uses `pid_source` instead of
    /// the real process id.
    pub fn with_pid_source(config: ClientConfig, pid_source: PidSource) -> Self {
        Self::from_connection(Connection::new(config).with_pid_source(pid_source))
    }

    fn from_connection(connection: Connection) -> Self {
        Self {
            inner: Mutex::new(connection),
        }
    }

    /// Lock the connection. A lock poisoned by a panicking push callback
    /// is recovered with the connection dropped, since the stream position
    /// is unknown.
    fn lock(&self) -> MutexGuard<'_, Connection> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("client lock poisoned; dropping connection");
                let mut guard = poisoned.into_inner();
                guard.invalidate();
                self.inner.clear_poison();
                guard
            }
        }
    }

    pub fn connect(&self) -> Result<()> {
        self.lock().connect()
    }

    pub fn disconnect(&self) {
        self.lock().disconnect();
    }

    pub fn connected(&self) -> bool {
        self.lock().is_connected()
    }

    pub fn state(&self) -> ConnectionState {
        self.lock().state()
    }

    pub fn timeout(&self) -> Duration {
        self.lock().timeout()
    }

    pub fn set_timeout(&self, timeout: Duration) -> Result<()> {
        self.lock().set_timeout(timeout)
    }

    pub fn disk_timeout(&self) -> Duration {
        self.lock().disk_timeout()
    }

    pub fn set_disk_timeout(&self, disk_timeout: Duration) {
        self.lock().set_disk_timeout(disk_timeout);
    }

    pub fn auto_reconnect(&self) -> bool {
        self.lock().auto_reconnect()
    }

    pub fn set_auto_reconnect(&self, auto_reconnect: bool) {
        self.lock().set_auto_reconnect(auto_reconnect);
    }

    /// Send `request` and wait for its reply.
    ///
    /// Push notifications that arrive first are routed to the subscription
    /// sink. A non-success status becomes [`crate::ClientError::Protocol`]
    /// and leaves the connection intact.
    pub fn call(&self, request: &Request, timeout: CallTimeout) -> Result<Response> {
        let frame = encode(request)?;
        debug!(kind = ?request.kind(), ?timeout, "call");
        let response = self.lock().dispatch(&frame, timeout)?;
        check_status(response)
    }

    /// [`Client::call`] with the disk timeout added on top of the default.
    pub fn call_disk_bound(&self, request: &Request) -> Result<Response> {
        let extra = self.disk_timeout();
        self.call(request, CallTimeout::extra(Some(extra)))
    }

    /// Register `subscription`, replacing any previous one, and announce it
    /// to the daemon. It is replayed automatically on every reconnect.
    pub fn subscribe(&self, subscription: Subscription) -> Result<()> {
        let frame = encode(&subscription.request())?;
        debug!(names = ?subscription.names(), labels = ?subscription.labels(), "subscribe");

        let mut conn = self.lock();
        conn.set_subscription(Some(subscription));
        if conn.auto_reconnect() && !conn.is_owned() {
            // A fresh connection replays the stored subscription itself.
            return conn.connect();
        }
        let response = conn.dispatch(&frame, CallTimeout::Default)?;
        drop(conn);
        check_status(response).map(drop)
    }

    /// Forget the subscription and tell the daemon to stop sending events.
    pub fn unsubscribe(&self) -> Result<()> {
        let frame = encode(&Request::async_wait(portwire_proto::WaitRequest::new(
            Vec::<String>::new(),
        )))?;

        let mut conn = self.lock();
        conn.set_subscription(None);
        if !conn.is_owned() {
            // A new connection starts without a subscription.
            return Ok(());
        }
        let response = conn.dispatch(&frame, CallTimeout::Default)?;
        drop(conn);
        debug!("unsubscribed");
        check_status(response).map(drop)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").field("state", &self.state()).finish()
    }
}

fn encode(request: &Request) -> Result<Bytes> {
    Ok(encode_to_bytes(&request.to_payload()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extra_timeout_mapping() {
        assert_eq!(CallTimeout::extra(None), CallTimeout::Unbounded);
        assert_eq!(
            CallTimeout::extra(Some(Duration::ZERO)),
            CallTimeout::Default
        );
        assert_eq!(
            CallTimeout::from(Duration::from_secs(2)),
            CallTimeout::Extended(Duration::from_secs(2))
        );
        assert_eq!(CallTimeout::default(), CallTimeout::Default);
    }

    #[test]
    fn client_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Client>();
    }

    #[test]
    fn empty_request_fails_before_touching_the_socket() {
        let client = Client::new(ClientConfig::new("/nonexistent/portwire.sock"));
        let err = client
            .call(&Request::default(), CallTimeout::Default)
            .unwrap_err();
        assert!(matches!(err, crate::ClientError::Proto(_)));
        assert!(!client.connected());
    }

    #[test]
    fn unsubscribe_while_disconnected_is_local() {
        let client = Client::new(ClientConfig::new("/nonexistent/portwire.sock"));
        client.unsubscribe().unwrap();
    }
}
