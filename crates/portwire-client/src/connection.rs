use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use portwire_frame::{encode_to_bytes, FrameConfig, FrameReader, FrameWriter};
use portwire_proto::Response;
use portwire_transport::IpcStream;
use tracing::{debug, info, warn};

use crate::client::CallTimeout;
use crate::config::ClientConfig;
use crate::error::{check_status, ClientError, Result};
use crate::push::Subscription;

/// Source of the current process identity, compared against the identity
/// recorded at connect time. Defaults to [`std::process::id`].
pub type PidSource = Arc<dyn Fn() -> u32 + Send + Sync>;

/// Observable connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    /// Connected by the process with identity `owner`.
    Connected { owner: u32 },
}

struct Session {
    reader: FrameReader<IpcStream>,
    writer: FrameWriter<IpcStream>,
    owner: u32,
}

impl Session {
    fn set_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        // Reader and writer share one socket; one call covers both.
        self.writer
            .get_ref()
            .set_timeout(timeout)
            .map_err(ClientError::from_transport)
    }
}

/// One stream connection to the daemon plus the subscription that must be
/// re-established on every new connection.
///
/// `Connection` is not synchronized; [`crate::Client`] wraps it in a mutex
/// so send and receive of one call never interleave with another.
pub struct Connection {
    config: ClientConfig,
    session: Option<Session>,
    subscription: Option<Subscription>,
    pid_source: PidSource,
}

impl Connection {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            session: None,
            subscription: None,
            pid_source: Arc::new(std::process::id),
        }
    }

    /// Replace the process identity source.
    pub fn with_pid_source(mut self, pid_source: PidSource) -> Self {
        self.pid_source = pid_source;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        match &self.session {
            Some(session) => ConnectionState::Connected {
                owner: session.owner,
            },
            None => ConnectionState::Disconnected,
        }
    }

    /// A socket is held. Liveness is not checked.
    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// Connected, and by the current process.
    pub fn is_owned(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.owner == (self.pid_source)())
    }

    /// Open a fresh connection, replacing any existing one, and replay the
    /// subscription on it.
    pub fn connect(&mut self) -> Result<()> {
        self.open()
    }

    /// Close the socket if one is held.
    pub fn disconnect(&mut self) {
        if self.session.take().is_some() {
            debug!(path = %self.config.socket_path.display(), "disconnected");
        }
    }

    pub fn timeout(&self) -> Duration {
        self.config.timeout
    }

    /// Update the default timeout, applying it to the live socket if any.
    pub fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        if timeout.is_zero() {
            return Err(ClientError::Config("timeout must be positive".into()));
        }
        self.config.timeout = timeout;
        match &self.session {
            Some(session) => session.set_timeout(Some(timeout)),
            None => Ok(()),
        }
    }

    pub fn disk_timeout(&self) -> Duration {
        self.config.disk_timeout
    }

    pub fn set_disk_timeout(&mut self, disk_timeout: Duration) {
        self.config.disk_timeout = disk_timeout;
    }

    pub fn auto_reconnect(&self) -> bool {
        self.config.auto_reconnect
    }

    pub fn set_auto_reconnect(&mut self, auto_reconnect: bool) {
        self.config.auto_reconnect = auto_reconnect;
    }

    pub fn subscription(&self) -> Option<&Subscription> {
        self.subscription.as_ref()
    }

    /// Store (or clear) the subscription, returning the previous one. No
    /// traffic is generated.
    pub fn set_subscription(&mut self, subscription: Option<Subscription>) -> Option<Subscription> {
        std::mem::replace(&mut self.subscription, subscription)
    }

    /// Drop the session after a fault; the stream position is unknown.
    pub(crate) fn invalidate(&mut self) {
        if self.session.take().is_some() {
            debug!("connection invalidated");
        }
    }

    /// Send one encoded frame and return the next non-push response.
    ///
    /// Any transport fault or undecodable response invalidates the
    /// connection. Non-success statuses are returned as-is.
    pub(crate) fn dispatch(&mut self, frame: &[u8], timeout: CallTimeout) -> Result<Response> {
        let sent = self.prepare(frame)?;
        let result = self.exchange(frame, sent, timeout);
        if result.is_err() {
            self.invalidate();
        }
        result
    }

    /// Make sure a usable session exists. With auto-reconnect on a live
    /// session the frame is sent here, so a dead socket is noticed and
    /// replaced before the reply is awaited; returns whether it was sent.
    fn prepare(&mut self, frame: &[u8]) -> Result<bool> {
        let auto = self.config.auto_reconnect;
        let current = (self.pid_source)();

        let owner = match self.session.as_ref().map(|session| session.owner) {
            Some(owner) => owner,
            None if !auto => return Err(ClientError::Connection("not connected".into())),
            None => {
                self.open()?;
                return Ok(false);
            }
        };

        if owner != current {
            if !auto {
                return Err(ClientError::Connection(format!(
                    "connected by other process {owner}"
                )));
            }
            debug!(owner, current, "connection inherited from another process");
            self.open()?;
            return Ok(false);
        }

        if !auto {
            return Ok(false);
        }

        let Some(session) = self.session.as_mut() else {
            return Ok(false);
        };
        match session.writer.send_encoded(frame) {
            Ok(()) => Ok(true),
            Err(err) if err.is_timeout() => {
                self.invalidate();
                Err(ClientError::from_frame(err))
            }
            Err(err) => {
                warn!(error = %err, "send failed, reconnecting");
                self.open()?;
                Ok(false)
            }
        }
    }

    fn exchange(&mut self, frame: &[u8], sent: bool, timeout: CallTimeout) -> Result<Response> {
        let base = self.config.timeout;
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| ClientError::Connection("not connected".into()))?;

        if !sent {
            session
                .writer
                .send_encoded(frame)
                .map_err(ClientError::from_frame)?;
        }

        let effective = apply_timeout(base, timeout);
        let widened = effective != Some(base);
        if widened {
            session.set_timeout(effective)?;
        }

        let result = recv_response(session, self.subscription.as_mut());

        let restored = if widened {
            session.set_timeout(Some(base))
        } else {
            Ok(())
        };
        let response = result?;
        restored?;
        Ok(response)
    }

    fn open(&mut self) -> Result<()> {
        self.invalidate();

        let path = &self.config.socket_path;
        let stream = portwire_transport::connect(path, Some(self.config.timeout))
            .map_err(ClientError::from_transport)?;
        if let Some(peer) = stream.peer_credentials() {
            debug!(pid = peer.pid, uid = peer.uid, gid = peer.gid, "daemon peer credentials");
        }

        let reader = FrameReader::with_config(
            stream.try_clone().map_err(ClientError::from_transport)?,
            FrameConfig {
                max_payload_size: self.config.max_payload_size,
            },
        );
        let owner = (self.pid_source)();
        self.session = Some(Session {
            reader,
            writer: FrameWriter::new(stream),
            owner,
        });
        info!(path = %path.display(), owner, "connected");

        if let Err(err) = self.replay() {
            warn!(error = %err, "subscription replay failed");
            self.invalidate();
            return Err(err);
        }
        Ok(())
    }

    fn replay(&mut self) -> Result<()> {
        let Some(request) = self
            .subscription
            .as_ref()
            .and_then(Subscription::replay_request)
        else {
            return Ok(());
        };
        let frame = encode_to_bytes(&request.to_payload()?);
        check_status(self.exchange(&frame, false, CallTimeout::Default)?)?;
        debug!("subscription replayed");
        Ok(())
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("socket_path", &self.config.socket_path)
            .field("state", &self.state())
            .field("subscription", &self.subscription)
            .finish()
    }
}

/// Read frames until a reply arrives, routing push notifications on the
/// way.
fn recv_response(
    session: &mut Session,
    mut subscription: Option<&mut Subscription>,
) -> Result<Response> {
    loop {
        let payload = session
            .reader
            .read_frame()
            .map_err(ClientError::from_frame)?;
        let response = Response::from_payload(&payload)?;
        if !response.is_push() {
            return Ok(response);
        }
        let Some(event) = response.into_event() else {
            continue;
        };
        match subscription.as_deref_mut() {
            Some(subscription) => subscription.deliver(event),
            None => debug!(name = %event.name, "push without subscription dropped"),
        }
    }
}

/// Socket timeout for one receive. `None` blocks until the reply arrives.
fn apply_timeout(base: Duration, timeout: CallTimeout) -> Option<Duration> {
    match timeout {
        CallTimeout::Default => Some(base),
        CallTimeout::Extended(extra) => Some(base.saturating_add(extra)),
        CallTimeout::Unbounded => None,
    }
}
