//! Push notification routing.
//!
//! A subscription is process-wide client state: it survives reconnects and
//! is replayed on every new connection before any other request. Events
//! are delivered synchronously by whichever thread is reading the socket
//! at the time, while that thread holds the client lock.

use std::fmt;
use std::sync::mpsc;
use std::time::Duration;

use portwire_proto::{ContainerEvent, Request, WaitRequest};
use tracing::{debug, trace};

/// Where push notifications go.
pub enum PushSink {
    /// Run a closure on the reading thread.
    ///
    /// The closure runs with the client lock held and must not call back
    /// into the same client; doing so deadlocks.
    Callback(Box<dyn FnMut(ContainerEvent) + Send>),
    /// Queue events for a consumer on another thread.
    Channel(mpsc::Sender<ContainerEvent>),
}

impl PushSink {
    pub fn callback(f: impl FnMut(ContainerEvent) + Send + 'static) -> Self {
        PushSink::Callback(Box::new(f))
    }

    /// A channel sink and its receiving end.
    pub fn channel() -> (Self, mpsc::Receiver<ContainerEvent>) {
        let (tx, rx) = mpsc::channel();
        (PushSink::Channel(tx), rx)
    }

    pub(crate) fn deliver(&mut self, event: ContainerEvent) {
        match self {
            PushSink::Callback(f) => f(event),
            PushSink::Channel(tx) => {
                if tx.send(event).is_err() {
                    debug!("push receiver dropped; event discarded");
                }
            }
        }
    }
}

impl fmt::Debug for PushSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PushSink::Callback(_) => f.write_str("PushSink::Callback"),
            PushSink::Channel(_) => f.write_str("PushSink::Channel"),
        }
    }
}

/// Subjects, label filter and server-side timeout of a subscription, plus
/// the sink its events go to.
#[derive(Debug)]
pub struct Subscription {
    names: Vec<String>,
    labels: Vec<String>,
    timeout: Option<Duration>,
    sink: PushSink,
}

impl Subscription {
    pub fn new<I, S>(names: I, sink: PushSink) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            labels: Vec::new(),
            timeout: None,
            sink,
        }
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// The AsyncWait request announcing this subscription.
    pub fn request(&self) -> Request {
        Request::async_wait(
            WaitRequest::new(self.names.iter().cloned())
                .with_timeout(self.timeout)
                .with_labels(self.labels.iter().cloned()),
        )
    }

    /// The request to replay after a reconnect; nothing for an empty
    /// subject set.
    pub(crate) fn replay_request(&self) -> Option<Request> {
        (!self.names.is_empty()).then(|| self.request())
    }

    pub(crate) fn deliver(&mut self, event: ContainerEvent) {
        trace!(name = %event.name, state = %event.state, "push notification");
        self.sink.deliver(event);
    }
}
