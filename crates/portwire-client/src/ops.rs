//! Typed helpers over [`Client::call`].

use std::time::Duration;

use portwire_proto::{ContainerEvent, PropertyValue, Request, WaitRequest};

use crate::client::{CallTimeout, Client};
use crate::error::{ClientError, Result};
use crate::push::{PushSink, Subscription};

impl Client {
    /// Daemon version as `(tag, revision)`.
    pub fn version(&self) -> Result<(String, String)> {
        let response = self.call(&Request::version(), CallTimeout::Default)?;
        let version = response
            .version
            .ok_or(ClientError::MissingPayload("Version"))?;
        Ok((version.tag, version.revision))
    }

    /// Container names, optionally filtered by a daemon-side glob.
    pub fn list(&self, mask: Option<&str>) -> Result<Vec<String>> {
        let response = self.call(&Request::list(mask), CallTimeout::Default)?;
        Ok(response.list.map(|list| list.name).unwrap_or_default())
    }

    pub fn get_property(&self, name: &str, property: &str) -> Result<PropertyValue> {
        let response = self.call(&Request::get_property(name, property), CallTimeout::Default)?;
        let value = response
            .get_property
            .ok_or(ClientError::MissingPayload("GetProperty"))?;
        Ok(PropertyValue::from_wire(value.value))
    }

    pub fn set_property(
        &self,
        name: &str,
        property: &str,
        value: impl Into<PropertyValue>,
    ) -> Result<()> {
        let value = value.into().to_wire();
        self.call(
            &Request::set_property(name, property, value),
            CallTimeout::Default,
        )?;
        Ok(())
    }

    /// Block until one of `names` changes state (or a matching label
    /// changes, when `labels` is non-empty).
    ///
    /// `timeout` bounds the wait on the daemon side and widens the socket
    /// timeout by the same amount; `None` waits indefinitely. Elapsing
    /// yields [`ClientError::WaitTimeout`].
    pub fn wait_containers<S: AsRef<str>>(
        &self,
        names: &[S],
        timeout: Option<Duration>,
        labels: &[S],
    ) -> Result<ContainerEvent> {
        let request = Request::wait(
            WaitRequest::new(names.iter().map(|name| name.as_ref()))
                .with_timeout(timeout)
                .with_labels(labels.iter().map(|label| label.as_ref())),
        );
        let response = self.call(&request, CallTimeout::extra(timeout))?;
        let wait = response.wait.ok_or(ClientError::MissingPayload("Wait"))?;
        if wait.name.is_empty() {
            return Err(ClientError::WaitTimeout(timeout));
        }
        Ok(wait.into())
    }

    /// Like [`Client::wait_containers`] without labels, returning the name
    /// of the container that changed, or `None` on timeout.
    pub fn wait<S: AsRef<str>>(
        &self,
        names: &[S],
        timeout: Option<Duration>,
    ) -> Result<Option<String>> {
        match self.wait_containers(names, timeout, &[]) {
            Ok(event) => Ok(Some(event.name)),
            Err(ClientError::WaitTimeout(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Subscribe to state changes of `names`; events go to `sink`.
    pub fn async_wait<S: AsRef<str>>(
        &self,
        names: &[S],
        sink: PushSink,
        timeout: Option<Duration>,
        labels: &[S],
    ) -> Result<()> {
        let subscription = Subscription::new(names.iter().map(|name| name.as_ref()), sink)
            .with_labels(labels.iter().map(|label| label.as_ref()))
            .with_timeout(timeout);
        self.subscribe(subscription)
    }
}
