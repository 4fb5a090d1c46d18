use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use prost::Message;
use serde::{Deserialize, Serialize};

use crate::error::{ProtoError, Result};
use crate::status::Status;

#[derive(Clone, PartialEq, Message)]
pub struct ListRequest {
    #[prost(string, optional, tag = "1")]
    pub mask: Option<String>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ListResponse {
    #[prost(string, repeated, tag = "1")]
    pub name: Vec<String>,
}

#[derive(Clone, PartialEq, Message)]
pub struct GetPropertyRequest {
    #[prost(string, required, tag = "1")]
    pub name: String,
    #[prost(string, required, tag = "2")]
    pub property: String,
    #[prost(bool, optional, tag = "3")]
    pub sync: Option<bool>,
    #[prost(bool, optional, tag = "4")]
    pub real: Option<bool>,
}

#[derive(Clone, PartialEq, Message)]
pub struct GetPropertyResponse {
    #[prost(string, required, tag = "1")]
    pub value: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct SetPropertyRequest {
    #[prost(string, required, tag = "1")]
    pub name: String,
    #[prost(string, required, tag = "2")]
    pub property: String,
    #[prost(string, required, tag = "3")]
    pub value: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct VersionRequest {}

#[derive(Clone, PartialEq, Message)]
pub struct VersionResponse {
    #[prost(string, required, tag = "1")]
    pub tag: String,
    #[prost(string, required, tag = "2")]
    pub revision: String,
}

/// Wait / subscription request: container names, optional server-side
/// timeout and label filter.
#[derive(Clone, PartialEq, Message)]
pub struct WaitRequest {
    #[prost(string, repeated, tag = "1")]
    pub name: Vec<String>,
    #[prost(uint32, optional, tag = "2")]
    pub timeout_ms: Option<u32>,
    #[prost(string, repeated, tag = "3")]
    pub label: Vec<String>,
}

impl WaitRequest {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: names.into_iter().map(Into::into).collect(),
            timeout_ms: None,
            label: Vec::new(),
        }
    }

    /// Server-side timeout, saturated to what fits in milliseconds.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout_ms =
            timeout.map(|t| u32::try_from(t.as_millis()).unwrap_or(u32::MAX));
        self
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.label = labels.into_iter().map(Into::into).collect();
        self
    }
}

/// Outcome of a wait, and the body of a push notification.
#[derive(Clone, PartialEq, Message)]
pub struct WaitResponse {
    #[prost(string, required, tag = "1")]
    pub name: String,
    #[prost(string, optional, tag = "2")]
    pub state: Option<String>,
    #[prost(uint64, optional, tag = "3")]
    pub when: Option<u64>,
    #[prost(string, optional, tag = "4")]
    pub label: Option<String>,
    #[prost(string, optional, tag = "5")]
    pub value: Option<String>,
}

/// Request envelope. Exactly one command field is expected to be set.
#[derive(Clone, PartialEq, Message)]
pub struct Request {
    #[prost(message, optional, tag = "3")]
    pub list: Option<ListRequest>,
    #[prost(message, optional, tag = "4")]
    pub get_property: Option<GetPropertyRequest>,
    #[prost(message, optional, tag = "5")]
    pub set_property: Option<SetPropertyRequest>,
    #[prost(message, optional, tag = "14")]
    pub version: Option<VersionRequest>,
    #[prost(message, optional, tag = "16")]
    pub wait: Option<WaitRequest>,
    #[prost(message, optional, tag = "19")]
    pub async_wait: Option<WaitRequest>,
}

/// Which command a request carries, for logging and dispatch checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    List,
    GetProperty,
    SetProperty,
    Version,
    Wait,
    AsyncWait,
}

impl RequestKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestKind::List => "List",
            RequestKind::GetProperty => "GetProperty",
            RequestKind::SetProperty => "SetProperty",
            RequestKind::Version => "Version",
            RequestKind::Wait => "Wait",
            RequestKind::AsyncWait => "AsyncWait",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Request {
    pub fn list(mask: Option<&str>) -> Self {
        Self {
            list: Some(ListRequest {
                mask: mask.map(str::to_string),
            }),
            ..Self::default()
        }
    }

    pub fn get_property(name: &str, property: &str) -> Self {
        Self {
            get_property: Some(GetPropertyRequest {
                name: name.to_string(),
                property: property.to_string(),
                sync: None,
                real: None,
            }),
            ..Self::default()
        }
    }

    pub fn set_property(name: &str, property: &str, value: impl Into<String>) -> Self {
        Self {
            set_property: Some(SetPropertyRequest {
                name: name.to_string(),
                property: property.to_string(),
                value: value.into(),
            }),
            ..Self::default()
        }
    }

    pub fn version() -> Self {
        Self {
            version: Some(VersionRequest {}),
            ..Self::default()
        }
    }

    pub fn wait(wait: WaitRequest) -> Self {
        Self {
            wait: Some(wait),
            ..Self::default()
        }
    }

    pub fn async_wait(wait: WaitRequest) -> Self {
        Self {
            async_wait: Some(wait),
            ..Self::default()
        }
    }

    /// The command this request carries; the first one set wins.
    pub fn kind(&self) -> Option<RequestKind> {
        if self.list.is_some() {
            Some(RequestKind::List)
        } else if self.get_property.is_some() {
            Some(RequestKind::GetProperty)
        } else if self.set_property.is_some() {
            Some(RequestKind::SetProperty)
        } else if self.version.is_some() {
            Some(RequestKind::Version)
        } else if self.wait.is_some() {
            Some(RequestKind::Wait)
        } else if self.async_wait.is_some() {
            Some(RequestKind::AsyncWait)
        } else {
            None
        }
    }

    /// Serialize to a frame payload. Empty requests are refused.
    pub fn to_payload(&self) -> Result<Bytes> {
        if self.kind().is_none() {
            return Err(ProtoError::EmptyRequest);
        }
        Ok(Bytes::from(self.encode_to_vec()))
    }

    /// Parse a frame payload (daemon side and tests).
    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        Ok(Self::decode(payload)?)
    }
}

/// Response envelope. Also carries push notifications in `async_wait`.
#[derive(Clone, PartialEq, Message)]
pub struct Response {
    #[prost(int32, required, tag = "1")]
    pub error: i32,
    #[prost(string, optional, tag = "2")]
    pub error_msg: Option<String>,
    #[prost(message, optional, tag = "3")]
    pub list: Option<ListResponse>,
    #[prost(message, optional, tag = "4")]
    pub get_property: Option<GetPropertyResponse>,
    #[prost(message, optional, tag = "8")]
    pub version: Option<VersionResponse>,
    #[prost(message, optional, tag = "10")]
    pub wait: Option<WaitResponse>,
    #[prost(message, optional, tag = "19")]
    pub async_wait: Option<WaitResponse>,
}

impl Response {
    /// A successful, otherwise empty response.
    pub fn success() -> Self {
        Self::default()
    }

    /// A failed response with a status and message.
    pub fn failure(status: Status, message: impl Into<String>) -> Self {
        Self {
            error: status.code(),
            error_msg: Some(message.into()),
            ..Self::default()
        }
    }

    /// A push notification frame.
    pub fn push(event: ContainerEvent) -> Self {
        Self {
            async_wait: Some(event.into()),
            ..Self::default()
        }
    }

    pub fn status(&self) -> Status {
        Status::from_code(self.error)
    }

    pub fn is_success(&self) -> bool {
        self.error == Status::Success.code()
    }

    /// True when this frame is a push notification, not a reply.
    pub fn is_push(&self) -> bool {
        self.async_wait.is_some()
    }

    /// Take the push notification out of this frame, if it is one.
    pub fn into_event(self) -> Option<ContainerEvent> {
        self.async_wait.map(ContainerEvent::from)
    }

    pub fn to_payload(&self) -> Bytes {
        Bytes::from(self.encode_to_vec())
    }

    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        Ok(Self::decode(payload)?)
    }
}

/// A container state change: the body of a push notification and the
/// outcome of a wait.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerEvent {
    pub name: String,
    pub state: String,
    /// Daemon timestamp, seconds since the epoch.
    pub when: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl From<WaitResponse> for ContainerEvent {
    fn from(wait: WaitResponse) -> Self {
        // Label and value travel together; a value without its label is noise.
        let (label, value) = match wait.label {
            Some(label) => (Some(label), Some(wait.value.unwrap_or_default())),
            None => (None, None),
        };
        Self {
            name: wait.name,
            state: wait.state.unwrap_or_default(),
            when: wait.when.unwrap_or_default(),
            label,
            value,
        }
    }
}

impl From<ContainerEvent> for WaitResponse {
    fn from(event: ContainerEvent) -> Self {
        Self {
            name: event.name,
            state: Some(event.state),
            when: Some(event.when),
            label: event.label,
            value: event.value,
        }
    }
}
