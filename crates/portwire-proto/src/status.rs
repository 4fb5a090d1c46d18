//! Status codes carried in the `error` field of every response.
//!
//! The daemon owns this enumeration and grows it over time. Codes this
//! crate does not know decode to [`Status::Unrecognized`] and are treated
//! as a generic failure.

use std::fmt;

/// A response status as sent by the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Success,
    Unknown,
    InvalidMethod,
    ContainerAlreadyExists,
    ContainerDoesNotExist,
    InvalidProperty,
    InvalidData,
    InvalidValue,
    InvalidState,
    NotSupported,
    ResourceNotAvailable,
    Permission,
    VolumeAlreadyExists,
    VolumeNotFound,
    NoSpace,
    Busy,
    VolumeAlreadyLinked,
    VolumeNotLinked,
    LayerAlreadyExists,
    LayerNotFound,
    NoValue,
    VolumeNotReady,
    InvalidCommand,
    LostError,
    DeviceNotFound,
    InvalidPath,
    InvalidNetworkAddress,
    Frozen,
    LabelNotFound,
    InvalidLabel,
    /// A code newer than this client.
    Unrecognized(i32),
}

/// Coarse grouping of failure statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCategory {
    NotFound,
    InvalidValue,
    PermissionDenied,
    AlreadyExists,
    Busy,
    Unsupported,
    Unknown,
}

const NAMED: &[Status] = &[
    Status::Success,
    Status::Unknown,
    Status::InvalidMethod,
    Status::ContainerAlreadyExists,
    Status::ContainerDoesNotExist,
    Status::InvalidProperty,
    Status::InvalidData,
    Status::InvalidValue,
    Status::InvalidState,
    Status::NotSupported,
    Status::ResourceNotAvailable,
    Status::Permission,
    Status::VolumeAlreadyExists,
    Status::VolumeNotFound,
    Status::NoSpace,
    Status::Busy,
    Status::VolumeAlreadyLinked,
    Status::VolumeNotLinked,
    Status::LayerAlreadyExists,
    Status::LayerNotFound,
    Status::NoValue,
    Status::VolumeNotReady,
    Status::InvalidCommand,
    Status::LostError,
    Status::DeviceNotFound,
    Status::InvalidPath,
    Status::InvalidNetworkAddress,
    Status::Frozen,
    Status::LabelNotFound,
    Status::InvalidLabel,
];

impl Status {
    /// Map a wire code to a status; never fails.
    pub fn from_code(code: i32) -> Self {
        usize::try_from(code)
            .ok()
            .and_then(|idx| NAMED.get(idx).copied())
            .unwrap_or(Status::Unrecognized(code))
    }

    /// The wire code. Named statuses are numbered by their position.
    pub fn code(self) -> i32 {
        match self {
            Status::Unrecognized(code) => code,
            named => NAMED
                .iter()
                .position(|s| *s == named)
                .map_or(-1, |idx| idx as i32),
        }
    }

    pub fn is_success(self) -> bool {
        self == Status::Success
    }

    pub fn category(self) -> StatusCategory {
        use Status::*;
        match self {
            ContainerDoesNotExist | VolumeNotFound | LayerNotFound | LabelNotFound
            | DeviceNotFound | NoValue => StatusCategory::NotFound,
            InvalidProperty | InvalidData | InvalidValue | InvalidState | InvalidCommand
            | InvalidPath | InvalidNetworkAddress | InvalidLabel | VolumeNotLinked => {
                StatusCategory::InvalidValue
            }
            Permission => StatusCategory::PermissionDenied,
            ContainerAlreadyExists | VolumeAlreadyExists | LayerAlreadyExists
            | VolumeAlreadyLinked => StatusCategory::AlreadyExists,
            Busy | ResourceNotAvailable | NoSpace | VolumeNotReady | Frozen => {
                StatusCategory::Busy
            }
            InvalidMethod | NotSupported => StatusCategory::Unsupported,
            Success | Unknown | LostError | Unrecognized(_) => StatusCategory::Unknown,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Unrecognized(code) => write!(f, "Unrecognized({code})"),
            named => write!(f, "{named:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_codes_roundtrip() {
        for (idx, status) in NAMED.iter().enumerate() {
            assert_eq!(status.code(), idx as i32);
            assert_eq!(Status::from_code(idx as i32), *status);
        }
    }

    #[test]
    fn well_known_codes() {
        assert_eq!(Status::from_code(0), Status::Success);
        assert_eq!(Status::from_code(4), Status::ContainerDoesNotExist);
        assert_eq!(Status::from_code(11), Status::Permission);
        assert_eq!(Status::from_code(15), Status::Busy);
    }

    #[test]
    fn unknown_codes_fail_closed() {
        let status = Status::from_code(4242);
        assert_eq!(status, Status::Unrecognized(4242));
        assert_eq!(status.code(), 4242);
        assert_eq!(status.category(), StatusCategory::Unknown);
        assert!(!status.is_success());

        assert_eq!(Status::from_code(-3), Status::Unrecognized(-3));
    }

    #[test]
    fn categories() {
        assert_eq!(
            Status::ContainerDoesNotExist.category(),
            StatusCategory::NotFound
        );
        assert_eq!(Status::InvalidValue.category(), StatusCategory::InvalidValue);
        assert_eq!(Status::Permission.category(), StatusCategory::PermissionDenied);
        assert_eq!(
            Status::VolumeAlreadyExists.category(),
            StatusCategory::AlreadyExists
        );
        assert_eq!(Status::Busy.category(), StatusCategory::Busy);
        assert_eq!(Status::NotSupported.category(), StatusCategory::Unsupported);
    }

    #[test]
    fn display_names() {
        assert_eq!(Status::Busy.to_string(), "Busy");
        assert_eq!(Status::Unrecognized(77).to_string(), "Unrecognized(77)");
    }
}
