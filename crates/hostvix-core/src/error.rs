//! Error types for hostvix-core.

use hostvix_api::{ErrorCode, PropertyId, SearchType};
use std::fmt;
use thiserror::Error;

/// Result type alias for hostvix-core operations.
pub type Result<T> = std::result::Result<T, VixError>;

/// Which registration job failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationAction {
    Register,
    Unregister,
}

impl fmt::Display for RegistrationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Register => write!(f, "register"),
            Self::Unregister => write!(f, "unregister"),
        }
    }
}

/// Errors reported by host sessions and VM references.
///
/// Host failures carry the native code and the host's text for it.
#[derive(Debug, Error)]
pub enum VixError {
    /// The session has no live connection
    #[error("not connected to a host")]
    NotConnected,

    /// The connect job failed
    #[error("could not connect to host: {message} ({code})")]
    Connect { code: ErrorCode, message: String },

    /// A property could not be read or decoded
    #[error("could not read property {id}: {message}")]
    Property {
        id: PropertyId,
        /// Native code, absent when decoding failed on this side
        code: Option<ErrorCode>,
        message: String,
    },

    /// A register or unregister job failed
    #[error("could not {action} VM {path}: {message} ({code})")]
    Registration {
        action: RegistrationAction,
        path: String,
        code: ErrorCode,
        message: String,
    },

    /// The open job failed or returned no usable VM handle
    #[error("could not open VM {path}: {message}")]
    Open {
        path: String,
        code: Option<ErrorCode>,
        message: String,
    },

    /// Enumerating VMs failed
    #[error("could not list {search} VMs: {message}")]
    Discovery {
        search: SearchType,
        code: Option<ErrorCode>,
        message: String,
    },

    /// An argument had the wrong shape
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Connection settings are inconsistent
    #[error("configuration error: {0}")]
    Config(String),
}

/// Coarse classification of [`VixError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Connection,
    Property,
    Registration,
    Open,
    Discovery,
    Type,
    Config,
}

impl VixError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotConnected | Self::Connect { .. } => ErrorKind::Connection,
            Self::Property { .. } => ErrorKind::Property,
            Self::Registration { .. } => ErrorKind::Registration,
            Self::Open { .. } => ErrorKind::Open,
            Self::Discovery { .. } => ErrorKind::Discovery,
            Self::InvalidArgument(_) => ErrorKind::Type,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    /// The host's native error code, if the host reported one.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Connect { code, .. } | Self::Registration { code, .. } => Some(*code),
            Self::Property { code, .. }
            | Self::Open { code, .. }
            | Self::Discovery { code, .. } => *code,
            Self::NotConnected | Self::InvalidArgument(_) | Self::Config(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(VixError::NotConnected.kind(), ErrorKind::Connection);
        assert_eq!(
            VixError::InvalidArgument("path".into()).kind(),
            ErrorKind::Type
        );
        let err = VixError::Registration {
            action: RegistrationAction::Unregister,
            path: "/vm/a.vmx".into(),
            code: ErrorCode::DISK_FULL,
            message: "disk full".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Registration);
        assert_eq!(err.code(), Some(ErrorCode::DISK_FULL));
    }

    #[test]
    fn test_display_carries_host_text() {
        let err = VixError::Registration {
            action: RegistrationAction::Register,
            path: "/vm/a.vmx".into(),
            code: ErrorCode::DISK_FULL,
            message: "disk full".into(),
        };
        assert_eq!(
            err.to_string(),
            "could not register VM /vm/a.vmx: disk full (host error 8)"
        );

        let err = VixError::Discovery {
            search: SearchType::Running,
            code: None,
            message: "bad item".into(),
        };
        assert_eq!(err.to_string(), "could not list running VMs: bad item");
    }
}
