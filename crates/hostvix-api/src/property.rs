//! Property identifiers, declared types and raw values.

use crate::handle::RawHandle;
use std::fmt;

/// Identifier of a host-defined property on a host, VM or job handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyId(pub i32);

impl PropertyId {
    /// Terminates a property list; never readable.
    pub const NONE: Self = Self(0);

    // Host
    pub const HOST_HOSTTYPE: Self = Self(50);
    pub const HOST_API_VERSION: Self = Self(51);
    pub const HOST_SOFTWARE_VERSION: Self = Self(52);

    // Virtual machine
    pub const VM_NUM_VCPUS: Self = Self(101);
    pub const VM_VMX_PATHNAME: Self = Self(103);
    pub const VM_VMTEAM_PATHNAME: Self = Self(105);
    pub const VM_MEMORY_SIZE: Self = Self(106);
    pub const VM_READ_ONLY: Self = Self(107);
    pub const VM_NAME: Self = Self(108);
    pub const VM_GUESTOS: Self = Self(109);
    pub const VM_IN_VMTEAM: Self = Self(128);
    pub const VM_POWER_STATE: Self = Self(129);
    pub const VM_TOOLS_STATE: Self = Self(152);
    pub const VM_IS_RUNNING: Self = Self(196);
    pub const VM_SUPPORTED_FEATURES: Self = Self(197);
    pub const VM_SSL_ERROR: Self = Self(293);

    // Job results
    pub const JOB_RESULT_ERROR_CODE: Self = Self(3000);
    pub const JOB_RESULT_VM_IN_GROUP: Self = Self(3001);
    pub const JOB_RESULT_USER_MESSAGE: Self = Self(3002);
    pub const JOB_RESULT_EXIT_CODE: Self = Self(3004);
    pub const JOB_RESULT_COMMAND_OUTPUT: Self = Self(3005);
    pub const JOB_RESULT_HANDLE: Self = Self(3010);
    pub const JOB_RESULT_ITEM_NAME: Self = Self(3035);

    // Discovery events
    pub const FOUND_ITEM_LOCATION: Self = Self(4010);
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for PropertyId {
    fn from(raw: i32) -> Self {
        Self(raw)
    }
}

/// Declared runtime type of a property, as reported by the host metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyType {
    /// No concrete type; the property carries no value.
    Any,
    Integer,
    String,
    Bool,
    Handle,
    Int64,
    Blob,
}

impl PropertyType {
    /// Map the host's numeric type tag.
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Self::Any),
            1 => Some(Self::Integer),
            2 => Some(Self::String),
            3 => Some(Self::Bool),
            4 => Some(Self::Handle),
            5 => Some(Self::Int64),
            6 => Some(Self::Blob),
            _ => None,
        }
    }

    /// The host's numeric type tag.
    pub fn as_raw(&self) -> i32 {
        match self {
            Self::Any => 0,
            Self::Integer => 1,
            Self::String => 2,
            Self::Bool => 3,
            Self::Handle => 4,
            Self::Int64 => 5,
            Self::Blob => 6,
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "any"),
            Self::Integer => write!(f, "integer"),
            Self::String => write!(f, "string"),
            Self::Bool => write!(f, "bool"),
            Self::Handle => write!(f, "handle"),
            Self::Int64 => write!(f, "int64"),
            Self::Blob => write!(f, "blob"),
        }
    }
}

/// A value as stored by the host, before decoding.
///
/// Strings are raw bytes: the host makes no encoding promise.
/// A `Handle` value read through [`HostApi::get_property`](crate::HostApi::get_property)
/// is owned by the reader and must be released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostValue {
    Integer(i32),
    Int64(i64),
    Bool(bool),
    Text(Vec<u8>),
    Handle(RawHandle),
    Blob(Vec<u8>),
}

impl HostValue {
    /// The property type this value is stored as.
    pub fn property_type(&self) -> PropertyType {
        match self {
            Self::Integer(_) => PropertyType::Integer,
            Self::Int64(_) => PropertyType::Int64,
            Self::Bool(_) => PropertyType::Bool,
            Self::Text(_) => PropertyType::String,
            Self::Handle(_) => PropertyType::Handle,
            Self::Blob(_) => PropertyType::Blob,
        }
    }
}

impl From<&str> for HostValue {
    fn from(s: &str) -> Self {
        Self::Text(s.as_bytes().to_vec())
    }
}
