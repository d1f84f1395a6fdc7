//! The handle-based host interface consumed by the binding.

use crate::error::ErrorCode;
use crate::handle::RawHandle;
use crate::property::{HostValue, PropertyId, PropertyType};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Service provider a connection targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostType {
    /// Whatever provider the host library picks.
    #[default]
    Default,
    Server,
    Workstation,
    Player,
    #[serde(rename = "vsphere")]
    VSphere,
    WorkstationShared,
}

impl HostType {
    /// Parse from string (case-insensitive). Unknown values select `Default`.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "server" => Self::Server,
            "workstation" | "ws" => Self::Workstation,
            "player" => Self::Player,
            "vsphere" | "vi" | "esx" => Self::VSphere,
            "workstation_shared" | "shared" => Self::WorkstationShared,
            _ => Self::Default,
        }
    }

    /// Whether the provider is reached over the network and needs a host name.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Server | Self::VSphere | Self::WorkstationShared)
    }
}

impl fmt::Display for HostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::Server => write!(f, "server"),
            Self::Workstation => write!(f, "workstation"),
            Self::Player => write!(f, "player"),
            Self::VSphere => write!(f, "vsphere"),
            Self::WorkstationShared => write!(f, "workstation_shared"),
        }
    }
}

/// Borrowed arguments of a connect job.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ConnectParams<'a> {
    pub api_version: i32,
    pub host_type: HostType,
    pub host_name: Option<&'a str>,
    pub port: u16,
    pub user_name: Option<&'a str>,
    pub password: Option<&'a str>,
}

impl fmt::Debug for ConnectParams<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectParams")
            .field("api_version", &self.api_version)
            .field("host_type", &self.host_type)
            .field("host_name", &self.host_name)
            .field("port", &self.port)
            .field("user_name", &self.user_name)
            .field("password", &self.password.map(|_| "<redacted>"))
            .finish()
    }
}

/// Kind of work a job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    Connect,
    RegisterVm,
    UnregisterVm,
    OpenVm,
    FindItems,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect => write!(f, "connect"),
            Self::RegisterVm => write!(f, "register_vm"),
            Self::UnregisterVm => write!(f, "unregister_vm"),
            Self::OpenVm => write!(f, "open_vm"),
            Self::FindItems => write!(f, "find_items"),
        }
    }
}

/// A unit of host work, with its arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobRequest<'a> {
    Connect(ConnectParams<'a>),
    RegisterVm { path: &'a str },
    UnregisterVm { path: &'a str },
    OpenVm { path: &'a str },
}

impl JobRequest<'_> {
    pub fn kind(&self) -> JobKind {
        match self {
            Self::Connect(_) => JobKind::Connect,
            Self::RegisterVm { .. } => JobKind::RegisterVm,
            Self::UnregisterVm { .. } => JobKind::UnregisterVm,
            Self::OpenVm { .. } => JobKind::OpenVm,
        }
    }
}

/// Category of items a discovery job enumerates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    Running,
    Registered,
}

impl fmt::Display for SearchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Registered => write!(f, "registered"),
        }
    }
}

/// An event the host delivers while a discovery job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent<'a> {
    /// One discovered item, identified by its raw location string.
    FoundItem { location: &'a [u8] },
    /// The job is still making progress.
    Progress,
}

/// Receives discovery events. Invoked by the host, possibly from a
/// host-managed thread; it must not block. The host treats every delivery
/// as accepted.
pub type EventSink = Box<dyn FnMut(HostEvent<'_>) + Send>;

/// The opaque, handle-based API of a virtualization host.
///
/// Job submission never blocks and always yields a handle; failures surface
/// from [`wait_job`](HostApi::wait_job). Every handle returned by
/// `submit_job`, `find_items`, or extracted as a `Handle` value must be
/// passed to [`release_handle`](HostApi::release_handle) exactly once.
/// Connections are given back with [`disconnect`](HostApi::disconnect)
/// instead.
pub trait HostApi: Send + Sync + 'static {
    /// Submit a job against `host` (`RawHandle::INVALID` for `Connect`).
    fn submit_job(&self, host: RawHandle, request: JobRequest<'_>) -> RawHandle;

    /// Submit a discovery job. `sink` is invoked once per event until the
    /// job completes, then dropped.
    fn find_items(&self, host: RawHandle, search: SearchType, sink: EventSink) -> RawHandle;

    /// Block until `job` completes and read the listed result properties,
    /// in order.
    fn wait_job(&self, job: RawHandle, results: &[PropertyId]) -> Result<Vec<HostValue>, ErrorCode>;

    fn release_handle(&self, handle: RawHandle);

    fn disconnect(&self, host: RawHandle);

    /// Declared type of property `id` on `owner`.
    fn property_type(&self, owner: RawHandle, id: PropertyId) -> Result<PropertyType, ErrorCode>;

    /// Read property `id` of `owner`, stored as `ty`. Reading with a type
    /// other than the declared one fails with `TYPE_MISMATCH`.
    fn get_property(
        &self,
        owner: RawHandle,
        id: PropertyId,
        ty: PropertyType,
    ) -> Result<HostValue, ErrorCode>;

    /// Human-readable text for `code`.
    fn error_text(&self, code: ErrorCode) -> String {
        code.default_text().to_string()
    }
}
