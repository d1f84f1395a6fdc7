//! HostSession - a connection to a virtualization host.

use crate::config::ConnectConfig;
use crate::discovery::enumerate;
use crate::error::{RegistrationAction, Result, VixError};
use crate::job::{Job, ResultKind};
use crate::property::{get_property, PropertyValue};
use crate::vm::VirtualMachineRef;
use hostvix_api::{ConnectionHandle, HostApi, JobRequest, PropertyId, RawHandle, SearchType};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// A session with one virtualization host.
///
/// The session owns the host connection. Dropping it, or calling
/// [`disconnect`](Self::disconnect), gives the connection back exactly once.
///
/// While disconnected, [`running`](Self::running) and
/// [`registered`](Self::registered) return empty lists and
/// [`open`](Self::open) returns `None`, all without contacting the host.
///
/// Operations that wait on the host are `async`: the wait runs on tokio's
/// blocking pool, so other tasks keep running meanwhile. The session does
/// not serialize its own operations.
pub struct HostSession {
    id: Uuid,
    api: Arc<dyn HostApi>,
    connection: Option<ConnectionHandle>,
}

impl HostSession {
    /// Create a session that is not connected to anything.
    pub fn new(api: Arc<dyn HostApi>) -> Self {
        Self {
            id: Uuid::new_v4(),
            api,
            connection: None,
        }
    }

    /// Adopt a host connection established elsewhere.
    ///
    /// The session takes ownership of `host` and disconnects it when done.
    /// An invalid handle yields a disconnected session.
    pub fn from_raw(api: Arc<dyn HostApi>, host: RawHandle) -> Self {
        let connection = host
            .is_valid()
            .then(|| ConnectionHandle::new(api.clone(), host));
        Self {
            id: Uuid::new_v4(),
            api,
            connection,
        }
    }

    /// Connect to the host described by `config`.
    ///
    /// # Errors
    /// Returns a config error if `config` is inconsistent, or a connection
    /// error carrying the host's text if the connect job fails.
    pub async fn connect(api: Arc<dyn HostApi>, config: &ConnectConfig) -> Result<Self> {
        config.validate()?;

        let id = Uuid::new_v4();
        tracing::info!(
            session = %id,
            host_type = %config.host_type,
            host = config.host_name.as_deref().unwrap_or("localhost"),
            "Connecting to host"
        );

        let job = Job::submit(&api, RawHandle::INVALID, JobRequest::Connect(config.params()));
        let host = job
            .wait_handle_yielding()
            .await
            .map_err(|e| {
                tracing::warn!(session = %id, error = %e, "Connect failed");
                VixError::Connect {
                    code: e.code,
                    message: e.message,
                }
            })?
            .into_raw();

        tracing::info!(session = %id, %host, "Connected to host");

        Ok(Self {
            id,
            connection: Some(ConnectionHandle::new(api.clone(), host)),
            api,
        })
    }

    /// Identifier used to correlate this session's log events.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// The host connection handle, or `RawHandle::INVALID` when disconnected.
    pub fn host_handle(&self) -> RawHandle {
        self.connection
            .as_ref()
            .map_or(RawHandle::INVALID, ConnectionHandle::raw)
    }

    /// Disconnect from the host. Does nothing if already disconnected.
    pub fn disconnect(&mut self) {
        if let Some(connection) = self.connection.take() {
            tracing::info!(session = %self.id, host = %connection.raw(), "Disconnecting session");
            drop(connection);
        }
    }

    /// Paths of the VMs currently running on the host, in host order.
    pub async fn running(&self) -> Result<Vec<String>> {
        enumerate(&self.api, self.host_handle(), SearchType::Running).await
    }

    /// Paths of the VMs registered with the host, in host order.
    pub async fn registered(&self) -> Result<Vec<String>> {
        enumerate(&self.api, self.host_handle(), SearchType::Registered).await
    }

    /// Register the VM whose configuration lives at `path`.
    ///
    /// # Errors
    /// Fails with an invalid-argument error before contacting the host if
    /// `path` is not a usable identifier, with `NotConnected` when
    /// disconnected, and with a registration error if the job fails.
    pub async fn register(&self, path: impl AsRef<Path>) -> Result<()> {
        self.registration(RegistrationAction::Register, path.as_ref())
            .await
    }

    /// Unregister the VM whose configuration lives at `path`.
    pub async fn unregister(&self, path: impl AsRef<Path>) -> Result<()> {
        self.registration(RegistrationAction::Unregister, path.as_ref())
            .await
    }

    async fn registration(&self, action: RegistrationAction, path: &Path) -> Result<()> {
        let path = validate_path(path)?;
        let host = self
            .connection
            .as_ref()
            .ok_or(VixError::NotConnected)?
            .raw();

        tracing::info!(session = %self.id, %action, path = %path, "Updating VM registration");

        let request = match action {
            RegistrationAction::Register => JobRequest::RegisterVm { path },
            RegistrationAction::Unregister => JobRequest::UnregisterVm { path },
        };
        Job::submit(&self.api, host, request)
            .wait_yielding(ResultKind::None)
            .await
            .map_err(|e| {
                tracing::warn!(
                    session = %self.id,
                    %action,
                    path = %path,
                    error = %e,
                    "Registration failed"
                );
                VixError::Registration {
                    action,
                    path: path.to_string(),
                    code: e.code,
                    message: e.message,
                }
            })?;
        Ok(())
    }

    /// Open the VM whose configuration lives at `path`.
    ///
    /// Returns `Ok(None)` without contacting the host when disconnected.
    pub async fn open(&self, path: impl AsRef<Path>) -> Result<Option<VirtualMachineRef>> {
        let Some(connection) = self.connection.as_ref() else {
            return Ok(None);
        };
        let path = validate_path(path.as_ref())?;

        tracing::info!(session = %self.id, path = %path, "Opening VM");

        let handle = Job::submit(&self.api, connection.raw(), JobRequest::OpenVm { path })
            .wait_handle_yielding()
            .await
            .map_err(|e| {
                tracing::warn!(session = %self.id, path = %path, error = %e, "Open failed");
                VixError::Open {
                    path: path.to_string(),
                    code: Some(e.code),
                    message: e.message,
                }
            })?;

        Ok(Some(VirtualMachineRef::new(handle, path.to_string())))
    }

    /// Read a property of the host.
    pub fn property(&self, id: PropertyId) -> Result<PropertyValue> {
        get_property(&self.api, self.host_handle(), id)
    }
}

impl std::fmt::Debug for HostSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostSession")
            .field("id", &self.id)
            .field("host", &self.host_handle())
            .finish()
    }
}

impl Drop for HostSession {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Check that `path` can be passed to the host as a VM identifier.
fn validate_path(path: &Path) -> Result<&str> {
    let s = path
        .to_str()
        .ok_or_else(|| VixError::InvalidArgument("VM path must be valid UTF-8".into()))?;
    if s.is_empty() {
        return Err(VixError::InvalidArgument("VM path must not be empty".into()));
    }
    if s.contains('\0') {
        return Err(VixError::InvalidArgument(
            "VM path must not contain NUL bytes".into(),
        ));
    }
    Ok(s)
}
