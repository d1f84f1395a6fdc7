//! Native handles and the guards that own them.
//!
//! Every handle the host gives out has exactly one owner on this side. The
//! guards here make that rule mechanical: they are not `Clone`, and they
//! give the handle back to the host exactly once, when dropped.

use crate::host::HostApi;
use std::fmt;
use std::sync::Arc;

/// Opaque identifier of a host-side resource (connection, job, VM).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct RawHandle(pub u32);

impl RawHandle {
    /// The invalid sentinel.
    pub const INVALID: Self = Self(0);

    /// Check if this handle refers to anything.
    pub const fn is_valid(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for RawHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Exclusive owner of a job, VM or property handle.
///
/// Dropping the guard releases the handle through the host it came from.
/// Invalid handles are never released.
pub struct OwnedHandle {
    api: Arc<dyn HostApi>,
    raw: RawHandle,
}

impl OwnedHandle {
    /// Take ownership of `raw`. The caller must not release it afterwards.
    pub fn new(api: Arc<dyn HostApi>, raw: RawHandle) -> Self {
        Self { api, raw }
    }

    /// The wrapped handle, still owned by this guard.
    pub fn raw(&self) -> RawHandle {
        self.raw
    }

    /// The host this handle belongs to.
    pub fn api(&self) -> &Arc<dyn HostApi> {
        &self.api
    }

    /// Give up ownership without releasing.
    pub fn into_raw(mut self) -> RawHandle {
        std::mem::replace(&mut self.raw, RawHandle::INVALID)
    }
}

impl fmt::Debug for OwnedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OwnedHandle").field(&self.raw).finish()
    }
}

impl Drop for OwnedHandle {
    fn drop(&mut self) {
        if self.raw.is_valid() {
            tracing::debug!(handle = %self.raw, "Releasing handle");
            self.api.release_handle(self.raw);
        }
    }
}

/// Exclusive owner of a live host connection.
///
/// Dropping the guard disconnects from the host.
pub struct ConnectionHandle {
    api: Arc<dyn HostApi>,
    raw: RawHandle,
}

impl ConnectionHandle {
    /// Take ownership of the connection `raw`.
    pub fn new(api: Arc<dyn HostApi>, raw: RawHandle) -> Self {
        Self { api, raw }
    }

    pub fn raw(&self) -> RawHandle {
        self.raw
    }

    pub fn api(&self) -> &Arc<dyn HostApi> {
        &self.api
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ConnectionHandle").field(&self.raw).finish()
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        if self.raw.is_valid() {
            tracing::debug!(host = %self.raw, "Disconnecting from host");
            self.api.disconnect(self.raw);
        }
    }
}
