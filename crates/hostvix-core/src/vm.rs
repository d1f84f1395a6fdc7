//! VirtualMachineRef - an opened VM, owned until released.

use crate::error::Result;
use crate::property::{get_property, PropertyValue};
use hostvix_api::{OwnedHandle, PropertyId, RawHandle};

/// A VM opened through [`HostSession::open`](crate::HostSession::open).
///
/// Owns exactly one VM handle. The handle is released when the reference
/// is dropped or [`close`](Self::close)d; there is no way to copy it out
/// while keeping it owned.
#[derive(Debug)]
pub struct VirtualMachineRef {
    handle: OwnedHandle,
    path: String,
}

impl VirtualMachineRef {
    pub(crate) fn new(handle: OwnedHandle, path: String) -> Self {
        tracing::debug!(vm = %handle.raw(), path = %path, "Opened VM");
        Self { handle, path }
    }

    /// The native VM handle, still owned by this reference.
    pub fn handle(&self) -> RawHandle {
        self.handle.raw()
    }

    /// The configuration path the VM was opened from.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Read a property of this VM.
    pub fn property(&self, id: PropertyId) -> Result<PropertyValue> {
        get_property(self.handle.api(), self.handle.raw(), id)
    }

    /// Release the VM handle now.
    pub fn close(self) {
        tracing::debug!(vm = %self.handle.raw(), path = %self.path, "Closing VM");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostvix_api::{HostApi, HostValue, InMemoryHost, JobRequest};
    use std::sync::Arc;

    fn open(host: &Arc<InMemoryHost>, path: &str) -> VirtualMachineRef {
        let conn = host.open_connection();
        let job = host.submit_job(conn, JobRequest::OpenVm { path });
        let values = host
            .wait_job(job, &[PropertyId::JOB_RESULT_HANDLE])
            .expect("open should succeed");
        host.release_handle(job);
        let HostValue::Handle(raw) = values[0] else {
            panic!("expected a handle");
        };
        VirtualMachineRef::new(OwnedHandle::new(host.clone(), raw), path.to_string())
    }

    #[test]
    fn test_close_releases_handle_once() {
        let host = Arc::new(InMemoryHost::new().with_registered(["/vm/a.vmx"]));
        let vm = open(&host, "/vm/a.vmx");
        let raw = vm.handle();
        assert_eq!(vm.path(), "/vm/a.vmx");

        vm.close();
        assert_eq!(host.release_count(raw), 1);
        assert_eq!(host.stray_releases(), 0);
    }

    #[test]
    fn test_vm_properties() {
        let host = Arc::new(
            InMemoryHost::new()
                .with_registered(["/vm/a.vmx"])
                .with_vm_property("/vm/a.vmx", PropertyId::VM_NUM_VCPUS, HostValue::Integer(2))
                .with_vm_property("/vm/a.vmx", PropertyId::VM_IS_RUNNING, HostValue::Bool(false)),
        );
        let vm = open(&host, "/vm/a.vmx");

        let path = vm.property(PropertyId::VM_VMX_PATHNAME).unwrap();
        assert_eq!(path.as_str(), Some("/vm/a.vmx"));
        assert_eq!(vm.property(PropertyId::VM_NUM_VCPUS).unwrap().as_integer(), Some(2));
        assert_eq!(vm.property(PropertyId::VM_IS_RUNNING).unwrap().as_bool(), Some(false));
    }
}
