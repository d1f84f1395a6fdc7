//! In-process host with scriptable behaviour and call accounting.
//!
//! `InMemoryHost` implements [`HostApi`] without any native library. It
//! keeps a registry of VM paths, runs jobs synchronously inside
//! [`wait_job`](HostApi::wait_job), and counts every submit, wait, release
//! and disconnect so callers can assert that nothing leaks.
//!
//! ```
//! use hostvix_api::{HostApi, InMemoryHost, JobRequest, PropertyId, HostValue};
//!
//! let host = InMemoryHost::new().with_registered(["/vms/a.vmx"]);
//! let conn = host.open_connection();
//!
//! let job = host.submit_job(conn, JobRequest::OpenVm { path: "/vms/a.vmx" });
//! let values = host.wait_job(job, &[PropertyId::JOB_RESULT_HANDLE]).unwrap();
//! host.release_handle(job);
//!
//! let HostValue::Handle(vm) = values[0] else { panic!("expected a handle") };
//! assert_eq!(host.vm_path(vm).as_deref(), Some("/vms/a.vmx"));
//! host.release_handle(vm);
//! assert_eq!(host.live_handles(), 0);
//! ```

use crate::error::ErrorCode;
use crate::handle::RawHandle;
use crate::host::{EventSink, HostApi, HostEvent, JobKind, JobRequest, SearchType};
use crate::property::{HostValue, PropertyId, PropertyType};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// A scriptable, thread-safe [`HostApi`] implementation.
pub struct InMemoryHost {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    next_handle: u32,
    live: HashMap<RawHandle, Resource>,
    connections: HashSet<RawHandle>,

    registered: Vec<String>,
    running: Vec<Vec<u8>>,
    host_properties: HashMap<PropertyId, Slot>,
    vm_properties: HashMap<String, HashMap<PropertyId, Slot>>,
    invalid_open_results: HashSet<String>,

    failures: HashMap<JobKind, ErrorCode>,
    error_texts: HashMap<u16, String>,
    wait_delay: Option<Duration>,

    jobs: Vec<(RawHandle, JobKind)>,
    find_calls: usize,
    waits: usize,
    releases: HashMap<RawHandle, usize>,
    stray_releases: usize,
    disconnects: usize,
}

enum Resource {
    Job(PendingJob),
    Vm { path: String },
    Value,
}

struct PendingJob {
    host: RawHandle,
    op: Operation,
    sink: Option<EventSink>,
    waited: bool,
}

#[derive(Clone)]
enum Operation {
    Connect,
    Register(String),
    Unregister(String),
    Open(String),
    Find(SearchType),
}

impl Operation {
    fn kind(&self) -> JobKind {
        match self {
            Self::Connect => JobKind::Connect,
            Self::Register(_) => JobKind::RegisterVm,
            Self::Unregister(_) => JobKind::UnregisterVm,
            Self::Open(_) => JobKind::OpenVm,
            Self::Find(_) => JobKind::FindItems,
        }
    }
}

#[derive(Clone)]
struct Slot {
    ty: PropertyType,
    value: Option<HostValue>,
}

impl Slot {
    fn typed(value: HostValue) -> Self {
        Self {
            ty: value.property_type(),
            value: Some(value),
        }
    }
}

impl State {
    fn allocate(&mut self, resource: Resource) -> RawHandle {
        self.next_handle += 1;
        let raw = RawHandle(self.next_handle);
        self.live.insert(raw, resource);
        raw
    }

    fn connect(&mut self) -> RawHandle {
        self.next_handle += 1;
        let raw = RawHandle(self.next_handle);
        self.connections.insert(raw);
        raw
    }

    fn slot(&self, owner: RawHandle, id: PropertyId) -> Result<Slot, ErrorCode> {
        if self.connections.contains(&owner) {
            return self
                .host_properties
                .get(&id)
                .cloned()
                .ok_or(ErrorCode::UNRECOGNIZED_PROPERTY);
        }
        match self.live.get(&owner) {
            Some(Resource::Vm { path }) => {
                if id == PropertyId::VM_VMX_PATHNAME {
                    return Ok(Slot::typed(HostValue::from(path.as_str())));
                }
                self.vm_properties
                    .get(path)
                    .and_then(|props| props.get(&id))
                    .cloned()
                    .ok_or(ErrorCode::UNRECOGNIZED_PROPERTY)
            }
            Some(_) => Err(ErrorCode::UNRECOGNIZED_PROPERTY),
            None => Err(ErrorCode::INVALID_HANDLE),
        }
    }

    /// Run a non-discovery job to completion. Returns the result handle, if
    /// the job produces one.
    fn execute(&mut self, host: RawHandle, op: &Operation) -> Result<Option<RawHandle>, ErrorCode> {
        if !matches!(op, Operation::Connect) && !self.connections.contains(&host) {
            return Err(ErrorCode::INVALID_HANDLE);
        }
        if let Some(code) = self.failures.get(&op.kind()) {
            return Err(*code);
        }

        match op {
            Operation::Connect => Ok(Some(self.connect())),
            Operation::Register(path) => {
                if !self.registered.contains(path) {
                    self.registered.push(path.clone());
                }
                Ok(None)
            }
            Operation::Unregister(path) => {
                let idx = self
                    .registered
                    .iter()
                    .position(|p| p == path)
                    .ok_or(ErrorCode::VM_NOT_FOUND)?;
                self.registered.remove(idx);
                Ok(None)
            }
            Operation::Open(path) => {
                if !self.registered.contains(path) {
                    return Err(ErrorCode::FILE_NOT_FOUND);
                }
                if self.invalid_open_results.contains(path) {
                    return Ok(Some(RawHandle::INVALID));
                }
                let path = path.clone();
                Ok(Some(self.allocate(Resource::Vm { path })))
            }
            Operation::Find(_) => Ok(None),
        }
    }

    /// Give back a result handle nobody asked for.
    fn discard(&mut self, raw: RawHandle) {
        self.connections.remove(&raw);
        self.live.remove(&raw);
    }
}

impl Default for InMemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryHost {
    /// Create an empty host with no registered VMs.
    pub fn new() -> Self {
        let mut state = State::default();
        state
            .host_properties
            .insert(PropertyId::HOST_HOSTTYPE, Slot::typed(HostValue::Integer(3)));
        state
            .host_properties
            .insert(PropertyId::HOST_API_VERSION, Slot::typed(HostValue::Integer(1)));
        Self {
            state: Mutex::new(state),
        }
    }

    /// Register the given VM paths.
    pub fn with_registered<I, S>(self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state
            .lock()
            .registered
            .extend(paths.into_iter().map(Into::into));
        self
    }

    /// Report the given VM paths as running, in this order.
    pub fn with_running<I, S>(self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state
            .lock()
            .running
            .extend(paths.into_iter().map(|p| p.into().into_bytes()));
        self
    }

    /// Report a running item whose identifier is arbitrary bytes.
    pub fn with_running_raw(self, location: impl Into<Vec<u8>>) -> Self {
        self.state.lock().running.push(location.into());
        self
    }

    /// Set a property on every connection handle.
    pub fn with_host_property(self, id: PropertyId, value: HostValue) -> Self {
        self.state
            .lock()
            .host_properties
            .insert(id, Slot::typed(value));
        self
    }

    /// Declare a host property of type `Any`, which carries no value.
    pub fn with_untyped_host_property(self, id: PropertyId) -> Self {
        self.state.lock().host_properties.insert(
            id,
            Slot {
                ty: PropertyType::Any,
                value: None,
            },
        );
        self
    }

    /// Set a property on every handle opened for `path`.
    pub fn with_vm_property(
        self,
        path: impl Into<String>,
        id: PropertyId,
        value: HostValue,
    ) -> Self {
        self.state
            .lock()
            .vm_properties
            .entry(path.into())
            .or_default()
            .insert(id, Slot::typed(value));
        self
    }

    /// Let opening `path` succeed but report the invalid handle as its result.
    pub fn with_invalid_open_result(self, path: impl Into<String>) -> Self {
        self.state.lock().invalid_open_results.insert(path.into());
        self
    }

    /// Make every following job of `kind` fail with `code` at wait time.
    ///
    /// Discovery jobs still deliver their items before failing.
    pub fn fail(&self, kind: JobKind, code: ErrorCode) {
        self.state.lock().failures.insert(kind, code);
    }

    /// Undo [`fail`](Self::fail) for `kind`.
    pub fn succeed(&self, kind: JobKind) {
        self.state.lock().failures.remove(&kind);
    }

    /// Override the text reported for `code`.
    pub fn set_error_text(&self, code: ErrorCode, text: impl Into<String>) {
        self.state.lock().error_texts.insert(code.code(), text.into());
    }

    /// Make every wait block the calling thread for `delay` first.
    pub fn set_wait_delay(&self, delay: Duration) {
        self.state.lock().wait_delay = Some(delay);
    }

    /// Establish a connection without going through a connect job.
    pub fn open_connection(&self) -> RawHandle {
        self.state.lock().connect()
    }

    /// Hand out a plain handle that must be released by the caller.
    pub fn allocate_handle(&self) -> RawHandle {
        self.state.lock().allocate(Resource::Value)
    }

    pub fn is_connection(&self, raw: RawHandle) -> bool {
        self.state.lock().connections.contains(&raw)
    }

    /// Currently registered VM paths.
    pub fn registered(&self) -> Vec<String> {
        self.state.lock().registered.clone()
    }

    /// The path behind a live VM handle.
    pub fn vm_path(&self, raw: RawHandle) -> Option<String> {
        match self.state.lock().live.get(&raw) {
            Some(Resource::Vm { path }) => Some(path.clone()),
            _ => None,
        }
    }

    /// Handles of every job submitted so far, oldest first.
    pub fn job_handles(&self) -> Vec<RawHandle> {
        self.state.lock().jobs.iter().map(|(raw, _)| *raw).collect()
    }

    /// Number of jobs submitted, discovery jobs included.
    pub fn submitted_jobs(&self) -> usize {
        self.state.lock().jobs.len()
    }

    /// Number of jobs of `kind` submitted.
    pub fn submitted(&self, kind: JobKind) -> usize {
        self.state
            .lock()
            .jobs
            .iter()
            .filter(|(_, k)| *k == kind)
            .count()
    }

    pub fn find_calls(&self) -> usize {
        self.state.lock().find_calls
    }

    pub fn wait_count(&self) -> usize {
        self.state.lock().waits
    }

    /// How many times `raw` was released, including invalid releases.
    pub fn release_count(&self, raw: RawHandle) -> usize {
        self.state.lock().releases.get(&raw).copied().unwrap_or(0)
    }

    /// Releases of handles that were not live at the time.
    pub fn stray_releases(&self) -> usize {
        self.state.lock().stray_releases
    }

    pub fn disconnect_count(&self) -> usize {
        self.state.lock().disconnects
    }

    /// Job, VM and value handles handed out and not yet released.
    pub fn live_handles(&self) -> usize {
        self.state.lock().live.len()
    }
}

impl HostApi for InMemoryHost {
    fn submit_job(&self, host: RawHandle, request: JobRequest<'_>) -> RawHandle {
        let op = match request {
            JobRequest::Connect(params) => {
                tracing::debug!(host_type = %params.host_type, "In-memory connect job");
                Operation::Connect
            }
            JobRequest::RegisterVm { path } => Operation::Register(path.to_string()),
            JobRequest::UnregisterVm { path } => Operation::Unregister(path.to_string()),
            JobRequest::OpenVm { path } => Operation::Open(path.to_string()),
        };
        let kind = op.kind();

        let mut state = self.state.lock();
        let raw = state.allocate(Resource::Job(PendingJob {
            host,
            op,
            sink: None,
            waited: false,
        }));
        state.jobs.push((raw, kind));
        raw
    }

    fn find_items(&self, host: RawHandle, search: SearchType, sink: EventSink) -> RawHandle {
        let mut state = self.state.lock();
        state.find_calls += 1;
        let raw = state.allocate(Resource::Job(PendingJob {
            host,
            op: Operation::Find(search),
            sink: Some(sink),
            waited: false,
        }));
        state.jobs.push((raw, JobKind::FindItems));
        raw
    }

    fn wait_job(
        &self,
        job: RawHandle,
        results: &[PropertyId],
    ) -> Result<Vec<HostValue>, ErrorCode> {
        let (delay, host, op, sink) = {
            let mut state = self.state.lock();
            state.waits += 1;
            let delay = state.wait_delay;
            let pending = match state.live.get_mut(&job) {
                Some(Resource::Job(pending)) => pending,
                _ => return Err(ErrorCode::INVALID_HANDLE),
            };
            if pending.waited {
                return Err(ErrorCode::OBJECT_IS_BUSY);
            }
            pending.waited = true;
            (delay, pending.host, pending.op.clone(), pending.sink.take())
        };

        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }

        if let Operation::Find(search) = op {
            let (items, failure) = {
                let state = self.state.lock();
                if !state.connections.contains(&host) {
                    return Err(ErrorCode::INVALID_HANDLE);
                }
                let items: Vec<Vec<u8>> = match search {
                    SearchType::Running => state.running.clone(),
                    SearchType::Registered => state
                        .registered
                        .iter()
                        .map(|p| p.clone().into_bytes())
                        .collect(),
                };
                (items, state.failures.get(&JobKind::FindItems).copied())
            };

            // Deliver outside the lock; the sink may be arbitrarily slow.
            if let Some(mut sink) = sink {
                sink(HostEvent::Progress);
                for item in &items {
                    sink(HostEvent::FoundItem { location: item });
                }
            }

            return match failure {
                Some(code) => Err(code),
                None if results.is_empty() => Ok(Vec::new()),
                None => Err(ErrorCode::UNRECOGNIZED_PROPERTY),
            };
        }

        let mut state = self.state.lock();
        let mut produced = state.execute(host, &op)?;

        let mut values = Vec::with_capacity(results.len());
        for id in results {
            match (*id, produced.take()) {
                (PropertyId::JOB_RESULT_HANDLE, Some(raw)) => values.push(HostValue::Handle(raw)),
                (_, leftover) => {
                    if let Some(raw) = leftover {
                        state.discard(raw);
                    }
                    for value in &values {
                        if let HostValue::Handle(raw) = value {
                            state.discard(*raw);
                        }
                    }
                    return Err(ErrorCode::UNRECOGNIZED_PROPERTY);
                }
            }
        }
        if let Some(raw) = produced {
            state.discard(raw);
        }
        Ok(values)
    }

    fn release_handle(&self, handle: RawHandle) {
        let mut state = self.state.lock();
        *state.releases.entry(handle).or_insert(0) += 1;
        if state.live.remove(&handle).is_none() {
            tracing::warn!(%handle, "Release of a handle that is not live");
            state.stray_releases += 1;
        }
    }

    fn disconnect(&self, host: RawHandle) {
        let mut state = self.state.lock();
        state.disconnects += 1;
        state.connections.remove(&host);
    }

    fn property_type(&self, owner: RawHandle, id: PropertyId) -> Result<PropertyType, ErrorCode> {
        self.state.lock().slot(owner, id).map(|slot| slot.ty)
    }

    fn get_property(
        &self,
        owner: RawHandle,
        id: PropertyId,
        ty: PropertyType,
    ) -> Result<HostValue, ErrorCode> {
        let mut state = self.state.lock();
        let slot = state.slot(owner, id)?;
        if slot.ty != ty {
            return Err(ErrorCode::TYPE_MISMATCH);
        }
        match slot.value {
            // Each read hands the caller its own handle.
            Some(HostValue::Handle(_)) => Ok(HostValue::Handle(state.allocate(Resource::Value))),
            Some(value) => Ok(value),
            None => Err(ErrorCode::TYPE_MISMATCH),
        }
    }

    fn error_text(&self, code: ErrorCode) -> String {
        self.state
            .lock()
            .error_texts
            .get(&code.code())
            .cloned()
            .unwrap_or_else(|| code.default_text().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    type Collected = (Result<Vec<HostValue>, ErrorCode>, Vec<Vec<u8>>);

    fn collect(host: &InMemoryHost, conn: RawHandle, search: SearchType) -> Collected {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = seen.clone();
        let job = host.find_items(
            conn,
            search,
            Box::new(move |event| {
                if let HostEvent::FoundItem { location } = event {
                    sink_seen.lock().push(location.to_vec());
                }
            }),
        );
        let outcome = host.wait_job(job, &[]);
        host.release_handle(job);
        let items = seen.lock().clone();
        (outcome, items)
    }

    #[test]
    fn test_register_then_unregister() {
        let host = InMemoryHost::new();
        let conn = host.open_connection();

        let job = host.submit_job(conn, JobRequest::RegisterVm { path: "/vm/a.vmx" });
        assert_eq!(host.wait_job(job, &[]), Ok(vec![]));
        host.release_handle(job);
        assert_eq!(host.registered(), vec!["/vm/a.vmx".to_string()]);

        let job = host.submit_job(conn, JobRequest::UnregisterVm { path: "/vm/a.vmx" });
        assert_eq!(host.wait_job(job, &[]), Ok(vec![]));
        host.release_handle(job);
        assert!(host.registered().is_empty());
        assert_eq!(host.live_handles(), 0);
    }

    #[test]
    fn test_unregister_unknown_vm_fails() {
        let host = InMemoryHost::new();
        let conn = host.open_connection();
        let job = host.submit_job(conn, JobRequest::UnregisterVm { path: "/vm/x.vmx" });
        assert_eq!(host.wait_job(job, &[]), Err(ErrorCode::VM_NOT_FOUND));
        host.release_handle(job);
    }

    #[test]
    fn test_jobs_against_invalid_host_fail_at_wait() {
        let host = InMemoryHost::new().with_registered(["/vm/a.vmx"]);
        let job = host.submit_job(RawHandle::INVALID, JobRequest::OpenVm { path: "/vm/a.vmx" });
        assert!(job.is_valid());
        assert_eq!(
            host.wait_job(job, &[PropertyId::JOB_RESULT_HANDLE]),
            Err(ErrorCode::INVALID_HANDLE)
        );
        host.release_handle(job);
        assert_eq!(host.live_handles(), 0);
    }

    #[test]
    fn test_second_wait_is_rejected() {
        let host = InMemoryHost::new();
        let conn = host.open_connection();
        let job = host.submit_job(conn, JobRequest::RegisterVm { path: "/vm/a.vmx" });
        assert!(host.wait_job(job, &[]).is_ok());
        assert_eq!(host.wait_job(job, &[]), Err(ErrorCode::OBJECT_IS_BUSY));
        host.release_handle(job);
    }

    #[test]
    fn test_connect_job_yields_connection() {
        let host = InMemoryHost::new();
        let params = crate::ConnectParams {
            api_version: -1,
            host_type: crate::HostType::Workstation,
            host_name: None,
            port: 0,
            user_name: None,
            password: None,
        };
        let job = host.submit_job(RawHandle::INVALID, JobRequest::Connect(params));
        let values = host.wait_job(job, &[PropertyId::JOB_RESULT_HANDLE]).unwrap();
        host.release_handle(job);

        let HostValue::Handle(conn) = values[0] else {
            panic!("expected a handle");
        };
        assert!(host.is_connection(conn));
        assert_eq!(host.live_handles(), 0);
    }

    #[test]
    fn test_unrequested_result_handle_is_discarded() {
        let host = InMemoryHost::new().with_registered(["/vm/a.vmx"]);
        let conn = host.open_connection();
        let job = host.submit_job(conn, JobRequest::OpenVm { path: "/vm/a.vmx" });
        assert_eq!(host.wait_job(job, &[]), Ok(vec![]));
        host.release_handle(job);
        assert_eq!(host.live_handles(), 0);
    }

    #[test]
    fn test_succeed_clears_scripted_failure() {
        let host = InMemoryHost::new();
        let conn = host.open_connection();
        host.fail(JobKind::RegisterVm, ErrorCode::DISK_FULL);

        let job = host.submit_job(conn, JobRequest::RegisterVm { path: "/vm/a.vmx" });
        assert_eq!(host.wait_job(job, &[]), Err(ErrorCode::DISK_FULL));
        host.release_handle(job);

        host.succeed(JobKind::RegisterVm);
        let job = host.submit_job(conn, JobRequest::RegisterVm { path: "/vm/a.vmx" });
        assert_eq!(host.wait_job(job, &[]), Ok(vec![]));
        host.release_handle(job);

        assert_eq!(host.registered(), vec!["/vm/a.vmx".to_string()]);
        assert_eq!(host.live_handles(), 0);
    }

    #[test]
    fn test_invalid_open_result() {
        let host = InMemoryHost::new()
            .with_registered(["/vm/a.vmx"])
            .with_invalid_open_result("/vm/a.vmx");
        let conn = host.open_connection();

        let job = host.submit_job(conn, JobRequest::OpenVm { path: "/vm/a.vmx" });
        assert_eq!(
            host.wait_job(job, &[PropertyId::JOB_RESULT_HANDLE]),
            Ok(vec![HostValue::Handle(RawHandle::INVALID)])
        );
        host.release_handle(job);
        assert_eq!(host.live_handles(), 0);
    }

    #[test]
    fn test_find_items_delivers_in_order() {
        let host = InMemoryHost::new().with_running(["a", "b", "c"]);
        let conn = host.open_connection();
        let (outcome, items) = collect(&host, conn, SearchType::Running);
        assert_eq!(outcome, Ok(vec![]));
        assert_eq!(items, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
        assert_eq!(host.find_calls(), 1);
        assert_eq!(host.live_handles(), 0);
    }

    #[test]
    fn test_failing_find_still_delivers_items() {
        let host = InMemoryHost::new().with_registered(["/vm/a.vmx"]);
        host.fail(JobKind::FindItems, ErrorCode::FAIL);
        let conn = host.open_connection();
        let (outcome, items) = collect(&host, conn, SearchType::Registered);
        assert_eq!(outcome, Err(ErrorCode::FAIL));
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn test_property_type_and_mismatch() {
        let host = InMemoryHost::new()
            .with_host_property(PropertyId::HOST_SOFTWARE_VERSION, HostValue::from("2.0"));
        let conn = host.open_connection();

        let ty = host.property_type(conn, PropertyId::HOST_SOFTWARE_VERSION).unwrap();
        assert_eq!(ty, PropertyType::String);
        assert_eq!(
            host.get_property(conn, PropertyId::HOST_SOFTWARE_VERSION, PropertyType::Integer),
            Err(ErrorCode::TYPE_MISMATCH)
        );
        assert_eq!(
            host.property_type(RawHandle(999), PropertyId::HOST_SOFTWARE_VERSION),
            Err(ErrorCode::INVALID_HANDLE)
        );
        assert_eq!(
            host.property_type(conn, PropertyId::VM_NAME),
            Err(ErrorCode::UNRECOGNIZED_PROPERTY)
        );
    }

    #[test]
    fn test_handle_property_reads_are_owned() {
        let host = InMemoryHost::new()
            .with_host_property(PropertyId(900), HostValue::Handle(RawHandle(1)));
        let conn = host.open_connection();

        let first = host.get_property(conn, PropertyId(900), PropertyType::Handle).unwrap();
        let second = host.get_property(conn, PropertyId(900), PropertyType::Handle).unwrap();
        assert_ne!(first, second);
        assert_eq!(host.live_handles(), 2);
    }

    #[test]
    fn test_stray_release_is_counted() {
        let host = InMemoryHost::new();
        let raw = host.allocate_handle();
        host.release_handle(raw);
        host.release_handle(raw);
        assert_eq!(host.release_count(raw), 2);
        assert_eq!(host.stray_releases(), 1);
    }

    #[test]
    fn test_error_text_override() {
        let host = InMemoryHost::new();
        assert_eq!(host.error_text(ErrorCode::DISK_FULL), ErrorCode::DISK_FULL.default_text());
        host.set_error_text(ErrorCode::DISK_FULL, "disk full");
        assert_eq!(host.error_text(ErrorCode::DISK_FULL), "disk full");
    }
}
