//! Job protocol: submit host work, block until it completes, extract results.
//!
//! Every blocking host interaction passes through [`Job::wait`]. A [`Job`]
//! owns its native handle, so it is consumed by exactly one wait and its
//! handle is released when the wait returns, on success and failure alike.

use hostvix_api::{
    ErrorCode, EventSink, HostApi, HostValue, JobKind, JobRequest, OwnedHandle, PropertyId,
    RawHandle, SearchType,
};
use std::sync::Arc;
use thiserror::Error;

/// Result shape a caller expects from a completed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    /// Success is the only result.
    None,
    /// One owned handle (used by open and connect).
    SingleHandle,
}

impl ResultKind {
    fn properties(&self) -> &'static [PropertyId] {
        match self {
            Self::None => &[],
            Self::SingleHandle => &[PropertyId::JOB_RESULT_HANDLE],
        }
    }
}

/// Values extracted from a successfully completed job.
#[derive(Debug)]
pub enum JobResult {
    None,
    Handle(OwnedHandle),
}

impl JobResult {
    /// Take the result handle, if the job produced one.
    pub fn into_handle(self) -> Option<OwnedHandle> {
        match self {
            Self::Handle(handle) => Some(handle),
            Self::None => None,
        }
    }
}

/// A failed job: the host's native code and its text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} ({code})")]
pub struct JobError {
    pub code: ErrorCode,
    pub message: String,
}

impl JobError {
    fn from_code(api: &dyn HostApi, code: ErrorCode) -> Self {
        Self {
            code,
            message: api.error_text(code),
        }
    }
}

/// A submitted unit of host work.
#[derive(Debug)]
pub struct Job {
    handle: OwnedHandle,
    kind: JobKind,
}

impl Job {
    /// Submit `request` against `host`. Never blocks; errors surface at wait.
    pub fn submit(api: &Arc<dyn HostApi>, host: RawHandle, request: JobRequest<'_>) -> Self {
        let kind = request.kind();
        let raw = api.submit_job(host, request);
        tracing::debug!(job = %raw, %host, %kind, "Submitted job");
        Self {
            handle: OwnedHandle::new(api.clone(), raw),
            kind,
        }
    }

    /// Submit a discovery job that reports each item to `sink`.
    pub fn find_items(
        api: &Arc<dyn HostApi>,
        host: RawHandle,
        search: SearchType,
        sink: EventSink,
    ) -> Self {
        let raw = api.find_items(host, search, sink);
        tracing::debug!(job = %raw, %host, %search, "Submitted discovery job");
        Self {
            handle: OwnedHandle::new(api.clone(), raw),
            kind: JobKind::FindItems,
        }
    }

    /// The native job handle.
    pub fn handle(&self) -> RawHandle {
        self.handle.raw()
    }

    pub fn kind(&self) -> JobKind {
        self.kind
    }

    /// Block the calling thread until the job completes.
    ///
    /// The job handle is released before this returns.
    pub fn wait(self, expect: ResultKind) -> Result<JobResult, JobError> {
        let (api, values) = self.complete(expect)?;
        match expect {
            ResultKind::None => {
                // Anything handed back unasked is ours to release.
                release_handles(&api, values);
                Ok(JobResult::None)
            }
            ResultKind::SingleHandle => extract_handle(&api, values).map(JobResult::Handle),
        }
    }

    /// Block until the job completes and take its single result handle.
    pub fn wait_handle(self) -> Result<OwnedHandle, JobError> {
        let (api, values) = self.complete(ResultKind::SingleHandle)?;
        extract_handle(&api, values)
    }

    /// [`wait`](Self::wait) on tokio's blocking pool, so the runtime keeps
    /// scheduling other tasks while this one is parked on the host.
    ///
    /// A panic inside the wait is resumed here.
    pub async fn wait_yielding(self, expect: ResultKind) -> Result<JobResult, JobError> {
        self.yielding(move |job| job.wait(expect)).await
    }

    /// [`wait_handle`](Self::wait_handle) on tokio's blocking pool.
    pub async fn wait_handle_yielding(self) -> Result<OwnedHandle, JobError> {
        self.yielding(Job::wait_handle).await
    }

    async fn yielding<T, F>(self, wait: F) -> Result<T, JobError>
    where
        T: Send + 'static,
        F: FnOnce(Self) -> Result<T, JobError> + Send + 'static,
    {
        let kind = self.kind;
        match tokio::task::spawn_blocking(move || wait(self)).await {
            Ok(outcome) => outcome,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => {
                tracing::warn!(%kind, error = %e, "Blocking wait was cancelled");
                Err(JobError {
                    code: ErrorCode::CANCELLED,
                    message: format!("wait for {kind} job was cancelled: {e}"),
                })
            }
        }
    }

    /// Wait for completion and read `expect`'s result properties. The job
    /// handle is released whatever the outcome.
    fn complete(
        self,
        expect: ResultKind,
    ) -> Result<(Arc<dyn HostApi>, Vec<HostValue>), JobError> {
        let api = self.handle.api().clone();
        let raw = self.handle.raw();
        let start = std::time::Instant::now();

        let outcome = api.wait_job(raw, expect.properties());
        drop(self);

        let values = outcome.map_err(|code| {
            tracing::debug!(job = %raw, code = code.code(), "Job failed");
            JobError::from_code(api.as_ref(), code)
        })?;

        tracing::debug!(
            job = %raw,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Job completed"
        );
        Ok((api, values))
    }
}

fn extract_handle(
    api: &Arc<dyn HostApi>,
    values: Vec<HostValue>,
) -> Result<OwnedHandle, JobError> {
    let mut values = values.into_iter();
    let result = match values.next() {
        Some(HostValue::Handle(raw)) if raw.is_valid() => Ok(OwnedHandle::new(api.clone(), raw)),
        Some(HostValue::Handle(_)) | None => {
            tracing::warn!("Job completed without a usable result handle");
            Err(JobError::from_code(api.as_ref(), ErrorCode::NOT_FOUND))
        }
        Some(other) => {
            tracing::warn!(ty = %other.property_type(), "Job result is not a handle");
            Err(JobError::from_code(api.as_ref(), ErrorCode::TYPE_MISMATCH))
        }
    };
    release_handles(api, values);
    result
}

fn release_handles(api: &Arc<dyn HostApi>, values: impl IntoIterator<Item = HostValue>) {
    for value in values {
        if let HostValue::Handle(extra) = value {
            drop(OwnedHandle::new(api.clone(), extra));
        }
    }
}
