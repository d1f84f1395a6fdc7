//! Discovery: turn a streamed enumeration into an ordered list.
//!
//! The host reports each discovered VM through a callback while the
//! discovery job runs. [`DiscoveryCollector`] appends those reports in
//! arrival order; the list becomes visible only once the job has completed
//! successfully.

use crate::error::{Result, VixError};
use crate::job::{Job, ResultKind};
use hostvix_api::{EventSink, HostApi, HostEvent, RawHandle, SearchType};
use parking_lot::Mutex;
use std::sync::Arc;

/// Accumulates item identifiers reported by a discovery job.
///
/// The sink never rejects an item. Identifiers are kept as raw bytes and
/// only converted when the collector is finished, so a bad identifier fails
/// the whole enumeration instead of stalling the host mid-job.
#[derive(Debug, Default)]
pub struct DiscoveryCollector {
    items: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl DiscoveryCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that appends every found item to this collector.
    pub fn sink(&self) -> EventSink {
        let items = Arc::clone(&self.items);
        Box::new(move |event| {
            if let HostEvent::FoundItem { location } = event {
                tracing::trace!(item = %String::from_utf8_lossy(location), "Discovered item");
                items.lock().push(location.to_vec());
            }
        })
    }

    /// Number of items collected so far.
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Convert the collected identifiers, preserving arrival order.
    pub fn finish(self) -> std::result::Result<Vec<String>, std::string::FromUtf8Error> {
        let items = std::mem::take(&mut *self.items.lock());
        items.into_iter().map(String::from_utf8).collect()
    }
}

/// Enumerate the VMs in `search` on `host`.
///
/// An invalid `host` yields an empty list without submitting anything.
pub async fn enumerate(
    api: &Arc<dyn HostApi>,
    host: RawHandle,
    search: SearchType,
) -> Result<Vec<String>> {
    if !host.is_valid() {
        return Ok(Vec::new());
    }

    let collector = DiscoveryCollector::new();
    let job = Job::find_items(api, host, search, collector.sink());

    if let Err(e) = job.wait_yielding(ResultKind::None).await {
        tracing::warn!(%search, discarded = collector.len(), error = %e, "Enumeration failed");
        return Err(VixError::Discovery {
            search,
            code: Some(e.code),
            message: e.message,
        });
    }

    let items = collector.finish().map_err(|e| VixError::Discovery {
        search,
        code: None,
        message: format!("item identifier is not valid UTF-8: {e}"),
    })?;

    tracing::debug!(%search, count = items.len(), "Enumeration complete");
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use hostvix_api::{ErrorCode, InMemoryHost, JobKind};

    #[test]
    fn test_collector_keeps_arrival_order() {
        let collector = DiscoveryCollector::new();
        let mut sink = collector.sink();
        sink(HostEvent::Progress);
        sink(HostEvent::FoundItem { location: b"b" });
        sink(HostEvent::FoundItem { location: b"a" });
        sink(HostEvent::FoundItem { location: b"c" });
        drop(sink);

        assert_eq!(collector.len(), 3);
        assert_eq!(collector.finish().unwrap(), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_collector_defers_conversion_errors() {
        let collector = DiscoveryCollector::new();
        let mut sink = collector.sink();
        sink(HostEvent::FoundItem { location: b"ok" });
        sink(HostEvent::FoundItem { location: &[0xff, 0xfe] });
        sink(HostEvent::FoundItem { location: b"after" });

        assert_eq!(collector.len(), 3);
        assert!(collector.finish().is_err());
    }

    #[tokio::test]
    async fn test_invalid_host_submits_nothing() {
        let host = Arc::new(InMemoryHost::new().with_running(["a"]));
        let api: Arc<dyn HostApi> = host.clone();

        let items = enumerate(&api, RawHandle::INVALID, SearchType::Running)
            .await
            .unwrap();

        assert!(items.is_empty());
        assert_eq!(host.find_calls(), 0);
        assert_eq!(host.submitted_jobs(), 0);
    }

    #[tokio::test]
    async fn test_failed_job_discards_partial_list() {
        let host = Arc::new(InMemoryHost::new().with_registered(["/vm/a.vmx", "/vm/b.vmx"]));
        host.fail(JobKind::FindItems, ErrorCode::NOT_SUPPORTED);
        let conn = host.open_connection();
        let api: Arc<dyn HostApi> = host.clone();

        let err = enumerate(&api, conn, SearchType::Registered)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Discovery);
        assert_eq!(err.code(), Some(ErrorCode::NOT_SUPPORTED));
        assert_eq!(host.live_handles(), 0);
    }

    #[tokio::test]
    async fn test_bad_identifier_fails_enumeration() {
        let host = Arc::new(
            InMemoryHost::new()
                .with_running(["a"])
                .with_running_raw(vec![0xc3, 0x28]),
        );
        let conn = host.open_connection();
        let api: Arc<dyn HostApi> = host.clone();

        let err = enumerate(&api, conn, SearchType::Running).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Discovery);
        assert_eq!(err.code(), None);
        assert_eq!(host.live_handles(), 0);
    }
}
