//! # hostvix-api
//!
//! The handle-based interface of a virtualization host, as consumed by
//! `hostvix-core`, plus the ownership guards for the handles it returns.
//!
//! ## Handle discipline
//!
//! ```text
//! submit_job / find_items ──▶ job handle ──▶ wait_job ──▶ release_handle
//!                                               │
//!                                               └─▶ result handle (VM) ──▶ release_handle
//! connect job ──▶ host handle ──▶ disconnect
//! ```
//!
//! Each handle has exactly one owner. [`OwnedHandle`] and
//! [`ConnectionHandle`] enforce that by construction: neither is `Clone`,
//! and each gives its handle back exactly once, on drop.
//!
//! ## Features
//!
//! - **`HostApi` trait**: submit, wait, release, discovery, typed properties
//! - **Ownership guards**: release-on-drop wrappers for native handles
//! - **`InMemoryHost`**: scriptable in-process host with leak accounting

mod error;
mod handle;
mod host;
mod memory;
mod property;

pub use error::ErrorCode;
pub use handle::{ConnectionHandle, OwnedHandle, RawHandle};
pub use host::{
    ConnectParams, EventSink, HostApi, HostEvent, HostType, JobKind, JobRequest, SearchType,
};
pub use memory::InMemoryHost;
pub use property::{HostValue, PropertyId, PropertyType};
