//! # hostvix-core
//!
//! Session layer for managing virtual machines on a virtualization host.
//!
//! This crate turns the handle-and-job interface of [`hostvix_api`] into
//! owned, typed values: a [`HostSession`] that owns its connection, and
//! [`VirtualMachineRef`]s that own their VM handles.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                       hostvix-core                       │
//! ├──────────────────────────────────────────────────────────┤
//! │                                                          │
//! │  ┌─────────────────┐     ┌──────────────────────────┐   │
//! │  │  HostSession    │────▶│  Job                     │   │
//! │  │  - running()    │     │  - submit / find_items   │   │
//! │  │  - registered() │     │  - wait_yielding()       │   │
//! │  │  - register()   │     └──────────────────────────┘   │
//! │  │  - unregister() │                │                   │
//! │  │  - open()       │     ┌──────────────────────────┐   │
//! │  │  - property()   │     │  DiscoveryCollector      │   │
//! │  └─────────────────┘     └──────────────────────────┘   │
//! │           │                                              │
//! │           ▼                                              │
//! │  ┌─────────────────┐     ┌──────────────────────────┐   │
//! │  │VirtualMachineRef│────▶│  get_property()          │   │
//! │  │  - property()   │     │  (typed property codec)  │   │
//! │  └─────────────────┘     └──────────────────────────┘   │
//! │                                                          │
//! └──────────────────────────────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │                 dyn HostApi (hostvix-api)                │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use hostvix_core::{ConnectConfig, HostSession};
//! use hostvix_core::hostvix_api::{HostType, PropertyId};
//!
//! # use std::sync::Arc;
//! # use hostvix_core::hostvix_api::HostApi;
//! # async fn example(api: Arc<dyn HostApi>) -> hostvix_core::Result<()> {
//! let config = ConnectConfig::builder()
//!     .host_type(HostType::Workstation)
//!     .build()?;
//!
//! let mut session = HostSession::connect(api, &config).await?;
//!
//! for path in session.registered().await? {
//!     println!("registered: {path}");
//! }
//!
//! if let Some(vm) = session.open("/vms/build.vmx").await? {
//!     let cpus = vm.property(PropertyId::VM_NUM_VCPUS)?;
//!     println!("{} has {:?} vCPUs", vm.path(), cpus.as_integer());
//! }
//!
//! session.disconnect();
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - **Owned handles**: connections and VM handles are given back exactly once
//! - **Typed properties**: values decoded by the property's declared type
//! - **Discovery**: running and registered VMs, in host order
//! - **Cooperative waits**: host jobs run on tokio's blocking pool

mod config;
mod discovery;
mod error;
mod job;
mod property;
mod session;
mod vm;

pub use hostvix_api;

pub use config::{ConnectConfig, ConnectConfigBuilder, LATEST_API_VERSION};
pub use discovery::{enumerate, DiscoveryCollector};
pub use error::{ErrorKind, RegistrationAction, Result, VixError};
pub use job::{Job, JobError, JobResult, ResultKind};
pub use property::{get_property, PropertyValue};
pub use session::HostSession;
pub use vm::VirtualMachineRef;
