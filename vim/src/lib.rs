//! # vim
//!
//! Inventory walking and virtual disk relocation for vSphere.
//!
//! The remote platform is reached through the [`VimClient`] trait; the
//! bundled [`GovcClient`] drives the `govc` command-line client and parses
//! its JSON output.
//!
//! ## Features
//!
//! - **Inventory walker**: collect every object of a type below a folder or datacenter
//! - **Disk relocation**: detach a VMDK from every VM that uses it, attach it to a target
//! - **Task waiting**: block on reconfiguration tasks with timeout and progress callback
//! - **Typed errors**: failures classified for reporting
//!
//! ## Example
//!
//! ```no_run
//! use vim::{ConnectionConfig, GovcClient, RelocationRequest, TaskWaitConfig};
//!
//! fn main() -> vim::Result<()> {
//!     let client = GovcClient::connect(ConnectionConfig::new("https://vc.example.com/sdk"))?;
//!
//!     let report = vim::relocate(
//!         &client,
//!         &RelocationRequest {
//!             target_vm: "/dc1/vm/web01".to_string(),
//!             disk: "[datastore1] scrap1/scrap1.vmdk".parse()?,
//!             base_path: None,
//!             wait: TaskWaitConfig::default(),
//!         },
//!     )?;
//!
//!     println!("detached from {:?}", report.detached_from);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config_spec;
pub mod connection;
pub mod datastore;
pub mod device;
pub mod error;
pub mod govc;
pub mod inventory;
pub mod relocate;
pub mod task;

#[cfg(test)]
mod testing;

pub use client::VimClient;
pub use config_spec::{ConfigSpec, DeviceConfigSpec, DeviceOperation};
pub use connection::{ConnectionConfig, Credentials, DEFAULT_GOVC, DEFAULT_URL};
pub use datastore::{datacenter_of, scan_root, DatastorePath};
pub use device::{
    first_controller, BackingFile, ControllerKind, DeviceKind, DiskBacking, VirtualDevice,
};
pub use error::{Error, FailureType, Result};
pub use govc::GovcClient;
pub use inventory::{
    walk, InventoryObject, ManagedObjectReference, VmRef, WalkReport, CONTAINER_TYPES, DATACENTER,
    FOLDER, VIRTUAL_MACHINE,
};
pub use relocate::{
    attach, detach, relocate, AttachOutcome, RelocationReport, RelocationRequest,
};
pub use task::{
    Task, TaskInfo, TaskState, TaskWaitConfig, TaskWaiter, DEFAULT_POLL_INTERVAL,
    DEFAULT_TASK_TIMEOUT,
};
