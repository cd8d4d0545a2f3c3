//! Inventory objects and the container walker.

use crate::client::VimClient;
use crate::error::{Error, Result};
use core::fmt;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Type tag of folders.
pub const FOLDER: &str = "Folder";
/// Type tag of datacenters.
pub const DATACENTER: &str = "Datacenter";
/// Type tag of virtual machines.
pub const VIRTUAL_MACHINE: &str = "VirtualMachine";

/// Container types the walker descends into.
pub const CONTAINER_TYPES: [&str; 2] = [FOLDER, DATACENTER];

/// Opaque handle identifying a remote inventory entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ManagedObjectReference {
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(rename = "Value")]
    pub value: String,
}

impl ManagedObjectReference {
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
        }
    }

    pub fn is_container(&self) -> bool {
        CONTAINER_TYPES.contains(&self.kind.as_str())
    }
}

impl fmt::Display for ManagedObjectReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.value)
    }
}

/// One child returned by an inventory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryObject {
    pub reference: ManagedObjectReference,
    pub path: String,
}

impl InventoryObject {
    pub fn new(reference: ManagedObjectReference, path: impl Into<String>) -> Self {
        Self {
            reference,
            path: path.into(),
        }
    }
}

/// Local handle of a remote virtual machine.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VmRef {
    pub path: String,
    pub reference: ManagedObjectReference,
}

impl VmRef {
    pub fn new(path: impl Into<String>, reference: ManagedObjectReference) -> Self {
        Self {
            path: path.into(),
            reference,
        }
    }
}

impl fmt::Display for VmRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

/// Result of an inventory walk.
#[derive(Debug, Default)]
pub struct WalkReport {
    /// Paths of matching objects, in discovery order.
    pub paths: Vec<String>,
    /// Subtrees that could not be listed.
    pub errors: Vec<(String, Error)>,
}

/// Collect the paths of every object of `target_type` reachable from `base_path`.
///
/// Folders and datacenters are descended into whether or not they match.
/// A subtree whose listing fails is recorded in [`WalkReport::errors`] and
/// skipped; only a failure to list `base_path` itself aborts the walk.
pub fn walk<C: VimClient + ?Sized>(
    client: &C,
    base_path: &str,
    target_type: &str,
) -> Result<WalkReport> {
    let mut report = WalkReport::default();
    let mut visited: HashSet<ManagedObjectReference> = HashSet::new();

    let mut pending = vec![client.list_children(base_path)?];

    while let Some(children) = pending.pop() {
        let mut containers = Vec::new();
        for child in children {
            if !visited.insert(child.reference.clone()) {
                tracing::debug!(object = %child.reference, path = %child.path, "already visited");
                continue;
            }
            if child.reference.kind == target_type {
                report.paths.push(child.path.clone());
            }
            if child.reference.is_container() {
                containers.push(child.path);
            }
        }

        // Reversed so the stack yields subtrees in listing order.
        for path in containers.into_iter().rev() {
            match client.list_children(&path) {
                Ok(children) => pending.push(children),
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "skipping inventory branch");
                    report.errors.push((path, e));
                }
            }
        }
    }

    Ok(report)
}
