//! Moving a virtual disk from the VMs that reference it onto a target VM.
//!
//! The sequence is strictly ordered: every VM under the scan root is
//! examined and, on a match, reconfigured without the disk; only after the
//! whole loop has finished is the disk attached to the target. There is no
//! rollback: if the attach fails the disk is left detached everywhere.

use crate::client::VimClient;
use crate::config_spec::ConfigSpec;
use crate::datastore::{scan_root, DatastorePath};
use crate::device::{first_controller, BackingFile, DiskBacking, VirtualDevice};
use crate::error::{Error, Result};
use crate::inventory::{walk, VmRef, VIRTUAL_MACHINE};
use crate::task::{TaskWaitConfig, TaskWaiter};

/// Remove the disk backed by `disk` from `vm`.
///
/// Returns the datastore-relative path of the removed file, or `None` when
/// no disk on the VM uses that file, in which case nothing is submitted.
/// Disks with a backing type that carries no readable file name are skipped.
pub fn detach<C: VimClient + ?Sized>(
    client: &C,
    vm: &VmRef,
    disk: &DatastorePath,
    wait: &TaskWaitConfig,
) -> Result<Option<String>> {
    let wanted = disk.to_string();
    let devices = client.retrieve_hardware(vm)?;

    let matched = devices.into_iter().find(|device| {
        match device.backing().map(DiskBacking::file_name) {
            Some(BackingFile::Recognized(file)) => file == wanted,
            Some(BackingFile::Unrecognized(kind)) => {
                tracing::warn!(
                    vm = %vm,
                    key = device.key,
                    backing = kind,
                    "skipping disk with unrecognized backing"
                );
                false
            }
            None => false,
        }
    });

    let Some(device) = matched else {
        return Ok(None);
    };

    tracing::info!(vm = %vm, key = device.key, disk = %wanted, "removing disk");

    let mut spec = ConfigSpec::new();
    spec.remove_device(device);

    let task = client.reconfigure(vm, &spec)?;
    TaskWaiter::with_config(client, wait.clone()).wait(&task, "detach disk")?;

    Ok(Some(disk.path().to_string()))
}

/// What [`attach`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachOutcome {
    /// The disk was added and is present on the VM.
    Attached { controller_key: i32 },
    /// The VM already had a disk backed by the file.
    AlreadyAttached,
}

/// Attach the existing file `disk` to `vm` on its first controller.
///
/// Waits for the add-device task and then re-reads the device list; the
/// attach only succeeds once a disk backed by the file is present.
pub fn attach<C: VimClient + ?Sized>(
    client: &C,
    vm: &VmRef,
    disk: &DatastorePath,
    wait: &TaskWaitConfig,
) -> Result<AttachOutcome> {
    let wanted = disk.to_string();
    let devices = client.devices(vm)?;

    if devices.iter().any(|d| d.is_backed_by(&wanted)) {
        tracing::info!(vm = %vm, disk = %wanted, "disk already attached");
        return Ok(AttachOutcome::AlreadyAttached);
    }

    let controller = first_controller(&devices)
        .ok_or_else(|| Error::ControllerNotFound(vm.path.clone()))?;
    let controller_key = controller.key;
    let new_disk = VirtualDevice::new_disk(controller, disk);

    tracing::info!(vm = %vm, controller = controller_key, disk = %wanted, "attaching disk");

    let task = client.add_device(vm, new_disk)?;
    TaskWaiter::with_config(client, wait.clone()).wait(&task, "attach disk")?;

    let present = client
        .devices(vm)?
        .iter()
        .any(|d| d.is_backed_by(&wanted));
    if !present {
        return Err(Error::AttachNotConfirmed {
            vm: vm.path.clone(),
            disk: wanted,
        });
    }

    Ok(AttachOutcome::Attached { controller_key })
}

/// Inputs of a relocation run.
#[derive(Debug, Clone)]
pub struct RelocationRequest {
    /// Inventory path of the VM that receives the disk.
    pub target_vm: String,
    /// Disk to move.
    pub disk: DatastorePath,
    /// Inventory subtree to scan; defaults to the target's datacenter.
    pub base_path: Option<String>,
    pub wait: TaskWaitConfig,
}

/// Summary of a relocation run.
#[derive(Debug)]
pub struct RelocationReport {
    pub target: VmRef,
    /// Root the scan started from.
    pub scan_root: String,
    /// Every VM path examined.
    pub scanned: Vec<String>,
    /// VMs the disk was removed from.
    pub detached_from: Vec<String>,
    /// VMs whose detach failed.
    pub failures: Vec<(String, Error)>,
    /// Inventory branches that could not be listed.
    pub skipped_branches: Vec<(String, Error)>,
    pub attach: AttachOutcome,
}

/// Detach `request.disk` from every VM under the scan root, then attach it
/// to the target VM.
pub fn relocate<C: VimClient + ?Sized>(
    client: &C,
    request: &RelocationRequest,
) -> Result<RelocationReport> {
    let root = scan_root(request.base_path.as_deref(), &request.target_vm)?;
    let target = client.find_vm(&request.target_vm)?;

    tracing::info!(root = %root, target_vm = %target, disk = %request.disk, "scanning inventory");

    let walked = walk(client, &root, VIRTUAL_MACHINE)?;

    let mut detached_from = Vec::new();
    let mut failures = Vec::new();

    for path in &walked.paths {
        tracing::info!(vm = %path, "examining");

        let outcome = client.find_vm(path).and_then(|vm| {
            if vm.reference == target.reference {
                tracing::debug!(vm = %path, "skipping target VM");
                return Ok(None);
            }
            detach(client, &vm, &request.disk, &request.wait)
        });

        match outcome {
            Ok(Some(file)) => {
                tracing::info!(vm = %path, file = %file, "disk detached");
                detached_from.push(path.clone());
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(vm = %path, error = %e, "detach failed, continuing");
                failures.push((path.clone(), e));
            }
        }
    }

    if detached_from.len() > 1 {
        tracing::warn!(
            count = detached_from.len(),
            vms = ?detached_from,
            "disk was attached to more than one VM"
        );
    }

    let attached = match attach(client, &target, &request.disk, &request.wait) {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(
                vm = %target,
                detached_from = ?detached_from,
                "attach failed after detaching; disk is not attached to any VM"
            );
            return Err(e);
        }
    };

    Ok(RelocationReport {
        target,
        scan_root: root,
        scanned: walked.paths,
        detached_from,
        failures,
        skipped_branches: walked.errors,
        attach: attached,
    })
}
