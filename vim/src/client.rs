//! The management API seam.

use crate::config_spec::ConfigSpec;
use crate::device::VirtualDevice;
use crate::error::Result;
use crate::inventory::{InventoryObject, VmRef};
use crate::task::{Task, TaskInfo};

/// Remote operations the inventory walker and disk relocator depend on.
///
/// Implementations perform one blocking round trip per call. Only
/// [`VimClient::reconfigure`] starts work that outlives the call; its
/// progress is observed through [`VimClient::task_info`].
pub trait VimClient {
    /// List the immediate children of an inventory container.
    fn list_children(&self, path: &str) -> Result<Vec<InventoryObject>>;

    /// Resolve a VM by inventory path.
    fn find_vm(&self, path: &str) -> Result<VmRef>;

    /// Devices of the VM's `config.hardware` property.
    fn retrieve_hardware(&self, vm: &VmRef) -> Result<Vec<VirtualDevice>>;

    /// Current device list of the VM.
    fn devices(&self, vm: &VmRef) -> Result<Vec<VirtualDevice>>;

    /// Submit a change set, returning the task that applies it.
    fn reconfigure(&self, vm: &VmRef, spec: &ConfigSpec) -> Result<Task>;

    /// Current status of a task.
    fn task_info(&self, task: &Task) -> Result<TaskInfo>;

    /// Add one device to the VM.
    fn add_device(&self, vm: &VmRef, device: VirtualDevice) -> Result<Task> {
        let mut spec = ConfigSpec::new();
        spec.add_device(device);
        self.reconfigure(vm, &spec)
    }
}
