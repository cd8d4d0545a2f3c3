//! In-memory [`VimClient`] for unit tests.

use crate::client::VimClient;
use crate::config_spec::{ConfigSpec, DeviceOperation};
use crate::device::VirtualDevice;
use crate::error::{Error, Result};
use crate::inventory::{InventoryObject, ManagedObjectReference, VmRef, VIRTUAL_MACHINE};
use crate::task::{Task, TaskInfo};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

struct FakeTask {
    outcome: TaskInfo,
    polls_left: u32,
}

#[derive(Default)]
struct State {
    children: HashMap<String, Vec<InventoryObject>>,
    failing: HashSet<String>,
    vms: HashMap<String, (ManagedObjectReference, Vec<VirtualDevice>)>,
    tasks: HashMap<String, FakeTask>,
    next_task: u32,
    next_key: i32,
    polls_before_done: u32,
    submitted: Vec<(String, ConfigSpec)>,
    fail_next: HashMap<String, String>,
    dropping: HashSet<String>,
}

/// Scripted inventory, device lists and task outcomes.
#[derive(Default)]
pub struct FakeVim {
    state: RefCell<State>,
}

impl FakeVim {
    pub fn new() -> Self {
        let fake = Self::default();
        fake.state.borrow_mut().next_key = 3000;
        fake
    }

    pub fn add_object(&self, parent: &str, path: &str, kind: &str, value: &str) {
        let reference = ManagedObjectReference::new(kind, value);
        let mut state = self.state.borrow_mut();
        if reference.is_container() {
            state.children.entry(path.to_string()).or_default();
        }
        state
            .children
            .entry(parent.to_string())
            .or_default()
            .push(InventoryObject::new(reference, path));
    }

    pub fn add_empty_container(&self, path: &str) {
        self.state
            .borrow_mut()
            .children
            .entry(path.to_string())
            .or_default();
    }

    pub fn add_vm(
        &self,
        parent: &str,
        path: &str,
        value: &str,
        devices: Vec<VirtualDevice>,
    ) -> VmRef {
        self.add_object(parent, path, VIRTUAL_MACHINE, value);
        let reference = ManagedObjectReference::new(VIRTUAL_MACHINE, value);
        self.state
            .borrow_mut()
            .vms
            .insert(path.to_string(), (reference.clone(), devices));
        VmRef::new(path, reference)
    }

    pub fn fail_listing(&self, path: &str) {
        self.state.borrow_mut().failing.insert(path.to_string());
    }

    /// Number of `Running` polls every new task reports before finishing.
    pub fn set_task_polls_before_done(&self, polls: u32) {
        self.state.borrow_mut().polls_before_done = polls;
    }

    /// The next reconfiguration of `vm_path` fails without applying changes.
    pub fn fail_next_task(&self, vm_path: &str, message: &str) {
        self.state
            .borrow_mut()
            .fail_next
            .insert(vm_path.to_string(), message.to_string());
    }

    /// Reconfigurations of `vm_path` succeed but change nothing.
    pub fn drop_changes(&self, vm_path: &str) {
        self.state.borrow_mut().dropping.insert(vm_path.to_string());
    }

    pub fn start_task(&self, outcome: TaskInfo) -> Task {
        let mut state = self.state.borrow_mut();
        state.next_task += 1;
        let id = format!("task-{}", state.next_task);
        let polls_left = state.polls_before_done;
        state.tasks.insert(id.clone(), FakeTask { outcome, polls_left });
        Task::new(id)
    }

    /// Change sets submitted so far, with the VM path they targeted.
    pub fn submitted(&self) -> Vec<(String, ConfigSpec)> {
        self.state.borrow().submitted.clone()
    }

    pub fn devices_of(&self, vm_path: &str) -> Vec<VirtualDevice> {
        self.state
            .borrow()
            .vms
            .get(vm_path)
            .map(|(_, devices)| devices.clone())
            .unwrap_or_default()
    }

    fn apply(&self, vm_path: &str, spec: &ConfigSpec) {
        let mut state = self.state.borrow_mut();
        let mut next_key = state.next_key;
        let Some((_, devices)) = state.vms.get_mut(vm_path) else {
            return;
        };
        for change in &spec.device_change {
            match change.operation {
                DeviceOperation::Remove => devices.retain(|d| d.key != change.device.key),
                DeviceOperation::Add => {
                    let mut device = change.device.clone();
                    device.key = next_key;
                    next_key += 1;
                    devices.push(device);
                }
            }
        }
        state.next_key = next_key;
    }
}

impl VimClient for FakeVim {
    fn list_children(&self, path: &str) -> Result<Vec<InventoryObject>> {
        let state = self.state.borrow();
        if state.failing.contains(path) {
            return Err(Error::ListFailed {
                path: path.to_string(),
                message: "NoPermission".to_string(),
            });
        }
        state
            .children
            .get(path)
            .cloned()
            .ok_or_else(|| Error::ListFailed {
                path: path.to_string(),
                message: "not found".to_string(),
            })
    }

    fn find_vm(&self, path: &str) -> Result<VmRef> {
        self.state
            .borrow()
            .vms
            .get(path)
            .map(|(reference, _)| VmRef::new(path, reference.clone()))
            .ok_or_else(|| Error::VmNotFound(path.to_string()))
    }

    fn retrieve_hardware(&self, vm: &VmRef) -> Result<Vec<VirtualDevice>> {
        self.devices(vm)
    }

    fn devices(&self, vm: &VmRef) -> Result<Vec<VirtualDevice>> {
        self.state
            .borrow()
            .vms
            .get(&vm.path)
            .map(|(_, devices)| devices.clone())
            .ok_or_else(|| Error::VmNotFound(vm.path.clone()))
    }

    fn reconfigure(&self, vm: &VmRef, spec: &ConfigSpec) -> Result<Task> {
        let (failure, dropping) = {
            let mut state = self.state.borrow_mut();
            state.submitted.push((vm.path.clone(), spec.clone()));
            (
                state.fail_next.remove(&vm.path),
                state.dropping.contains(&vm.path),
            )
        };

        if let Some(message) = failure {
            return Ok(self.start_task(TaskInfo::failed(message)));
        }
        if !dropping {
            self.apply(&vm.path, spec);
        }
        Ok(self.start_task(TaskInfo::success()))
    }

    fn task_info(&self, task: &Task) -> Result<TaskInfo> {
        let mut state = self.state.borrow_mut();
        let fake = state
            .tasks
            .get_mut(task.id())
            .ok_or_else(|| Error::command_failed("task.info", format!("no task {task}")))?;
        if fake.polls_left > 0 {
            fake.polls_left -= 1;
            return Ok(TaskInfo::running());
        }
        Ok(fake.outcome.clone())
    }
}
