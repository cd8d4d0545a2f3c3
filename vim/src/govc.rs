//! [`VimClient`] backed by the `govc` command-line client.
//!
//! Every call runs one govc command with `-json` output. Reconfigurations
//! are spawned without waiting; the child process is the task, and
//! [`VimClient::task_info`] polls it.

use crate::client::VimClient;
use crate::config_spec::{ConfigSpec, DeviceOperation};
use crate::connection::ConnectionConfig;
use crate::datastore::DatastorePath;
use crate::device::{BackingFile, ControllerKind, DeviceKind, DiskBacking, VirtualDevice};
use crate::error::{Error, Result};
use crate::inventory::{InventoryObject, ManagedObjectReference, VmRef, VIRTUAL_MACHINE};
use crate::task::{Task, TaskInfo};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::io::{self, Read};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread::{self, JoinHandle};

/// A spawned reconfiguration. stderr is drained on its own thread while the
/// child runs.
struct RunningTask {
    command: String,
    child: Child,
    stderr: JoinHandle<io::Result<String>>,
}

/// Management client that shells out to govc.
pub struct GovcClient {
    config: ConnectionConfig,
    tasks: Mutex<HashMap<String, RunningTask>>,
    next_task: AtomicU32,
}

impl std::fmt::Debug for GovcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GovcClient")
            .field("url", &self.config.display_url())
            .field("govc", &self.config.govc)
            .finish_non_exhaustive()
    }
}

impl GovcClient {
    /// Connect and log in, failing early on bad URL or credentials.
    pub fn connect(config: ConnectionConfig) -> Result<Self> {
        let client = Self::new(config);
        let url = client.config.display_url();

        match client.run(&["about"]) {
            Ok(about) => {
                tracing::info!(url = %url, about = %about.lines().next().unwrap_or(""), "connected");
                Ok(client)
            }
            Err(Error::CommandFailed { message, .. }) if is_login_failure(&message) => {
                Err(Error::Authentication { url, message })
            }
            Err(Error::CommandFailed { message, .. }) => Err(Error::Connection { url, message }),
            Err(Error::Io(e)) => Err(Error::Connection {
                url,
                message: format!("cannot run {}: {e}", client.config.govc.display()),
            }),
            Err(e) => Err(e),
        }
    }

    /// Create a client without contacting the endpoint.
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            tasks: Mutex::new(HashMap::new()),
            next_task: AtomicU32::new(1),
        }
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.config.govc);
        cmd.args(args);
        for (key, value) in self.config.govc_env() {
            cmd.env(key, value);
        }
        cmd
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        let name = args.first().copied().unwrap_or_default();
        tracing::debug!(command = ?args, "running govc");

        let output = self.command(args).stdin(Stdio::null()).output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::command_failed(name, stderr.trim()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn run_json<T: DeserializeOwned>(&self, args: &[&str]) -> Result<T> {
        let name = args.first().copied().unwrap_or_default();
        let stdout = self.run(args)?;
        serde_json::from_str(stdout.trim()).map_err(|source| Error::Json {
            command: name.to_string(),
            source,
        })
    }

    fn spawn_task(&self, args: &[&str]) -> Result<Task> {
        let name = args.first().copied().unwrap_or_default().to_string();
        tracing::debug!(command = ?args, "starting govc task");

        let mut child = self
            .command(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        let pipe = child.stderr.take();
        let stderr = thread::spawn(move || {
            let mut output = String::new();
            if let Some(mut pipe) = pipe {
                pipe.read_to_string(&mut output)?;
            }
            Ok(output)
        });

        let id = format!("govc-{}", self.next_task.fetch_add(1, Ordering::Relaxed));
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner).insert(
            id.clone(),
            RunningTask {
                command: name,
                child,
                stderr,
            },
        );

        Ok(Task::new(id))
    }

    fn remove_devices(&self, vm: &VmRef, spec: &ConfigSpec) -> Result<Task> {
        let names = spec
            .device_change
            .iter()
            .map(|change| {
                device_name(&change.device).ok_or_else(|| {
                    Error::command_failed(
                        "device.remove",
                        format!("device {} has no govc name", change.device.key),
                    )
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut args = vec!["device.remove", "-vm", vm.path.as_str(), "-keep"];
        args.extend(names.iter().map(String::as_str));
        self.spawn_task(&args)
    }

    fn attach_disk(&self, vm: &VmRef, disk: &VirtualDevice) -> Result<Task> {
        let file = match disk.backing().map(DiskBacking::file_name) {
            Some(BackingFile::Recognized(file)) => file.parse::<DatastorePath>()?,
            _ => {
                return Err(Error::command_failed(
                    "vm.disk.attach",
                    "new disk has no backing file",
                ))
            }
        };

        let controller_key = disk
            .controller_key
            .ok_or_else(|| Error::ControllerNotFound(vm.path.clone()))?;
        let controller = self
            .devices(vm)?
            .into_iter()
            .find(|d| d.key == controller_key && d.is_controller())
            .and_then(|d| device_name(&d))
            .ok_or_else(|| Error::ControllerNotFound(vm.path.clone()))?;

        self.spawn_task(&[
            "vm.disk.attach",
            "-vm",
            vm.path.as_str(),
            "-ds",
            file.datastore(),
            "-disk",
            file.path(),
            "-controller",
            controller.as_str(),
            "-link=false",
        ])
    }
}

impl VimClient for GovcClient {
    fn list_children(&self, path: &str) -> Result<Vec<InventoryObject>> {
        let listing: Listing = self
            .run_json(&["ls", "-json", path])
            .map_err(|e| match e {
                Error::CommandFailed { message, .. } => Error::ListFailed {
                    path: path.to_string(),
                    message,
                },
                other => other,
            })?;

        Ok(listing
            .elements
            .unwrap_or_default()
            .into_iter()
            .map(|e| InventoryObject::new(e.object.reference, e.path))
            .collect())
    }

    fn find_vm(&self, path: &str) -> Result<VmRef> {
        let listing = match self.list_children(path) {
            Ok(listing) => listing,
            Err(Error::ListFailed { .. }) => return Err(Error::VmNotFound(path.to_string())),
            Err(e) => return Err(e),
        };

        listing
            .into_iter()
            .find(|o| o.path == path && o.reference.kind == VIRTUAL_MACHINE)
            .map(|o| VmRef::new(o.path, o.reference))
            .ok_or_else(|| Error::VmNotFound(path.to_string()))
    }

    fn retrieve_hardware(&self, vm: &VmRef) -> Result<Vec<VirtualDevice>> {
        let changes: Vec<PropertyChange> =
            self.run_json(&["object.collect", "-json", vm.path.as_str(), "config.hardware"])?;

        Ok(changes
            .into_iter()
            .find(|c| c.name == "config.hardware")
            .and_then(|c| c.val)
            .and_then(|hw| hw.device)
            .unwrap_or_default()
            .into_iter()
            .map(VirtualDevice::from)
            .collect())
    }

    fn devices(&self, vm: &VmRef) -> Result<Vec<VirtualDevice>> {
        let info: DeviceInfo = self.run_json(&["device.info", "-json", "-vm", vm.path.as_str()])?;

        Ok(info
            .devices
            .unwrap_or_default()
            .into_iter()
            .map(VirtualDevice::from)
            .collect())
    }

    fn reconfigure(&self, vm: &VmRef, spec: &ConfigSpec) -> Result<Task> {
        let ops: Vec<_> = spec.device_change.iter().map(|c| c.operation).collect();

        if spec.is_empty() {
            return Err(Error::command_failed("reconfigure", "empty change set"));
        }

        match ops.as_slice() {
            [DeviceOperation::Add] if spec.device_change[0].device.is_disk() => {
                self.attach_disk(vm, &spec.device_change[0].device)
            }
            removes if removes.iter().all(|op| *op == DeviceOperation::Remove) => {
                self.remove_devices(vm, spec)
            }
            _ => Err(Error::command_failed(
                "reconfigure",
                format!("unsupported change set {ops:?}"),
            )),
        }
    }

    /// Poll a spawned task. A terminal state is reported once; the task is
    /// forgotten afterwards.
    fn task_info(&self, task: &Task) -> Result<TaskInfo> {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        let running = tasks
            .get_mut(task.id())
            .ok_or_else(|| Error::command_failed("task", format!("unknown task {task}")))?;

        let Some(status) = running.child.try_wait()? else {
            return Ok(TaskInfo::running());
        };

        let RunningTask {
            command, stderr, ..
        } = tasks
            .remove(task.id())
            .ok_or_else(|| Error::command_failed("task", format!("unknown task {task}")))?;
        let stderr = stderr.join().unwrap_or_else(|_| Ok(String::new()))?;

        if status.success() {
            return Ok(TaskInfo::success());
        }

        let message = match stderr.trim() {
            "" => format!("{command} exited with {status}"),
            msg => msg.to_string(),
        };
        Ok(TaskInfo::failed(message))
    }
}

fn is_login_failure(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("incorrect user name or password")
        || lower.contains("cannot complete login")
        || lower.contains("invalidlogin")
}

/// govc's name for a device, as accepted by `device.remove` and `-controller`.
fn device_name(device: &VirtualDevice) -> Option<String> {
    match &device.kind {
        DeviceKind::Disk(_) => Some(format!(
            "disk-{}-{}",
            device.controller_key?,
            device.unit_number?
        )),
        DeviceKind::Controller(kind) => Some(format!("{}-{}", kind.name_prefix(), device.key)),
        DeviceKind::Other(_) => None,
    }
}

// =============================================================================
// govc JSON shapes
// =============================================================================

#[derive(Deserialize)]
struct Listing {
    #[serde(alias = "Elements")]
    elements: Option<Vec<ListElement>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListElement {
    path: String,
    object: ListObject,
}

#[derive(Deserialize)]
struct ListObject {
    #[serde(rename = "Self")]
    reference: ManagedObjectReference,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PropertyChange {
    name: String,
    val: Option<Hardware>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Hardware {
    device: Option<Vec<RawDevice>>,
}

#[derive(Deserialize)]
struct DeviceInfo {
    #[serde(alias = "Devices")]
    devices: Option<Vec<RawDevice>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawDevice {
    #[serde(rename = "_typeName", alias = "Type", default)]
    type_name: String,
    key: i32,
    device_info: Option<RawDescription>,
    backing: Option<RawBacking>,
    controller_key: Option<i32>,
    unit_number: Option<i32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawDescription {
    label: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawBacking {
    #[serde(rename = "_typeName", default)]
    type_name: String,
    file_name: Option<String>,
}

impl From<RawDevice> for VirtualDevice {
    fn from(raw: RawDevice) -> Self {
        let kind = if raw.type_name == "VirtualDisk" {
            let backing = match raw.backing {
                Some(b) => DiskBacking::from_type_name(&b.type_name, b.file_name),
                None => DiskBacking::Unrecognized(String::new()),
            };
            DeviceKind::Disk(backing)
        } else if let Some(kind) = ControllerKind::from_type_name(&raw.type_name) {
            DeviceKind::Controller(kind)
        } else {
            DeviceKind::Other(raw.type_name)
        };

        VirtualDevice {
            key: raw.key,
            label: raw.device_info.and_then(|d| d.label),
            controller_key: raw.controller_key,
            unit_number: raw.unit_number,
            kind,
        }
    }
}
