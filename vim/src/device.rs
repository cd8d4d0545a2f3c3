//! Virtual hardware devices, disk backings and controllers.
//!
//! Only the parts of the platform's device model needed to find a disk by
//! its backing file and to pick a controller for a new disk are modelled.
//! Everything else is carried as [`DeviceKind::Other`].

use crate::datastore::DatastorePath;
use core::fmt;

/// Storage-layer descriptor of a virtual disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiskBacking {
    FlatVer1 { file_name: String },
    FlatVer2 { file_name: String },
    SparseVer1 { file_name: String },
    SparseVer2 { file_name: String },
    SeSparse { file_name: String },
    /// Backing type this crate does not know how to read a file from.
    Unrecognized(String),
}

/// Outcome of reading the file name of a backing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackingFile<'a> {
    Recognized(&'a str),
    Unrecognized(&'a str),
}

impl DiskBacking {
    /// Build a backing from its platform type name.
    pub fn from_type_name(type_name: &str, file_name: Option<String>) -> Self {
        let file_name = match file_name {
            Some(f) => f,
            None => return DiskBacking::Unrecognized(type_name.to_string()),
        };
        match type_name {
            "VirtualDiskFlatVer1BackingInfo" => DiskBacking::FlatVer1 { file_name },
            "VirtualDiskFlatVer2BackingInfo" => DiskBacking::FlatVer2 { file_name },
            "VirtualDiskSparseVer1BackingInfo" => DiskBacking::SparseVer1 { file_name },
            "VirtualDiskSparseVer2BackingInfo" => DiskBacking::SparseVer2 { file_name },
            "VirtualDiskSeSparseBackingInfo" => DiskBacking::SeSparse { file_name },
            other => DiskBacking::Unrecognized(other.to_string()),
        }
    }

    /// Platform type name.
    pub fn type_name(&self) -> &str {
        match self {
            DiskBacking::FlatVer1 { .. } => "VirtualDiskFlatVer1BackingInfo",
            DiskBacking::FlatVer2 { .. } => "VirtualDiskFlatVer2BackingInfo",
            DiskBacking::SparseVer1 { .. } => "VirtualDiskSparseVer1BackingInfo",
            DiskBacking::SparseVer2 { .. } => "VirtualDiskSparseVer2BackingInfo",
            DiskBacking::SeSparse { .. } => "VirtualDiskSeSparseBackingInfo",
            DiskBacking::Unrecognized(name) => name,
        }
    }

    /// Backing file in `[datastore] path` form, if this backing type has one.
    pub fn file_name(&self) -> BackingFile<'_> {
        match self {
            DiskBacking::FlatVer1 { file_name }
            | DiskBacking::FlatVer2 { file_name }
            | DiskBacking::SparseVer1 { file_name }
            | DiskBacking::SparseVer2 { file_name }
            | DiskBacking::SeSparse { file_name } => BackingFile::Recognized(file_name),
            DiskBacking::Unrecognized(name) => BackingFile::Unrecognized(name),
        }
    }
}

/// Disk controller models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerKind {
    Ide,
    BusLogic,
    LsiLogic,
    LsiLogicSas,
    ParaVirtualScsi,
    Ahci,
    Nvme,
}

impl ControllerKind {
    /// Map a platform device type name to a controller kind.
    pub fn from_type_name(type_name: &str) -> Option<Self> {
        match type_name {
            "VirtualIDEController" => Some(ControllerKind::Ide),
            "VirtualBusLogicController" => Some(ControllerKind::BusLogic),
            "VirtualLsiLogicController" => Some(ControllerKind::LsiLogic),
            "VirtualLsiLogicSASController" => Some(ControllerKind::LsiLogicSas),
            "ParaVirtualSCSIController" => Some(ControllerKind::ParaVirtualScsi),
            "VirtualAHCIController" => Some(ControllerKind::Ahci),
            "VirtualNVMEController" => Some(ControllerKind::Nvme),
            _ => None,
        }
    }

    /// Device name prefix used by govc (`pvscsi-1000`, `ide-200`, ...).
    pub fn name_prefix(&self) -> &'static str {
        match self {
            ControllerKind::Ide => "ide",
            ControllerKind::BusLogic => "buslogic",
            ControllerKind::LsiLogic => "lsilogic",
            ControllerKind::LsiLogicSas => "lsilogic-sas",
            ControllerKind::ParaVirtualScsi => "pvscsi",
            ControllerKind::Ahci => "sata",
            ControllerKind::Nvme => "nvme",
        }
    }
}

impl fmt::Display for ControllerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name_prefix())
    }
}

/// What a device is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceKind {
    Disk(DiskBacking),
    Controller(ControllerKind),
    Other(String),
}

/// One entry of a VM's hardware device list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualDevice {
    /// Device key, unique within the VM. Negative for devices not yet created.
    pub key: i32,
    /// Human-readable label ("Hard disk 1").
    pub label: Option<String>,
    pub controller_key: Option<i32>,
    pub unit_number: Option<i32>,
    pub kind: DeviceKind,
}

impl VirtualDevice {
    /// A new disk that reuses an existing backing file.
    ///
    /// The key is a temporary negative value; the platform assigns the
    /// real key and unit number when the device is added.
    pub fn new_disk(controller: &VirtualDevice, file: &DatastorePath) -> Self {
        Self {
            key: -100,
            label: None,
            controller_key: Some(controller.key),
            unit_number: None,
            kind: DeviceKind::Disk(DiskBacking::FlatVer2 {
                file_name: file.to_string(),
            }),
        }
    }

    pub fn is_disk(&self) -> bool {
        matches!(self.kind, DeviceKind::Disk(_))
    }

    pub fn is_controller(&self) -> bool {
        matches!(self.kind, DeviceKind::Controller(_))
    }

    /// Disk backing, if this device is a disk.
    pub fn backing(&self) -> Option<&DiskBacking> {
        match &self.kind {
            DeviceKind::Disk(backing) => Some(backing),
            _ => None,
        }
    }

    /// True when this is a disk whose backing file is exactly `file`.
    pub fn is_backed_by(&self, file: &str) -> bool {
        matches!(
            self.backing().map(DiskBacking::file_name),
            Some(BackingFile::Recognized(f)) if f == file
        )
    }
}

/// First disk controller in platform order.
pub fn first_controller(devices: &[VirtualDevice]) -> Option<&VirtualDevice> {
    devices.iter().find(|d| d.is_controller())
}
