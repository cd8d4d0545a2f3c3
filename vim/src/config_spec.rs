//! Reconfiguration change sets.

use crate::device::VirtualDevice;

/// Device change operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceOperation {
    Add,
    Remove,
}

/// One entry of a change set. Backing files are never created or destroyed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfigSpec {
    pub operation: DeviceOperation,
    pub device: VirtualDevice,
}

/// Device changes submitted atomically in one reconfiguration call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigSpec {
    pub device_change: Vec<DeviceConfigSpec>,
}

impl ConfigSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_change(&mut self, change: DeviceConfigSpec) {
        self.device_change.push(change);
    }

    /// Queue removal of `device`, keeping its backing file on the datastore.
    pub fn remove_device(&mut self, device: VirtualDevice) -> &mut Self {
        self.add_change(DeviceConfigSpec {
            operation: DeviceOperation::Remove,
            device,
        });
        self
    }

    /// Queue addition of `device` without creating a new backing file.
    pub fn add_device(&mut self, device: VirtualDevice) -> &mut Self {
        self.add_change(DeviceConfigSpec {
            operation: DeviceOperation::Add,
            device,
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.device_change.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceKind, DiskBacking};

    fn disk() -> VirtualDevice {
        VirtualDevice {
            key: 2000,
            label: Some("Hard disk 1".into()),
            controller_key: Some(1000),
            unit_number: Some(0),
            kind: DeviceKind::Disk(DiskBacking::FlatVer2 {
                file_name: "[datastore1] scrap1/scrap1.vmdk".into(),
            }),
        }
    }

    #[test]
    fn test_remove_device() {
        let mut spec = ConfigSpec::new();
        assert!(spec.is_empty());

        spec.remove_device(disk());

        assert_eq!(spec.device_change.len(), 1);
        let change = &spec.device_change[0];
        assert_eq!(change.operation, DeviceOperation::Remove);
        assert_eq!(change.device.key, 2000);
    }

    #[test]
    fn test_changes_keep_order() {
        let mut spec = ConfigSpec::new();
        spec.remove_device(disk()).add_device(disk());

        let ops: Vec<_> = spec.device_change.iter().map(|c| c.operation).collect();
        assert_eq!(ops, vec![DeviceOperation::Remove, DeviceOperation::Add]);
    }
}
