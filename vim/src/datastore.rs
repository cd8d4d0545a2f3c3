//! Datastore and inventory path handling.

use crate::error::{Error, Result};
use core::fmt;
use regex::Regex;
use std::str::FromStr;
use std::sync::LazyLock;

static DATASTORE_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[([^\]]+)\] (.+)$").expect("valid datastore path regex"));

/// A storage-relative file path of the form `[datastore] relative/path`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DatastorePath {
    datastore: String,
    path: String,
}

impl DatastorePath {
    pub fn new(datastore: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            datastore: datastore.into(),
            path: path.into(),
        }
    }

    /// Datastore name, without brackets.
    pub fn datastore(&self) -> &str {
        &self.datastore
    }

    /// Path relative to the datastore root.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl FromStr for DatastorePath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let caps = DATASTORE_PATH
            .captures(s)
            .ok_or_else(|| Error::InvalidDatastorePath(s.to_string()))?;

        // Identifiers are compared verbatim against backings; no padding.
        let datastore = &caps[1];
        let path = &caps[2];
        let padded = |part: &str| part.trim().is_empty() || part.trim() != part;
        if padded(datastore) || padded(path) {
            return Err(Error::InvalidDatastorePath(s.to_string()));
        }

        Ok(Self::new(datastore, path))
    }
}

impl fmt::Display for DatastorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.datastore, self.path)
    }
}

/// Datacenter name of an absolute inventory path (`/<datacenter>/...`).
pub fn datacenter_of(inventory_path: &str) -> Result<&str> {
    inventory_path
        .strip_prefix('/')
        .and_then(|rest| rest.split('/').next())
        .filter(|dc| !dc.is_empty())
        .ok_or_else(|| Error::InvalidInventoryPath(inventory_path.to_string()))
}

/// Base path for the inventory scan.
///
/// Trailing slashes are dropped. An unset or empty base falls back to the
/// datacenter root of the target VM.
pub fn scan_root(base_path: Option<&str>, target_vm_path: &str) -> Result<String> {
    let trimmed = base_path.map(|p| p.trim_end_matches('/')).unwrap_or("");
    if !trimmed.is_empty() {
        return Ok(trimmed.to_string());
    }
    Ok(format!("/{}", datacenter_of(target_vm_path)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_datastore_path() {
        let p: DatastorePath = "[ds2] folder/disk.vmdk".parse().unwrap();
        assert_eq!(p.datastore(), "ds2");
        assert_eq!(p.path(), "folder/disk.vmdk");
        assert_eq!(p.to_string(), "[ds2] folder/disk.vmdk");
    }

    #[test]
    fn test_parse_datastore_with_spaces() {
        let p: DatastorePath = "[SAN Volume 01] vm one/vm one.vmdk".parse().unwrap();
        assert_eq!(p.datastore(), "SAN Volume 01");
        assert_eq!(p.path(), "vm one/vm one.vmdk");
    }

    #[test]
    fn test_reject_malformed_datastore_paths() {
        for bad in [
            "",
            "disk.vmdk",
            "datastore1 scrap1/scrap1.vmdk",
            "[datastore1]scrap1/scrap1.vmdk",
            "[] scrap1.vmdk",
            "[datastore1] ",
            "[datastore1]",
        ] {
            let err = bad.parse::<DatastorePath>().unwrap_err();
            assert!(
                matches!(err, Error::InvalidDatastorePath(_)),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn test_reject_padded_datastore_paths() {
        for bad in [
            "[ds1]  a/a.vmdk",
            "[ds1] a/a.vmdk ",
            "[ ds1] a/a.vmdk",
            "[ds1 ] a/a.vmdk",
            " [ds1] a/a.vmdk",
        ] {
            assert!(
                matches!(
                    bad.parse::<DatastorePath>(),
                    Err(Error::InvalidDatastorePath(_))
                ),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn test_datacenter_of() {
        assert_eq!(datacenter_of("/dc1/vm/web01").unwrap(), "dc1");
        assert_eq!(datacenter_of("/dc1").unwrap(), "dc1");
        assert!(datacenter_of("dc1/vm/web01").is_err());
        assert!(datacenter_of("/").is_err());
        assert!(datacenter_of("").is_err());
    }

    #[test]
    fn test_scan_root_defaults_to_datacenter() {
        assert_eq!(scan_root(None, "/dc1/vm/web01").unwrap(), "/dc1");
        assert_eq!(scan_root(Some(""), "/dc1/vm/web01").unwrap(), "/dc1");
        assert_eq!(scan_root(Some("/"), "/dc1/vm/web01").unwrap(), "/dc1");
    }

    #[test]
    fn test_scan_root_trims_trailing_slash() {
        assert_eq!(
            scan_root(Some("/dc1/vm/prod/"), "/dc1/vm/web01").unwrap(),
            "/dc1/vm/prod"
        );
    }
}
