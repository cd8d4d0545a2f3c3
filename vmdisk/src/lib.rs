//! Move a VMDK between virtual machines
//!
//! Detaches the disk named by `VMDISK_DISK` from every VM below the scan
//! root that uses it, then attaches it to `VMDISK_TARGET`.

pub mod config;

use std::path::PathBuf;

use clap::{ArgAction, Parser};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vim::{AttachOutcome, GovcClient, RelocationReport, RelocationRequest, VimClient};

pub use config::{Config, ConfigError, Settings};

/// Command-line flags. Disk and target come from the environment.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "vmdisk",
    version,
    about = "Detach a VMDK from every VM that uses it and attach it to a target VM",
    after_help = "Environment:\n  \
        VMDISK_TARGET     inventory path of the VM receiving the disk (required)\n  \
        VMDISK_DISK       disk as \"[datastore] path/file.vmdk\" (required)\n  \
        VMDISK_BASEPATH   inventory path to scan (default: target's datacenter)\n  \
        GOVMOMI_USERNAME  username override\n  \
        GOVMOMI_PASSWORD  password override"
)]
pub struct Cli {
    /// ESX or vCenter URL
    #[arg(
        long,
        env = config::ENV_URL,
        default_value = vim::DEFAULT_URL,
        value_parser = parse_url,
        hide_env_values = true
    )]
    pub url: String,

    /// Don't verify the server's certificate chain
    #[arg(
        long,
        env = config::ENV_INSECURE,
        default_value = "true",
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = parse_flag,
        action = ArgAction::Set
    )]
    pub insecure: bool,

    /// Configuration file
    #[arg(long, default_value = "vmdisk.toml")]
    pub config: PathBuf,

    /// govc executable, overriding the config file
    #[arg(long)]
    pub govc: Option<PathBuf>,
}

// An exported but empty variable counts as unset, like the VMDISK_* ones.
fn parse_url(value: &str) -> Result<String, String> {
    match value {
        "" => Ok(vim::DEFAULT_URL.to_string()),
        url => Ok(url.to_string()),
    }
}

fn parse_flag(value: &str) -> Result<bool, String> {
    match value {
        "" => Ok(true),
        flag => Ok(config::parse_bool(flag)),
    }
}

// =============================================================================
// Tracing Initialization
// =============================================================================

/// Initialize tracing with the given filter; `RUST_LOG` wins when set.
pub fn init_tracing(filter: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

// =============================================================================
// Relocation
// =============================================================================

/// Connect with govc and relocate the disk.
pub fn run(settings: &Settings) -> vim::Result<RelocationReport> {
    let client = GovcClient::connect(settings.connection.clone())?;
    relocate_with(&client, settings)
}

/// Relocate using an already connected client.
pub fn relocate_with<C: VimClient + ?Sized>(
    client: &C,
    settings: &Settings,
) -> vim::Result<RelocationReport> {
    let request = RelocationRequest {
        target_vm: settings.target_vm.clone(),
        disk: settings.disk.clone(),
        base_path: settings.base_path.clone(),
        wait: settings.wait.clone(),
    };

    tracing::info!(
        disk = %request.disk,
        vm = %request.target_vm,
        base_path = ?request.base_path,
        "relocating disk"
    );

    let report = vim::relocate(client, &request)?;

    tracing::info!(
        scanned = report.scanned.len(),
        detached = report.detached_from.len(),
        failed = report.failures.len(),
        skipped_branches = report.skipped_branches.len(),
        "relocation finished"
    );

    Ok(report)
}

/// One-line outcome printed on success.
pub fn summary(report: &RelocationReport, settings: &Settings) -> String {
    let detached = if report.detached_from.is_empty() {
        "no other VM".to_string()
    } else {
        report.detached_from.join(", ")
    };

    match report.attach {
        AttachOutcome::Attached { controller_key } => format!(
            "{} detached from {detached}; attached to {} on controller {controller_key}",
            settings.disk, report.target
        ),
        AttachOutcome::AlreadyAttached => format!(
            "{} detached from {detached}; already attached to {}",
            settings.disk, report.target
        ),
    }
}
