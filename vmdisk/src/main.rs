//! vmdisk: relocate a VMDK to a target VM
//!
//! Configuration is loaded from vmdisk.toml (or `--config`), connection
//! details from flags and `GOVMOMI_*`, and the disk and target from
//! `VMDISK_*` environment variables.

use std::fmt::Display;

use clap::Parser;
use vmdisk::{init_tracing, run, summary, Cli, Config, Settings};

fn main() {
    let cli = Cli::parse();

    let config = Config::load(&cli.config).unwrap_or_else(|e| exit(e));

    init_tracing(&config.logging.level);
    config.log_source(&cli.config);

    let settings = Settings::resolve(&cli, &config, |key| std::env::var(key).ok())
        .unwrap_or_else(|e| exit(e));

    match run(&settings) {
        Ok(report) => println!("{}", summary(&report, &settings)),
        Err(e) => {
            tracing::error!(kind = %e.failure_type(), "relocation failed");
            exit(e)
        }
    }
}

fn exit(err: impl Display) -> ! {
    eprintln!("Error: {err}");
    std::process::exit(1);
}
