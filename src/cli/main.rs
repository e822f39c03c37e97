mod display_bytes;
mod error;
mod opt;
mod print;
mod table;
mod types;
mod uuid;

use self::error::*;
use self::opt::*;
use self::print::print;
use clap::Parser;
use env_logger::Env;
use gpt4096to512::{convert, Device, WriteMode};
use log::{debug, info, warn};
use std::fs;
use std::process::exit;

macro_rules! main_unwrap {
    ($e:expr) => {{
        match $e {
            Ok(x) => x,
            Err(err) => {
                eprintln!("{}", err);
                exit(1);
            }
        }
    }};
}

fn main() {
    let opt = match Opt::try_parse() {
        Ok(opt) => opt,
        Err(err) => {
            let code = if err.use_stderr() { 1 } else { 0 };
            let _ = err.print();
            exit(code);
        }
    };

    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let mode = if opt.write {
        WriteMode::Commit
    } else {
        WriteMode::DryRun
    };
    debug!("device: {:?}, mode: {:?}", opt.device, mode);

    let mut f = main_unwrap!(open_disk(&opt));
    let len = main_unwrap!(f.size());

    let report = match main_unwrap!(convert(&mut f, mode)) {
        Some(report) => report,
        None => {
            println!("No suitable gap found. Exiting");
            exit(2);
        }
    };

    main_unwrap!(print(&opt.device, &report, len));

    if !mode.is_dry_run() {
        reread_partition_table(&f);
    }
}

fn open_disk(opt: &Opt) -> Result<fs::File> {
    let f = fs::OpenOptions::new()
        .read(true)
        .write(opt.write)
        .open(&opt.device)?;

    log_sector_size(&f);

    Ok(f)
}

#[cfg(target_os = "linux")]
fn log_sector_size(f: &fs::File) {
    use gpt4096to512::linux::{logical_sector_size, BlockError};

    match logical_sector_size(f) {
        Ok(sector_size) => info!("Device logical sector size: {} bytes", sector_size),
        Err(BlockError::NotBlock) => debug!("not a block device"),
        Err(err) => warn!("{}", err),
    }
}

#[cfg(not(target_os = "linux"))]
fn log_sector_size(_f: &fs::File) {}

#[cfg(target_os = "linux")]
fn reread_partition_table(f: &fs::File) {
    use gpt4096to512::linux::{self, BlockError};

    match linux::reread_partition_table(f) {
        Ok(()) => info!("The kernel has reloaded the partition table"),
        Err(BlockError::NotBlock) => {}
        Err(err) => warn!("{}", err),
    }
}

#[cfg(not(target_os = "linux"))]
fn reread_partition_table(_f: &fs::File) {}
