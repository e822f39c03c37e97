use clap::Parser;
use std::path::PathBuf;

/// Inject a 512 bytes sector GPT in a disk partitioned with 4096 bytes sectors.
///
/// Without --write nothing is written: the changes are only displayed.
#[derive(Parser, Debug)]
#[command(version)]
pub struct Opt {
    /// do it for real
    #[arg(short = 'w', long = "write")]
    pub write: bool,

    /// device to open
    #[arg(value_name = "DEVICE")]
    pub device: PathBuf,
}
