use std::path::PathBuf;

use clap::Parser;

/// Formats an image file as a SOFS volume
#[derive(Parser)]
#[command(version)]
pub struct Cli {
    /// Image file to format
    pub image: PathBuf,

    /// Volume name
    #[arg(long, short, default_value = "SOFS13")]
    pub name: String,

    /// Number of inodes, rounded up to a whole block (0: one per eight blocks)
    #[arg(long, short, default_value_t = 0)]
    pub inodes: u32,

    /// Zero every free data cluster
    #[arg(long, short)]
    pub zero: bool,

    /// Do not print the resulting layout
    #[arg(long, short)]
    pub quiet: bool,

    /// Create the image, or resize it, to this many blocks
    #[arg(long, short)]
    pub blocks: Option<u64>,
}
