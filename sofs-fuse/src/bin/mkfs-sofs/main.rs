mod cli;

use std::fs::OpenOptions;
use std::io;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use block_dev::BLOCK_SIZE;
use clap::Parser;
use cli::Cli;
use sofs::{Config, Credentials, FormatOptions, Sofs};
use sofs_fuse::BlockFile;

fn unix_time() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |since| since.as_secs() as u32)
}

fn main() -> io::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let fd = OpenOptions::new()
        .read(true)
        .write(true)
        .create(cli.blocks.is_some())
        .truncate(false)
        .open(&cli.image)?;
    if let Some(blocks) = cli.blocks {
        fd.set_len(blocks * BLOCK_SIZE as u64)?;
    }
    let dev = Arc::new(BlockFile::new(fd)?);

    let options = FormatOptions {
        name: cli.name,
        inodes: cli.inodes,
        zero: cli.zero,
    };
    let config = Config::new(Credentials::ROOT, unix_time);
    let mut fs = Sofs::format(dev, &options, config).map_err(io::Error::other)?;

    if !cli.quiet {
        let sb = fs.super_block().map_err(io::Error::other)?;
        println!("volume {:?} on {:?}", sb.name(), cli.image);
        println!("  blocks:   {}", sb.ntotal);
        println!(
            "  inodes:   {} in blocks {}..{}",
            sb.itotal,
            sb.itable_start,
            sb.itable_start + sb.itable_size
        );
        println!(
            "  map:      blocks {}..{}",
            sb.ciutable_start,
            sb.ciutable_start + sb.ciutable_size
        );
        println!("  bitmap:   blocks {}..{}", sb.fctable_start, sb.fctable_start + sb.fctable_size);
        println!(
            "  clusters: {} from block {} ({} free)",
            sb.dzone_total, sb.dzone_start, sb.dzone_free
        );
    }

    fs.unmount().map_err(io::Error::other)
}
