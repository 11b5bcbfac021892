//! Helpers shared by unit tests.

use alloc::sync::Arc;
use core::sync::atomic::{AtomicBool, Ordering};

use block_dev::{BlockDevice, DeviceError, RamDisk};
use enumflags2::make_bitflags;

use crate::layout::{DataCluster, InodeKind, ModeFlag};
use crate::{AddOp, Config, FormatOptions, Sofs};

/// A fresh volume of `blocks` blocks, mounted as the superuser.
pub fn formatted(blocks: usize) -> (Arc<RamDisk>, Sofs) {
    let disk = Arc::new(RamDisk::new(blocks));
    let fs = Sofs::format(disk.clone(), &FormatOptions::default(), Config::default()).unwrap();
    (disk, fs)
}

/// Wraps a disk and fails transfers on demand.
pub struct FaultyDisk {
    inner: Arc<RamDisk>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl FaultyDisk {
    pub fn new(inner: Arc<RamDisk>) -> Self {
        Self {
            inner,
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn fail_reads(&self, on: bool) {
        self.fail_reads.store(on, Ordering::Relaxed);
    }

    pub fn fail_writes(&self, on: bool) {
        self.fail_writes.store(on, Ordering::Relaxed);
    }
}

impl BlockDevice for FaultyDisk {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), DeviceError> {
        if self.fail_reads.load(Ordering::Relaxed) {
            return Err(DeviceError::Io(block_id));
        }
        self.inner.read_block(block_id, buf)
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), DeviceError> {
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(DeviceError::Io(block_id));
        }
        self.inner.write_block(block_id, buf)
    }

    fn num_blocks(&self) -> usize {
        self.inner.num_blocks()
    }
}

/// Makes an empty directory `name` under `parent`, open to everybody.
pub fn mkdir(fs: &mut Sofs, parent: u32, name: &str) -> u32 {
    let n = fs.alloc_inode(InodeKind::Directory).unwrap();
    fs.set_permissions(n, ModeFlag::PERMISSIONS).unwrap();
    fs.add_att_dir_entry(parent, name, n, AddOp::Add).unwrap();
    n
}

/// Makes an empty `rw-r--r--` file `name` under `parent`.
pub fn mkfile(fs: &mut Sofs, parent: u32, name: &str) -> u32 {
    let n = fs.alloc_inode(InodeKind::File).unwrap();
    fs.set_permissions(n, make_bitflags!(ModeFlag::{UserRead | UserWrite | GroupRead | OtherRead}))
        .unwrap();
    fs.add_att_dir_entry(parent, name, n, AddOp::Add).unwrap();
    n
}

/// Makes a symbolic link `name` under `parent` pointing at `target`.
pub fn symlink(fs: &mut Sofs, parent: u32, name: &str, target: &str) -> u32 {
    let n = fs.alloc_inode(InodeKind::Symlink).unwrap();
    fs.set_permissions(n, ModeFlag::PERMISSIONS).unwrap();
    let mut cluster = DataCluster::zeroed();
    cluster.bytes_mut()[..target.len()].copy_from_slice(target.as_bytes());
    fs.write_file_cluster(n, 0, &cluster).unwrap();
    fs.update_inode(n, |inode| inode.size = target.len() as u32).unwrap();
    fs.add_att_dir_entry(parent, name, n, AddOp::Add).unwrap();
    n
}
