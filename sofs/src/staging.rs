//! # Staging layer
//!
//! Every piece of metadata is read and written through one in-memory slot
//! per kind: the superblock, one inode-table block, one block of the
//! cluster-to-inode map, one bitmap block, and two reference clusters.
//!
//! A slot holds a single key at a time. Loading another key drops the
//! buffer without writing it back, so whoever changed it must store first.
//!
//! Failures are sticky: after a read or write fails, the slot answers every
//! later request with that same error. There is no way to reset it.

use alloc::boxed::Box;
use alloc::sync::Arc;

use block_dev::BlockDevice;

use crate::layout::{BitmapBlock, DataCluster, InodeBlock, OnDisk, RefBlock, SuperBlock};
use crate::{Error, Result, BLOCKS_PER_CLUSTER};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Empty,
    Staged { key: u32, block: usize },
    Failed(Error),
}

/// One staging slot.
struct Slot<T: OnDisk> {
    buf: Box<T>,
    state: SlotState,
    /// Resource name for logs
    what: &'static str,
}

impl<T: OnDisk> Slot<T> {
    fn new(what: &'static str) -> Self {
        Self {
            buf: Box::new(T::zeroed()),
            state: SlotState::Empty,
            what,
        }
    }

    fn poison(&mut self, err: Error) -> Error {
        log::error!("staging: {} slot poisoned: {err}", self.what);
        self.state = SlotState::Failed(err);
        err
    }

    fn load(&mut self, dev: &dyn BlockDevice, key: u32, block: usize) -> Result<()> {
        match self.state {
            SlotState::Failed(err) => return Err(err),
            SlotState::Staged { key: staged, .. } if staged == key => return Ok(()),
            _ => {}
        }
        match dev.read_blocks(block, self.buf.as_bytes_mut()) {
            Ok(()) => {
                self.state = SlotState::Staged { key, block };
                Ok(())
            }
            Err(err) => Err(self.poison(err.into())),
        }
    }

    fn get(&self) -> Result<&T> {
        match self.state {
            SlotState::Staged { .. } => Ok(&self.buf),
            SlotState::Empty => Err(Error::NotAvailable),
            SlotState::Failed(err) => Err(err),
        }
    }

    fn get_mut(&mut self) -> Result<&mut T> {
        match self.state {
            SlotState::Staged { .. } => Ok(&mut self.buf),
            SlotState::Empty => Err(Error::NotAvailable),
            SlotState::Failed(err) => Err(err),
        }
    }

    fn store(&mut self, dev: &dyn BlockDevice) -> Result<()> {
        match self.state {
            SlotState::Failed(err) => Err(err),
            SlotState::Empty => Err(self.poison(Error::Corrupted)),
            SlotState::Staged { block, .. } => dev
                .write_blocks(block, self.buf.as_bytes())
                .map_err(|err| self.poison(err.into())),
        }
    }
}

pub(crate) struct Staging {
    dev: Arc<dyn BlockDevice>,
    sb: Slot<SuperBlock>,
    inodes: Slot<InodeBlock>,
    map: Slot<RefBlock>,
    bitmap: Slot<BitmapBlock>,
    /// Table of references to reference clusters (`i2`)
    sng_ind: Slot<DataCluster>,
    /// Table of references to data clusters (`i1` and the tables under `i2`)
    dir_refs: Slot<DataCluster>,
}

impl Staging {
    pub fn new(dev: Arc<dyn BlockDevice>) -> Self {
        Self {
            dev,
            sb: Slot::new("superblock"),
            inodes: Slot::new("inode table"),
            map: Slot::new("cluster map"),
            bitmap: Slot::new("bitmap"),
            sng_ind: Slot::new("single indirect refs"),
            dir_refs: Slot::new("direct refs"),
        }
    }

    #[inline]
    pub fn device(&self) -> &dyn BlockDevice {
        &*self.dev
    }

    pub fn load_super_block(&mut self) -> Result<()> {
        self.sb.load(&*self.dev, 0, 0)
    }

    pub fn super_block(&self) -> Result<&SuperBlock> {
        self.sb.get()
    }

    pub fn super_block_mut(&mut self) -> Result<&mut SuperBlock> {
        self.sb.get_mut()
    }

    pub fn store_super_block(&mut self) -> Result<()> {
        self.sb.store(&*self.dev)
    }

    /// Stages the superblock if needed and hands back a copy.
    pub fn sb(&mut self) -> Result<SuperBlock> {
        self.load_super_block()?;
        self.sb.get().copied()
    }

    /// Stages the superblock if needed and hands it out for changes.
    pub fn sb_mut(&mut self) -> Result<&mut SuperBlock> {
        self.load_super_block()?;
        self.sb.get_mut()
    }

    /// Physical block of a table block after checking it against the table size.
    fn table_block(&mut self, start: fn(&SuperBlock) -> (u32, u32), block: u32) -> Result<usize> {
        let sb = self.sb()?;
        let (start, size) = start(&sb);
        if block >= size {
            return Err(Error::InvalidArgument);
        }
        Ok((start + block) as usize)
    }

    /// First physical block of data cluster `c`.
    pub fn cluster_block(&mut self, c: u32) -> Result<usize> {
        let sb = self.sb()?;
        if c >= sb.dzone_total {
            return Err(Error::InvalidArgument);
        }
        Ok(sb.dzone_start as usize + c as usize * BLOCKS_PER_CLUSTER)
    }

    pub fn load_inode_block(&mut self, block: u32) -> Result<()> {
        let phys = self.table_block(|sb| (sb.itable_start, sb.itable_size), block)?;
        self.inodes.load(&*self.dev, block, phys)
    }

    pub fn inode_block(&self) -> Result<&InodeBlock> {
        self.inodes.get()
    }

    pub fn inode_block_mut(&mut self) -> Result<&mut InodeBlock> {
        self.inodes.get_mut()
    }

    pub fn store_inode_block(&mut self) -> Result<()> {
        self.inodes.store(&*self.dev)
    }

    pub fn load_map_block(&mut self, block: u32) -> Result<()> {
        let phys = self.table_block(|sb| (sb.ciutable_start, sb.ciutable_size), block)?;
        self.map.load(&*self.dev, block, phys)
    }

    pub fn map_block(&self) -> Result<&RefBlock> {
        self.map.get()
    }

    pub fn map_block_mut(&mut self) -> Result<&mut RefBlock> {
        self.map.get_mut()
    }

    pub fn store_map_block(&mut self) -> Result<()> {
        self.map.store(&*self.dev)
    }

    pub fn load_bitmap_block(&mut self, block: u32) -> Result<()> {
        let phys = self.table_block(|sb| (sb.fctable_start, sb.fctable_size), block)?;
        self.bitmap.load(&*self.dev, block, phys)
    }

    pub fn bitmap_block(&self) -> Result<&BitmapBlock> {
        self.bitmap.get()
    }

    pub fn bitmap_block_mut(&mut self) -> Result<&mut BitmapBlock> {
        self.bitmap.get_mut()
    }

    pub fn store_bitmap_block(&mut self) -> Result<()> {
        self.bitmap.store(&*self.dev)
    }

    pub fn load_sng_ind(&mut self, c: u32) -> Result<()> {
        let phys = self.cluster_block(c)?;
        self.sng_ind.load(&*self.dev, c, phys)
    }

    pub fn sng_ind(&self) -> Result<&DataCluster> {
        self.sng_ind.get()
    }

    pub fn sng_ind_mut(&mut self) -> Result<&mut DataCluster> {
        self.sng_ind.get_mut()
    }

    pub fn store_sng_ind(&mut self) -> Result<()> {
        self.sng_ind.store(&*self.dev)
    }

    pub fn load_dir_refs(&mut self, c: u32) -> Result<()> {
        let phys = self.cluster_block(c)?;
        self.dir_refs.load(&*self.dev, c, phys)
    }

    pub fn dir_refs(&self) -> Result<&DataCluster> {
        self.dir_refs.get()
    }

    pub fn dir_refs_mut(&mut self) -> Result<&mut DataCluster> {
        self.dir_refs.get_mut()
    }

    pub fn store_dir_refs(&mut self) -> Result<()> {
        self.dir_refs.store(&*self.dev)
    }
}

#[cfg(test)]
mod tests {
    use alloc::sync::Arc;

    use block_dev::{DeviceError, RamDisk};

    use super::*;
    use crate::testing::{formatted, FaultyDisk};

    #[test]
    fn get_before_load_is_not_available() {
        let staging = Staging::new(Arc::new(RamDisk::new(8)));
        assert_eq!(staging.super_block().err(), Some(Error::NotAvailable));
        assert_eq!(staging.bitmap_block().err(), Some(Error::NotAvailable));
    }

    #[test]
    fn store_without_load_poisons() {
        let mut staging = Staging::new(Arc::new(RamDisk::new(8)));
        assert_eq!(staging.store_map_block(), Err(Error::Corrupted));
        // sticky from now on, even though the device is fine
        assert_eq!(staging.map_block().err(), Some(Error::Corrupted));
        assert_eq!(staging.load_map_block(0), Err(Error::Corrupted));
    }

    #[test]
    fn reload_of_same_key_keeps_buffer() {
        let (disk, _) = formatted(1_000);
        let mut staging = Staging::new(disk);
        staging.load_inode_block(0).unwrap();
        staging.inode_block_mut().unwrap()[3].size = 77;
        staging.load_inode_block(0).unwrap();
        assert_eq!(staging.inode_block().unwrap()[3].size, 77);

        // switching keys drops the unsaved change
        staging.load_inode_block(1).unwrap();
        staging.load_inode_block(0).unwrap();
        assert_eq!(staging.inode_block().unwrap()[3].size, 0);
    }

    #[test]
    fn out_of_range_key_does_not_poison() {
        let (disk, _) = formatted(1_000);
        let mut staging = Staging::new(disk);
        let size = staging.sb().unwrap().fctable_size;
        assert_eq!(staging.load_bitmap_block(size), Err(Error::InvalidArgument));
        staging.load_bitmap_block(0).unwrap();
    }

    #[test]
    fn read_failure_is_sticky() {
        let (disk, _) = formatted(1_000);
        let faulty = Arc::new(FaultyDisk::new(disk));
        let mut staging = Staging::new(faulty.clone());
        let itable_start = staging.sb().unwrap().itable_start as usize;

        faulty.fail_reads(true);
        let err = Error::Device(DeviceError::Io(itable_start + 1));
        assert_eq!(staging.load_inode_block(1), Err(err));

        faulty.fail_reads(false);
        assert_eq!(staging.load_inode_block(0), Err(err));
        assert_eq!(staging.inode_block().err(), Some(err));
        assert_eq!(staging.store_inode_block(), Err(err));
        // other slots are unaffected
        staging.load_map_block(0).unwrap();
    }

    #[test]
    fn write_failure_is_sticky() {
        let (disk, _) = formatted(1_000);
        let faulty = Arc::new(FaultyDisk::new(disk));
        let mut staging = Staging::new(faulty.clone());
        staging.load_super_block().unwrap();

        faulty.fail_writes(true);
        assert_eq!(staging.store_super_block(), Err(Error::Device(DeviceError::Io(0))));
        faulty.fail_writes(false);
        assert_eq!(staging.store_super_block(), Err(Error::Device(DeviceError::Io(0))));
        assert!(staging.sb().is_err());
    }
}
