//! # Consistency checks
//!
//! Quick structural checks used as a validation oracle by the operations
//! above. They look at one record at a time and report the first thing
//! that is wrong as an [`Inconsistency`].

use crate::layout::{DataCluster, Inode, ModeFlag, SuperBlock};
use crate::{
    Error, Inconsistency, Result, Sofs, BITS_PER_BLOCK, BLOCKS_PER_CLUSTER, CLUSTER_SIZE,
    DZONE_CACHE_SIZE, IPB, NULL_CLUSTER, NULL_INODE, RPB,
};

/// Allocation status of a data cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterStat {
    Allocated,
    Free,
}

fn ensure(cond: bool, kind: Inconsistency) -> Result<()> {
    if cond { Ok(()) } else { Err(kind.into()) }
}

/// Identification, table layout and free inode list bookkeeping.
pub fn check_super_block(sb: &SuperBlock) -> Result<()> {
    ensure(sb.is_valid_magic(), Inconsistency::BadMagic)?;

    let layout_ok = sb.itable_start == 1
        && sb.itotal as usize == sb.itable_size as usize * IPB
        && sb.ciutable_start == sb.itable_start + sb.itable_size
        && sb.fctable_start == sb.ciutable_start + sb.ciutable_size
        && sb.dzone_start == sb.fctable_start + sb.fctable_size
        && sb.ntotal as usize
            == sb.dzone_start as usize + sb.dzone_total as usize * BLOCKS_PER_CLUSTER
        && sb.ciutable_size as usize * RPB >= sb.dzone_total as usize
        && sb.fctable_size as usize * BITS_PER_BLOCK >= sb.dzone_total as usize;
    ensure(layout_ok, Inconsistency::SuperBlock)?;

    let in_table = |n: u32| n != 0 && n < sb.itotal;
    let list_ok = sb.ifree < sb.itotal
        && if sb.ifree == 0 {
            sb.ihead == NULL_INODE && sb.itail == NULL_INODE
        } else {
            in_table(sb.ihead) && in_table(sb.itail) && (sb.ifree != 1 || sb.ihead == sb.itail)
        };
    ensure(list_ok, Inconsistency::FreeList)
}

/// Free-cluster bookkeeping of the data zone.
pub fn check_data_zone(sb: &SuperBlock) -> Result<()> {
    let retriev = &sb.dzone_retriev;
    let insert = &sb.dzone_insert;
    let in_zone = |c: &u32| *c != 0 && *c < sb.dzone_total;

    let ok = sb.dzone_total > 0
        && sb.dzone_free < sb.dzone_total
        && sb.fctable_pos < sb.dzone_total
        && retriev.cache_idx as usize <= DZONE_CACHE_SIZE
        && insert.cache_idx as usize <= DZONE_CACHE_SIZE
        && retriev.entries().iter().all(in_zone)
        && insert.entries().iter().all(in_zone)
        && retriev.entries().len() + insert.entries().len() <= sb.dzone_free as usize;
    ensure(ok, Inconsistency::DataZone)
}

pub fn check_inode_in_use(inode: &Inode) -> Result<()> {
    ensure(!inode.is_free() && inode.kind().is_some(), Inconsistency::InodeInUse)
}

pub fn check_free_dirty_inode(inode: &Inode) -> Result<()> {
    let types = (inode.mode() & ModeFlag::TYPES).bits();
    ensure(inode.is_free() && types.count_ones() <= 1, Inconsistency::FreeDirtyInode)
}

impl Sofs {
    /// A directory holds whole clusters and starts with `.` and `..`.
    pub fn check_dir_contents(&mut self, n: u32) -> Result<()> {
        let inode = self.fetch_inode(n)?;
        let size = inode.size as usize;
        ensure(
            inode.is_dir() && size != 0 && size % CLUSTER_SIZE == 0 && inode.d[0] != NULL_CLUSTER,
            Inconsistency::DirContents,
        )?;

        let mut cluster = DataCluster::zeroed();
        self.read_cluster(inode.d[0], &mut cluster)?;
        let [dot, dotdot, ..] = cluster.entries();
        ensure(
            dot.name() == b"." && dot.inode() == n && dotdot.name() == b"..",
            Inconsistency::DirContents,
        )
    }

    /// Whether data cluster `c` is allocated, looking at both caches and
    /// the bitmap.
    pub fn cluster_stat(&mut self, c: u32) -> Result<ClusterStat> {
        let sb = self.staging.sb()?;
        if c >= sb.dzone_total {
            return Err(Error::InvalidArgument);
        }
        let cached =
            sb.dzone_retriev.entries().contains(&c) || sb.dzone_insert.entries().contains(&c);
        if cached || self.bitmap_is_free(c)? {
            Ok(ClusterStat::Free)
        } else {
            Ok(ClusterStat::Allocated)
        }
    }

    /// Counts the free clusters recorded in the bitmap and in both caches,
    /// failing when the count disagrees with the superblock.
    pub fn audit_data_zone(&mut self) -> Result<u32> {
        let sb = self.staging.sb()?;
        let mut free = (sb.dzone_retriev.entries().len() + sb.dzone_insert.entries().len()) as u32;
        for c in 0..sb.dzone_total {
            if self.bitmap_is_free(c)? {
                free += 1;
            }
        }
        ensure(free == sb.dzone_free, Inconsistency::DataZone)?;
        Ok(free)
    }
}
