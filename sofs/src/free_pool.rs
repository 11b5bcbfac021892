//! # Data-cluster pool
//!
//! Free clusters are recorded in the bitmap, but allocation and release go
//! through two small caches kept in the superblock:
//! - the retrieval cache is refilled in batches by a circular bitmap scan
//!   and serves allocations
//! - the insertion cache collects released clusters and is flushed back to
//!   the bitmap when full
//!
//! A released cluster keeps its entry in the cluster-to-inode map. Finding
//! such an entry on allocation means the cluster is dirty: the former
//! owner still references it and has to let go first.

use crate::consist::{self, ClusterStat};
use crate::{
    convert, ClusterOp, Error, Inconsistency, InodeStatus, Result, Sofs, DZONE_CACHE_SIZE,
    NULL_INODE,
};

impl Sofs {
    pub fn alloc_data_cluster(&mut self) -> Result<u32> {
        log::trace!("alloc_data_cluster()");
        let sb = self.staging.sb()?;
        consist::check_data_zone(&sb)?;
        if sb.dzone_free == 0 {
            return Err(Error::NoSpace);
        }
        if sb.dzone_retriev.is_empty() {
            self.replenish()?;
        }

        let c = self
            .staging
            .sb()?
            .dzone_retriev
            .peek()
            .ok_or(Error::Inconsistent(Inconsistency::DataZone))?;
        let owner = self.cluster_owner(c)?;
        if owner != NULL_INODE {
            self.clean_data_cluster(owner, c)?;
        }

        let sb = self.staging.sb_mut()?;
        sb.dzone_retriev.pop();
        sb.dzone_free -= 1;
        self.staging.store_super_block()?;
        Ok(c)
    }

    pub fn free_data_cluster(&mut self, c: u32) -> Result<()> {
        log::trace!("free_data_cluster({c})");
        let sb = self.staging.sb()?;
        if c == 0 || c >= sb.dzone_total {
            return Err(Error::InvalidArgument);
        }
        consist::check_data_zone(&sb)?;
        if self.cluster_stat(c)? == ClusterStat::Free {
            return Err(Error::Inconsistent(Inconsistency::ClusterNotAllocated));
        }
        if sb.dzone_insert.is_full() {
            self.deplete()?;
        }

        let sb = self.staging.sb_mut()?;
        sb.dzone_insert.push(c);
        sb.dzone_free += 1;
        self.staging.store_super_block()
    }

    /// Refills the retrieval cache from the bitmap, starting where the last
    /// scan stopped. When the bitmap alone falls short, the insertion cache
    /// is flushed into it and the scan goes on.
    fn replenish(&mut self) -> Result<()> {
        let sb = self.staging.sb()?;
        let total = sb.dzone_total;
        let first = DZONE_CACHE_SIZE - (sb.dzone_free as usize).min(DZONE_CACHE_SIZE);
        let mut cache = sb.dzone_retriev.cache;
        let mut pos = sb.fctable_pos;
        let mut filled = first;
        let mut scanned = 0;
        let mut depleted = false;

        while filled < DZONE_CACHE_SIZE {
            if scanned == total {
                if depleted {
                    return Err(Error::Inconsistent(Inconsistency::DataZone));
                }
                self.deplete()?;
                depleted = true;
                scanned = 0;
            }
            if self.bitmap_is_free(pos)? {
                self.set_bitmap(pos, false)?;
                cache[filled] = pos;
                filled += 1;
            }
            pos = (pos + 1) % total;
            scanned += 1;
        }
        log::debug!(
            "replenish: {} clusters cached, next scan at {pos}",
            DZONE_CACHE_SIZE - first
        );

        let sb = self.staging.sb_mut()?;
        sb.dzone_retriev.cache = cache;
        sb.dzone_retriev.cache_idx = first as u32;
        sb.fctable_pos = pos;
        self.staging.store_super_block()
    }

    /// Writes the insertion cache back to the bitmap and empties it.
    fn deplete(&mut self) -> Result<()> {
        let insert = self.staging.sb()?.dzone_insert;
        for &c in insert.entries() {
            self.set_bitmap(c, true)?;
        }
        log::debug!("deplete: {} clusters back in the bitmap", insert.entries().len());

        self.staging.sb_mut()?.dzone_insert.clear();
        self.staging.store_super_block()
    }

    /// Makes the former owner of dirty cluster `c` drop its reference.
    ///
    /// A free owner loses any reference table the cleanup empties. An
    /// owner still in use keeps its tables, since it may be in the middle
    /// of growing through one of them.
    fn clean_data_cluster(&mut self, owner: u32, c: u32) -> Result<()> {
        log::debug!("cluster {c} is dirty, cleaning it out of inode {owner}");
        let inode = self.fetch_inode(owner)?;
        let idx = self
            .find_cluster_index(&inode, c)?
            .ok_or(Error::Inconsistent(Inconsistency::ClusterMapping))?;
        if inode.is_free() {
            self.resolve_cluster(owner, idx, ClusterOp::Clean, InodeStatus::FreeDirty, true)?;
        } else {
            self.resolve_cluster(owner, idx, ClusterOp::Clean, InodeStatus::InUse, false)?;
        }
        Ok(())
    }

    pub(crate) fn bitmap_is_free(&mut self, c: u32) -> Result<bool> {
        let sb = self.staging.sb()?;
        let (block, byte, bit) = convert::bitmap_pos(&sb, c)?;
        self.staging.load_bitmap_block(block)?;
        Ok(self.staging.bitmap_block()?[byte] & convert::bit_mask(bit) != 0)
    }

    fn set_bitmap(&mut self, c: u32, free: bool) -> Result<()> {
        let sb = self.staging.sb()?;
        let (block, byte, bit) = convert::bitmap_pos(&sb, c)?;
        self.staging.load_bitmap_block(block)?;
        let bits = &mut self.staging.bitmap_block_mut()?[byte];
        if free {
            *bits |= convert::bit_mask(bit);
        } else {
            *bits &= !convert::bit_mask(bit);
        }
        self.staging.store_bitmap_block()
    }

    /// Current or last owner of cluster `c`.
    pub(crate) fn cluster_owner(&mut self, c: u32) -> Result<u32> {
        let sb = self.staging.sb()?;
        let (block, offset) = convert::cluster_map_pos(&sb, c)?;
        self.staging.load_map_block(block)?;
        Ok(self.staging.map_block()?[offset])
    }

    pub(crate) fn map_cluster(&mut self, c: u32, n: u32) -> Result<()> {
        let sb = self.staging.sb()?;
        let (block, offset) = convert::cluster_map_pos(&sb, c)?;
        self.staging.load_map_block(block)?;
        self.staging.map_block_mut()?[offset] = n;
        self.staging.store_map_block()
    }

    /// Clears the map entry of `c`, which must name `n`.
    pub(crate) fn unmap_cluster(&mut self, c: u32, n: u32) -> Result<()> {
        if self.cluster_owner(c)? != n {
            return Err(Error::Inconsistent(Inconsistency::ClusterMapping));
        }
        self.map_cluster(c, NULL_INODE)
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use super::*;
    use crate::layout::InodeKind;
    use crate::testing::formatted;

    #[test]
    fn alloc_then_free_restores_count_and_bit() {
        let (_, mut fs) = formatted(1_000);
        let before = fs.super_block().unwrap().dzone_free;
        let c = fs.alloc_data_cluster().unwrap();
        assert_eq!(c, 1);
        assert_eq!(fs.super_block().unwrap().dzone_free, before - 1);
        assert_eq!(fs.cluster_stat(c).unwrap(), ClusterStat::Allocated);
        fs.audit_data_zone().unwrap();

        fs.free_data_cluster(c).unwrap();
        assert_eq!(fs.super_block().unwrap().dzone_free, before);
        assert!(!fs.bitmap_is_free(c).unwrap());
        fs.deplete().unwrap();
        assert!(fs.bitmap_is_free(c).unwrap());
        fs.audit_data_zone().unwrap();
    }

    #[test]
    fn bad_releases_are_rejected() {
        let (_, mut fs) = formatted(1_000);
        assert_eq!(fs.free_data_cluster(0), Err(Error::InvalidArgument));
        let total = fs.super_block().unwrap().dzone_total;
        assert_eq!(fs.free_data_cluster(total), Err(Error::InvalidArgument));
        assert_eq!(
            fs.free_data_cluster(3),
            Err(Error::Inconsistent(Inconsistency::ClusterNotAllocated))
        );
        let c = fs.alloc_data_cluster().unwrap();
        fs.free_data_cluster(c).unwrap();
        assert_eq!(
            fs.free_data_cluster(c),
            Err(Error::Inconsistent(Inconsistency::ClusterNotAllocated))
        );
    }

    #[test]
    fn counts_hold_through_many_operations() {
        let (_, mut fs) = formatted(1_000);
        let total = fs.super_block().unwrap().dzone_total;
        let mut held = Vec::new();
        for round in 0..5 {
            for _ in 0..70 {
                held.push(fs.alloc_data_cluster().unwrap());
            }
            // release every other one, oldest first
            let released: Vec<u32> = held.iter().copied().step_by(2).collect();
            held.retain(|c| !released.contains(c));
            for c in released {
                fs.free_data_cluster(c).unwrap();
            }
            let free = fs.audit_data_zone().unwrap();
            assert_eq!(free + held.len() as u32 + 1, total, "round {round}");
        }
        let mut unique = held.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), held.len());
    }

    #[test]
    fn exhausting_the_zone() {
        let (_, mut fs) = formatted(1_000);
        let total = fs.super_block().unwrap().dzone_total;
        let mut held: Vec<u32> = (1..total).map(|_| fs.alloc_data_cluster().unwrap()).collect();
        assert_eq!(fs.super_block().unwrap().dzone_free, 0);
        held.sort_unstable();
        assert_eq!(held, (1..total).collect::<Vec<_>>());

        // with one cluster left, the second request fails and changes nothing
        fs.free_data_cluster(held[100]).unwrap();
        assert_eq!(fs.alloc_data_cluster(), Ok(held[100]));
        let sb = fs.super_block().unwrap();
        assert_eq!(fs.alloc_data_cluster(), Err(Error::NoSpace));
        assert_eq!(fs.super_block().unwrap(), sb);
    }

    #[test]
    fn insertion_cache_flushes_when_full() {
        let (_, mut fs) = formatted(1_000);
        let held: Vec<u32> = (0..DZONE_CACHE_SIZE + 1)
            .map(|_| fs.alloc_data_cluster().unwrap())
            .collect();
        for &c in &held {
            fs.free_data_cluster(c).unwrap();
        }
        let sb = fs.super_block().unwrap();
        assert_eq!(sb.dzone_insert.entries(), &[held[DZONE_CACHE_SIZE]]);
        assert!(held[..DZONE_CACHE_SIZE].iter().all(|&c| fs.bitmap_is_free(c).unwrap()));
        fs.audit_data_zone().unwrap();
    }

    #[test]
    fn dirty_cluster_is_cleaned_before_reuse() {
        let (_, mut fs) = formatted(1_000);
        let total = fs.super_block().unwrap().dzone_total;
        let n = fs.alloc_inode(InodeKind::File).unwrap();
        let c = fs.handle_file_cluster(n, 3, ClusterOp::Alloc).unwrap();
        fs.handle_file_cluster(n, 3, ClusterOp::Free).unwrap();
        fs.free_inode(n).unwrap();
        assert_eq!(fs.cluster_owner(c).unwrap(), n);

        // cycle the pool until `c` comes back
        let mut got = Vec::new();
        while got.last() != Some(&c) {
            got.push(fs.alloc_data_cluster().unwrap());
            assert!(got.len() < total as usize);
        }
        assert_eq!(fs.cluster_owner(c).unwrap(), NULL_INODE);
        let inode = fs.read_inode(n, InodeStatus::FreeDirty).unwrap();
        assert_eq!(inode.d[3], crate::NULL_CLUSTER);
        assert_eq!(inode.clucount, 0);
    }
}
