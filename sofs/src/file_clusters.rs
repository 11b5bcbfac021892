//! Whole-file walks over the reference tree, and cluster-sized file I/O.

use alloc::vec::Vec;

use crate::layout::{DataCluster, Inode};
use crate::{
    ClusterOp, Error, InodeStatus, Result, Sofs, MAX_FILE_CLUSTERS, NULL_CLUSTER, N_DIRECT, RPC,
};

const SINGLE_START: usize = N_DIRECT;
const DOUBLE_START: usize = N_DIRECT + RPC;

impl Sofs {
    /// Applies a releasing `op` to every populated index of inode `n` from
    /// `start` on: double indirect first, then single indirect, then direct.
    pub fn handle_file_clusters(&mut self, n: u32, start: u32, op: ClusterOp) -> Result<()> {
        log::trace!("handle_file_clusters({n}, {start}, {op:?})");
        let status = match op {
            ClusterOp::Free | ClusterOp::FreeClean => InodeStatus::InUse,
            ClusterOp::Clean => InodeStatus::FreeDirty,
            ClusterOp::Get | ClusterOp::Alloc => return Err(Error::InvalidArgument),
        };
        let start = start as usize;
        if n >= self.staging.sb()?.itotal || start >= MAX_FILE_CLUSTERS {
            return Err(Error::InvalidArgument);
        }

        let inode = self.read_inode(n, status)?;
        for idx in self.populated_indices(&inode, start)? {
            self.resolve_cluster(n, idx, op, status, true)?;
        }
        if op != ClusterOp::Free {
            self.prune_tables(n, status)?;
        }
        Ok(())
    }

    /// Reads cluster `idx` of inode `n`; a hole reads as zeros.
    pub fn read_file_cluster(&mut self, n: u32, idx: u32, buf: &mut DataCluster) -> Result<()> {
        log::trace!("read_file_cluster({n}, {idx})");
        match self.handle_file_cluster(n, idx, ClusterOp::Get)? {
            NULL_CLUSTER => {
                buf.bytes_mut().fill(0);
                Ok(())
            }
            c => self.read_cluster(c, buf),
        }
    }

    /// Writes cluster `idx` of inode `n`, allocating it first if needed.
    pub fn write_file_cluster(&mut self, n: u32, idx: u32, buf: &DataCluster) -> Result<()> {
        log::trace!("write_file_cluster({n}, {idx})");
        let c = match self.handle_file_cluster(n, idx, ClusterOp::Get)? {
            NULL_CLUSTER => self.handle_file_cluster(n, idx, ClusterOp::Alloc)?,
            c => c,
        };
        self.write_cluster(c, buf)
    }

    /// Logical index at which `inode` references data cluster `c`.
    pub(crate) fn find_cluster_index(&mut self, inode: &Inode, c: u32) -> Result<Option<usize>> {
        if let Some(k) = inode.d.iter().position(|&r| r == c) {
            return Ok(Some(k));
        }
        let mut table = DataCluster::zeroed();
        if inode.i1 != NULL_CLUSTER {
            self.read_cluster(inode.i1, &mut table)?;
            if let Some(k) = table.refs().iter().position(|&r| r == c) {
                return Ok(Some(SINGLE_START + k));
            }
        }
        if inode.i2 != NULL_CLUSTER {
            let mut outer = DataCluster::zeroed();
            self.read_cluster(inode.i2, &mut outer)?;
            for (o, &inner) in outer.refs().iter().enumerate() {
                if inner == NULL_CLUSTER {
                    continue;
                }
                self.read_cluster(inner, &mut table)?;
                if let Some(k) = table.refs().iter().position(|&r| r == c) {
                    return Ok(Some(DOUBLE_START + o * RPC + k));
                }
            }
        }
        Ok(None)
    }

    /// Every index from `start` on that holds a reference, in walking order.
    fn populated_indices(&mut self, inode: &Inode, start: usize) -> Result<Vec<usize>> {
        let mut indices = Vec::new();
        let mut table = DataCluster::zeroed();

        if inode.i2 != NULL_CLUSTER {
            let mut outer = DataCluster::zeroed();
            self.read_cluster(inode.i2, &mut outer)?;
            let first = start.saturating_sub(DOUBLE_START);
            for (o, &inner) in outer.refs().iter().enumerate().skip(first / RPC) {
                if inner == NULL_CLUSTER {
                    continue;
                }
                self.read_cluster(inner, &mut table)?;
                indices.extend(
                    table
                        .refs()
                        .iter()
                        .enumerate()
                        .filter(|&(_, &c)| c != NULL_CLUSTER)
                        .map(|(k, _)| DOUBLE_START + o * RPC + k)
                        .filter(|&idx| idx >= start),
                );
            }
        }

        if inode.i1 != NULL_CLUSTER && start < DOUBLE_START {
            self.read_cluster(inode.i1, &mut table)?;
            indices.extend(
                table
                    .refs()
                    .iter()
                    .enumerate()
                    .filter(|&(_, &c)| c != NULL_CLUSTER)
                    .map(|(k, _)| SINGLE_START + k)
                    .filter(|&idx| idx >= start),
            );
        }

        indices.extend((start..N_DIRECT).filter(|&k| inode.d[k] != NULL_CLUSTER));
        Ok(indices)
    }

    /// Releases any reference table left without references.
    fn prune_tables(&mut self, n: u32, status: InodeStatus) -> Result<()> {
        let mut inode = self.read_inode(n, status)?;
        let before = inode;
        let mut table = DataCluster::zeroed();

        if inode.i2 != NULL_CLUSTER {
            let mut outer = DataCluster::zeroed();
            self.read_cluster(inode.i2, &mut outer)?;
            let mut changed = false;
            for slot in outer.refs_mut().iter_mut() {
                if *slot == NULL_CLUSTER {
                    continue;
                }
                self.read_cluster(*slot, &mut table)?;
                if table.refs_all_null() {
                    self.release_table(n, &mut inode, *slot)?;
                    *slot = NULL_CLUSTER;
                    changed = true;
                }
            }
            if outer.refs_all_null() {
                let top = inode.i2;
                self.release_table(n, &mut inode, top)?;
                inode.i2 = NULL_CLUSTER;
            } else if changed {
                self.staging.load_sng_ind(inode.i2)?;
                *self.staging.sng_ind_mut()? = outer;
                self.staging.store_sng_ind()?;
            }
        }

        if inode.i1 != NULL_CLUSTER {
            self.read_cluster(inode.i1, &mut table)?;
            if table.refs_all_null() {
                let top = inode.i1;
                self.release_table(n, &mut inode, top)?;
                inode.i1 = NULL_CLUSTER;
            }
        }

        if inode != before {
            self.write_inode(n, &inode, status)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::InodeKind;
    use crate::testing::formatted;
    use crate::NULL_INODE;

    #[test]
    fn truncate_from_the_middle() {
        let (_, mut fs) = formatted(4_000);
        let free = fs.super_block().unwrap().dzone_free;
        let n = fs.alloc_inode(InodeKind::File).unwrap();
        let indices = [0, 3, 6, 7, 100, 518, 519, 1_100];
        let clusters: Vec<u32> = indices
            .iter()
            .map(|&idx| fs.handle_file_cluster(n, idx, ClusterOp::Alloc).unwrap())
            .collect();

        fs.handle_file_clusters(n, 100, ClusterOp::FreeClean).unwrap();
        for (&idx, &c) in indices.iter().zip(&clusters) {
            let expected = if idx < 100 { c } else { NULL_CLUSTER };
            assert_eq!(fs.handle_file_cluster(n, idx, ClusterOp::Get), Ok(expected));
        }
        // leaves 0, 3, 6, 7 and table i1 remain
        let inode = fs.read_inode(n, InodeStatus::InUse).unwrap();
        assert_eq!((inode.clucount, inode.i2), (5, NULL_CLUSTER));
        assert_eq!(fs.super_block().unwrap().dzone_free, free - 5);
        fs.audit_data_zone().unwrap();
    }

    #[test]
    fn delete_then_clean_releases_everything() {
        let (_, mut fs) = formatted(4_000);
        let free = fs.super_block().unwrap().dzone_free;
        let n = fs.alloc_inode(InodeKind::File).unwrap();
        let mut clusters = Vec::new();
        for idx in [2, 10, 600, 2_000] {
            clusters.push(fs.handle_file_cluster(n, idx, ClusterOp::Alloc).unwrap());
        }

        fs.handle_file_clusters(n, 0, ClusterOp::Free).unwrap();
        fs.free_inode(n).unwrap();
        // leaves are free again but tables are still held
        assert_eq!(fs.super_block().unwrap().dzone_free, free - 4);

        fs.clean_inode(n).unwrap();
        let inode = fs.read_inode(n, InodeStatus::FreeDirty).unwrap();
        assert!(!inode.is_free_dirty());
        assert_eq!(fs.super_block().unwrap().dzone_free, free);
        for c in clusters {
            assert_eq!(fs.cluster_owner(c).unwrap(), NULL_INODE);
        }
        fs.audit_data_zone().unwrap();
    }

    #[test]
    fn only_releasing_ops_walk() {
        let (_, mut fs) = formatted(1_000);
        let n = fs.alloc_inode(InodeKind::File).unwrap();
        assert_eq!(fs.handle_file_clusters(n, 0, ClusterOp::Get), Err(Error::InvalidArgument));
        assert_eq!(fs.handle_file_clusters(n, 0, ClusterOp::Alloc), Err(Error::InvalidArgument));
        fs.handle_file_clusters(n, 0, ClusterOp::FreeClean).unwrap();
    }

    #[test]
    fn holes_read_as_zeros() {
        let (_, mut fs) = formatted(1_000);
        let n = fs.alloc_inode(InodeKind::File).unwrap();
        let mut data = DataCluster::zeroed();
        data.bytes_mut()[..5].copy_from_slice(b"hello");
        fs.write_file_cluster(n, 8, &data).unwrap();

        let mut back = DataCluster::null_refs();
        fs.read_file_cluster(n, 8, &mut back).unwrap();
        assert_eq!(&back.bytes()[..5], b"hello");
        fs.read_file_cluster(n, 9, &mut back).unwrap();
        assert!(back.bytes().iter().all(|&b| b == 0));

        // overwriting keeps the same cluster
        let c = fs.handle_file_cluster(n, 8, ClusterOp::Get).unwrap();
        fs.write_file_cluster(n, 8, &DataCluster::zeroed()).unwrap();
        assert_eq!(fs.handle_file_cluster(n, 8, ClusterOp::Get), Ok(c));
    }
}
