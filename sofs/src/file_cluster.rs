//! # File-cluster resolver
//!
//! Maps the logical cluster index of a file onto the data cluster holding
//! it, creating or dropping references on the way.
//!
//! ## Index routing
//!
//! - `idx < N_DIRECT`: the inode's direct references
//! - `idx < N_DIRECT + RPC`: slot `idx - N_DIRECT` of the `i1` table
//! - otherwise, with `k = idx - N_DIRECT - RPC`: slot `k / RPC` of the `i2`
//!   table names an inner table, whose slot `k % RPC` names the cluster
//!
//! Reference tables count as clusters of the file: they are mapped to the
//! inode and included in its cluster count like data clusters are.

use crate::layout::{DataCluster, Inode};
use crate::{
    Error, InodeStatus, Result, Sofs, MAX_FILE_CLUSTERS, NULL_CLUSTER, N_DIRECT, RPC,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterOp {
    /// Look the cluster up
    Get,
    /// Allocate a cluster for an empty index
    Alloc,
    /// Release the cluster but keep the reference to it
    Free,
    /// Release the cluster and drop the reference
    FreeClean,
    /// Drop the reference to an already released cluster
    Clean,
}

impl ClusterOp {
    /// Whether the reference goes away.
    #[inline]
    fn cleans(self) -> bool {
        matches!(self, Self::FreeClean | Self::Clean)
    }

    #[inline]
    fn frees(self) -> bool {
        matches!(self, Self::Free | Self::FreeClean)
    }
}

/// Which staging slot a reference table goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Table {
    /// `i2`, naming inner tables
    Outer,
    /// `i1` or a table under `i2`, naming data clusters
    Inner,
}

impl Sofs {
    /// Applies `op` to cluster `idx` of inode `n`, returning the cluster
    /// concerned, or [`NULL_CLUSTER`] for a [`ClusterOp::Get`] on an empty
    /// index.
    ///
    /// [`ClusterOp::Clean`] works on a free-dirty inode, every other
    /// operation on an inode in use.
    pub fn handle_file_cluster(&mut self, n: u32, idx: u32, op: ClusterOp) -> Result<u32> {
        log::trace!("handle_file_cluster({n}, {idx}, {op:?})");
        let status = if op == ClusterOp::Clean {
            InodeStatus::FreeDirty
        } else {
            InodeStatus::InUse
        };
        self.resolve_cluster(n, idx as usize, op, status, true)
    }

    /// With `prune` set, a table left empty by a cleanup is released too.
    pub(crate) fn resolve_cluster(
        &mut self,
        n: u32,
        idx: usize,
        op: ClusterOp,
        status: InodeStatus,
        prune: bool,
    ) -> Result<u32> {
        let sb = self.staging.sb()?;
        if n >= sb.itotal || idx >= MAX_FILE_CLUSTERS {
            return Err(Error::InvalidArgument);
        }

        let mut inode = self.read_inode(n, status)?;
        let c = if idx < N_DIRECT {
            self.direct(n, &mut inode, idx, op)?
        } else if idx < N_DIRECT + RPC {
            self.single_indirect(n, &mut inode, idx - N_DIRECT, op, prune)?
        } else {
            let k = idx - N_DIRECT - RPC;
            self.double_indirect(n, &mut inode, (k / RPC, k % RPC), op, prune)?
        };

        if op != ClusterOp::Get {
            self.write_inode(n, &inode, status)?;
        }
        Ok(c)
    }

    fn direct(&mut self, n: u32, inode: &mut Inode, k: usize, op: ClusterOp) -> Result<u32> {
        let c = inode.d[k];
        match op {
            ClusterOp::Get => Ok(c),
            ClusterOp::Alloc => {
                if c != NULL_CLUSTER {
                    return Err(Error::ClusterAlreadyInList);
                }
                let c = self.alloc_for(n, inode)?;
                inode.d[k] = c;
                Ok(c)
            }
            _ => {
                if c == NULL_CLUSTER {
                    return Err(Error::ClusterNotInList);
                }
                self.release_leaf(n, inode, c, op)?;
                if op.cleans() {
                    inode.d[k] = NULL_CLUSTER;
                }
                Ok(c)
            }
        }
    }

    fn single_indirect(
        &mut self,
        n: u32,
        inode: &mut Inode,
        k: usize,
        op: ClusterOp,
        prune: bool,
    ) -> Result<u32> {
        match op {
            ClusterOp::Get => {
                if inode.i1 == NULL_CLUSTER {
                    return Ok(NULL_CLUSTER);
                }
                self.table_ref(Table::Inner, inode.i1, k)
            }
            ClusterOp::Alloc => {
                if inode.i1 == NULL_CLUSTER {
                    inode.i1 = self.new_table(n, inode, Table::Inner)?;
                }
                let table = inode.i1;
                if self.table_ref(Table::Inner, table, k)? != NULL_CLUSTER {
                    return Err(Error::ClusterAlreadyInList);
                }
                let c = self.alloc_for(n, inode)?;
                self.set_table_ref(Table::Inner, table, k, c)?;
                Ok(c)
            }
            _ => {
                let table = inode.i1;
                if table == NULL_CLUSTER {
                    return Err(Error::ClusterNotInList);
                }
                let c = self.table_ref(Table::Inner, table, k)?;
                if c == NULL_CLUSTER {
                    return Err(Error::ClusterNotInList);
                }
                self.release_leaf(n, inode, c, op)?;
                if op.cleans() {
                    let empty = self.set_table_ref(Table::Inner, table, k, NULL_CLUSTER)?;
                    if empty && prune {
                        self.release_table(n, inode, table)?;
                        inode.i1 = NULL_CLUSTER;
                    }
                }
                Ok(c)
            }
        }
    }

    fn double_indirect(
        &mut self,
        n: u32,
        inode: &mut Inode,
        (outer, inner): (usize, usize),
        op: ClusterOp,
        prune: bool,
    ) -> Result<u32> {
        match op {
            ClusterOp::Get => {
                if inode.i2 == NULL_CLUSTER {
                    return Ok(NULL_CLUSTER);
                }
                let table = self.table_ref(Table::Outer, inode.i2, outer)?;
                if table == NULL_CLUSTER {
                    return Ok(NULL_CLUSTER);
                }
                self.table_ref(Table::Inner, table, inner)
            }
            ClusterOp::Alloc => {
                if inode.i2 == NULL_CLUSTER {
                    inode.i2 = self.new_table(n, inode, Table::Outer)?;
                }
                let mut table = self.table_ref(Table::Outer, inode.i2, outer)?;
                if table == NULL_CLUSTER {
                    table = self.new_table(n, inode, Table::Inner)?;
                    self.set_table_ref(Table::Outer, inode.i2, outer, table)?;
                } else if self.table_ref(Table::Inner, table, inner)? != NULL_CLUSTER {
                    return Err(Error::ClusterAlreadyInList);
                }
                let c = self.alloc_for(n, inode)?;
                self.set_table_ref(Table::Inner, table, inner, c)?;
                Ok(c)
            }
            _ => {
                let top = inode.i2;
                if top == NULL_CLUSTER {
                    return Err(Error::ClusterNotInList);
                }
                let table = self.table_ref(Table::Outer, top, outer)?;
                if table == NULL_CLUSTER {
                    return Err(Error::ClusterNotInList);
                }
                let c = self.table_ref(Table::Inner, table, inner)?;
                if c == NULL_CLUSTER {
                    return Err(Error::ClusterNotInList);
                }
                self.release_leaf(n, inode, c, op)?;
                if op.cleans()
                    && self.set_table_ref(Table::Inner, table, inner, NULL_CLUSTER)?
                    && prune
                {
                    self.release_table(n, inode, table)?;
                    if self.set_table_ref(Table::Outer, top, outer, NULL_CLUSTER)? {
                        self.release_table(n, inode, top)?;
                        inode.i2 = NULL_CLUSTER;
                    }
                }
                Ok(c)
            }
        }
    }

    /// Allocates a cluster and maps it to inode `n`.
    ///
    /// The pool may have to clean a dirty cluster out of `n` itself, so
    /// `inode` is written out before and read back after allocating.
    fn alloc_for(&mut self, n: u32, inode: &mut Inode) -> Result<u32> {
        self.put_inode(n, inode)?;
        let c = self.alloc_data_cluster()?;
        *inode = self.fetch_inode(n)?;
        self.map_cluster(c, n)?;
        inode.clucount += 1;
        Ok(c)
    }

    /// Allocates a reference table with every slot null.
    fn new_table(&mut self, n: u32, inode: &mut Inode, table: Table) -> Result<u32> {
        let c = self.alloc_for(n, inode)?;
        match table {
            Table::Outer => {
                self.staging.load_sng_ind(c)?;
                *self.staging.sng_ind_mut()? = DataCluster::null_refs();
                self.staging.store_sng_ind()?;
            }
            Table::Inner => {
                self.staging.load_dir_refs(c)?;
                *self.staging.dir_refs_mut()? = DataCluster::null_refs();
                self.staging.store_dir_refs()?;
            }
        }
        Ok(c)
    }

    fn table_ref(&mut self, table: Table, c: u32, k: usize) -> Result<u32> {
        let refs = match table {
            Table::Outer => {
                self.staging.load_sng_ind(c)?;
                self.staging.sng_ind()?.refs()
            }
            Table::Inner => {
                self.staging.load_dir_refs(c)?;
                self.staging.dir_refs()?.refs()
            }
        };
        Ok(refs[k])
    }

    /// Sets slot `k` of table `c`, telling whether the table is now empty.
    fn set_table_ref(&mut self, table: Table, c: u32, k: usize, value: u32) -> Result<bool> {
        let empty = match table {
            Table::Outer => {
                self.staging.load_sng_ind(c)?;
                let cluster = self.staging.sng_ind_mut()?;
                cluster.refs_mut()[k] = value;
                let empty = cluster.refs_all_null();
                self.staging.store_sng_ind()?;
                empty
            }
            Table::Inner => {
                self.staging.load_dir_refs(c)?;
                let cluster = self.staging.dir_refs_mut()?;
                cluster.refs_mut()[k] = value;
                let empty = cluster.refs_all_null();
                self.staging.store_dir_refs()?;
                empty
            }
        };
        Ok(empty)
    }

    fn release_leaf(&mut self, n: u32, inode: &mut Inode, c: u32, op: ClusterOp) -> Result<()> {
        if op.frees() {
            self.free_data_cluster(c)?;
        }
        if op.cleans() {
            self.unmap_cluster(c, n)?;
            inode.clucount = inode.clucount.saturating_sub(1);
        }
        Ok(())
    }

    pub(crate) fn release_table(&mut self, n: u32, inode: &mut Inode, c: u32) -> Result<()> {
        self.unmap_cluster(c, n)?;
        self.free_data_cluster(c)?;
        inode.clucount = inode.clucount.saturating_sub(1);
        Ok(())
    }
}
