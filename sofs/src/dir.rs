//! # Directory engine
//!
//! A directory is a file made of whole clusters of [`DirEntry`] slots,
//! addressed by a flat slot index `idx`: cluster `idx / DPC`, slot
//! `idx % DPC`. Slot 0 and 1 of cluster 0 always hold `.` and `..`.
//!
//! Every hard link, every `.` and every `..` counts once in the refcount
//! of the inode it names.

use enumflags2::BitFlags;

use crate::layout::{DataCluster, DirEntry, Inode, InodeKind};
use crate::{
    Access, ClusterOp, Error, InodeStatus, Result, Sofs, CLUSTER_SIZE, DPC, MAX_FILE_SIZE,
    MAX_LINKS, MAX_NAME, NULL_INODE,
};

/// Outcome of a name lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirLookup {
    Found { inode: u32, idx: u32 },
    /// Not there; `idx` is where it would go
    Vacant { idx: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOp {
    /// Link a new entry; a fresh directory gets its `.` and `..`
    Add,
    /// Link an entry detached from elsewhere
    Attach,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemOp {
    /// Unlink and tombstone the slot, releasing the entry on its last link
    Remove,
    /// Unlink and wipe the slot, never releasing anything
    Detach,
}

fn is_dot(name: &str) -> bool {
    name == "." || name == ".."
}

/// A bare component: non-empty, no separator or NUL, short enough.
fn check_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains(['/', '\0']) {
        return Err(Error::InvalidArgument);
    }
    if name.len() > MAX_NAME {
        return Err(Error::NameTooLong);
    }
    Ok(())
}

#[inline]
fn split_idx(idx: u32) -> (u32, usize) {
    (idx / DPC as u32, idx as usize % DPC)
}

impl Sofs {
    /// Looks `name` up in directory `dir`.
    pub fn get_dir_entry_by_name(&mut self, dir: u32, name: &str) -> Result<DirLookup> {
        log::trace!("get_dir_entry_by_name({dir}, {name:?})");
        self.check_inode_range(dir)?;
        check_name(name)?;
        let inode = self.open_dir(dir, Access::Exec.into())?;
        self.check_dir_contents(dir)?;
        self.scan_dir(dir, &inode, name)
    }

    /// Links inode `entry` into directory `dir` under `name`.
    pub fn add_att_dir_entry(&mut self, dir: u32, name: &str, entry: u32, op: AddOp) -> Result<()> {
        log::trace!("add_att_dir_entry({dir}, {name:?}, {entry}, {op:?})");
        self.check_inode_range(dir)?;
        self.check_inode_range(entry)?;
        check_name(name)?;
        if is_dot(name) {
            return Err(Error::InvalidArgument);
        }

        let parent = self.open_dir(dir, Access::Exec | Access::Write)?;
        if parent.size as usize >= MAX_FILE_SIZE {
            return Err(Error::FileTooBig);
        }
        let child = self.read_inode(entry, InodeStatus::InUse)?;
        let is_dir = child.is_dir();
        let (child_links, parent_links) = match (op, is_dir) {
            (AddOp::Add, true) => (2, 1),
            (AddOp::Attach, true) => (1, 1),
            (_, false) => (1, 0),
        };
        if child.refcount > MAX_LINKS - child_links || parent.refcount > MAX_LINKS - parent_links {
            return Err(Error::TooManyLinks);
        }
        let idx = match self.scan_dir(dir, &parent, name)? {
            DirLookup::Found { .. } => return Err(Error::AlreadyExists),
            DirLookup::Vacant { idx } => idx,
        };

        if is_dir {
            match op {
                AddOp::Add => {
                    if child.size != 0 {
                        return Err(Error::InvalidArgument);
                    }
                    let mut cluster = DataCluster::clean_entries();
                    let [dot, dotdot, ..] = cluster.entries_mut();
                    *dot = DirEntry::new(".", entry);
                    *dotdot = DirEntry::new("..", dir);
                    self.write_file_cluster(entry, 0, &cluster)?;
                }
                AddOp::Attach => {
                    if child.size == 0 {
                        return Err(Error::InvalidArgument);
                    }
                    self.check_dir_contents(entry)?;
                    self.set_parent_link(entry, dir)?;
                }
            }
        }

        let grows = self.put_dir_entry(dir, &parent, idx, DirEntry::new(name, entry))?;

        self.update_inode(entry, |inode| {
            inode.refcount += child_links;
            if is_dir && op == AddOp::Add {
                inode.size = CLUSTER_SIZE as u32;
            }
        })?;
        self.update_inode(dir, |inode| {
            inode.refcount += parent_links;
            if grows {
                inode.size += CLUSTER_SIZE as u32;
            }
        })
    }

    /// Unlinks `name` from directory `dir`.
    pub fn rem_detach_dir_entry(&mut self, dir: u32, name: &str, op: RemOp) -> Result<()> {
        log::trace!("rem_detach_dir_entry({dir}, {name:?}, {op:?})");
        if is_dot(name) {
            return Err(Error::PermissionDenied);
        }
        self.check_inode_range(dir)?;
        check_name(name)?;

        let parent = self.open_dir(dir, Access::Exec | Access::Write)?;
        let (entry, idx) = match self.scan_dir(dir, &parent, name)? {
            DirLookup::Found { inode, idx } => (inode, idx),
            DirLookup::Vacant { .. } => return Err(Error::NotFound),
        };
        let child = self.read_inode(entry, InodeStatus::InUse)?;
        let is_dir = child.is_dir();

        let (ci, slot) = split_idx(idx);
        let mut cluster = DataCluster::zeroed();
        match op {
            RemOp::Remove => {
                if is_dir {
                    self.check_directory_emptiness(entry)?;
                }
                self.read_file_cluster(dir, ci, &mut cluster)?;
                cluster.entries_mut()[slot].tombstone();
                self.write_file_cluster(dir, ci, &cluster)?;
            }
            RemOp::Detach => {
                self.read_file_cluster(dir, ci, &mut cluster)?;
                cluster.entries_mut()[slot] = DirEntry::CLEAN;
                self.write_file_cluster(dir, ci, &cluster)?;
                if is_dir {
                    self.set_parent_link(entry, NULL_INODE)?;
                }
            }
        }

        let child_links = if is_dir && op == RemOp::Remove { 2 } else { 1 };
        let mut refcount = 0;
        self.update_inode(entry, |inode| {
            inode.refcount = inode.refcount.saturating_sub(child_links);
            refcount = inode.refcount;
        })?;
        if is_dir {
            self.update_inode(dir, |inode| inode.refcount = inode.refcount.saturating_sub(1))?;
        }

        if op == RemOp::Remove && refcount == 0 {
            log::debug!("inode {entry} lost its last link");
            self.handle_file_clusters(entry, 0, ClusterOp::Free)?;
            self.free_inode(entry)?;
        }
        Ok(())
    }

    /// Renames entry `old` of directory `dir` to `new` in place.
    pub fn rename_dir_entry(&mut self, dir: u32, old: &str, new: &str) -> Result<()> {
        log::trace!("rename_dir_entry({dir}, {old:?}, {new:?})");
        if is_dot(old) || is_dot(new) {
            return Err(Error::PermissionDenied);
        }
        self.check_inode_range(dir)?;
        check_name(old)?;
        check_name(new)?;

        let parent = self.open_dir(dir, Access::Exec | Access::Write)?;
        let idx = match self.scan_dir(dir, &parent, old)? {
            DirLookup::Found { idx, .. } => idx,
            DirLookup::Vacant { .. } => return Err(Error::NotFound),
        };
        if let DirLookup::Found { .. } = self.scan_dir(dir, &parent, new)? {
            return Err(Error::AlreadyExists);
        }

        let (ci, slot) = split_idx(idx);
        let mut cluster = DataCluster::zeroed();
        self.read_file_cluster(dir, ci, &mut cluster)?;
        cluster.entries_mut()[slot].set_name(new);
        self.write_file_cluster(dir, ci, &cluster)
    }

    /// Fails with [`Error::DirectoryNotEmpty`] when directory `n` holds
    /// anything besides `.` and `..`.
    pub fn check_directory_emptiness(&mut self, n: u32) -> Result<()> {
        log::trace!("check_directory_emptiness({n})");
        self.check_inode_range(n)?;
        let inode = self.read_inode(n, InodeStatus::InUse)?;
        if !inode.is_dir() {
            return Err(Error::NotADirectory);
        }
        self.check_dir_contents(n)?;

        let mut cluster = DataCluster::zeroed();
        for ci in 0..inode.size / CLUSTER_SIZE as u32 {
            self.read_file_cluster(n, ci, &mut cluster)?;
            let skip = if ci == 0 { 2 } else { 0 };
            if cluster.entries().iter().skip(skip).any(DirEntry::is_live) {
                return Err(Error::DirectoryNotEmpty);
            }
        }
        Ok(())
    }

    fn check_inode_range(&mut self, n: u32) -> Result<()> {
        if n >= self.staging.sb()?.itotal {
            return Err(Error::InvalidArgument);
        }
        Ok(())
    }

    /// Reads directory `dir` after checking the caller's rights on it. A
    /// missing execute right is [`Error::AccessDenied`], a missing write
    /// right [`Error::PermissionDenied`].
    fn open_dir(&mut self, dir: u32, access: BitFlags<Access>) -> Result<Inode> {
        let inode = self.read_inode(dir, InodeStatus::InUse)?;
        if inode.kind() != Some(InodeKind::Directory) {
            return Err(Error::NotADirectory);
        }
        self.check_access(dir, Access::Exec.into())?;
        if access.contains(Access::Write) {
            self.check_access(dir, Access::Write.into()).map_err(|err| match err {
                Error::AccessDenied => Error::PermissionDenied,
                err => err,
            })?;
        }
        Ok(inode)
    }

    /// Walks the slots of `dir` in index order.
    fn scan_dir(&mut self, dir: u32, inode: &Inode, name: &str) -> Result<DirLookup> {
        let clusters = inode.size / CLUSTER_SIZE as u32;
        let mut vacant = None;
        let mut cluster = DataCluster::zeroed();
        for ci in 0..clusters {
            self.read_file_cluster(dir, ci, &mut cluster)?;
            for (slot, entry) in cluster.entries().iter().enumerate() {
                let idx = ci * DPC as u32 + slot as u32;
                if entry.is_live() && entry.name() == name.as_bytes() {
                    return Ok(DirLookup::Found {
                        inode: entry.inode(),
                        idx,
                    });
                }
                if vacant.is_none() && entry.is_clean() {
                    vacant = Some(idx);
                }
            }
        }
        Ok(DirLookup::Vacant {
            idx: vacant.unwrap_or(clusters * DPC as u32),
        })
    }

    /// Stores `entry` at slot `idx` of `dir`, telling whether that opened
    /// a new cluster.
    fn put_dir_entry(
        &mut self,
        dir: u32,
        inode: &Inode,
        idx: u32,
        entry: DirEntry,
    ) -> Result<bool> {
        let (ci, slot) = split_idx(idx);
        let grows = ci >= inode.size / CLUSTER_SIZE as u32;
        let mut cluster = if grows {
            DataCluster::clean_entries()
        } else {
            let mut cluster = DataCluster::zeroed();
            self.read_file_cluster(dir, ci, &mut cluster)?;
            cluster
        };
        cluster.entries_mut()[slot] = entry;
        self.write_file_cluster(dir, ci, &cluster)?;
        Ok(grows)
    }

    /// Points the `..` of directory `n` at `parent`.
    fn set_parent_link(&mut self, n: u32, parent: u32) -> Result<()> {
        let mut cluster = DataCluster::zeroed();
        self.read_file_cluster(n, 0, &mut cluster)?;
        cluster.entries_mut()[1].set_inode(parent);
        self.write_file_cluster(n, 0, &cluster)
    }
}
