//! # Inode accessor
//!
//! Whole-record reads and writes of the inode table. The public entry
//! points check the record against the expected status and keep the
//! in-use timestamps current; the raw helpers do neither.

use crate::layout::Inode;
use crate::{consist, convert, Result, Sofs};

/// What the caller expects to find in the inode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodeStatus {
    InUse,
    /// Free, possibly still holding references from its former life
    FreeDirty,
}

fn check_status(inode: &Inode, status: InodeStatus) -> Result<()> {
    match status {
        InodeStatus::InUse => consist::check_inode_in_use(inode),
        InodeStatus::FreeDirty => consist::check_free_dirty_inode(inode),
    }
}

impl Sofs {
    /// Copies inode `n` out of the table as is.
    pub(crate) fn fetch_inode(&mut self, n: u32) -> Result<Inode> {
        let sb = self.staging.sb()?;
        let (block, offset) = convert::inode_pos(&sb, n)?;
        self.staging.load_inode_block(block)?;
        Ok(self.staging.inode_block()?[offset])
    }

    /// Writes inode `n` back as is.
    pub(crate) fn put_inode(&mut self, n: u32, inode: &Inode) -> Result<()> {
        let sb = self.staging.sb()?;
        let (block, offset) = convert::inode_pos(&sb, n)?;
        self.staging.load_inode_block(block)?;
        self.staging.inode_block_mut()?[offset] = *inode;
        self.staging.store_inode_block()
    }

    /// Reads inode `n`, which must be in the given status.
    ///
    /// Reading an inode in use stamps its access time.
    pub fn read_inode(&mut self, n: u32, status: InodeStatus) -> Result<Inode> {
        log::trace!("read_inode({n}, {status:?})");
        let mut inode = self.fetch_inode(n)?;
        check_status(&inode, status)?;

        if let Some((_, mtime)) = inode.times() {
            inode.touch(self.now(), mtime);
            self.put_inode(n, &inode)?;
        }
        Ok(inode)
    }

    /// Writes `inode` as inode `n`; the record must be in the given status.
    ///
    /// Writing an inode in use stamps both its access and modification time.
    pub fn write_inode(&mut self, n: u32, inode: &Inode, status: InodeStatus) -> Result<()> {
        log::trace!("write_inode({n}, {status:?})");
        check_status(inode, status)?;

        let mut inode = *inode;
        let now = self.now();
        inode.touch(now, now);
        self.put_inode(n, &inode)
    }

    /// Reads, changes and writes back an inode in use.
    pub(crate) fn update_inode(&mut self, n: u32, f: impl FnOnce(&mut Inode)) -> Result<()> {
        let mut inode = self.read_inode(n, InodeStatus::InUse)?;
        f(&mut inode);
        self.write_inode(n, &inode, InodeStatus::InUse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::InodeKind;
    use crate::testing::formatted;
    use crate::{Config, Credentials, Error, Inconsistency};

    #[test]
    fn status_must_match() {
        let (_, mut fs) = formatted(1_000);
        assert_eq!(
            fs.read_inode(0, InodeStatus::FreeDirty),
            Err(Error::Inconsistent(Inconsistency::FreeDirtyInode))
        );
        assert_eq!(
            fs.read_inode(1, InodeStatus::InUse),
            Err(Error::Inconsistent(Inconsistency::InodeInUse))
        );
        let itotal = fs.super_block().unwrap().itotal;
        assert_eq!(fs.read_inode(itotal, InodeStatus::InUse), Err(Error::InvalidArgument));
    }

    #[test]
    fn timestamps_are_refreshed() {
        let (_, mut fs) = formatted(1_000);
        fs.config = Config::new(Credentials::ROOT, || 42);
        let root = fs.read_inode(0, InodeStatus::InUse).unwrap();
        assert_eq!(root.times().map(|(atime, _)| atime), Some(42));

        let mut file = Inode::new(InodeKind::File, 0, 0, 1);
        file.size = 10;
        fs.write_inode(0, &file, InodeStatus::InUse).unwrap();
        let back = fs.fetch_inode(0).unwrap();
        assert_eq!(back.size, 10);
        assert_eq!(back.times(), Some((42, 42)));
    }
}
