//! # Inode free list
//!
//! Free inodes form a doubly linked list threaded through the inode table
//! itself, with both ends kept in the superblock. Allocation takes the
//! head; freeing appends at the tail, so a freed inode keeps its old
//! references for as long as possible.

use crate::layout::{Inode, InodeKind, InodeState, ModeFlag};
use crate::{consist, ClusterOp, Error, Inconsistency, InodeStatus, Result, Sofs, NULL_INODE};

impl Sofs {
    /// Takes an inode off the free list and makes it a fresh, empty
    /// `kind` owned by the caller.
    pub fn alloc_inode(&mut self, kind: InodeKind) -> Result<u32> {
        log::trace!("alloc_inode({kind:?})");
        let sb = self.staging.sb()?;
        consist::check_super_block(&sb)?;
        if sb.ifree == 0 {
            return Err(Error::NoSpace);
        }

        let n = sb.ihead;
        if self.read_inode(n, InodeStatus::FreeDirty)?.is_free_dirty() {
            self.clean_inode(n)?;
        }
        let (_, next) = self
            .fetch_inode(n)?
            .free_links()
            .ok_or(Error::Inconsistent(Inconsistency::FreeList))?;

        let (ihead, itail) = if next == NULL_INODE {
            (NULL_INODE, NULL_INODE)
        } else {
            let mut head = self.read_inode(next, InodeStatus::FreeDirty)?;
            head.set_prev(NULL_INODE);
            self.put_inode(next, &head)?;
            (next, self.staging.sb()?.itail)
        };

        let caller = self.credentials();
        let inode = Inode::new(kind, caller.uid, caller.gid, self.now());
        self.put_inode(n, &inode)?;

        let sb = self.staging.sb_mut()?;
        sb.ihead = ihead;
        sb.itail = itail;
        sb.ifree -= 1;
        self.staging.store_super_block()?;
        Ok(n)
    }

    /// Puts inode `n` at the tail of the free list. Its cluster references
    /// stay in place until the inode is cleaned.
    pub fn free_inode(&mut self, n: u32) -> Result<()> {
        log::trace!("free_inode({n})");
        let sb = self.staging.sb()?;
        if n == 0 || n >= sb.itotal {
            return Err(Error::InvalidArgument);
        }
        consist::check_super_block(&sb)?;

        let mut inode = self.read_inode(n, InodeStatus::InUse)?;
        inode.owner = 0;
        inode.group = 0;

        let ihead = if sb.ifree == 0 {
            inode.set_state(InodeState::Free {
                prev: NULL_INODE,
                next: NULL_INODE,
            });
            self.put_inode(n, &inode)?;
            n
        } else {
            inode.set_state(InodeState::Free {
                prev: sb.itail,
                next: NULL_INODE,
            });
            self.put_inode(n, &inode)?;
            let mut tail = self.read_inode(sb.itail, InodeStatus::FreeDirty)?;
            tail.set_next(n);
            self.put_inode(sb.itail, &tail)?;
            sb.ihead
        };

        let sb = self.staging.sb_mut()?;
        sb.ihead = ihead;
        sb.itail = n;
        sb.ifree += 1;
        self.staging.store_super_block()
    }

    /// Drops every cluster association a freed inode still has and leaves
    /// it as a clean free inode.
    pub fn clean_inode(&mut self, n: u32) -> Result<()> {
        log::trace!("clean_inode({n})");
        let sb = self.staging.sb()?;
        if n == 0 || n >= sb.itotal {
            return Err(Error::InvalidArgument);
        }

        self.handle_file_clusters(n, 0, ClusterOp::Clean)?;

        let mut inode = self.read_inode(n, InodeStatus::FreeDirty)?;
        inode.set_mode(inode.mode() & !ModeFlag::TYPES);
        inode.size = 0;
        self.put_inode(n, &inode)?;
        log::debug!("inode {n} cleaned");

        let sb = self.staging.sb()?;
        consist::check_super_block(&sb)?;
        consist::check_data_zone(&sb)
    }
}
