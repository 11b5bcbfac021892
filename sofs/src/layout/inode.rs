//! Inode records.
//!
//! An inode references its data clusters in three tiers:
//! - direct: `d` holds [`N_DIRECT`] cluster numbers
//! - single indirect: `i1` names a cluster of [`RPC`](crate::RPC) cluster numbers
//! - double indirect: `i2` names a cluster of cluster numbers, each naming a
//!   cluster like `i1`'s
//!
//! Two words change meaning with the free flag; [`InodeState`] is the only
//! way to reach them.

use enumflags2::{bitflags, make_bitflags, BitFlags};

use crate::{N_DIRECT, NULL_CLUSTER, NULL_INODE};

#[bitflags]
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeFlag {
    OtherExec = 0x0001,
    OtherWrite = 0x0002,
    OtherRead = 0x0004,
    GroupExec = 0x0008,
    GroupWrite = 0x0010,
    GroupRead = 0x0020,
    UserExec = 0x0040,
    UserWrite = 0x0080,
    UserRead = 0x0100,
    Directory = 0x0200,
    File = 0x0400,
    Symlink = 0x0800,
    Free = 0x1000,
}

impl ModeFlag {
    pub const PERMISSIONS: BitFlags<Self> = make_bitflags!(ModeFlag::{
        OtherExec | OtherWrite | OtherRead |
        GroupExec | GroupWrite | GroupRead |
        UserExec | UserWrite | UserRead
    });

    pub const TYPES: BitFlags<Self> = make_bitflags!(ModeFlag::{Directory | File | Symlink});

    pub const EXEC: BitFlags<Self> = make_bitflags!(ModeFlag::{OtherExec | GroupExec | UserExec});
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodeKind {
    Directory,
    File,
    Symlink,
}

impl InodeKind {
    pub fn flag(self) -> ModeFlag {
        match self {
            Self::Directory => ModeFlag::Directory,
            Self::File => ModeFlag::File,
            Self::Symlink => ModeFlag::Symlink,
        }
    }
}

/// The state-dependent pair of words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodeState {
    InUse { atime: u32, mtime: u32 },
    Free { prev: u32, next: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct Inode {
    mode: u16,
    /// Hard links, counting `.` and `..` of directories
    pub refcount: u16,
    pub owner: u32,
    pub group: u32,
    /// Size in bytes
    pub size: u32,
    /// Clusters in use, indirect tables included
    pub clucount: u32,
    // atime or previous free inode
    word1: u32,
    // mtime or next free inode
    word2: u32,
    pub d: [u32; N_DIRECT],
    pub i1: u32,
    pub i2: u32,
}

impl Inode {
    pub const SIZE: usize = 64;

    /// A freshly allocated inode with no permissions and no clusters.
    pub fn new(kind: InodeKind, owner: u32, group: u32, now: u32) -> Self {
        Self {
            mode: kind.flag() as u16,
            refcount: 0,
            owner,
            group,
            size: 0,
            clucount: 0,
            word1: now,
            word2: now,
            d: [NULL_CLUSTER; N_DIRECT],
            i1: NULL_CLUSTER,
            i2: NULL_CLUSTER,
        }
    }

    /// A clean free inode linked between `prev` and `next`.
    pub fn new_free(prev: u32, next: u32) -> Self {
        Self {
            mode: ModeFlag::Free as u16,
            refcount: 0,
            owner: 0,
            group: 0,
            size: 0,
            clucount: 0,
            word1: prev,
            word2: next,
            d: [NULL_CLUSTER; N_DIRECT],
            i1: NULL_CLUSTER,
            i2: NULL_CLUSTER,
        }
    }

    #[inline]
    pub fn mode(&self) -> BitFlags<ModeFlag> {
        BitFlags::from_bits_truncate(self.mode)
    }

    #[inline]
    pub fn raw_mode(&self) -> u16 {
        self.mode
    }

    #[inline]
    pub fn set_mode(&mut self, mode: BitFlags<ModeFlag>) {
        self.mode = mode.bits();
    }

    #[inline]
    pub fn permissions(&self) -> BitFlags<ModeFlag> {
        self.mode() & ModeFlag::PERMISSIONS
    }

    pub fn set_permissions(&mut self, perms: BitFlags<ModeFlag>) {
        let mode = (self.mode() & !ModeFlag::PERMISSIONS) | (perms & ModeFlag::PERMISSIONS);
        self.set_mode(mode);
    }

    #[inline]
    pub fn is_free(&self) -> bool {
        self.mode().contains(ModeFlag::Free)
    }

    /// The type, if exactly one type bit is set.
    pub fn kind(&self) -> Option<InodeKind> {
        match self.mode & ModeFlag::TYPES.bits() {
            t if t == ModeFlag::Directory as u16 => Some(InodeKind::Directory),
            t if t == ModeFlag::File as u16 => Some(InodeKind::File),
            t if t == ModeFlag::Symlink as u16 => Some(InodeKind::Symlink),
            _ => None,
        }
    }

    #[inline]
    pub fn is_dir(&self) -> bool {
        self.kind() == Some(InodeKind::Directory)
    }

    pub fn state(&self) -> InodeState {
        if self.is_free() {
            InodeState::Free {
                prev: self.word1,
                next: self.word2,
            }
        } else {
            InodeState::InUse {
                atime: self.word1,
                mtime: self.word2,
            }
        }
    }

    /// Replaces the state words and keeps the free flag in step with them.
    pub fn set_state(&mut self, state: InodeState) {
        let (word1, word2, free) = match state {
            InodeState::InUse { atime, mtime } => (atime, mtime, false),
            InodeState::Free { prev, next } => (prev, next, true),
        };
        self.word1 = word1;
        self.word2 = word2;
        let mut mode = self.mode();
        mode.set(ModeFlag::Free, free);
        self.set_mode(mode);
    }

    /// Access and modification time, or `None` for a free inode.
    pub fn times(&self) -> Option<(u32, u32)> {
        match self.state() {
            InodeState::InUse { atime, mtime } => Some((atime, mtime)),
            InodeState::Free { .. } => None,
        }
    }

    /// Previous and next free inode, or `None` for an inode in use.
    pub fn free_links(&self) -> Option<(u32, u32)> {
        match self.state() {
            InodeState::Free { prev, next } => Some((prev, next)),
            InodeState::InUse { .. } => None,
        }
    }

    /// Rewrites only the previous link of a free inode.
    pub fn set_prev(&mut self, prev: u32) {
        if let Some((_, next)) = self.free_links() {
            self.set_state(InodeState::Free { prev, next });
        }
    }

    /// Rewrites only the next link of a free inode.
    pub fn set_next(&mut self, next: u32) {
        if let Some((prev, _)) = self.free_links() {
            self.set_state(InodeState::Free { prev, next });
        }
    }

    pub fn touch(&mut self, atime: u32, mtime: u32) {
        if !self.is_free() {
            self.set_state(InodeState::InUse { atime, mtime });
        }
    }

    /// Whether any cluster reference is still present.
    pub fn has_references(&self) -> bool {
        self.d.iter().any(|&c| c != NULL_CLUSTER)
            || self.i1 != NULL_CLUSTER
            || self.i2 != NULL_CLUSTER
    }

    /// A free inode that still carries traces of its former life.
    pub fn is_free_dirty(&self) -> bool {
        self.is_free()
            && (self.clucount != 0
                || self.has_references()
                || self.mode().intersects(ModeFlag::TYPES))
    }
}

impl Default for Inode {
    fn default() -> Self {
        Self::new_free(NULL_INODE, NULL_INODE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_follows_free_flag() {
        let mut inode = Inode::new(InodeKind::File, 1, 2, 100);
        assert_eq!(inode.kind(), Some(InodeKind::File));
        assert_eq!(inode.times(), Some((100, 100)));
        assert_eq!(inode.free_links(), None);

        inode.set_state(InodeState::Free { prev: 3, next: NULL_INODE });
        assert!(inode.is_free());
        assert!(inode.is_free_dirty());
        assert_eq!(inode.times(), None);
        assert_eq!(inode.free_links(), Some((3, NULL_INODE)));

        inode.set_next(9);
        assert_eq!(inode.free_links(), Some((3, 9)));
        inode.touch(5, 5);
        assert_eq!(inode.free_links(), Some((3, 9)));
    }

    #[test]
    fn permissions_keep_type_bits() {
        let mut inode = Inode::new(InodeKind::Directory, 0, 0, 0);
        inode.set_permissions(ModeFlag::UserRead | ModeFlag::UserExec | ModeFlag::File);
        assert!(inode.is_dir());
        assert_eq!(inode.permissions(), ModeFlag::UserRead | ModeFlag::UserExec);
        assert_eq!(inode.raw_mode(), 0x200 | 0x100 | 0x040);
    }

    #[test]
    fn clean_free_inode() {
        let inode = Inode::new_free(NULL_INODE, 2);
        assert!(inode.is_free());
        assert!(!inode.is_free_dirty());
        assert_eq!(inode.kind(), None);
    }
}
