use crate::{MAX_NAME, NULL_INODE};

/// Name/inode pair stored in a directory cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct DirEntry {
    // NUL padded; the last byte keeps the first character of a removed name
    name: [u8; MAX_NAME + 1],
    inode: u32,
}

impl DirEntry {
    /// An entry is always 64 bytes
    pub const SIZE: usize = 64;

    /// A never used slot.
    pub const CLEAN: Self = Self {
        name: [0; MAX_NAME + 1],
        inode: NULL_INODE,
    };

    /// `name` must already be validated to fit in [`MAX_NAME`] bytes.
    pub fn new(name: &str, inode: u32) -> Self {
        let mut entry = Self { inode, ..Self::CLEAN };
        entry.set_name(name);
        entry
    }

    /// The stored name bytes, up to the first NUL.
    pub fn name(&self) -> &[u8] {
        let len = self.name.iter().position(|&c| c == 0).unwrap_or(MAX_NAME + 1);
        &self.name[..len]
    }

    pub fn set_name(&mut self, name: &str) {
        let bytes = &name.as_bytes()[..name.len().min(MAX_NAME)];
        self.name = [0; MAX_NAME + 1];
        self.name[..bytes.len()].copy_from_slice(bytes);
    }

    #[inline]
    pub fn inode(&self) -> u32 {
        self.inode
    }

    #[inline]
    pub fn set_inode(&mut self, inode: u32) {
        self.inode = inode;
    }

    /// Whether the slot holds a live name.
    #[inline]
    pub fn is_live(&self) -> bool {
        self.name[0] != 0
    }

    /// Free and clean: never used, or fully detached.
    #[inline]
    pub fn is_clean(&self) -> bool {
        self.name[0] == 0 && self.name[1] == 0 && self.inode == NULL_INODE
    }

    /// Marks the slot removed while leaving enough behind to recover it.
    pub fn tombstone(&mut self) {
        self.name[MAX_NAME] = self.name[0];
        self.name[0] = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tombstone_keeps_inode() {
        let mut entry = DirEntry::new("notes", 4);
        assert_eq!(entry.name(), b"notes");
        assert!(entry.is_live());

        entry.tombstone();
        assert!(!entry.is_live());
        assert!(!entry.is_clean());
        assert_eq!(entry.inode(), 4);
        assert_eq!(entry.name(), b"");
        assert!(DirEntry::CLEAN.is_clean());
    }

    #[test]
    fn longest_name_fits() {
        let name = "x".repeat(MAX_NAME);
        let entry = DirEntry::new(&name, 1);
        assert_eq!(entry.name(), name.as_bytes());
    }
}
