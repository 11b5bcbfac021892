use core::mem;

use super::DirEntry;
use crate::{CLUSTER_SIZE, DPC, NULL_CLUSTER, RPC};

/// A data cluster, viewed as raw bytes, as a table of cluster references or
/// as a table of directory entries depending on who owns it.
#[derive(Clone)]
#[repr(C, align(4))]
pub struct DataCluster {
    bytes: [u8; CLUSTER_SIZE],
}

const _: () = assert!(mem::size_of::<[u32; RPC]>() == CLUSTER_SIZE);
const _: () = assert!(mem::size_of::<[DirEntry; DPC]>() == CLUSTER_SIZE);

impl DataCluster {
    pub const fn zeroed() -> Self {
        Self {
            bytes: [0; CLUSTER_SIZE],
        }
    }

    /// A reference table with every slot null.
    pub const fn null_refs() -> Self {
        Self {
            bytes: [0xFF; CLUSTER_SIZE],
        }
    }

    /// A directory table with every slot clean.
    pub fn clean_entries() -> Self {
        let mut cluster = Self::zeroed();
        cluster.entries_mut().fill(DirEntry::CLEAN);
        cluster
    }

    #[inline]
    pub fn bytes(&self) -> &[u8; CLUSTER_SIZE] {
        &self.bytes
    }

    #[inline]
    pub fn bytes_mut(&mut self) -> &mut [u8; CLUSTER_SIZE] {
        &mut self.bytes
    }

    #[inline]
    pub fn refs(&self) -> &[u32; RPC] {
        // SAFETY: same size, 4-byte aligned, every bit pattern is a valid u32
        unsafe { &*self.bytes.as_ptr().cast() }
    }

    #[inline]
    pub fn refs_mut(&mut self) -> &mut [u32; RPC] {
        unsafe { &mut *self.bytes.as_mut_ptr().cast() }
    }

    #[inline]
    pub fn entries(&self) -> &[DirEntry; DPC] {
        // SAFETY: DirEntry is repr(C) plain data with 4-byte alignment
        unsafe { &*self.bytes.as_ptr().cast() }
    }

    #[inline]
    pub fn entries_mut(&mut self) -> &mut [DirEntry; DPC] {
        unsafe { &mut *self.bytes.as_mut_ptr().cast() }
    }

    /// Whether every reference slot is null.
    pub fn refs_all_null(&self) -> bool {
        self.refs().iter().all(|&r| r == NULL_CLUSTER)
    }
}

impl Default for DataCluster {
    fn default() -> Self {
        Self::zeroed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn views_share_bytes() {
        let mut cluster = DataCluster::null_refs();
        assert!(cluster.refs_all_null());
        cluster.refs_mut()[1] = 0x0102_0304;
        assert_eq!(&cluster.bytes()[4..8], &0x0102_0304u32.to_ne_bytes());
        assert!(!cluster.refs_all_null());

        let dir = DataCluster::clean_entries();
        assert!(dir.entries().iter().all(DirEntry::is_clean));
    }
}
