//! # On-disk records
//!
//! SOFS disk layout:
//! superblock | inode table | cluster-to-inode map | bitmap | data zone
//!
//! Every record is `repr(C)` without padding so a staged block can be
//! viewed in place as the record it holds.

use core::{mem, ptr, slice};

mod super_block;
pub use super_block::{InsertionCache, MountStatus, RetrievalCache, SuperBlock};

mod inode;
pub use inode::{Inode, InodeKind, InodeState, ModeFlag};

mod dir_entry;
pub use dir_entry::DirEntry;

mod cluster;
pub use cluster::DataCluster;

use crate::{BLOCK_SIZE, IPB, RPB};

/// One block of the inode table
pub type InodeBlock = [Inode; IPB];
/// One block of the cluster-to-inode map
pub type RefBlock = [u32; RPB];
/// One block of the bitmap
pub type BitmapBlock = [u8; BLOCK_SIZE];

/// A record that is stored byte for byte on the device.
///
/// # Safety
///
/// Implementors must be `repr(C)` (or arrays of such types), contain no
/// padding, and accept every bit pattern, including all zeros.
pub unsafe trait OnDisk: Sized {
    fn zeroed() -> Self {
        unsafe { mem::zeroed() }
    }

    #[inline]
    fn as_bytes(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(ptr::from_ref(self).cast(), mem::size_of::<Self>()) }
    }

    #[inline]
    fn as_bytes_mut(&mut self) -> &mut [u8] {
        unsafe { slice::from_raw_parts_mut(ptr::from_mut(self).cast(), mem::size_of::<Self>()) }
    }
}

unsafe impl OnDisk for SuperBlock {}
unsafe impl OnDisk for InodeBlock {}
unsafe impl OnDisk for RefBlock {}
unsafe impl OnDisk for BitmapBlock {}
unsafe impl OnDisk for DataCluster {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CLUSTER_SIZE;

    #[test]
    fn record_sizes() {
        assert_eq!(BLOCK_SIZE, mem::size_of::<SuperBlock>());
        assert_eq!(64, mem::size_of::<Inode>());
        assert_eq!(64, mem::size_of::<DirEntry>());
        assert_eq!(BLOCK_SIZE, mem::size_of::<InodeBlock>());
        assert_eq!(CLUSTER_SIZE, mem::size_of::<DataCluster>());
    }
}
