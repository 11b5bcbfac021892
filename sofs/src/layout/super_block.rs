use crate::{DZONE_CACHE_SIZE, MAGIC_NUMBER, NULL_CLUSTER, PARTITION_NAME_SIZE, VERSION_NUMBER};

/// Whether the volume was cleanly unmounted last time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum MountStatus {
    /// Properly unmounted
    Clean = 0,
    /// Not properly unmounted
    Dirty = 1,
}

/// Free-cluster references waiting to be handed out.
///
/// Filled from the back: the live entries are `cache[cache_idx..]`, so the
/// cache is empty when `cache_idx == DZONE_CACHE_SIZE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct RetrievalCache {
    pub cache_idx: u32,
    pub cache: [u32; DZONE_CACHE_SIZE],
}

impl RetrievalCache {
    pub const EMPTY: Self = Self {
        cache_idx: DZONE_CACHE_SIZE as u32,
        cache: [NULL_CLUSTER; DZONE_CACHE_SIZE],
    };

    #[inline]
    fn start(&self) -> usize {
        (self.cache_idx as usize).min(DZONE_CACHE_SIZE)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start() == DZONE_CACHE_SIZE
    }

    #[inline]
    pub fn entries(&self) -> &[u32] {
        &self.cache[self.start()..]
    }

    #[inline]
    pub fn peek(&self) -> Option<u32> {
        self.entries().first().copied()
    }

    pub fn pop(&mut self) -> Option<u32> {
        let idx = self.start();
        let cluster = *self.cache.get(idx)?;
        self.cache[idx] = NULL_CLUSTER;
        self.cache_idx = idx as u32 + 1;
        Some(cluster)
    }
}

/// Freed cluster references waiting to be written back to the bitmap.
///
/// Filled from the front: the live entries are `cache[..cache_idx]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct InsertionCache {
    pub cache_idx: u32,
    pub cache: [u32; DZONE_CACHE_SIZE],
}

impl InsertionCache {
    pub const EMPTY: Self = Self {
        cache_idx: 0,
        cache: [NULL_CLUSTER; DZONE_CACHE_SIZE],
    };

    #[inline]
    fn end(&self) -> usize {
        (self.cache_idx as usize).min(DZONE_CACHE_SIZE)
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.end() == DZONE_CACHE_SIZE
    }

    #[inline]
    pub fn entries(&self) -> &[u32] {
        &self.cache[..self.end()]
    }

    /// Appends `cluster`; the caller makes room first when full.
    pub fn push(&mut self, cluster: u32) {
        let end = self.end();
        if let Some(slot) = self.cache.get_mut(end) {
            *slot = cluster;
            self.cache_idx = end as u32 + 1;
        }
    }

    pub fn clear(&mut self) {
        *self = Self::EMPTY;
    }
}

/// Block 0 of the volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct SuperBlock {
    pub magic: u32,
    pub version: u32,
    name: [u8; PARTITION_NAME_SIZE + 1],
    /// Total number of blocks of the device
    pub ntotal: u32,
    mstat: u32,

    // Inode table
    pub itable_start: u32,
    pub itable_size: u32,
    pub itotal: u32,
    pub ifree: u32,
    pub ihead: u32,
    pub itail: u32,

    // Cluster-to-inode map
    pub ciutable_start: u32,
    pub ciutable_size: u32,

    pub dzone_retriev: RetrievalCache,
    pub dzone_insert: InsertionCache,

    // Bitmap of free clusters
    pub fctable_start: u32,
    pub fctable_size: u32,
    /// Where the next circular bitmap scan starts
    pub fctable_pos: u32,

    // Data zone
    pub dzone_start: u32,
    pub dzone_total: u32,
    pub dzone_free: u32,

    reserved: [u8; 8],
}

const _: () = assert!(core::mem::size_of::<SuperBlock>() == crate::BLOCK_SIZE);

impl SuperBlock {
    /// A superblock carrying only the identification fields.
    pub fn new(name: &str, ntotal: u32) -> Self {
        let mut sb = Self {
            magic: MAGIC_NUMBER,
            version: VERSION_NUMBER,
            name: [0; PARTITION_NAME_SIZE + 1],
            ntotal,
            mstat: MountStatus::Clean as u32,
            itable_start: 0,
            itable_size: 0,
            itotal: 0,
            ifree: 0,
            ihead: 0,
            itail: 0,
            ciutable_start: 0,
            ciutable_size: 0,
            dzone_retriev: RetrievalCache::EMPTY,
            dzone_insert: InsertionCache::EMPTY,
            fctable_start: 0,
            fctable_size: 0,
            fctable_pos: 0,
            dzone_start: 0,
            dzone_total: 0,
            dzone_free: 0,
            reserved: [0; 8],
        };
        sb.set_name(name);
        sb
    }

    pub fn name(&self) -> &str {
        let len = self.name.iter().position(|&c| c == 0).unwrap_or(PARTITION_NAME_SIZE);
        core::str::from_utf8(&self.name[..len]).unwrap_or_default()
    }

    /// Sets the volume name, truncated to [`PARTITION_NAME_SIZE`] bytes.
    pub fn set_name(&mut self, name: &str) {
        let bytes = &name.as_bytes()[..name.len().min(PARTITION_NAME_SIZE)];
        self.name = [0; PARTITION_NAME_SIZE + 1];
        self.name[..bytes.len()].copy_from_slice(bytes);
    }

    #[inline]
    pub fn is_valid_magic(&self) -> bool {
        self.magic == MAGIC_NUMBER && self.version == VERSION_NUMBER
    }

    pub fn mount_status(&self) -> MountStatus {
        if self.mstat == MountStatus::Clean as u32 {
            MountStatus::Clean
        } else {
            MountStatus::Dirty
        }
    }

    pub fn set_mount_status(&mut self, status: MountStatus) {
        self.mstat = status as u32;
    }
}
