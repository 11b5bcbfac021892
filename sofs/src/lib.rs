//! SOFS: a small Unix-style file system living on a block device.
//!
//! Layers from the top down:
//! - directory engine: lookup, insertion, removal, rename and path walking
//! - file-cluster resolver: direct, single- and double-indirect references
//! - inode accessor together with the inode free list and the data-cluster pool
//! - staging layer: one in-memory slot per kind of metadata block
//! - [`BlockDevice`] from the `block-dev` crate

#![no_std]

extern crate alloc;

// Session object and its configuration
mod config;
mod control;
pub use config::{Config, Credentials};
pub use control::Sofs;

mod error;
pub use error::{Error, Inconsistency, Result};

// On-disk records
pub mod layout;

// Address translators
pub mod convert;

// Single-slot staging of metadata blocks
mod staging;

// Consistency checks used as a validation oracle
pub mod consist;

// Inode free list, data-cluster pool and inode access
mod free_list;
mod free_pool;
mod inode;
mod perm;
pub use inode::InodeStatus;
pub use perm::Access;

// File-cluster resolution
mod file_cluster;
mod file_clusters;
pub use file_cluster::ClusterOp;

// Directories and paths
mod dir;
mod path;
pub use dir::{AddOp, DirLookup, RemOp};

mod format;
pub use format::FormatOptions;

pub use block_dev::{BlockDevice, BLOCK_SIZE};

pub const MAGIC_NUMBER: u32 = 0x65FE;
pub const VERSION_NUMBER: u32 = 0x2013;
/// Longest volume name, not counting the trailing NUL.
pub const PARTITION_NAME_SIZE: usize = 23;

/// Blocks per data cluster
pub const BLOCKS_PER_CLUSTER: usize = 4;
pub const CLUSTER_SIZE: usize = BLOCK_SIZE * BLOCKS_PER_CLUSTER;
/// Bytes of file data stored in one cluster
pub const BSLPC: usize = CLUSTER_SIZE;
/// Cluster references per cluster
pub const RPC: usize = CLUSTER_SIZE / 4;
/// Cluster references per block
pub const RPB: usize = BLOCK_SIZE / 4;
/// Bitmap bits per block
pub const BITS_PER_BLOCK: usize = BLOCK_SIZE * 8;

/// Direct references held in an inode
pub const N_DIRECT: usize = 7;
/// Longest name of a directory entry
pub const MAX_NAME: usize = 59;
/// Longest path accepted by path resolution
pub const MAX_PATH: usize = 255;
/// Largest logical cluster count of a file
pub const MAX_FILE_CLUSTERS: usize = N_DIRECT + RPC + RPC * RPC;
pub const MAX_FILE_SIZE: usize = MAX_FILE_CLUSTERS * BSLPC;

pub const NULL_INODE: u32 = u32::MAX;
pub const NULL_CLUSTER: u32 = u32::MAX;

/// Capacity of each free-cluster cache in the superblock
pub const DZONE_CACHE_SIZE: usize = 50;

/// Largest hard-link count an inode can hold
pub const MAX_LINKS: u16 = u16::MAX;

/// Inodes per block
pub const IPB: usize = BLOCK_SIZE / layout::Inode::SIZE;
/// Directory entries per cluster
pub const DPC: usize = CLUSTER_SIZE / layout::DirEntry::SIZE;

#[cfg(test)]
mod testing;
