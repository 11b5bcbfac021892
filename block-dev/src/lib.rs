//! # Block device interface
//!
//! A block device stores data in fixed-size **blocks**. [`BlockDevice`]
//! abstracts reading and writing those blocks; a type implementing it is a
//! block device driver.
//!
//! Unlike a bare driver interface, every transfer here is fallible so the
//! file system above can surface device faults instead of aborting.

#![no_std]

extern crate alloc;

mod ram;

use core::any::Any;

use thiserror::Error;

pub use self::ram::RamDisk;

/// Size in bytes of one device block.
pub const BLOCK_SIZE: usize = 512;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError {
    #[error("block {0} is beyond the end of the device")]
    OutOfRange(usize),
    #[error("buffer of {0} bytes is not a whole number of blocks")]
    Misaligned(usize),
    #[error("device I/O failure at block {0}")]
    Io(usize),
}

/// Block device driver trait
pub trait BlockDevice: Send + Sync + Any {
    /// Reads exactly one block into `buf[..BLOCK_SIZE]`.
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), DeviceError>;

    /// Writes exactly one block from `buf[..BLOCK_SIZE]`.
    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), DeviceError>;

    /// Total number of blocks on the device.
    fn num_blocks(&self) -> usize;

    /// Reads consecutive blocks starting at `start` until `buf` is full.
    fn read_blocks(&self, start: usize, buf: &mut [u8]) -> Result<(), DeviceError> {
        if buf.len() % BLOCK_SIZE != 0 {
            return Err(DeviceError::Misaligned(buf.len()));
        }
        buf.chunks_mut(BLOCK_SIZE)
            .enumerate()
            .try_for_each(|(i, block)| self.read_block(start + i, block))
    }

    /// Writes consecutive blocks starting at `start` from `buf`.
    fn write_blocks(&self, start: usize, buf: &[u8]) -> Result<(), DeviceError> {
        if buf.len() % BLOCK_SIZE != 0 {
            return Err(DeviceError::Misaligned(buf.len()));
        }
        buf.chunks(BLOCK_SIZE)
            .enumerate()
            .try_for_each(|(i, block)| self.write_block(start + i, block))
    }
}
