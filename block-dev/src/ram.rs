use alloc::vec;
use alloc::vec::Vec;

use spin::Mutex;

use crate::{BlockDevice, DeviceError, BLOCK_SIZE};

/// A block device kept entirely in memory.
#[derive(Debug)]
pub struct RamDisk {
    data: Mutex<Vec<u8>>,
}

impl RamDisk {
    /// Creates a zero-filled disk of `blocks` blocks.
    pub fn new(blocks: usize) -> Self {
        Self {
            data: Mutex::new(vec![0; blocks * BLOCK_SIZE]),
        }
    }

    /// Copies the raw image out, e.g. for inspection in tests.
    pub fn snapshot(&self) -> Vec<u8> {
        self.data.lock().clone()
    }

    fn range(&self, block_id: usize, len: usize) -> Result<core::ops::Range<usize>, DeviceError> {
        if len < BLOCK_SIZE {
            return Err(DeviceError::Misaligned(len));
        }
        let start = block_id * BLOCK_SIZE;
        if start + BLOCK_SIZE > self.data.lock().len() {
            return Err(DeviceError::OutOfRange(block_id));
        }
        Ok(start..start + BLOCK_SIZE)
    }
}

impl BlockDevice for RamDisk {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), DeviceError> {
        let range = self.range(block_id, buf.len())?;
        buf[..BLOCK_SIZE].copy_from_slice(&self.data.lock()[range]);
        Ok(())
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), DeviceError> {
        let range = self.range(block_id, buf.len())?;
        self.data.lock()[range].copy_from_slice(&buf[..BLOCK_SIZE]);
        Ok(())
    }

    fn num_blocks(&self) -> usize {
        self.data.lock().len() / BLOCK_SIZE
    }
}
