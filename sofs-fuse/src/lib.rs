//! Host-side support for SOFS images: a [`BlockDevice`] backed by a file.

use std::fs::File;
use std::io;
use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::Mutex;

use block_dev::{BlockDevice, DeviceError, BLOCK_SIZE};

#[derive(Debug)]
pub struct BlockFile {
    file: Mutex<File>,
    blocks: usize,
}

impl BlockFile {
    /// Wraps an image file; trailing bytes short of a block are ignored.
    pub fn new(file: File) -> io::Result<Self> {
        let len = file.metadata()?.len();
        Ok(Self {
            file: Mutex::new(file),
            blocks: (len / BLOCK_SIZE as u64) as usize,
        })
    }

    fn check(&self, block_id: usize, len: usize) -> Result<(), DeviceError> {
        if len < BLOCK_SIZE {
            return Err(DeviceError::Misaligned(len));
        }
        if block_id >= self.blocks {
            return Err(DeviceError::OutOfRange(block_id));
        }
        Ok(())
    }
}

impl BlockDevice for BlockFile {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), DeviceError> {
        self.check(block_id, buf.len())?;
        let mut file = self.file.lock().map_err(|_| DeviceError::Io(block_id))?;
        file.seek(SeekFrom::Start((block_id * BLOCK_SIZE) as u64))
            .and_then(|_| file.read_exact(&mut buf[..BLOCK_SIZE]))
            .map_err(|err| {
                log::error!("reading block {block_id}: {err}");
                DeviceError::Io(block_id)
            })
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), DeviceError> {
        self.check(block_id, buf.len())?;
        let mut file = self.file.lock().map_err(|_| DeviceError::Io(block_id))?;
        file.seek(SeekFrom::Start((block_id * BLOCK_SIZE) as u64))
            .and_then(|_| file.write_all(&buf[..BLOCK_SIZE]))
            .map_err(|err| {
                log::error!("writing block {block_id}: {err}");
                DeviceError::Io(block_id)
            })
    }

    fn num_blocks(&self) -> usize {
        self.blocks
    }
}
