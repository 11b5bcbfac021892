//! # Address translators
//!
//! Map inode numbers, cluster numbers and file byte offsets to the block
//! coordinates where they live. All of them are pure; the ones that depend
//! on the volume geometry take the staged superblock.
//!
//! Block numbers returned here are relative to the start of their table.

use crate::layout::SuperBlock;
use crate::{Error, Result, BITS_PER_BLOCK, BLOCK_SIZE, BSLPC, IPB, MAX_FILE_SIZE, RPB};

/// `(block, offset)` of inode `n` within the inode table.
pub fn inode_pos(sb: &SuperBlock, n: u32) -> Result<(u32, usize)> {
    if n >= sb.itotal {
        return Err(Error::InvalidArgument);
    }
    let n = n as usize;
    Ok(((n / IPB) as u32, n % IPB))
}

/// `(block, offset)` of cluster `c`'s entry in the cluster-to-inode map.
pub fn cluster_map_pos(sb: &SuperBlock, c: u32) -> Result<(u32, usize)> {
    if c >= sb.dzone_total {
        return Err(Error::InvalidArgument);
    }
    let c = c as usize;
    Ok(((c / RPB) as u32, c % RPB))
}

/// `(block, byte, bit)` of cluster `c`'s bit in the bitmap.
///
/// Bits are numbered from the most significant end of each byte.
pub fn bitmap_pos(sb: &SuperBlock, c: u32) -> Result<(u32, usize, u32)> {
    if c >= sb.dzone_total {
        return Err(Error::InvalidArgument);
    }
    let c = c as usize;
    let block = c / BITS_PER_BLOCK;
    let byte = (c % BITS_PER_BLOCK) / 8;
    let bit = (c % 8) as u32;
    Ok((block as u32, byte, bit))
}

/// Inverse of [`bitmap_pos`].
pub fn bitmap_ref(sb: &SuperBlock, block: u32, byte: usize, bit: u32) -> Result<u32> {
    if block >= sb.fctable_size || byte >= BLOCK_SIZE || bit >= 8 {
        return Err(Error::InvalidArgument);
    }
    let c = (block as usize * BLOCK_SIZE + byte) * 8 + bit as usize;
    if c >= sb.dzone_total as usize {
        return Err(Error::InvalidArgument);
    }
    Ok(c as u32)
}

/// Mask selecting `bit` inside its bitmap byte.
#[inline]
pub fn bit_mask(bit: u32) -> u8 {
    0x80 >> bit
}

/// `(cluster index, offset)` of byte `p` within a file.
pub fn byte_pos(p: u32) -> Result<(u32, usize)> {
    let p = p as usize;
    if p >= MAX_FILE_SIZE {
        return Err(Error::InvalidArgument);
    }
    Ok(((p / BSLPC) as u32, p % BSLPC))
}
