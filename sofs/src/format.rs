//! # Formatting
//!
//! Lays out a fresh volume on a whole device:
//! superblock | inode table | cluster-to-inode map | bitmap | data zone
//!
//! The root directory takes inode 0 and data cluster 0; everything else
//! starts out free.

use alloc::string::String;
use alloc::sync::Arc;

use block_dev::BlockDevice;

use crate::layout::{
    BitmapBlock, DataCluster, DirEntry, Inode, InodeBlock, InodeKind, ModeFlag, OnDisk, RefBlock,
    SuperBlock,
};
use crate::{
    convert, Config, Error, Result, Sofs, BITS_PER_BLOCK, BLOCKS_PER_CLUSTER, CLUSTER_SIZE, IPB,
    NULL_INODE, RPB,
};

#[derive(Debug, Clone)]
pub struct FormatOptions {
    /// Volume name
    pub name: String,
    /// Requested number of inodes; 0 picks one per eight blocks
    pub inodes: u32,
    /// Zero every free data cluster
    pub zero: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            name: String::from("SOFS13"),
            inodes: 0,
            zero: false,
        }
    }
}

/// Sizes, in blocks, of each region of the volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Geometry {
    itable_size: usize,
    ciutable_size: usize,
    fctable_size: usize,
    dzone_total: usize,
}

impl Geometry {
    /// Sizes the tables around the clusters that fit, giving blocks too few
    /// to make up a cluster back to the inode table.
    fn compute(ntotal: usize, inodes: usize) -> Result<Self> {
        let itotal = if inodes == 0 { ntotal / 8 } else { inodes };
        let itable_size = itotal.div_ceil(IPB).max(1);
        let avail = ntotal.checked_sub(1 + itable_size).ok_or(Error::InvalidArgument)?;

        // first guess ignoring the map and bitmap, then size them for real
        let guess = avail / BLOCKS_PER_CLUSTER;
        let tables = guess.div_ceil(BITS_PER_BLOCK) + guess.div_ceil(RPB);
        let mut dzone_total =
            avail.checked_sub(tables).ok_or(Error::InvalidArgument)? / BLOCKS_PER_CLUSTER;
        let mut fctable_size = dzone_total.div_ceil(BITS_PER_BLOCK);
        let mut ciutable_size = dzone_total.div_ceil(RPB);
        if dzone_total % BITS_PER_BLOCK != 0
            && dzone_total % RPB != 0
            && avail - fctable_size - ciutable_size - dzone_total * BLOCKS_PER_CLUSTER
                >= BLOCKS_PER_CLUSTER
        {
            dzone_total += 1;
            fctable_size = dzone_total.div_ceil(BITS_PER_BLOCK);
            ciutable_size = dzone_total.div_ceil(RPB);
        }
        if dzone_total < 2 {
            return Err(Error::InvalidArgument);
        }

        Ok(Self {
            itable_size: ntotal
                - 1
                - fctable_size
                - ciutable_size
                - dzone_total * BLOCKS_PER_CLUSTER,
            ciutable_size,
            fctable_size,
            dzone_total,
        })
    }
}

impl Sofs {
    /// Formats the whole device and mounts the result.
    pub fn format(dev: Arc<dyn BlockDevice>, opts: &FormatOptions, config: Config) -> Result<Self> {
        let ntotal = dev.num_blocks();
        let geo = Geometry::compute(ntotal, opts.inodes as usize)?;
        let sb = super_block(&opts.name, ntotal, &geo)?;
        log::debug!("format {:?}: {geo:?}", opts.name);

        dev.write_block(0, sb.as_bytes())?;
        write_inode_table(&*dev, &sb, &config)?;
        write_cluster_map(&*dev, &sb)?;
        write_bitmap(&*dev, &sb)?;

        let mut root = DataCluster::clean_entries();
        root.entries_mut()[0] = DirEntry::new(".", 0);
        root.entries_mut()[1] = DirEntry::new("..", 0);
        dev.write_blocks(sb.dzone_start as usize, root.as_bytes())?;

        if opts.zero {
            let zero = DataCluster::zeroed();
            for c in 1..sb.dzone_total as usize {
                let block = sb.dzone_start as usize + c * BLOCKS_PER_CLUSTER;
                dev.write_blocks(block, zero.as_bytes())?;
            }
        }

        Self::mount(dev, config)
    }
}

fn super_block(name: &str, ntotal: usize, geo: &Geometry) -> Result<SuperBlock> {
    let to_u32 = |n: usize| u32::try_from(n).map_err(|_| Error::InvalidArgument);

    let mut sb = SuperBlock::new(name, to_u32(ntotal)?);
    sb.itable_start = 1;
    sb.itable_size = to_u32(geo.itable_size)?;
    sb.itotal = to_u32(geo.itable_size * IPB)?;
    sb.ifree = sb.itotal - 1;
    (sb.ihead, sb.itail) = if sb.ifree == 0 {
        (NULL_INODE, NULL_INODE)
    } else {
        (1, sb.itotal - 1)
    };

    sb.ciutable_start = sb.itable_start + sb.itable_size;
    sb.ciutable_size = to_u32(geo.ciutable_size)?;
    sb.fctable_start = sb.ciutable_start + sb.ciutable_size;
    sb.fctable_size = to_u32(geo.fctable_size)?;
    sb.fctable_pos = 1;

    sb.dzone_start = sb.fctable_start + sb.fctable_size;
    sb.dzone_total = to_u32(geo.dzone_total)?;
    sb.dzone_free = sb.dzone_total - 1;
    Ok(sb)
}

fn write_inode_table(dev: &dyn BlockDevice, sb: &SuperBlock, config: &Config) -> Result<()> {
    let last = sb.itotal - 1;
    let mut block = InodeBlock::zeroed();
    for b in 0..sb.itable_size {
        for (k, inode) in block.iter_mut().enumerate() {
            let n = b * IPB as u32 + k as u32;
            *inode = if n == 0 {
                let mut root = Inode::new(
                    InodeKind::Directory,
                    config.credentials.uid,
                    config.credentials.gid,
                    config.now(),
                );
                root.set_permissions(ModeFlag::PERMISSIONS);
                root.refcount = 2;
                root.size = CLUSTER_SIZE as u32;
                root.clucount = 1;
                root.d[0] = 0;
                root
            } else {
                let prev = if n == 1 { NULL_INODE } else { n - 1 };
                let next = if n == last { NULL_INODE } else { n + 1 };
                Inode::new_free(prev, next)
            };
        }
        dev.write_block((sb.itable_start + b) as usize, block.as_bytes())?;
    }
    Ok(())
}

fn write_cluster_map(dev: &dyn BlockDevice, sb: &SuperBlock) -> Result<()> {
    let mut block: RefBlock = [NULL_INODE; RPB];
    for b in 0..sb.ciutable_size {
        block[0] = if b == 0 { 0 } else { NULL_INODE };
        dev.write_block((sb.ciutable_start + b) as usize, block.as_bytes())?;
    }
    Ok(())
}

fn write_bitmap(dev: &dyn BlockDevice, sb: &SuperBlock) -> Result<()> {
    for b in 0..sb.fctable_size {
        let mut block = BitmapBlock::zeroed();
        let first = b as usize * BITS_PER_BLOCK;
        let end = (first + BITS_PER_BLOCK).min(sb.dzone_total as usize);
        for c in first.max(1)..end {
            let (_, byte, bit) = convert::bitmap_pos(sb, c as u32)?;
            block[byte] |= convert::bit_mask(bit);
        }
        dev.write_block((sb.fctable_start + b) as usize, block.as_bytes())?;
    }
    Ok(())
}
