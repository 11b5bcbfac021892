use std::mem;

use sofs::layout::{DataCluster, DirEntry, Inode, SuperBlock};
use sofs::{BLOCK_SIZE, DPC, IPB};

#[test]
fn records() {
    assert_eq!(512, mem::size_of::<SuperBlock>());
    assert_eq!(64, mem::size_of::<Inode>());
    assert_eq!(64, mem::size_of::<DirEntry>());
    assert_eq!(2048, mem::size_of::<DataCluster>());
    assert_eq!(BLOCK_SIZE, IPB * mem::size_of::<Inode>());
    assert_eq!(32, DPC);
}
