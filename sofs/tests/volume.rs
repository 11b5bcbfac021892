use std::sync::Arc;

use block_dev::RamDisk;
use sofs::layout::{DataCluster, InodeKind, ModeFlag};
use sofs::{
    AddOp, ClusterOp, Config, Credentials, DirLookup, Error, FormatOptions, InodeStatus, RemOp,
    Sofs, CLUSTER_SIZE,
};

fn create(fs: &mut Sofs, dir: u32, name: &str, kind: InodeKind) -> u32 {
    let n = fs.alloc_inode(kind).unwrap();
    fs.set_permissions(n, ModeFlag::PERMISSIONS).unwrap();
    fs.add_att_dir_entry(dir, name, n, AddOp::Add).unwrap();
    n
}

fn pattern(seed: u8) -> DataCluster {
    let mut cluster = DataCluster::zeroed();
    for (i, b) in cluster.bytes_mut().iter_mut().enumerate() {
        *b = seed.wrapping_add(i as u8);
    }
    cluster
}

#[test]
fn tree_survives_remount() {
    let disk = Arc::new(RamDisk::new(2_000));
    let mut fs = Sofs::format(disk.clone(), &FormatOptions::default(), Config::default()).unwrap();
    let docs = create(&mut fs, 0, "docs", InodeKind::Directory);
    let readme = create(&mut fs, docs, "readme", InodeKind::File);
    for idx in [0, 12] {
        fs.write_file_cluster(readme, idx, &pattern(idx as u8)).unwrap();
    }
    let mut inode = fs.read_inode(readme, InodeStatus::InUse).unwrap();
    inode.size = 13 * CLUSTER_SIZE as u32;
    fs.write_inode(readme, &inode, InodeStatus::InUse).unwrap();
    fs.unmount().unwrap();

    let mut fs = Sofs::mount(disk, Config::default()).unwrap();
    assert_eq!(fs.get_dir_entry_by_path("/docs/readme"), Ok((docs, readme)));
    let mut buf = DataCluster::zeroed();
    fs.read_file_cluster(readme, 12, &mut buf).unwrap();
    assert_eq!(buf.bytes(), pattern(12).bytes());
    fs.read_file_cluster(readme, 5, &mut buf).unwrap();
    assert!(buf.bytes().iter().all(|&b| b == 0));

    // two leaves and the single indirect table
    let inode = fs.read_inode(readme, InodeStatus::InUse).unwrap();
    assert_eq!(inode.clucount, 3);
    fs.audit_data_zone().unwrap();
}

#[test]
fn removed_inode_is_cleaned_when_reused() {
    // sized so that no spare block grows the inode table
    let disk = Arc::new(RamDisk::new(997));
    let opts = FormatOptions {
        inodes: 8,
        ..FormatOptions::default()
    };
    let mut fs = Sofs::format(disk, &opts, Config::default()).unwrap();
    let sb = fs.super_block().unwrap();
    assert_eq!((sb.itotal, sb.ifree), (8, 7));
    let free = sb.dzone_free;

    let f = create(&mut fs, 0, "f", InodeKind::File);
    fs.write_file_cluster(f, 0, &pattern(1)).unwrap();
    fs.write_file_cluster(f, 10, &pattern(2)).unwrap();
    fs.rem_detach_dir_entry(0, "f", RemOp::Remove).unwrap();
    // the reference table is held until the inode is cleaned
    assert_eq!(fs.super_block().unwrap().dzone_free, free - 1);
    let dirty = fs.read_inode(f, InodeStatus::FreeDirty).unwrap();
    assert!(dirty.is_free_dirty());

    for k in 0..6 {
        create(&mut fs, 0, &format!("g{k}"), InodeKind::File);
    }
    let again = fs.alloc_inode(InodeKind::Directory).unwrap();
    assert_eq!(again, f);
    let inode = fs.read_inode(again, InodeStatus::InUse).unwrap();
    assert_eq!((inode.size, inode.clucount, inode.i1), (0, 0, sofs::NULL_CLUSTER));
    assert_eq!(fs.super_block().unwrap().dzone_free, free);
    assert_eq!(fs.alloc_inode(InodeKind::File), Err(Error::NoSpace));
    fs.audit_data_zone().unwrap();
}

#[test]
fn moving_a_subtree() {
    let disk = Arc::new(RamDisk::new(1_000));
    let mut fs = Sofs::format(disk, &FormatOptions::default(), Config::default()).unwrap();
    let src = create(&mut fs, 0, "src", InodeKind::Directory);
    let dst = create(&mut fs, 0, "dst", InodeKind::Directory);
    let tree = create(&mut fs, src, "tree", InodeKind::Directory);
    let leaf = create(&mut fs, tree, "leaf", InodeKind::File);

    fs.rem_detach_dir_entry(src, "tree", RemOp::Detach).unwrap();
    fs.add_att_dir_entry(dst, "tree", tree, AddOp::Attach).unwrap();
    fs.rename_dir_entry(dst, "tree", "moved").unwrap();

    assert_eq!(fs.get_dir_entry_by_path("/dst/moved/leaf"), Ok((tree, leaf)));
    assert_eq!(fs.get_dir_entry_by_path("/dst/moved/.."), Ok((tree, dst)));
    assert_eq!(fs.get_dir_entry_by_path("/src/tree"), Err(Error::NotFound));
    assert_eq!(fs.read_inode(src, InodeStatus::InUse).unwrap().refcount, 2);
    assert_eq!(fs.read_inode(dst, InodeStatus::InUse).unwrap().refcount, 3);
    fs.check_directory_emptiness(src).unwrap();
}

#[test]
fn other_users_need_rights() {
    let disk = Arc::new(RamDisk::new(1_000));
    let mut fs = Sofs::format(disk, &FormatOptions::default(), Config::default()).unwrap();
    let home = create(&mut fs, 0, "home", InodeKind::Directory);
    fs.set_permissions(home, ModeFlag::UserExec | ModeFlag::UserWrite | ModeFlag::UserRead)
        .unwrap();

    fs.set_credentials(Credentials { uid: 1000, gid: 100 });
    assert_eq!(fs.get_dir_entry_by_path("/home/x"), Err(Error::AccessDenied));
    assert_eq!(fs.set_permissions(home, ModeFlag::PERMISSIONS), Err(Error::PermissionDenied));

    fs.set_credentials(Credentials::ROOT);
    assert_eq!(fs.get_dir_entry_by_name(home, "x"), Ok(DirLookup::Vacant { idx: 2 }));
}

#[test]
fn truncating_a_file() {
    let disk = Arc::new(RamDisk::new(4_000));
    let mut fs = Sofs::format(disk, &FormatOptions::default(), Config::default()).unwrap();
    let f = create(&mut fs, 0, "big", InodeKind::File);
    let free = fs.super_block().unwrap().dzone_free;
    for idx in [0, 6, 7, 600] {
        fs.write_file_cluster(f, idx, &pattern(0)).unwrap();
    }
    fs.handle_file_clusters(f, 7, ClusterOp::FreeClean).unwrap();

    let inode = fs.read_inode(f, InodeStatus::InUse).unwrap();
    assert_eq!(inode.clucount, 2);
    assert_eq!(fs.super_block().unwrap().dzone_free, free - 2);
    assert_eq!(fs.handle_file_cluster(f, 600, ClusterOp::Get), Ok(sofs::NULL_CLUSTER));
}
