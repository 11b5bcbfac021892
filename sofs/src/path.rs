//! # Path walking
//!
//! Absolute paths resolve component by component from the root. One
//! symbolic link may be followed per resolution; inside its target,
//! relative paths start from the directory holding the link.

use alloc::string::String;

use crate::layout::{DataCluster, InodeKind};
use crate::{Access, DirLookup, Error, InodeStatus, Result, Sofs, CLUSTER_SIZE, MAX_NAME, MAX_PATH};

/// Splits `path` the way POSIX `dirname` and `basename` do.
pub(crate) fn split_path(path: &str) -> (&str, &str) {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return if path.is_empty() { (".", ".") } else { ("/", "/") };
    }
    match trimmed.rfind('/') {
        None => (".", trimmed),
        Some(pos) => {
            let dir = trimmed[..pos].trim_end_matches('/');
            let dir = if dir.is_empty() { "/" } else { dir };
            (dir, &trimmed[pos + 1..])
        }
    }
}

/// State carried through one resolution.
#[derive(Debug, Default)]
struct PathWalk {
    /// Symbolic links followed so far
    symlinks: u32,
    /// Directory holding the last link followed
    base_dir: u32,
}

impl Sofs {
    /// Resolves an absolute `path` into the directory holding the last
    /// component and the inode it names. `"/"` is `(0, 0)`.
    pub fn get_dir_entry_by_path(&mut self, path: &str) -> Result<(u32, u32)> {
        log::trace!("get_dir_entry_by_path({path:?})");
        if path.is_empty() {
            return Err(Error::InvalidArgument);
        }
        if path.len() > MAX_PATH {
            return Err(Error::NameTooLong);
        }
        self.walk(path, &mut PathWalk::default())
    }

    fn walk(&mut self, path: &str, state: &mut PathWalk) -> Result<(u32, u32)> {
        let (parent, name) = split_path(path);
        if name.len() > MAX_NAME {
            return Err(Error::NameTooLong);
        }
        if state.symlinks == 0 && !parent.starts_with('/') {
            return Err(Error::RelativePath);
        }
        let name = if name == "/" { "." } else { name };

        let dir = match parent {
            "/" => 0,
            "." => state.base_dir,
            _ => self.walk(parent, state)?.1,
        };
        let entry = match self.get_dir_entry_by_name(dir, name)? {
            DirLookup::Found { inode, .. } => inode,
            DirLookup::Vacant { .. } => return Err(Error::NotFound),
        };

        let inode = self.read_inode(entry, InodeStatus::InUse)?;
        if inode.kind() != Some(InodeKind::Symlink) {
            return Ok((dir, entry));
        }
        if state.symlinks >= 1 {
            return Err(Error::SymlinkLoop);
        }
        state.symlinks += 1;
        self.check_access(entry, Access::Exec.into())?;

        let target = self.read_link(entry, inode.size as usize)?;
        state.base_dir = dir;
        self.walk(&target, state)
    }

    /// The target stored in cluster 0 of symlink `n`.
    fn read_link(&mut self, n: u32, size: usize) -> Result<String> {
        let mut cluster = DataCluster::zeroed();
        self.read_file_cluster(n, 0, &mut cluster)?;
        let bytes = &cluster.bytes()[..size.min(CLUSTER_SIZE)];
        let len = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        if len == 0 {
            return Err(Error::NotFound);
        }
        if len > MAX_PATH {
            return Err(Error::NameTooLong);
        }
        let target = core::str::from_utf8(&bytes[..len]).map_err(|_| Error::InvalidArgument)?;
        Ok(String::from(target))
    }
}
