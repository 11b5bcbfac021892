//! # Permissions
//!
//! Unix style owner/group/other triplets. The superuser may always read
//! and write, and may execute whenever anybody can.

use enumflags2::{bitflags, BitFlags};

use crate::layout::ModeFlag;
use crate::{Error, InodeStatus, Result, Sofs};

/// Rights that can be requested on an inode.
#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Exec = 0b001,
    Write = 0b010,
    Read = 0b100,
}

impl Sofs {
    /// Fails with [`Error::AccessDenied`] unless the caller holds every
    /// right in `access` on inode `n`.
    pub fn check_access(&mut self, n: u32, access: BitFlags<Access>) -> Result<()> {
        log::trace!("check_access({n}, {access:?})");
        if access.is_empty() {
            return Err(Error::InvalidArgument);
        }

        let inode = self.read_inode(n, InodeStatus::InUse)?;
        let caller = self.credentials();
        let granted = if caller.is_superuser() {
            let mut granted = Access::Read | Access::Write;
            if inode.mode().intersects(ModeFlag::EXEC) {
                granted |= Access::Exec;
            }
            granted
        } else {
            let shift = if caller.uid == inode.owner {
                6
            } else if caller.gid == inode.group {
                3
            } else {
                0
            };
            BitFlags::from_bits_truncate(((inode.raw_mode() >> shift) & 0b111) as u8)
        };

        if granted.contains(access) {
            Ok(())
        } else {
            Err(Error::AccessDenied)
        }
    }

    /// Replaces the permission bits of inode `n`; type bits in `perms` are
    /// ignored. Only the owner or the superuser may do this.
    pub fn set_permissions(&mut self, n: u32, perms: BitFlags<ModeFlag>) -> Result<()> {
        log::trace!("set_permissions({n}, {perms:?})");
        let mut inode = self.read_inode(n, InodeStatus::InUse)?;
        let caller = self.credentials();
        if !caller.is_superuser() && caller.uid != inode.owner {
            return Err(Error::PermissionDenied);
        }
        inode.set_permissions(perms);
        self.write_inode(n, &inode, InodeStatus::InUse)
    }
}

#[cfg(test)]
mod tests {
    use enumflags2::make_bitflags;

    use super::*;
    use crate::layout::InodeKind;
    use crate::testing::formatted;
    use crate::Credentials;

    #[test]
    fn triplet_is_chosen_by_identity() {
        let (_, mut fs) = formatted(1_000);
        let n = fs.alloc_inode(InodeKind::File).unwrap();
        fs.update_inode(n, |inode| {
            inode.owner = 10;
            inode.group = 20;
        })
        .unwrap();
        // rw- r-- --x
        let perms = make_bitflags!(ModeFlag::{UserRead | UserWrite | GroupRead | OtherExec});
        fs.set_permissions(n, perms).unwrap();

        fs.set_credentials(Credentials { uid: 10, gid: 99 });
        fs.check_access(n, Access::Read | Access::Write).unwrap();
        assert_eq!(fs.check_access(n, Access::Exec.into()), Err(Error::AccessDenied));

        fs.set_credentials(Credentials { uid: 11, gid: 20 });
        fs.check_access(n, Access::Read.into()).unwrap();
        assert_eq!(fs.check_access(n, Access::Write.into()), Err(Error::AccessDenied));

        fs.set_credentials(Credentials { uid: 11, gid: 21 });
        fs.check_access(n, Access::Exec.into()).unwrap();
        assert_eq!(fs.check_access(n, Access::Read.into()), Err(Error::AccessDenied));
        assert_eq!(fs.check_access(n, BitFlags::empty()), Err(Error::InvalidArgument));
        assert_eq!(
            fs.set_permissions(n, BitFlags::empty()),
            Err(Error::PermissionDenied)
        );
    }

    #[test]
    fn superuser_execute_needs_some_exec_bit() {
        let (_, mut fs) = formatted(1_000);
        let n = fs.alloc_inode(InodeKind::File).unwrap();
        fs.check_access(n, Access::Read | Access::Write).unwrap();
        assert_eq!(fs.check_access(n, Access::Exec.into()), Err(Error::AccessDenied));

        fs.set_permissions(n, ModeFlag::GroupExec.into()).unwrap();
        fs.check_access(n, BitFlags::all()).unwrap();
    }
}
