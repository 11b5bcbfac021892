use block_dev::DeviceError;
use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("invalid argument")]
    InvalidArgument,
    #[error("name too long")]
    NameTooLong,

    #[error("no space left on device")]
    NoSpace,
    #[error("file too large")]
    FileTooBig,
    #[error("too many links")]
    TooManyLinks,

    /// Execute right missing
    #[error("access denied")]
    AccessDenied,
    /// Write right missing
    #[error("operation not permitted")]
    PermissionDenied,

    #[error("not a directory")]
    NotADirectory,
    #[error("entry already exists")]
    AlreadyExists,
    #[error("entry not found")]
    NotFound,
    #[error("directory not empty")]
    DirectoryNotEmpty,
    #[error("too many levels of symbolic links")]
    SymlinkLoop,
    #[error("relative path where an absolute one is required")]
    RelativePath,
    #[error("data cluster already in the list of references")]
    ClusterAlreadyInList,
    #[error("data cluster not in the list of references")]
    ClusterNotInList,

    #[error("inconsistent file system: {0}")]
    Inconsistent(Inconsistency),

    /// Nothing valid is staged in the slot
    #[error("no staged buffer available")]
    NotAvailable,
    /// A slot was stored without ever being loaded
    #[error("staging slot stored before being loaded")]
    Corrupted,

    #[error("device error: {0}")]
    Device(#[from] DeviceError),
}

/// What the consistency oracle found wrong.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Inconsistency {
    #[error("bad magic or version number")]
    BadMagic,
    #[error("superblock")]
    SuperBlock,
    #[error("data zone metadata")]
    DataZone,
    #[error("free inode list")]
    FreeList,
    #[error("in-use inode")]
    InodeInUse,
    #[error("free-dirty inode")]
    FreeDirtyInode,
    #[error("directory contents")]
    DirContents,
    #[error("cluster-to-inode mapping")]
    ClusterMapping,
    #[error("data cluster not allocated")]
    ClusterNotAllocated,
}

impl From<Inconsistency> for Error {
    fn from(kind: Inconsistency) -> Self {
        Self::Inconsistent(kind)
    }
}
