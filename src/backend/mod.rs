//! The filesystem capability consumed by the protocol engine.
//!
//! Handlers never touch the host filesystem directly; they go through the
//! [`FSBackend`] trait so the storage side can be swapped out. The shipped
//! implementation is [`posix::PosixBackend`], which roots the exported
//! namespace at a local directory.
//!
//! All paths crossing this interface are virtual absolute paths: `/` is the
//! root of the exported namespace, regardless of where the backend stores it.

use std::net::IpAddr;

use async_trait::async_trait;

pub mod posix;

pub use posix::PosixBackend;

/// Backend failure, one variant per errno the protocol layer distinguishes.
/// The single translation point to NFS statuses is `errors::nfs_error`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FsError {
    /// Any failure the other variants do not cover.
    Generic,
    NotFound,
    Access,
    Exists,
    NotDir,
    IsDir,
    Inval,
    TooBig,
    NoSpace,
    ReadOnly,
    NotEmpty,
    NameTooLong,
    Stale,
}

/// Subset of `struct stat` the protocol layer consumes.
#[derive(Copy, Clone, Debug, Default)]
pub struct FsStat {
    pub dev: u64,
    pub ino: u64,
    pub mode: u32,
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    pub rdev: u64,
    pub size: u64,
    pub blksize: u32,
    pub blocks: u64,
    pub atime: i64,
    pub mtime: i64,
    pub ctime: i64,
}

/// Subset of `struct statvfs` FSSTAT needs.
#[derive(Copy, Clone, Debug, Default)]
pub struct FsStatvfs {
    pub frsize: u64,
    pub blocks: u64,
    pub bfree: u64,
    pub bavail: u64,
    pub files: u64,
    pub ffree: u64,
}

/// Access requested by an open probe.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
}

/// Filesystem operations the NFS and MOUNT handlers are written against.
///
/// Paths are virtual absolute paths. Every call may block on storage, so no
/// caller holds a lock across an await on these methods.
#[async_trait]
pub trait FSBackend: Send + Sync {
    /// Stats an object without following a final symlink.
    async fn lstat(&self, path: &str) -> Result<FsStat, FsError>;

    /// Probes that the object can be opened with the given access.
    async fn open(&self, path: &str, mode: OpenMode) -> Result<(), FsError>;

    /// Creates (or, unless `excl`, truncates) a regular file.
    async fn open_create(&self, path: &str, excl: bool, mode: u32) -> Result<(), FsError>;

    /// Reads up to `count` bytes at `offset`. A short result means EOF.
    async fn pread(&self, path: &str, count: u32, offset: u64) -> Result<Vec<u8>, FsError>;

    /// Writes `data` at `offset` and flushes it to stable storage.
    async fn pwrite(&self, path: &str, data: &[u8], offset: u64) -> Result<u32, FsError>;

    async fn truncate(&self, path: &str, size: u64) -> Result<(), FsError>;

    async fn chmod(&self, path: &str, mode: u32) -> Result<(), FsError>;

    /// Changes ownership without following a final symlink. `None` keeps the
    /// current id.
    async fn lchown(
        &self,
        path: &str,
        uid: Option<u32>,
        gid: Option<u32>,
    ) -> Result<(), FsError>;

    /// Sets access and modification times (whole seconds).
    async fn set_times(&self, path: &str, atime: i64, mtime: i64) -> Result<(), FsError>;

    async fn mkdir(&self, path: &str, mode: u32) -> Result<(), FsError>;

    async fn rmdir(&self, path: &str) -> Result<(), FsError>;

    /// Removes a non-directory object.
    async fn remove(&self, path: &str) -> Result<(), FsError>;

    async fn rename(&self, from: &str, to: &str) -> Result<(), FsError>;

    /// Creates a hard link at `link` pointing to `target`.
    async fn link(&self, target: &str, link: &str) -> Result<(), FsError>;

    /// Creates a symlink at `link` with the given contents. `mode` is
    /// advisory; not every host filesystem honours symlink permissions.
    async fn symlink(&self, target: &str, link: &str, mode: u32) -> Result<(), FsError>;

    async fn readlink(&self, path: &str) -> Result<Vec<u8>, FsError>;

    /// Creates a device node. `mode` carries the S_IFCHR/S_IFBLK type bits.
    async fn mknod(&self, path: &str, mode: u32, dev: u64) -> Result<(), FsError>;

    async fn mkfifo(&self, path: &str, mode: u32) -> Result<(), FsError>;

    /// Creates a Unix-domain socket object bound at `path`.
    async fn mksocket(&self, path: &str, mode: u32) -> Result<(), FsError>;

    /// Flushes the object to stable storage and returns its fresh stat.
    async fn sync(&self, path: &str) -> Result<FsStat, FsError>;

    async fn statvfs(&self, path: &str) -> Result<FsStatvfs, FsError>;

    /// Lists a directory's entry names (no `.`/`..`) in an order that is
    /// stable across calls while the directory is unchanged.
    async fn read_dir(&self, path: &str) -> Result<Vec<String>, FsError>;

    /// Inverse inode lookup used by long-path filehandles. Returns the
    /// current virtual path of the inode, if the backend still knows one.
    async fn fgetpath(&self, ino: u64) -> Option<String>;

    /// Backend-level veto over MNT, after the export table has said yes.
    async fn accept_mount(&self, _client: IpAddr, _path: &str) -> bool {
        true
    }

    /// Canonicalises a virtual path, resolving symlinks within the exported
    /// namespace.
    async fn realpath(&self, path: &str) -> Result<String, FsError>;
}
