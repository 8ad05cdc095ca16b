//! Filehandle composition and resolution.
//!
//! A handle names `(inode, path)`. On the wire it is `ino (8 bytes LE)`,
//! a one-byte length class, and, when the path fits, the inlined
//! NUL-terminated path bytes:
//!
//! - `len == 0`: the export root, resolves to `/`.
//! - `1..=33`: inlined path of `len - 1` bytes plus NUL.
//! - `>= 34`: path too long to inline; resolution goes through the backend's
//!   inode->path index.
//!
//! Inlined handles keep the server stateless: no table survives between
//! requests, and directory churn elsewhere cannot invalidate them. A rename
//! of the referenced object makes an inlined handle stale rather than
//! silently retargeting it.

use smallvec::SmallVec;

use crate::attr::S_IFMT;
use crate::backend::FSBackend;
use crate::protocol::xdr::nfs3::{nfs_fh3, post_op_fh3};

/// Minimum bytes in a well-formed handle: inode plus length class.
pub const FH_MINLEN: usize = 9;
/// Longest path (excluding NUL) that is carried inline.
pub const FH_INLINE_MAX: usize = 32;
/// Length class marking a non-inlined path.
const FH_LONG: u8 = 34;

/// Decoded form of an opaque handle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileHandle {
    pub ino: u64,
    pub len: u8,
    path: SmallVec<[u8; FH_INLINE_MAX]>,
}

impl FileHandle {
    /// Composes a handle for `path`, inlining it when it fits.
    pub fn new(ino: u64, path: &str) -> FileHandle {
        if path == "/" {
            FileHandle { ino, len: 0, path: SmallVec::new() }
        } else if path.len() <= FH_INLINE_MAX {
            FileHandle {
                ino,
                len: (path.len() + 1) as u8,
                path: SmallVec::from_slice(path.as_bytes()),
            }
        } else {
            FileHandle { ino, len: FH_LONG, path: SmallVec::new() }
        }
    }

    /// Encoded byte length: inode, length class, and the inlined bytes when
    /// the length class says they are present.
    pub fn wire_len(&self) -> usize {
        let inline = if self.len <= FH_INLINE_MAX as u8 + 1 { self.len as usize } else { 0 };
        FH_MINLEN + inline
    }

    /// Inlined path, if this handle carries one.
    pub fn inline_path(&self) -> Option<&str> {
        if self.len == 0 || self.len > FH_INLINE_MAX as u8 + 1 {
            return None;
        }
        std::str::from_utf8(&self.path).ok()
    }

    pub fn to_nfs(&self) -> nfs_fh3 {
        let mut data = Vec::with_capacity(self.wire_len());
        data.extend_from_slice(&self.ino.to_le_bytes());
        data.push(self.len);
        if self.len > 0 && self.len <= FH_INLINE_MAX as u8 + 1 {
            data.extend_from_slice(&self.path);
            data.push(0);
        }
        nfs_fh3 { data }
    }

    /// Decodes and validates an opaque handle. The declared XDR length must
    /// agree with the length class, the handle must fit the RFC limit, and
    /// the inode must be non-zero.
    pub fn from_nfs(fh: &nfs_fh3) -> Option<FileHandle> {
        let data = &fh.data;
        if data.len() < FH_MINLEN || data.len() > 64 {
            return None;
        }
        let ino = u64::from_le_bytes(data[0..8].try_into().ok()?);
        let len = data[8];
        let inline = if len <= FH_INLINE_MAX as u8 + 1 { len as usize } else { 0 };
        if data.len() != FH_MINLEN + inline {
            return None;
        }
        if ino == 0 {
            return None;
        }
        let path = if inline > 0 {
            // Inlined bytes are NUL-terminated.
            if data[FH_MINLEN + inline - 1] != 0 {
                return None;
            }
            SmallVec::from_slice(&data[FH_MINLEN..FH_MINLEN + inline - 1])
        } else {
            SmallVec::new()
        };
        Some(FileHandle { ino, len, path })
    }
}

/// Whether an opaque handle passes structural validation.
pub fn nfh_valid(fh: &nfs_fh3) -> bool {
    FileHandle::from_nfs(fh).is_some()
}

/// Composes the opaque handle for `(ino, path)`.
pub fn fh_comp(ino: u64, path: &str) -> nfs_fh3 {
    FileHandle::new(ino, path).to_nfs()
}

/// Resolves an opaque handle back to a path. Inlined handles resolve without
/// touching the backend; long-path handles consult `fgetpath`.
pub async fn fh_decomp(backend: &dyn FSBackend, fh: &nfs_fh3) -> Option<String> {
    let handle = FileHandle::from_nfs(fh)?;
    if handle.len == 0 {
        return Some("/".to_string());
    }
    if let Some(path) = handle.inline_path() {
        return Some(path.to_string());
    }
    backend.fgetpath(handle.ino).await
}

/// Builds the optional result handle the create-family procedures return.
pub fn fh_comp_post(ino: u64, path: &str) -> post_op_fh3 {
    post_op_fh3::handle(fh_comp(ino, path))
}

/// Stats `path` and builds a handle only if the object exists and, when
/// `want_ifmt` is given, has that file type.
pub async fn fh_comp_type(
    backend: &dyn FSBackend,
    path: &str,
    want_ifmt: Option<u32>,
) -> post_op_fh3 {
    match backend.lstat(path).await {
        Ok(stat) => match want_ifmt {
            Some(ifmt) if stat.mode & S_IFMT != ifmt => post_op_fh3::Void,
            _ => fh_comp_post(stat.ino, path),
        },
        Err(_) => post_op_fh3::Void,
    }
}
