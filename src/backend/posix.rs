//! Local-directory backend: maps the virtual `/` namespace onto a host
//! directory and satisfies the [`FSBackend`] contract with POSIX semantics.

use std::ffi::CString;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{FileExt, MetadataExt, PermissionsExt};
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use filetime::FileTime;
use moka::sync::Cache;
use tracing::trace;

use super::{FSBackend, FsError, FsStat, FsStatvfs, OpenMode};

/// Upper bound on remembered inode->path pairs. Entries are re-validated on
/// lookup, so eviction only costs a long-path handle its resolvability.
const INODE_INDEX_CAPACITY: u64 = 65536;

/// `FSBackend` over a subtree of the host filesystem.
pub struct PosixBackend {
    root: PathBuf,
    /// Inode->virtual-path index backing `fgetpath`. Fed by every successful
    /// `lstat`; hits are confirmed with a fresh stat before being returned.
    inode_index: Cache<u64, String>,
}

impl PosixBackend {
    pub fn new(root: impl Into<PathBuf>) -> PosixBackend {
        PosixBackend {
            root: root.into(),
            inode_index: Cache::builder().max_capacity(INODE_INDEX_CAPACITY).build(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a virtual absolute path onto the backing directory. Relative
    /// paths and `..` components never cross this boundary.
    fn host_path(&self, path: &str) -> Result<PathBuf, FsError> {
        let rel = path.strip_prefix('/').ok_or(FsError::Stale)?;
        let rel = Path::new(rel);
        for component in rel.components() {
            match component {
                Component::Normal(_) => {}
                Component::CurDir => {}
                _ => return Err(FsError::Access),
            }
        }
        Ok(self.root.join(rel))
    }

    fn remember(&self, ino: u64, path: &str) {
        self.inode_index.insert(ino, path.to_string());
    }
}

fn map_io(err: &io::Error) -> FsError {
    if let Some(code) = err.raw_os_error() {
        return match code {
            libc::ENOENT => FsError::NotFound,
            libc::EACCES | libc::EPERM => FsError::Access,
            libc::EEXIST => FsError::Exists,
            libc::ENOTDIR => FsError::NotDir,
            libc::EISDIR => FsError::IsDir,
            libc::EINVAL => FsError::Inval,
            libc::EFBIG => FsError::TooBig,
            libc::ENOSPC => FsError::NoSpace,
            libc::EROFS => FsError::ReadOnly,
            libc::ENOTEMPTY => FsError::NotEmpty,
            libc::ENAMETOOLONG => FsError::NameTooLong,
            libc::ESTALE => FsError::Stale,
            _ => FsError::Generic,
        };
    }
    match err.kind() {
        io::ErrorKind::NotFound => FsError::NotFound,
        io::ErrorKind::PermissionDenied => FsError::Access,
        io::ErrorKind::AlreadyExists => FsError::Exists,
        _ => FsError::Generic,
    }
}

fn stat_of(meta: &std::fs::Metadata) -> FsStat {
    FsStat {
        dev: meta.dev(),
        ino: meta.ino(),
        mode: meta.mode(),
        nlink: meta.nlink() as u32,
        uid: meta.uid(),
        gid: meta.gid(),
        rdev: meta.rdev(),
        size: meta.size(),
        blksize: meta.blksize() as u32,
        blocks: meta.blocks(),
        atime: meta.atime(),
        mtime: meta.mtime(),
        ctime: meta.ctime(),
    }
}

/// Runs a libc call returning `-1`-with-errno and maps the failure.
fn check_libc(ret: libc::c_int) -> Result<(), FsError> {
    if ret == 0 {
        Ok(())
    } else {
        Err(map_io(&io::Error::last_os_error()))
    }
}

fn c_path(path: &Path) -> Result<CString, FsError> {
    CString::new(path.as_os_str().as_bytes()).map_err(|_| FsError::Inval)
}

#[async_trait]
impl FSBackend for PosixBackend {
    async fn lstat(&self, path: &str) -> Result<FsStat, FsError> {
        let host = self.host_path(path)?;
        let meta = tokio::fs::symlink_metadata(&host).await.map_err(|e| map_io(&e))?;
        let stat = stat_of(&meta);
        self.remember(stat.ino, path);
        Ok(stat)
    }

    async fn open(&self, path: &str, mode: OpenMode) -> Result<(), FsError> {
        let host = self.host_path(path)?;
        let mut options = tokio::fs::OpenOptions::new();
        match mode {
            OpenMode::Read => options.read(true),
            OpenMode::Write => options.write(true),
        };
        options.open(&host).await.map_err(|e| map_io(&e))?;
        Ok(())
    }

    async fn open_create(&self, path: &str, excl: bool, mode: u32) -> Result<(), FsError> {
        let host = self.host_path(path)?;
        let mut options = tokio::fs::OpenOptions::new();
        options.read(true).write(true).mode(mode);
        if excl {
            options.create_new(true);
        } else {
            options.create(true).truncate(true);
        }
        options.open(&host).await.map_err(|e| map_io(&e))?;
        Ok(())
    }

    async fn pread(&self, path: &str, count: u32, offset: u64) -> Result<Vec<u8>, FsError> {
        let host = self.host_path(path)?;
        let file = std::fs::File::open(&host).map_err(|e| map_io(&e))?;
        let mut data = vec![0u8; count as usize];
        let mut filled = 0usize;
        while filled < data.len() {
            let n = file
                .read_at(&mut data[filled..], offset + filled as u64)
                .map_err(|e| map_io(&e))?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        data.truncate(filled);
        Ok(data)
    }

    async fn pwrite(&self, path: &str, data: &[u8], offset: u64) -> Result<u32, FsError> {
        let host = self.host_path(path)?;
        let file = std::fs::OpenOptions::new()
            .write(true)
            .open(&host)
            .map_err(|e| map_io(&e))?;
        file.write_all_at(data, offset).map_err(|e| map_io(&e))?;
        // Writes are advertised as FILE_SYNC, so flush before replying.
        file.sync_all().map_err(|e| map_io(&e))?;
        Ok(data.len() as u32)
    }

    async fn truncate(&self, path: &str, size: u64) -> Result<(), FsError> {
        let host = self.host_path(path)?;
        let file = tokio::fs::OpenOptions::new()
            .write(true)
            .open(&host)
            .await
            .map_err(|e| map_io(&e))?;
        file.set_len(size).await.map_err(|e| map_io(&e))
    }

    async fn chmod(&self, path: &str, mode: u32) -> Result<(), FsError> {
        let host = self.host_path(path)?;
        tokio::fs::set_permissions(&host, std::fs::Permissions::from_mode(mode))
            .await
            .map_err(|e| map_io(&e))
    }

    async fn lchown(
        &self,
        path: &str,
        uid: Option<u32>,
        gid: Option<u32>,
    ) -> Result<(), FsError> {
        let host = self.host_path(path)?;
        std::os::unix::fs::lchown(&host, uid, gid).map_err(|e| map_io(&e))
    }

    async fn set_times(&self, path: &str, atime: i64, mtime: i64) -> Result<(), FsError> {
        let host = self.host_path(path)?;
        filetime::set_symlink_file_times(
            &host,
            FileTime::from_unix_time(atime, 0),
            FileTime::from_unix_time(mtime, 0),
        )
        .map_err(|e| map_io(&e))
    }

    async fn mkdir(&self, path: &str, mode: u32) -> Result<(), FsError> {
        let host = self.host_path(path)?;
        let mut builder = tokio::fs::DirBuilder::new();
        builder.mode(mode);
        builder.create(&host).await.map_err(|e| map_io(&e))
    }

    async fn rmdir(&self, path: &str) -> Result<(), FsError> {
        let host = self.host_path(path)?;
        tokio::fs::remove_dir(&host).await.map_err(|e| map_io(&e))
    }

    async fn remove(&self, path: &str) -> Result<(), FsError> {
        let host = self.host_path(path)?;
        tokio::fs::remove_file(&host).await.map_err(|e| map_io(&e))
    }

    async fn rename(&self, from: &str, to: &str) -> Result<(), FsError> {
        let from_host = self.host_path(from)?;
        let to_host = self.host_path(to)?;
        tokio::fs::rename(&from_host, &to_host).await.map_err(|e| map_io(&e))
    }

    async fn link(&self, target: &str, link: &str) -> Result<(), FsError> {
        let target_host = self.host_path(target)?;
        let link_host = self.host_path(link)?;
        tokio::fs::hard_link(&target_host, &link_host).await.map_err(|e| map_io(&e))
    }

    async fn symlink(&self, target: &str, link: &str, _mode: u32) -> Result<(), FsError> {
        // The requested mode is dropped: Linux has no lchmod and ignores
        // symlink permission bits, and a chmod here would follow the link to
        // its target.
        let link_host = self.host_path(link)?;
        tokio::fs::symlink(target, &link_host).await.map_err(|e| map_io(&e))
    }

    async fn readlink(&self, path: &str) -> Result<Vec<u8>, FsError> {
        let host = self.host_path(path)?;
        let target = tokio::fs::read_link(&host).await.map_err(|e| map_io(&e))?;
        Ok(target.into_os_string().as_bytes().to_vec())
    }

    async fn mknod(&self, path: &str, mode: u32, dev: u64) -> Result<(), FsError> {
        let host = self.host_path(path)?;
        let cpath = c_path(&host)?;
        check_libc(unsafe { libc::mknod(cpath.as_ptr(), mode as libc::mode_t, dev as libc::dev_t) })
    }

    async fn mkfifo(&self, path: &str, mode: u32) -> Result<(), FsError> {
        let host = self.host_path(path)?;
        let cpath = c_path(&host)?;
        check_libc(unsafe { libc::mkfifo(cpath.as_ptr(), mode as libc::mode_t) })
    }

    async fn mksocket(&self, path: &str, mode: u32) -> Result<(), FsError> {
        let host = self.host_path(path)?;
        // Binding creates the socket object; the listener itself is not kept.
        std::os::unix::net::UnixListener::bind(&host).map_err(|e| map_io(&e))?;
        tokio::fs::set_permissions(&host, std::fs::Permissions::from_mode(mode))
            .await
            .map_err(|e| map_io(&e))
    }

    async fn sync(&self, path: &str) -> Result<FsStat, FsError> {
        let host = self.host_path(path)?;
        let file = std::fs::File::open(&host).map_err(|e| map_io(&e))?;
        file.sync_all().map_err(|e| map_io(&e))?;
        self.lstat(path).await
    }

    async fn statvfs(&self, path: &str) -> Result<FsStatvfs, FsError> {
        let host = self.host_path(path)?;
        let cpath = c_path(&host)?;
        let mut raw: libc::statvfs = unsafe { std::mem::zeroed() };
        check_libc(unsafe { libc::statvfs(cpath.as_ptr(), &mut raw) })?;
        Ok(FsStatvfs {
            frsize: raw.f_frsize as u64,
            blocks: raw.f_blocks as u64,
            bfree: raw.f_bfree as u64,
            bavail: raw.f_bavail as u64,
            files: raw.f_files as u64,
            ffree: raw.f_ffree as u64,
        })
    }

    async fn read_dir(&self, path: &str) -> Result<Vec<String>, FsError> {
        let host = self.host_path(path)?;
        let mut reader = tokio::fs::read_dir(&host).await.map_err(|e| map_io(&e))?;
        let mut names = Vec::new();
        while let Some(entry) = reader.next_entry().await.map_err(|e| map_io(&e))? {
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(raw) => trace!("skipping non-UTF-8 directory entry {:?}", raw),
            }
        }
        // Host readdir order is arbitrary; index cookies need a stable one.
        names.sort();
        Ok(names)
    }

    async fn fgetpath(&self, ino: u64) -> Option<String> {
        let candidate = self.inode_index.get(&ino)?;
        let host = self.host_path(&candidate).ok()?;
        match tokio::fs::symlink_metadata(&host).await {
            Ok(meta) if meta.ino() == ino => Some(candidate),
            _ => {
                self.inode_index.invalidate(&ino);
                None
            }
        }
    }

    async fn realpath(&self, path: &str) -> Result<String, FsError> {
        let host = self.host_path(path)?;
        let canonical = tokio::fs::canonicalize(&host).await.map_err(|e| map_io(&e))?;
        let canonical_root = tokio::fs::canonicalize(&self.root).await.map_err(|e| map_io(&e))?;
        if canonical == canonical_root {
            return Ok("/".to_string());
        }
        let rel = canonical.strip_prefix(&canonical_root).map_err(|_| FsError::Access)?;
        let rel = rel.to_str().ok_or(FsError::Inval)?;
        Ok(format!("/{rel}"))
    }
}
