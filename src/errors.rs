//! Backend-error to NFS-status translation.
//!
//! `nfs_error` is the single general-purpose mapping. Each procedure then has
//! a helper that narrows the result to the statuses RFC 1813 permits for that
//! procedure; anything outside the permitted set collapses to `NFS3ERR_IO`.

use crate::backend::FsError;
use crate::protocol::xdr::nfs3::nfsstat3;

/// General errno-style translation, used where no per-operation subset
/// applies.
pub fn nfs_error(err: FsError) -> nfsstat3 {
    match err {
        FsError::NotFound => nfsstat3::NFS3ERR_NOENT,
        FsError::Access => nfsstat3::NFS3ERR_ACCES,
        FsError::Exists => nfsstat3::NFS3ERR_EXIST,
        FsError::NotDir => nfsstat3::NFS3ERR_NOTDIR,
        FsError::IsDir => nfsstat3::NFS3ERR_ISDIR,
        FsError::Inval => nfsstat3::NFS3ERR_INVAL,
        FsError::TooBig => nfsstat3::NFS3ERR_FBIG,
        FsError::NoSpace => nfsstat3::NFS3ERR_NOSPC,
        FsError::ReadOnly => nfsstat3::NFS3ERR_ROFS,
        FsError::NotEmpty => nfsstat3::NFS3ERR_NOTEMPTY,
        FsError::NameTooLong => nfsstat3::NFS3ERR_NAMETOOLONG,
        FsError::Stale => nfsstat3::NFS3ERR_STALE,
        FsError::Generic => nfsstat3::NFS3ERR_IO,
    }
}

fn restrict(err: FsError, permitted: &[nfsstat3]) -> nfsstat3 {
    let status = nfs_error(err);
    if permitted.contains(&status) {
        status
    } else {
        nfsstat3::NFS3ERR_IO
    }
}

pub fn setattr_err(err: FsError) -> nfsstat3 {
    restrict(
        err,
        &[
            nfsstat3::NFS3ERR_PERM,
            nfsstat3::NFS3ERR_ACCES,
            nfsstat3::NFS3ERR_FBIG,
            nfsstat3::NFS3ERR_NOSPC,
            nfsstat3::NFS3ERR_ROFS,
            nfsstat3::NFS3ERR_INVAL,
            nfsstat3::NFS3ERR_NOENT,
            nfsstat3::NFS3ERR_STALE,
        ],
    )
}

pub fn lookup_err(err: FsError) -> nfsstat3 {
    restrict(
        err,
        &[
            nfsstat3::NFS3ERR_NOENT,
            nfsstat3::NFS3ERR_ACCES,
            nfsstat3::NFS3ERR_NOTDIR,
            nfsstat3::NFS3ERR_NAMETOOLONG,
            nfsstat3::NFS3ERR_STALE,
        ],
    )
}

pub fn readlink_err(err: FsError) -> nfsstat3 {
    restrict(
        err,
        &[nfsstat3::NFS3ERR_INVAL, nfsstat3::NFS3ERR_ACCES, nfsstat3::NFS3ERR_STALE],
    )
}

pub fn read_err(err: FsError) -> nfsstat3 {
    restrict(
        err,
        &[
            nfsstat3::NFS3ERR_NOENT,
            nfsstat3::NFS3ERR_ACCES,
            nfsstat3::NFS3ERR_INVAL,
            nfsstat3::NFS3ERR_STALE,
        ],
    )
}

pub fn write_open_err(err: FsError) -> nfsstat3 {
    restrict(
        err,
        &[
            nfsstat3::NFS3ERR_NOENT,
            nfsstat3::NFS3ERR_ACCES,
            nfsstat3::NFS3ERR_ISDIR,
            nfsstat3::NFS3ERR_STALE,
        ],
    )
}

pub fn write_write_err(err: FsError) -> nfsstat3 {
    restrict(
        err,
        &[
            nfsstat3::NFS3ERR_ACCES,
            nfsstat3::NFS3ERR_FBIG,
            nfsstat3::NFS3ERR_NOSPC,
            nfsstat3::NFS3ERR_INVAL,
        ],
    )
}

pub fn create_err(err: FsError) -> nfsstat3 {
    restrict(
        err,
        &[
            nfsstat3::NFS3ERR_NOENT,
            nfsstat3::NFS3ERR_ACCES,
            nfsstat3::NFS3ERR_EXIST,
            nfsstat3::NFS3ERR_NOTDIR,
            nfsstat3::NFS3ERR_NOSPC,
            nfsstat3::NFS3ERR_ROFS,
            nfsstat3::NFS3ERR_NAMETOOLONG,
            nfsstat3::NFS3ERR_STALE,
        ],
    )
}

pub fn mkdir_err(err: FsError) -> nfsstat3 {
    create_err(err)
}

pub fn symlink_err(err: FsError) -> nfsstat3 {
    create_err(err)
}

pub fn mknod_err(err: FsError) -> nfsstat3 {
    restrict(
        err,
        &[
            nfsstat3::NFS3ERR_NOENT,
            nfsstat3::NFS3ERR_ACCES,
            nfsstat3::NFS3ERR_EXIST,
            nfsstat3::NFS3ERR_NOTDIR,
            nfsstat3::NFS3ERR_NOSPC,
            nfsstat3::NFS3ERR_ROFS,
            nfsstat3::NFS3ERR_NAMETOOLONG,
            nfsstat3::NFS3ERR_INVAL,
            nfsstat3::NFS3ERR_STALE,
        ],
    )
}

pub fn remove_err(err: FsError) -> nfsstat3 {
    restrict(
        err,
        &[
            nfsstat3::NFS3ERR_NOENT,
            nfsstat3::NFS3ERR_ACCES,
            nfsstat3::NFS3ERR_NOTDIR,
            nfsstat3::NFS3ERR_ISDIR,
            nfsstat3::NFS3ERR_ROFS,
            nfsstat3::NFS3ERR_NAMETOOLONG,
            nfsstat3::NFS3ERR_STALE,
        ],
    )
}

pub fn rmdir_err(err: FsError) -> nfsstat3 {
    restrict(
        err,
        &[
            nfsstat3::NFS3ERR_NOENT,
            nfsstat3::NFS3ERR_ACCES,
            nfsstat3::NFS3ERR_NOTDIR,
            nfsstat3::NFS3ERR_NOTEMPTY,
            nfsstat3::NFS3ERR_ROFS,
            nfsstat3::NFS3ERR_NAMETOOLONG,
            nfsstat3::NFS3ERR_STALE,
        ],
    )
}

pub fn rename_err(err: FsError) -> nfsstat3 {
    restrict(
        err,
        &[
            nfsstat3::NFS3ERR_NOENT,
            nfsstat3::NFS3ERR_ACCES,
            nfsstat3::NFS3ERR_EXIST,
            nfsstat3::NFS3ERR_NOTDIR,
            nfsstat3::NFS3ERR_ISDIR,
            nfsstat3::NFS3ERR_NOTEMPTY,
            nfsstat3::NFS3ERR_NOSPC,
            nfsstat3::NFS3ERR_ROFS,
            nfsstat3::NFS3ERR_NAMETOOLONG,
            nfsstat3::NFS3ERR_STALE,
        ],
    )
}

pub fn link_err(err: FsError) -> nfsstat3 {
    restrict(
        err,
        &[
            nfsstat3::NFS3ERR_NOENT,
            nfsstat3::NFS3ERR_ACCES,
            nfsstat3::NFS3ERR_EXIST,
            nfsstat3::NFS3ERR_NOTDIR,
            nfsstat3::NFS3ERR_NOSPC,
            nfsstat3::NFS3ERR_ROFS,
            nfsstat3::NFS3ERR_NAMETOOLONG,
            nfsstat3::NFS3ERR_STALE,
        ],
    )
}
