//! Attribute handling: translating backend stat results into the protocol's
//! `fattr3`/`wcc_attr` shapes and applying SETATTR requests.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::backend::FsError;
use crate::errors::setattr_err;
use crate::protocol::rpc::Context;
use crate::protocol::xdr::nfs3::{
    fattr3, ftype3, nfsstat3, nfstime3, post_op_attr, pre_op_attr, sattr3, set_atime, set_gid3,
    set_mode3, set_mtime, set_size3, set_uid3, specdata3, wcc_attr,
};
use crate::backend::FsStat;

// File type and permission bits of st_mode.
pub const S_IFMT: u32 = 0o170000;
pub const S_IFSOCK: u32 = 0o140000;
pub const S_IFLNK: u32 = 0o120000;
pub const S_IFREG: u32 = 0o100000;
pub const S_IFBLK: u32 = 0o060000;
pub const S_IFDIR: u32 = 0o040000;
pub const S_IFCHR: u32 = 0o020000;
pub const S_IFIFO: u32 = 0o010000;

pub const S_IRUSR: u32 = 0o400;
pub const S_IWUSR: u32 = 0o200;
pub const S_IXUSR: u32 = 0o100;
pub const S_IRGRP: u32 = 0o040;
pub const S_IWGRP: u32 = 0o020;
pub const S_IXGRP: u32 = 0o010;
pub const S_IROTH: u32 = 0o004;
pub const S_IWOTH: u32 = 0o002;
pub const S_IXOTH: u32 = 0o001;

/// NFS file type of a stat mode. Unknown types degrade to regular files.
pub fn type_of_mode(mode: u32) -> ftype3 {
    match mode & S_IFMT {
        S_IFDIR => ftype3::NF3DIR,
        S_IFBLK => ftype3::NF3BLK,
        S_IFCHR => ftype3::NF3CHR,
        S_IFLNK => ftype3::NF3LNK,
        S_IFSOCK => ftype3::NF3SOCK,
        S_IFIFO => ftype3::NF3FIFO,
        _ => ftype3::NF3REG,
    }
}

/// Stat type bits corresponding to an NFS file type.
pub fn type_to_mode(ftype: ftype3) -> u32 {
    match ftype {
        ftype3::NF3REG => S_IFREG,
        ftype3::NF3DIR => S_IFDIR,
        ftype3::NF3LNK => S_IFLNK,
        ftype3::NF3CHR => S_IFCHR,
        ftype3::NF3BLK => S_IFBLK,
        ftype3::NF3FIFO => S_IFIFO,
        ftype3::NF3SOCK => S_IFSOCK,
    }
}

fn seconds(raw: i64) -> nfstime3 {
    nfstime3 { seconds: raw as u32, nseconds: 0 }
}

/// Builds `fattr3` from a stat buffer.
pub fn fattr_of(stat: &FsStat, readable_executables: bool) -> fattr3 {
    let mut mode = stat.mode;

    // Optionally let clients read what they may execute.
    if readable_executables && mode & S_IFMT == S_IFREG {
        if mode & S_IXUSR != 0 {
            mode |= S_IRUSR;
        }
        if mode & S_IXGRP != 0 {
            mode |= S_IRGRP;
        }
        if mode & S_IXOTH != 0 {
            mode |= S_IROTH;
        }
    }

    fattr3 {
        ftype: type_of_mode(stat.mode),
        mode: mode & 0xFFFF,
        nlink: stat.nlink,
        uid: stat.uid,
        gid: stat.gid,
        size: stat.size,
        used: stat.blocks * 512,
        rdev: specdata3 {
            specdata1: ((stat.rdev >> 8) & 0xFF) as u32,
            specdata2: (stat.rdev & 0xFF) as u32,
        },
        // Truncated to 32 bits; dev_t is signed on some hosts.
        fsid: stat.dev & 0xFFFF_FFFF,
        fileid: stat.ino,
        atime: seconds(stat.atime),
        mtime: seconds(stat.mtime),
        ctime: seconds(stat.ctime),
    }
}

/// `fattr_of` wrapped in the optional union most replies carry.
pub fn get_post_buf(stat: &FsStat, readable_executables: bool) -> post_op_attr {
    post_op_attr::attributes(fattr_of(stat, readable_executables))
}

/// Post-operation attributes from a fresh lstat; a failed stat degrades to
/// `attributes_follow = FALSE`.
pub async fn get_post(ctx: &Context, path: &str) -> post_op_attr {
    match ctx.backend().lstat(path).await {
        Ok(stat) => get_post_buf(&stat, ctx.config().readable_executables),
        Err(_) => post_op_attr::Void,
    }
}

/// WCC before-image from a stat buffer: size, mtime, ctime only.
pub fn get_pre_buf(stat: &FsStat) -> pre_op_attr {
    pre_op_attr::attributes(wcc_attr {
        size: stat.size,
        mtime: seconds(stat.mtime),
        ctime: seconds(stat.ctime),
    })
}

/// WCC before-image from a fresh lstat.
pub async fn get_pre(ctx: &Context, path: &str) -> pre_op_attr {
    match ctx.backend().lstat(path).await {
        Ok(stat) => get_pre_buf(&stat),
        Err(_) => pre_op_attr::Void,
    }
}

/// Mode for newly created objects; `rwxrwxr-x` when the client sent none.
pub fn create_mode(new: &sattr3) -> u32 {
    match new.mode {
        set_mode3::mode(mode) => mode,
        set_mode3::Void => {
            S_IRUSR
                | S_IWUSR
                | S_IXUSR
                | S_IRGRP
                | S_IWGRP
                | S_IXGRP
                | S_IROTH
                | S_IXOTH
        }
    }
}

fn now_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Applies a SETATTR request to `path`.
///
/// The object is re-stat'ed and its inode compared against the filehandle's:
/// a mismatch means the path was retargeted underneath us and the handle is
/// stale. Size, ownership, mode, and times are applied in that order; the
/// first failure wins.
pub async fn set_attr(ctx: &Context, path: &str, fh_ino: u64, new: &sattr3) -> nfsstat3 {
    let backend = ctx.backend();
    let stat = match backend.lstat(path).await {
        Ok(stat) => stat,
        Err(FsError::NotFound) => return nfsstat3::NFS3ERR_NOENT,
        Err(_) => return nfsstat3::NFS3ERR_STALE,
    };

    if stat.ino != fh_ino {
        return nfsstat3::NFS3ERR_STALE;
    }

    if let set_size3::size(size) = new.size {
        if let Err(err) = backend.truncate(path, size).await {
            return setattr_err(err);
        }
    }

    let new_uid = match new.uid {
        set_uid3::uid(uid) if uid != stat.uid => Some(uid),
        _ => None,
    };
    let new_gid = match new.gid {
        set_gid3::gid(gid) => Some(gid),
        set_gid3::Void => None,
    };
    if new_uid.is_some() || new_gid.is_some() {
        if let Err(err) = backend.lchown(path, new_uid, new_gid).await {
            return setattr_err(err);
        }
    }

    if let set_mode3::mode(mode) = new.mode {
        if let Err(err) = backend.chmod(path, mode).await {
            return setattr_err(err);
        }
    }

    set_time(ctx, path, &stat, new).await
}

/// Applies the atime/mtime part of a SETATTR. Races with local changes to
/// the untouched timestamp are inherent: there is no separate "set only
/// mtime" call.
async fn set_time(ctx: &Context, path: &str, stat: &FsStat, new: &sattr3) -> nfsstat3 {
    let change_atime = !matches!(new.atime, set_atime::DONT_CHANGE);
    let change_mtime = !matches!(new.mtime, set_mtime::DONT_CHANGE);
    if !change_atime && !change_mtime {
        return nfsstat3::NFS3_OK;
    }

    let atime = match new.atime {
        set_atime::SET_TO_SERVER_TIME => now_seconds(),
        set_atime::SET_TO_CLIENT_TIME(t) => i64::from(t.seconds),
        set_atime::DONT_CHANGE => stat.atime,
    };
    let mtime = match new.mtime {
        set_mtime::SET_TO_SERVER_TIME => now_seconds(),
        set_mtime::SET_TO_CLIENT_TIME(t) => i64::from(t.seconds),
        set_mtime::DONT_CHANGE => stat.mtime,
    };

    match ctx.backend().set_times(path, atime, mtime).await {
        Ok(()) => nfsstat3::NFS3_OK,
        Err(err) => setattr_err(err),
    }
}
