//! NFS version 3 procedure handlers (RFC 1813 section 3.3).
//!
//! One module per procedure. Every handler follows the same discipline:
//! decode the filehandle (invalid -> `NFS3ERR_STALE`), resolve it to a path,
//! capture pre-operation attributes where the RFC asks for them, gate
//! mutators on the export table's rw bit, run the backend operation, and
//! always try to attach fresh post-operation attributes to the reply.

use std::io::{Read, Write};

use num_traits::cast::FromPrimitive;
use tracing::{trace, warn};

use crate::exports::{squash_ids, ExportOptions};
use crate::protocol::rpc;
use crate::protocol::xdr::{self, nfs3, Serialize};

mod access;
mod commit;
mod create;
mod fsinfo;
mod fsstat;
mod getattr;
mod link;
mod lookup;
mod mkdir;
mod mknod;
mod null;
mod pathconf;
mod read;
mod readdir;
mod readdirplus;
mod readlink;
mod remove;
mod rename;
mod rmdir;
mod setattr;
mod symlink;
mod write;

use access::nfsproc3_access;
use commit::nfsproc3_commit;
use create::nfsproc3_create;
use fsinfo::nfsproc3_fsinfo;
use fsstat::nfsproc3_fsstat;
use getattr::nfsproc3_getattr;
use link::nfsproc3_link;
use lookup::nfsproc3_lookup;
use mkdir::nfsproc3_mkdir;
use mknod::nfsproc3_mknod;
use null::nfsproc3_null;
use pathconf::nfsproc3_pathconf;
use read::nfsproc3_read;
use readdir::nfsproc3_readdir;
use readdirplus::nfsproc3_readdirplus;
use readlink::nfsproc3_readlink;
use remove::nfsproc3_remove;
use rename::nfsproc3_rename;
use rmdir::nfsproc3_rmdir;
use setattr::nfsproc3_setattr;
use symlink::nfsproc3_symlink;
use write::nfsproc3_write;

/// First non-OK status wins.
pub(crate) fn join(a: nfs3::nfsstat3, b: nfs3::nfsstat3) -> nfs3::nfsstat3 {
    if a != nfs3::nfsstat3::NFS3_OK {
        a
    } else {
        b
    }
}

pub(crate) fn join3(a: nfs3::nfsstat3, b: nfs3::nfsstat3, c: nfs3::nfsstat3) -> nfs3::nfsstat3 {
    join(join(a, b), c)
}

/// Appends an object name to a directory path, rejecting anything that could
/// leave the directory: empty names, names with embedded slashes, and
/// results exceeding the path limit. `"."` is a no-op rewrite to the
/// directory itself.
pub(crate) fn cat_name(
    path: Option<&str>,
    name: &nfs3::filename3,
) -> Result<String, nfs3::nfsstat3> {
    let Some(path) = path else {
        return Err(nfs3::nfsstat3::NFS3ERR_STALE);
    };
    let Ok(name) = std::str::from_utf8(name.as_ref()) else {
        return Err(nfs3::nfsstat3::NFS3ERR_ACCES);
    };
    if name.is_empty() || name.contains('/') {
        return Err(nfs3::nfsstat3::NFS3ERR_ACCES);
    }
    if path.len() + name.len() + 2 > nfs3::NFS_MAXPATHLEN {
        return Err(nfs3::nfsstat3::NFS3ERR_NAMETOOLONG);
    }
    if name == "." {
        return Ok(path.to_string());
    }
    if path == "/" {
        Ok(format!("/{name}"))
    } else {
        Ok(format!("{path}/{name}"))
    }
}

/// READ/WRITE/COMMIT operate on regular files only.
pub(crate) async fn is_reg(ctx: &rpc::Context, path: &str) -> nfs3::nfsstat3 {
    use crate::attr::{S_IFMT, S_IFREG};
    use crate::backend::FsError;

    match ctx.backend().lstat(path).await {
        Ok(stat) if stat.mode & S_IFMT == S_IFREG => nfs3::nfsstat3::NFS3_OK,
        Ok(_) => nfs3::nfsstat3::NFS3ERR_INVAL,
        Err(FsError::NotFound) => nfs3::nfsstat3::NFS3ERR_NOENT,
        Err(_) => nfs3::nfsstat3::NFS3ERR_STALE,
    }
}

/// Gives a freshly created object to the (squashed) caller. With euid
/// switching gone, this is where AUTH_UNIX identity reaches the filesystem.
/// Failure only costs the ownership, not the operation.
pub(crate) async fn chown_new_object(
    ctx: &rpc::Context,
    path: &str,
    opts: Option<&ExportOptions>,
) {
    if ctx.config().single_user {
        return;
    }
    let Some(opts) = opts else { return };
    let (uid, gid) = squash_ids(&ctx.auth, opts);
    if let Err(err) = ctx.backend().lchown(path, Some(uid), Some(gid)).await {
        trace!("could not chown fresh object {path} to {uid}:{gid}: {err:?}");
    }
}

#[cfg(test)]
mod tests {
    use super::{cat_name, join};
    use crate::protocol::xdr::nfs3::{self, nfsstat3};

    #[test]
    fn cat_name_joins_and_rewrites_dot() {
        assert_eq!(cat_name(Some("/a"), &"b".into()).unwrap(), "/a/b");
        assert_eq!(cat_name(Some("/"), &"b".into()).unwrap(), "/b");
        assert_eq!(cat_name(Some("/a"), &".".into()).unwrap(), "/a");
    }

    #[test]
    fn cat_name_rejects_escapes() {
        assert_eq!(cat_name(None, &"b".into()).unwrap_err(), nfsstat3::NFS3ERR_STALE);
        assert_eq!(cat_name(Some("/a"), &"".into()).unwrap_err(), nfsstat3::NFS3ERR_ACCES);
        assert_eq!(
            cat_name(Some("/a"), &"../etc".into()).unwrap_err(),
            nfsstat3::NFS3ERR_ACCES
        );
        assert_eq!(cat_name(Some("/a"), &"x/y".into()).unwrap_err(), nfsstat3::NFS3ERR_ACCES);
    }

    #[test]
    fn cat_name_enforces_the_path_limit_exactly() {
        let dir = "/d";
        // dir + '/' + name + NUL lands exactly on the limit.
        let fits = "n".repeat(nfs3::NFS_MAXPATHLEN - dir.len() - 2);
        assert!(cat_name(Some(dir), &fits.as_str().into()).is_ok());

        let over = "n".repeat(nfs3::NFS_MAXPATHLEN - dir.len() - 1);
        assert_eq!(
            cat_name(Some(dir), &over.as_str().into()).unwrap_err(),
            nfsstat3::NFS3ERR_NAMETOOLONG
        );
    }

    #[test]
    fn join_prefers_the_first_failure() {
        assert_eq!(join(nfsstat3::NFS3_OK, nfsstat3::NFS3_OK), nfsstat3::NFS3_OK);
        assert_eq!(join(nfsstat3::NFS3ERR_ACCES, nfsstat3::NFS3ERR_ROFS), nfsstat3::NFS3ERR_ACCES);
        assert_eq!(join(nfsstat3::NFS3_OK, nfsstat3::NFS3ERR_ROFS), nfsstat3::NFS3ERR_ROFS);
    }
}

/// Routes an NFS3 call to its procedure handler.
pub async fn handle_nfs(
    xid: u32,
    call: xdr::rpc::call_body,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    if call.vers != nfs3::VERSION {
        warn!("invalid NFS version {} != {}", call.vers, nfs3::VERSION);
        xdr::rpc::prog_mismatch_reply_message(xid, nfs3::VERSION).serialize(output)?;
        return Ok(());
    }
    let proc = nfs3::NFSProgram::from_u32(call.proc).unwrap_or(nfs3::NFSProgram::INVALID);

    match proc {
        nfs3::NFSProgram::NFSPROC3_NULL => nfsproc3_null(xid, output)?,
        nfs3::NFSProgram::NFSPROC3_GETATTR => nfsproc3_getattr(xid, input, output, context).await?,
        nfs3::NFSProgram::NFSPROC3_SETATTR => nfsproc3_setattr(xid, input, output, context).await?,
        nfs3::NFSProgram::NFSPROC3_LOOKUP => nfsproc3_lookup(xid, input, output, context).await?,
        nfs3::NFSProgram::NFSPROC3_ACCESS => nfsproc3_access(xid, input, output, context).await?,
        nfs3::NFSProgram::NFSPROC3_READLINK => {
            nfsproc3_readlink(xid, input, output, context).await?
        }
        nfs3::NFSProgram::NFSPROC3_READ => nfsproc3_read(xid, input, output, context).await?,
        nfs3::NFSProgram::NFSPROC3_WRITE => nfsproc3_write(xid, input, output, context).await?,
        nfs3::NFSProgram::NFSPROC3_CREATE => nfsproc3_create(xid, input, output, context).await?,
        nfs3::NFSProgram::NFSPROC3_MKDIR => nfsproc3_mkdir(xid, input, output, context).await?,
        nfs3::NFSProgram::NFSPROC3_SYMLINK => nfsproc3_symlink(xid, input, output, context).await?,
        nfs3::NFSProgram::NFSPROC3_MKNOD => nfsproc3_mknod(xid, input, output, context).await?,
        nfs3::NFSProgram::NFSPROC3_REMOVE => nfsproc3_remove(xid, input, output, context).await?,
        nfs3::NFSProgram::NFSPROC3_RMDIR => nfsproc3_rmdir(xid, input, output, context).await?,
        nfs3::NFSProgram::NFSPROC3_RENAME => nfsproc3_rename(xid, input, output, context).await?,
        nfs3::NFSProgram::NFSPROC3_LINK => nfsproc3_link(xid, input, output, context).await?,
        nfs3::NFSProgram::NFSPROC3_READDIR => nfsproc3_readdir(xid, input, output, context).await?,
        nfs3::NFSProgram::NFSPROC3_READDIRPLUS => {
            nfsproc3_readdirplus(xid, input, output, context).await?
        }
        nfs3::NFSProgram::NFSPROC3_FSSTAT => nfsproc3_fsstat(xid, input, output, context).await?,
        nfs3::NFSProgram::NFSPROC3_FSINFO => nfsproc3_fsinfo(xid, input, output, context).await?,
        nfs3::NFSProgram::NFSPROC3_PATHCONF => {
            nfsproc3_pathconf(xid, input, output, context).await?
        }
        nfs3::NFSProgram::NFSPROC3_COMMIT => nfsproc3_commit(xid, input, output, context).await?,
        nfs3::NFSProgram::INVALID => {
            warn!("unimplemented NFS procedure {}", call.proc);
            xdr::rpc::proc_unavail_reply_message(xid).serialize(output)?;
        }
    }
    Ok(())
}
