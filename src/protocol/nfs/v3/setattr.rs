//! SETATTR procedure (procedure 2, RFC 1813 section 3.3.2): change mode,
//! ownership, size, or times, optionally guarded by the object's ctime.

use std::io::{Read, Write};

use tracing::debug;

use super::join;
use crate::attr;
use crate::exports::exports_rw;
use crate::fh;
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

/// The ctime guard: a mismatch means another client changed the object
/// between the caller's GETATTR and this SETATTR.
fn in_sync(guard: &nfs3::sattrguard3, pre: &nfs3::pre_op_attr) -> nfs3::nfsstat3 {
    let nfs3::pre_op_attr::attributes(pre) = pre else {
        return nfs3::nfsstat3::NFS3ERR_STALE;
    };
    match guard {
        nfs3::sattrguard3::Void => nfs3::nfsstat3::NFS3_OK,
        nfs3::sattrguard3::obj_ctime(ctime) if ctime.seconds == pre.ctime.seconds => {
            nfs3::nfsstat3::NFS3_OK
        }
        nfs3::sattrguard3::obj_ctime(_) => nfs3::nfsstat3::NFS3ERR_NOT_SYNC,
    }
}

pub async fn nfsproc3_setattr(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let args = deserialize::<nfs3::SETATTR3args>(input)?;
    debug!("nfsproc3_setattr({xid}, {args:?})");

    let handle = fh::FileHandle::from_nfs(&args.object);
    let path = match &handle {
        Some(_) => fh::fh_decomp(context.backend(), &args.object).await,
        None => None,
    };
    let (Some(handle), Some(path)) = (handle, path) else {
        xdr::rpc::make_success_reply(xid).serialize(output)?;
        nfs3::nfsstat3::NFS3ERR_STALE.serialize(output)?;
        nfs3::wcc_data::default().serialize(output)?;
        return Ok(());
    };

    let pre = attr::get_pre(context, &path).await;
    let opts = context.exports_options(&path);
    let mut status = join(in_sync(&args.guard, &pre), exports_rw(opts.as_ref()));

    if status == nfs3::nfsstat3::NFS3_OK {
        status = attr::set_attr(context, &path, handle.ino, &args.new_attributes).await;
    }

    let wcc = nfs3::wcc_data { before: pre, after: attr::get_post(context, &path).await };
    xdr::rpc::make_success_reply(xid).serialize(output)?;
    status.serialize(output)?;
    wcc.serialize(output)?;
    Ok(())
}
