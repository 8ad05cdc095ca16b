//! RENAME procedure (procedure 14, RFC 1813 section 3.3.14). Invalidates
//! outstanding readdir cookies; an inlined filehandle for the renamed object
//! keeps pointing at the old path and goes stale.

use std::io::{Read, Write};

use tracing::debug;

use super::{cat_name, join};
use crate::attr;
use crate::backend::FsError;
use crate::errors::rename_err;
use crate::exports::exports_rw;
use crate::fh;
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

pub async fn nfsproc3_rename(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let args = deserialize::<nfs3::dir::RENAME3args>(input)?;
    debug!("nfsproc3_rename({xid}, {args:?})");

    let from_path = fh::fh_decomp(context.backend(), &args.from.dir).await;
    let to_path = fh::fh_decomp(context.backend(), &args.to.dir).await;
    let (Some(from_path), Some(to_path)) = (from_path, to_path) else {
        xdr::rpc::make_success_reply(xid).serialize(output)?;
        nfs3::nfsstat3::NFS3ERR_STALE.serialize(output)?;
        nfs3::wcc_data::default().serialize(output)?;
        nfs3::wcc_data::default().serialize(output)?;
        return Ok(());
    };

    let from_pre = attr::get_pre(context, &from_path).await;
    let to_pre = attr::get_pre(context, &to_path).await;
    let opts = context.exports_options(&from_path);

    let from_obj = cat_name(Some(&from_path), &args.from.name);
    let to_obj = cat_name(Some(&to_path), &args.to.name);
    let name_status = match (&from_obj, &to_obj) {
        (Err(err), _) | (_, Err(err)) => *err,
        _ => nfs3::nfsstat3::NFS3_OK,
    };

    let mut status = join(name_status, exports_rw(opts.as_ref()));
    if let (nfs3::nfsstat3::NFS3_OK, Ok(from_obj), Ok(to_obj)) = (status, &from_obj, &to_obj) {
        context.server().change_readdir_cookie();
        status = match context.backend().rename(from_obj, to_obj).await {
            Ok(()) => nfs3::nfsstat3::NFS3_OK,
            Err(FsError::NotFound) => nfs3::nfsstat3::NFS3ERR_NOENT,
            Err(err) => rename_err(err),
        };
    }

    let fromdir_wcc =
        nfs3::wcc_data { before: from_pre, after: attr::get_post(context, &from_path).await };
    let todir_wcc =
        nfs3::wcc_data { before: to_pre, after: attr::get_post(context, &to_path).await };
    xdr::rpc::make_success_reply(xid).serialize(output)?;
    status.serialize(output)?;
    fromdir_wcc.serialize(output)?;
    todir_wcc.serialize(output)?;
    Ok(())
}
