//! RMDIR procedure (procedure 13, RFC 1813 section 3.3.13): delete an empty
//! directory. Invalidates outstanding readdir cookies.

use std::io::{Read, Write};

use tracing::debug;

use super::{cat_name, join};
use crate::attr;
use crate::errors::rmdir_err;
use crate::exports::exports_rw;
use crate::fh;
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

pub async fn nfsproc3_rmdir(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let args = deserialize::<nfs3::diropargs3>(input)?;
    debug!("nfsproc3_rmdir({xid}, {args:?})");

    let Some(dir_path) = fh::fh_decomp(context.backend(), &args.dir).await else {
        xdr::rpc::make_success_reply(xid).serialize(output)?;
        nfs3::nfsstat3::NFS3ERR_STALE.serialize(output)?;
        nfs3::wcc_data::default().serialize(output)?;
        return Ok(());
    };

    let pre = attr::get_pre(context, &dir_path).await;
    let opts = context.exports_options(&dir_path);

    let (mut status, obj_path) = match cat_name(Some(&dir_path), &args.name) {
        Ok(obj) => (exports_rw(opts.as_ref()), Some(obj)),
        Err(err) => (join(err, exports_rw(opts.as_ref())), None),
    };

    if let (nfs3::nfsstat3::NFS3_OK, Some(obj_path)) = (status, obj_path.as_deref()) {
        context.server().change_readdir_cookie();
        if let Err(err) = context.backend().rmdir(obj_path).await {
            status = rmdir_err(err);
        }
    }

    let wcc = nfs3::wcc_data { before: pre, after: attr::get_post(context, &dir_path).await };
    xdr::rpc::make_success_reply(xid).serialize(output)?;
    status.serialize(output)?;
    wcc.serialize(output)?;
    Ok(())
}
