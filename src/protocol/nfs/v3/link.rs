//! LINK procedure (procedure 15, RFC 1813 section 3.3.15): create a hard
//! link to an existing object.

use std::io::{Read, Write};

use tracing::debug;

use super::{cat_name, join};
use crate::attr;
use crate::errors::link_err;
use crate::exports::exports_rw;
use crate::fh;
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

pub async fn nfsproc3_link(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let args = deserialize::<nfs3::file::LINK3args>(input)?;
    debug!("nfsproc3_link({xid}, {args:?})");

    let Some(link_dir) = fh::fh_decomp(context.backend(), &args.link.dir).await else {
        xdr::rpc::make_success_reply(xid).serialize(output)?;
        nfs3::nfsstat3::NFS3ERR_STALE.serialize(output)?;
        nfs3::post_op_attr::Void.serialize(output)?;
        nfs3::wcc_data::default().serialize(output)?;
        return Ok(());
    };

    let pre = attr::get_pre(context, &link_dir).await;
    let opts = context.exports_options(&link_dir);

    let (mut status, obj_path) = match cat_name(Some(&link_dir), &args.link.name) {
        Ok(obj) => (exports_rw(opts.as_ref()), Some(obj)),
        Err(err) => (join(err, exports_rw(opts.as_ref())), None),
    };

    let old_path = fh::fh_decomp(context.backend(), &args.file).await;
    if old_path.is_none() && status == nfs3::nfsstat3::NFS3_OK {
        status = nfs3::nfsstat3::NFS3ERR_STALE;
    }

    if let (nfs3::nfsstat3::NFS3_OK, Some(obj_path), Some(old_path)) =
        (status, obj_path.as_deref(), old_path.as_deref())
    {
        if let Err(err) = context.backend().link(old_path, obj_path).await {
            status = link_err(err);
        }
    }

    let file_attributes = match old_path.as_deref() {
        Some(old) => attr::get_post(context, old).await,
        None => nfs3::post_op_attr::Void,
    };
    let linkdir_wcc =
        nfs3::wcc_data { before: pre, after: attr::get_post(context, &link_dir).await };
    xdr::rpc::make_success_reply(xid).serialize(output)?;
    status.serialize(output)?;
    file_attributes.serialize(output)?;
    linkdir_wcc.serialize(output)?;
    Ok(())
}
