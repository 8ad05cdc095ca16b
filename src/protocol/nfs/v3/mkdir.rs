//! MKDIR procedure (procedure 9, RFC 1813 section 3.3.9).

use std::io::{Read, Write};

use tracing::debug;

use super::{cat_name, chown_new_object, join};
use crate::attr::{self, S_IFDIR};
use crate::errors::mkdir_err;
use crate::exports::exports_rw;
use crate::fh;
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

pub async fn nfsproc3_mkdir(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let args = deserialize::<nfs3::dir::MKDIR3args>(input)?;
    debug!("nfsproc3_mkdir({xid}, {args:?})");

    let Some(dir_path) = fh::fh_decomp(context.backend(), &args.dirops.dir).await else {
        xdr::rpc::make_success_reply(xid).serialize(output)?;
        nfs3::nfsstat3::NFS3ERR_STALE.serialize(output)?;
        nfs3::wcc_data::default().serialize(output)?;
        return Ok(());
    };

    let pre = attr::get_pre(context, &dir_path).await;
    let opts = context.exports_options(&dir_path);

    let (mut status, obj_path) = match cat_name(Some(&dir_path), &args.dirops.name) {
        Ok(obj) => (exports_rw(opts.as_ref()), Some(obj)),
        Err(err) => (join(err, exports_rw(opts.as_ref())), None),
    };

    let mut resok: Option<(nfs3::post_op_fh3, nfs3::post_op_attr)> = None;
    if let (nfs3::nfsstat3::NFS3_OK, Some(obj_path)) = (status, obj_path.as_deref()) {
        match context.backend().mkdir(obj_path, attr::create_mode(&args.attributes)).await {
            Ok(()) => {
                chown_new_object(context, obj_path, opts.as_ref()).await;
                resok = Some((
                    fh::fh_comp_type(context.backend(), obj_path, Some(S_IFDIR)).await,
                    attr::get_post(context, obj_path).await,
                ));
            }
            Err(err) => status = mkdir_err(err),
        }
    }

    let wcc = nfs3::wcc_data { before: pre, after: attr::get_post(context, &dir_path).await };
    xdr::rpc::make_success_reply(xid).serialize(output)?;
    match resok {
        Some((obj, obj_attributes)) => {
            nfs3::nfsstat3::NFS3_OK.serialize(output)?;
            obj.serialize(output)?;
            obj_attributes.serialize(output)?;
            wcc.serialize(output)?;
        }
        None => {
            status.serialize(output)?;
            wcc.serialize(output)?;
        }
    }
    Ok(())
}
