//! COMMIT procedure (procedure 21, RFC 1813 section 3.3.21).
//!
//! WRITE already forces data to stable storage, so COMMIT only re-syncs and
//! hands back the same process-stable verifier the WRITE replies carried.

use std::io::{Read, Write};

use tracing::debug;

use super::{is_reg, join};
use crate::attr;
use crate::errors::nfs_error;
use crate::exports::exports_rw;
use crate::fh;
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

pub async fn nfsproc3_commit(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let args = deserialize::<nfs3::file::COMMIT3args>(input)?;
    debug!("nfsproc3_commit({xid}, {:?}, offset {}, count {})", args.file, args.offset, args.count);

    let Some(path) = fh::fh_decomp(context.backend(), &args.file).await else {
        xdr::rpc::make_success_reply(xid).serialize(output)?;
        nfs3::nfsstat3::NFS3ERR_STALE.serialize(output)?;
        nfs3::wcc_data::default().serialize(output)?;
        return Ok(());
    };

    let pre = attr::get_pre(context, &path).await;
    let opts = context.exports_options(&path);
    let mut status = join(is_reg(context, &path).await, exports_rw(opts.as_ref()));

    let mut after = nfs3::post_op_attr::Void;
    if status == nfs3::nfsstat3::NFS3_OK {
        match context.backend().sync(&path).await {
            Ok(stat) => {
                after = attr::get_post_buf(&stat, context.config().readable_executables);
            }
            Err(err) => status = nfs_error(err),
        }
    }
    if matches!(after, nfs3::post_op_attr::Void) {
        after = attr::get_post(context, &path).await;
    }

    let wcc = nfs3::wcc_data { before: pre, after };
    xdr::rpc::make_success_reply(xid).serialize(output)?;
    status.serialize(output)?;
    if status == nfs3::nfsstat3::NFS3_OK {
        let resok =
            nfs3::file::COMMIT3resok { file_wcc: wcc, verf: context.server().write_verf() };
        resok.serialize(output)?;
    } else {
        wcc.serialize(output)?;
    }
    Ok(())
}
