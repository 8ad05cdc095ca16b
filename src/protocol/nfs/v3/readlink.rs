//! READLINK procedure (procedure 5, RFC 1813 section 3.3.5): read a symbolic
//! link's target.

use std::io::{Read, Write};

use tracing::debug;

use crate::attr;
use crate::errors::readlink_err;
use crate::fh;
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

pub async fn nfsproc3_readlink(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let handle = deserialize::<nfs3::nfs_fh3>(input)?;
    debug!("nfsproc3_readlink({xid}, {handle:?})");

    let Some(path) = fh::fh_decomp(context.backend(), &handle).await else {
        xdr::rpc::make_success_reply(xid).serialize(output)?;
        nfs3::nfsstat3::NFS3ERR_STALE.serialize(output)?;
        nfs3::post_op_attr::Void.serialize(output)?;
        return Ok(());
    };

    let symlink_attributes = attr::get_post(context, &path).await;
    match context.backend().readlink(&path).await {
        Ok(mut target) => {
            target.truncate(nfs3::NFS_MAXPATHLEN - 1);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfs3::nfsstat3::NFS3_OK.serialize(output)?;
            symlink_attributes.serialize(output)?;
            nfs3::nfspath3::from(target).serialize(output)?;
        }
        Err(err) => {
            let status = readlink_err(err);
            debug!("readlink of {path} failed: {status:?}");
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            status.serialize(output)?;
            symlink_attributes.serialize(output)?;
        }
    }
    Ok(())
}
