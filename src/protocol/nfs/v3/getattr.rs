//! GETATTR procedure (procedure 1, RFC 1813 section 3.3.1): fetch the
//! attributes of the object a filehandle names.

use std::io::{Read, Write};

use tracing::{debug, error};

use crate::attr;
use crate::fh;
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

pub async fn nfsproc3_getattr(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let handle = deserialize::<nfs3::nfs_fh3>(input)?;
    debug!("nfsproc3_getattr({xid}, {handle:?})");

    let Some(path) = fh::fh_decomp(context.backend(), &handle).await else {
        xdr::rpc::make_success_reply(xid).serialize(output)?;
        nfs3::nfsstat3::NFS3ERR_STALE.serialize(output)?;
        return Ok(());
    };

    // A failed stat means the handle no longer names a live object. The
    // GETATTR3res error arm carries nothing.
    match context.backend().lstat(&path).await {
        Ok(stat) => {
            let attrs = attr::fattr_of(&stat, context.config().readable_executables);
            debug!("{xid} --> {attrs:?}");
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfs3::nfsstat3::NFS3_OK.serialize(output)?;
            attrs.serialize(output)?;
        }
        Err(err) => {
            error!("nfsproc3_getattr error {xid} --> {err:?}");
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfs3::nfsstat3::NFS3ERR_STALE.serialize(output)?;
        }
    }
    Ok(())
}
