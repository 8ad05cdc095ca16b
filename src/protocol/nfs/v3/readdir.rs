//! READDIR procedure (procedure 16, RFC 1813 section 3.3.16). The actual
//! enumeration, cookie handling, and byte accounting live in the `readdir`
//! engine module; this handler is wire glue.

use std::io::{Read, Write};

use tracing::debug;

use crate::attr;
use crate::fh;
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};
use crate::readdir;

pub async fn nfsproc3_readdir(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let args = deserialize::<nfs3::dir::READDIR3args>(input)?;
    debug!("nfsproc3_readdir({xid}, {:?}, cookie {})", args.dir, args.cookie);

    let Some(path) = fh::fh_decomp(context.backend(), &args.dir).await else {
        xdr::rpc::make_success_reply(xid).serialize(output)?;
        nfs3::nfsstat3::NFS3ERR_STALE.serialize(output)?;
        nfs3::post_op_attr::Void.serialize(output)?;
        return Ok(());
    };

    let dir_attributes = attr::get_post(context, &path).await;

    match readdir::read_dir(context, &path, args.cookie, args.cookieverf, args.count).await {
        Ok(reply) => {
            debug!("{xid} --> {} entries, eof {}", reply.entries.len(), reply.eof);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfs3::nfsstat3::NFS3_OK.serialize(output)?;
            dir_attributes.serialize(output)?;
            reply.cookieverf.serialize(output)?;
            for entry in &reply.entries {
                true.serialize(output)?;
                entry.serialize(output)?;
            }
            false.serialize(output)?;
            reply.eof.serialize(output)?;
        }
        Err(status) => {
            debug!("readdir of {path} failed: {status:?}");
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            status.serialize(output)?;
            dir_attributes.serialize(output)?;
        }
    }
    Ok(())
}
