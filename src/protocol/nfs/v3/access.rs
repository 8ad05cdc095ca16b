//! ACCESS procedure (procedure 4, RFC 1813 section 3.3.4).
//!
//! The permission model is optimistic: the server advertises broad access
//! and lets the filesystem reject the follow-up operation. Clients that
//! trust ACCESS for caching will re-learn the truth on first use.

use std::io::{Read, Write};

use tracing::debug;

use crate::attr;
use crate::fh;
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

#[derive(Clone, Debug, Default)]
struct ACCESS3args {
    object: nfs3::nfs_fh3,
    access: u32,
}
crate::DeserializeStruct!(ACCESS3args, object, access);

pub async fn nfsproc3_access(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let args = deserialize::<ACCESS3args>(input)?;
    debug!("nfsproc3_access({xid}, {:?}, {:#x})", args.object, args.access);

    let Some(path) = fh::fh_decomp(context.backend(), &args.object).await else {
        xdr::rpc::make_success_reply(xid).serialize(output)?;
        nfs3::nfsstat3::NFS3ERR_STALE.serialize(output)?;
        nfs3::post_op_attr::Void.serialize(output)?;
        return Ok(());
    };

    let post = attr::get_post(context, &path).await;

    let mut access =
        nfs3::ACCESS3_READ | nfs3::ACCESS3_MODIFY | nfs3::ACCESS3_EXTEND | nfs3::ACCESS3_EXECUTE;

    if let nfs3::post_op_attr::attributes(attrs) = &post {
        if attrs.ftype == nfs3::ftype3::NF3DIR {
            if access & (nfs3::ACCESS3_READ | nfs3::ACCESS3_EXECUTE) != 0 {
                access |= nfs3::ACCESS3_LOOKUP;
            }
            if access & nfs3::ACCESS3_MODIFY != 0 {
                access |= nfs3::ACCESS3_DELETE;
            }
            access &= !nfs3::ACCESS3_EXECUTE;
        }
    }

    debug!("{xid} --> {access:#x}");
    xdr::rpc::make_success_reply(xid).serialize(output)?;
    nfs3::nfsstat3::NFS3_OK.serialize(output)?;
    post.serialize(output)?;
    access.serialize(output)?;
    Ok(())
}
