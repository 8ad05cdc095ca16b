//! PATHCONF procedure (procedure 20, RFC 1813 section 3.3.20): POSIX
//! pathname limits and case behaviour.

use std::io::{Read, Write};

use tracing::debug;

use crate::attr;
use crate::fh;
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

pub async fn nfsproc3_pathconf(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let handle = deserialize::<nfs3::nfs_fh3>(input)?;
    debug!("nfsproc3_pathconf({xid}, {handle:?})");

    let Some(path) = fh::fh_decomp(context.backend(), &handle).await else {
        xdr::rpc::make_success_reply(xid).serialize(output)?;
        nfs3::nfsstat3::NFS3ERR_STALE.serialize(output)?;
        nfs3::post_op_attr::Void.serialize(output)?;
        return Ok(());
    };

    let resok = nfs3::fs::PATHCONF3resok {
        obj_attributes: attr::get_post(context, &path).await,
        linkmax: u32::MAX,
        name_max: nfs3::NFS_MAXPATHLEN as u32,
        no_trunc: true,
        chown_restricted: false,
        case_insensitive: false,
        case_preserving: true,
    };

    xdr::rpc::make_success_reply(xid).serialize(output)?;
    nfs3::nfsstat3::NFS3_OK.serialize(output)?;
    resok.serialize(output)?;
    Ok(())
}
