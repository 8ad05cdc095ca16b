//! FSINFO procedure (procedure 19, RFC 1813 section 3.3.19): static
//! filesystem capabilities. Transfer caps depend on the carrying transport.

use std::io::{Read, Write};

use tracing::debug;

use crate::attr;
use crate::fh;
use crate::protocol::rpc;
use crate::protocol::xdr::nfs3::fs::{FSF_CANSETTIME, FSF_HOMOGENEOUS, FSF_LINK, FSF_SYMLINK};
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

pub async fn nfsproc3_fsinfo(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let handle = deserialize::<nfs3::nfs_fh3>(input)?;
    debug!("nfsproc3_fsinfo({xid}, {handle:?})");

    let Some(path) = fh::fh_decomp(context.backend(), &handle).await else {
        xdr::rpc::make_success_reply(xid).serialize(output)?;
        nfs3::nfsstat3::NFS3ERR_STALE.serialize(output)?;
        nfs3::post_op_attr::Void.serialize(output)?;
        return Ok(());
    };

    let maxdata = context.max_data();
    let resok = nfs3::fs::FSINFO3resok {
        obj_attributes: attr::get_post(context, &path).await,
        rtmax: maxdata,
        rtpref: maxdata,
        rtmult: 4096,
        wtmax: maxdata,
        wtpref: maxdata,
        wtmult: 4096,
        dtpref: 4096,
        maxfilesize: u64::MAX,
        time_delta: nfs3::nfstime3 { seconds: 1, nseconds: 0 },
        properties: FSF_LINK | FSF_SYMLINK | FSF_HOMOGENEOUS | FSF_CANSETTIME,
    };

    debug!("{xid} --> {resok:?}");
    xdr::rpc::make_success_reply(xid).serialize(output)?;
    nfs3::nfsstat3::NFS3_OK.serialize(output)?;
    resok.serialize(output)?;
    Ok(())
}
