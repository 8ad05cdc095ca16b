//! FSSTAT procedure (procedure 18, RFC 1813 section 3.3.18).
//!
//! On a removable export whose media is absent, statvfs fails; the reply is
//! then all zeros rather than an error so clients keep the mount alive.

use std::io::{Read, Write};

use tracing::debug;

use crate::attr;
use crate::exports::OPT_REMOVABLE;
use crate::fh;
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

pub async fn nfsproc3_fsstat(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let handle = deserialize::<nfs3::nfs_fh3>(input)?;
    debug!("nfsproc3_fsstat({xid}, {handle:?})");

    let Some(path) = fh::fh_decomp(context.backend(), &handle).await else {
        xdr::rpc::make_success_reply(xid).serialize(output)?;
        nfs3::nfsstat3::NFS3ERR_STALE.serialize(output)?;
        nfs3::post_op_attr::Void.serialize(output)?;
        return Ok(());
    };

    let obj_attributes = attr::get_post(context, &path).await;

    match context.backend().statvfs(&path).await {
        Ok(vfs) => {
            let resok = nfs3::fs::FSSTAT3resok {
                obj_attributes,
                tbytes: vfs.blocks * vfs.frsize,
                fbytes: vfs.bfree * vfs.frsize,
                abytes: vfs.bavail * vfs.frsize,
                tfiles: vfs.files,
                ffiles: vfs.ffree,
                afiles: vfs.ffree,
                invarsec: 0,
            };
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfs3::nfsstat3::NFS3_OK.serialize(output)?;
            resok.serialize(output)?;
        }
        Err(err) => {
            let opts = context.exports_options(&path);
            let removable = opts
                .as_ref()
                .map(|o| o.options & OPT_REMOVABLE != 0)
                .unwrap_or(false);
            let exports = context.server().exports();
            if removable && exports.export_point(&path) {
                // Media not inserted; report an empty filesystem.
                let resok = nfs3::fs::FSSTAT3resok { obj_attributes, ..Default::default() };
                xdr::rpc::make_success_reply(xid).serialize(output)?;
                nfs3::nfsstat3::NFS3_OK.serialize(output)?;
                resok.serialize(output)?;
            } else {
                debug!("statvfs of {path} failed: {err:?}");
                xdr::rpc::make_success_reply(xid).serialize(output)?;
                nfs3::nfsstat3::NFS3ERR_IO.serialize(output)?;
                obj_attributes.serialize(output)?;
            }
        }
    }
    Ok(())
}
