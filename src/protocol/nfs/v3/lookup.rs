//! LOOKUP procedure (procedure 3, RFC 1813 section 3.3.3): translate a name
//! within a directory into a filehandle.

use std::io::{Read, Write};

use tracing::debug;

use super::cat_name;
use crate::attr;
use crate::backend::FsError;
use crate::errors::lookup_err;
use crate::fh;
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

pub async fn nfsproc3_lookup(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let args = deserialize::<nfs3::diropargs3>(input)?;
    debug!("nfsproc3_lookup({xid}, {args:?})");

    let dir_path = fh::fh_decomp(context.backend(), &args.dir).await;

    match cat_name(dir_path.as_deref(), &args.name) {
        Ok(obj_path) => match context.backend().lstat(&obj_path).await {
            Ok(stat) => {
                let object = fh::fh_comp(stat.ino, &obj_path);
                let obj_attributes =
                    attr::get_post_buf(&stat, context.config().readable_executables);
                let dir_attributes = match &dir_path {
                    Some(dir) => attr::get_post(context, dir).await,
                    None => nfs3::post_op_attr::Void,
                };
                debug!("{xid} --> {object:?}");
                xdr::rpc::make_success_reply(xid).serialize(output)?;
                nfs3::nfsstat3::NFS3_OK.serialize(output)?;
                object.serialize(output)?;
                obj_attributes.serialize(output)?;
                dir_attributes.serialize(output)?;
            }
            Err(err) => {
                let status = match err {
                    FsError::NotFound => nfs3::nfsstat3::NFS3ERR_NOENT,
                    other => lookup_err(other),
                };
                debug!("lookup of {obj_path} failed: {status:?}");
                xdr::rpc::make_success_reply(xid).serialize(output)?;
                status.serialize(output)?;
                dir_attrs(context, dir_path.as_deref()).await.serialize(output)?;
            }
        },
        Err(status) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            status.serialize(output)?;
            dir_attrs(context, dir_path.as_deref()).await.serialize(output)?;
        }
    }
    Ok(())
}

async fn dir_attrs(context: &rpc::Context, dir_path: Option<&str>) -> nfs3::post_op_attr {
    match dir_path {
        Some(dir) => attr::get_post(context, dir).await,
        None => nfs3::post_op_attr::Void,
    }
}
