//! READ procedure (procedure 6, RFC 1813 section 3.3.6).
//!
//! EOF is detected by asking the backend for one byte more than the client
//! wanted: getting fewer than `count + 1` bytes back means the file ended
//! within the request.

use std::io::{Read, Write};

use tracing::{debug, error};

use super::is_reg;
use crate::attr;
use crate::errors::read_err;
use crate::fh;
use crate::backend::OpenMode;
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

pub async fn nfsproc3_read(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let args = deserialize::<nfs3::file::READ3args>(input)?;
    debug!("nfsproc3_read({xid}, {:?}, offset {}, count {})", args.file, args.offset, args.count);

    let Some(path) = fh::fh_decomp(context.backend(), &args.file).await else {
        xdr::rpc::make_success_reply(xid).serialize(output)?;
        nfs3::nfsstat3::NFS3ERR_STALE.serialize(output)?;
        nfs3::post_op_attr::Void.serialize(output)?;
        return Ok(());
    };

    let count = args.count.min(context.max_data());
    let mut status = is_reg(context, &path).await;
    let mut resok: Option<nfs3::file::READ3resok> = None;

    if status == nfs3::nfsstat3::NFS3_OK {
        match context.backend().open(&path, OpenMode::Read).await {
            Ok(()) => match context.backend().pread(&path, count + 1, args.offset).await {
                Ok(mut data) => {
                    let eof = data.len() <= count as usize;
                    data.truncate(count as usize);
                    resok = Some(nfs3::file::READ3resok {
                        file_attributes: nfs3::post_op_attr::Void,
                        count: data.len() as u32,
                        eof,
                        data,
                    });
                }
                Err(err) => {
                    error!("read of {path} failed: {err:?}");
                    status = read_err(err);
                }
            },
            Err(err) => status = read_err(err),
        }
    }

    let file_attributes = attr::get_post(context, &path).await;
    xdr::rpc::make_success_reply(xid).serialize(output)?;
    status.serialize(output)?;
    match resok {
        Some(mut resok) => {
            resok.file_attributes = file_attributes;
            debug!("{xid} --> count {}, eof {}", resok.count, resok.eof);
            resok.serialize(output)?;
        }
        None => file_attributes.serialize(output)?,
    }
    Ok(())
}
