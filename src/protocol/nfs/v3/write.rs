//! WRITE procedure (procedure 7, RFC 1813 section 3.3.7).
//!
//! Every write goes to stable storage before the reply, so the result always
//! reports FILE_SYNC regardless of what the client asked for. The verifier
//! is constant for the life of the process; clients compare it against the
//! COMMIT verifier to detect a restart in between.

use std::io::{Read, Write};

use tracing::{debug, error};

use super::{is_reg, join};
use crate::attr;
use crate::backend::OpenMode;
use crate::errors::{write_open_err, write_write_err};
use crate::exports::exports_rw;
use crate::fh;
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

pub async fn nfsproc3_write(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let args = deserialize::<nfs3::file::WRITE3args>(input)?;
    debug!("nfsproc3_write({xid}, {:?}, offset {}, count {})", args.file, args.offset, args.count);

    if args.data.len() != args.count as usize {
        xdr::rpc::garbage_args_reply_message(xid).serialize(output)?;
        return Ok(());
    }

    let Some(path) = fh::fh_decomp(context.backend(), &args.file).await else {
        xdr::rpc::make_success_reply(xid).serialize(output)?;
        nfs3::nfsstat3::NFS3ERR_STALE.serialize(output)?;
        nfs3::wcc_data::default().serialize(output)?;
        return Ok(());
    };

    let pre = attr::get_pre(context, &path).await;
    let opts = context.exports_options(&path);
    let mut status = join(is_reg(context, &path).await, exports_rw(opts.as_ref()));
    let mut written = 0;

    if status == nfs3::nfsstat3::NFS3_OK {
        match context.backend().open(&path, OpenMode::Write).await {
            Ok(()) => match context.backend().pwrite(&path, &args.data, args.offset).await {
                Ok(count) => written = count,
                Err(err) => {
                    error!("write to {path} failed: {err:?}");
                    status = write_write_err(err);
                }
            },
            Err(err) => status = write_open_err(err),
        }
    }

    let wcc = nfs3::wcc_data { before: pre, after: attr::get_post(context, &path).await };
    xdr::rpc::make_success_reply(xid).serialize(output)?;
    status.serialize(output)?;
    if status == nfs3::nfsstat3::NFS3_OK {
        let resok = nfs3::file::WRITE3resok {
            file_wcc: wcc,
            count: written,
            committed: nfs3::file::stable_how::FILE_SYNC,
            verf: context.server().write_verf(),
        };
        debug!("{xid} --> wrote {written}");
        resok.serialize(output)?;
    } else {
        wcc.serialize(output)?;
    }
    Ok(())
}
