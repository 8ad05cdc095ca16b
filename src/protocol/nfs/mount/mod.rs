//! MOUNT version 3 procedure handlers (RFC 1813 Appendix I).
//!
//! MNT validates the requested path against the export table and hands out
//! the directory filehandle; DUMP/UMNT/UMNTALL maintain the advisory mount
//! table; EXPORT lists the export table in the protocol's own format.

use std::io::{Read, Write};

use num_traits::cast::FromPrimitive;

use crate::protocol::rpc;
use crate::protocol::xdr::{self, mount, Serialize};

mod dump;
mod export;
mod mnt;
mod null;
mod umnt;
mod umnt_all;

use dump::mountproc3_dump;
use export::mountproc3_export;
use mnt::mountproc3_mnt;
use null::mountproc3_null;
use umnt::mountproc3_umnt;
use umnt_all::mountproc3_umnt_all;

/// Routes a MOUNT call to its procedure handler.
pub async fn handle_mount(
    xid: u32,
    call: xdr::rpc::call_body,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let proc = mount::MountProgram::from_u32(call.proc).unwrap_or(mount::MountProgram::INVALID);

    match proc {
        mount::MountProgram::MOUNTPROC3_NULL => mountproc3_null(xid, output)?,
        mount::MountProgram::MOUNTPROC3_MNT => {
            mountproc3_mnt(xid, call.vers, input, output, context).await?
        }
        mount::MountProgram::MOUNTPROC3_DUMP => mountproc3_dump(xid, output, context)?,
        mount::MountProgram::MOUNTPROC3_UMNT => {
            mountproc3_umnt(xid, input, output, context).await?
        }
        mount::MountProgram::MOUNTPROC3_UMNTALL => {
            mountproc3_umnt_all(xid, output, context).await?
        }
        mount::MountProgram::MOUNTPROC3_EXPORT => mountproc3_export(xid, output, context)?,
        mount::MountProgram::INVALID => {
            xdr::rpc::proc_unavail_reply_message(xid).serialize(output)?;
        }
    }
    Ok(())
}
