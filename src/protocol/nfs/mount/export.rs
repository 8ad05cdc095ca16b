//! MOUNT EXPORT procedure (procedure 5): list the export table.

use std::io::Write;

use tracing::debug;

use crate::protocol::rpc;
use crate::protocol::xdr::{self, Serialize};

pub fn mountproc3_export(
    xid: u32,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    debug!("mountproc3_export({xid})");

    let exports = context.server().exports().to_mount_exports();
    xdr::rpc::make_success_reply(xid).serialize(output)?;
    exports.serialize(output)?;
    Ok(())
}
