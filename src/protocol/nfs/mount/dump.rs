//! MOUNT DUMP procedure (procedure 2): report the advisory mount table.

use std::io::Write;

use tracing::debug;

use crate::protocol::rpc;
use crate::protocol::xdr::{self, mount, Serialize};

pub fn mountproc3_dump(
    xid: u32,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    debug!("mountproc3_dump({xid})");

    let list = mount::mountlist(
        context
            .server()
            .mounts()
            .into_iter()
            .map(|entry| mount::mountbody {
                ml_hostname: entry.hostname.into_bytes(),
                ml_directory: entry.directory.into_bytes(),
            })
            .collect(),
    );

    xdr::rpc::make_success_reply(xid).serialize(output)?;
    list.serialize(output)?;
    Ok(())
}
