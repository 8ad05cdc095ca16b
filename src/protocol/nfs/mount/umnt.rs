//! MOUNT UMNT procedure (procedure 3): drop this host's registration of one
//! directory.

use std::io::{Read, Write};

use tracing::debug;

use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, mount, Serialize};

pub async fn mountproc3_umnt(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let raw_path = deserialize::<mount::dirpath>(input)?;
    let directory = String::from_utf8_lossy(&raw_path).into_owned();
    debug!("mountproc3_umnt({xid}, {directory:?})");

    context.server().remove_mount(&context.client_host(), &directory);
    xdr::rpc::make_success_reply(xid).serialize(output)?;
    Ok(())
}
