//! MOUNT UMNTALL procedure (procedure 4): drop every registration of the
//! calling host.

use std::io::Write;

use tracing::debug;

use crate::protocol::rpc;
use crate::protocol::xdr::{self, Serialize};

pub async fn mountproc3_umnt_all(
    xid: u32,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    debug!("mountproc3_umnt_all({xid}, {})", context.client_host());

    context.server().remove_mounts_for_host(&context.client_host());
    xdr::rpc::make_success_reply(xid).serialize(output)?;
    Ok(())
}
