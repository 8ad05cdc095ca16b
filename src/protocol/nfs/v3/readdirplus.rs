//! READDIRPLUS procedure (procedure 17, RFC 1813 section 3.3.17).
//!
//! Not supported: READDIRPLUS wants filehandle+attribute batches produced
//! atomically with the enumeration, which a user-space server cannot do
//! without races. Clients fall back to READDIR + LOOKUP.

use std::io::{Read, Write};

use tracing::debug;

use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

pub async fn nfsproc3_readdirplus(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    _context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let args = deserialize::<nfs3::dir::READDIRPLUS3args>(input)?;
    debug!("nfsproc3_readdirplus({xid}, {:?}) --> NOTSUPP", args.dir);

    xdr::rpc::make_success_reply(xid).serialize(output)?;
    nfs3::nfsstat3::NFS3ERR_NOTSUPP.serialize(output)?;
    nfs3::post_op_attr::Void.serialize(output)?;
    Ok(())
}
