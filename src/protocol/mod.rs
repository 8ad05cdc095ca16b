//! Protocol implementation: XDR serialization, RPC dispatch, and the NFS3
//! and MOUNT3 procedure handlers.

pub mod nfs;
pub mod rpc;
pub mod xdr;
