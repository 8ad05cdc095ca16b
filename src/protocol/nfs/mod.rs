//! Procedure handlers for the two RPC programs this server registers:
//! NFS version 3 (program 100003) and MOUNT version 3 (program 100005).

pub mod mount;
pub mod v3;
