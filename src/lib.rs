//! nfs-subtree - a user-space NFS version 3 server for a local directory
//! subtree.
//!
//! The server speaks the NFS version 3 protocol (RFC 1813) and its companion
//! MOUNT version 3 protocol over ONC-RPC (RFC 5531), on both TCP and UDP.
//! Filehandles are path-based: short paths travel inside the opaque handle
//! itself, so the server keeps no per-client state beyond the advisory mount
//! table.
//!
//! ## Main components
//!
//! - `backend`: the [`backend::FSBackend`] capability the protocol engine is
//!   written against, plus the local-directory [`backend::PosixBackend`].
//! - `fh`: the filehandle codec (compose, validate, resolve).
//! - `attr`: stat-to-`fattr3` translation and SETATTR application.
//! - `exports`: exports parsing, client matching, and squash policy.
//! - `readdir`: cookie-based directory enumeration with byte budgets.
//! - `server`: shared state (exports generation, mount table, verifiers).
//! - `protocol`: XDR types, RPC dispatch, and the NFS3/MOUNT3 handlers.
//! - `tcp`, `udp`: the two transports.
//!
//! ## Standards
//!
//! - RFC 1813: NFS Version 3 Protocol Specification
//! - RFC 5531: RPC: Remote Procedure Call Protocol Specification Version 2
//! - RFC 4506: XDR: External Data Representation Standard

pub mod attr;
pub mod backend;
pub mod errors;
pub mod exports;
pub mod fh;
pub mod protocol;
pub mod readdir;
pub mod server;
pub mod tcp;
pub mod udp;

pub use protocol::xdr;
