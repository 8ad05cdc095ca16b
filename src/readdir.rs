//! Directory enumeration with size-bounded replies and index cookies.
//!
//! A cookie is the number of entries already consumed from the listing; the
//! cookie verifier carries the directory generation it was minted under.
//! Mutating procedures bump the generation (`Server::change_readdir_cookie`),
//! so a client resuming with a pre-mutation cookie gets `NFS3ERR_BAD_COOKIE`
//! and restarts cleanly instead of silently skipping or repeating entries.

use crate::errors::nfs_error;
use crate::exports::fnv1a_32;
use crate::protocol::rpc::Context;
use crate::protocol::xdr::nfs3::dir::entry3;
use crate::protocol::xdr::nfs3::{cookie3, cookieverf3, nfsstat3};

/// Maximum entries in one reply: 4096 divided by the minimum entry size.
pub const MAX_ENTRIES: usize = 170;

/// Encoded READDIR3resok overhead: 88 bytes of attributes, 8 bytes of
/// verifier, 4 bytes of value_follows, 4 bytes of eof.
pub const RESOK_SIZE: u32 = 104;

/// Encoded entry3 overhead: 8 bytes fileid, 4 bytes name length, 8 bytes
/// cookie, 4 bytes value_follows.
pub const ENTRY_SIZE: u32 = 24;

/// Hard cap on the byte budget a client may request.
const MAX_COUNT: u32 = 4096;

/// XDR-padded size of a name.
fn name_size(name: &str) -> u32 {
    ((name.len() as u32 + 3) / 4) * 4
}

/// Result of one enumeration step.
#[derive(Debug)]
pub struct ReadDirReply {
    pub entries: Vec<entry3>,
    pub eof: bool,
    pub cookieverf: cookieverf3,
}

/// Enumerates `path` from `cookie`, packing entries while the byte budget
/// allows. `eof` is true iff the listing was exhausted.
pub async fn read_dir(
    ctx: &Context,
    path: &str,
    cookie: cookie3,
    cookieverf: cookieverf3,
    count: u32,
) -> Result<ReadDirReply, nfsstat3> {
    let generation = ctx.server().readdir_cookie_generation();
    if cookie != 0 && u64::from_le_bytes(cookieverf) != generation {
        return Err(nfsstat3::NFS3ERR_BAD_COOKIE);
    }

    let count = count.min(MAX_COUNT);
    let names = ctx.backend().read_dir(path).await.map_err(nfs_error)?;

    let mut entries = Vec::new();
    let mut used = RESOK_SIZE;
    let mut eof = true;

    for (index, name) in names.iter().enumerate().skip(cookie as usize) {
        let cost = ENTRY_SIZE + name_size(name);
        if entries.len() >= MAX_ENTRIES || used + cost > count {
            eof = false;
            break;
        }

        // Entries that vanish mid-listing are dropped; the cookie keeps its
        // position in the name order.
        let child = join(path, name);
        let Ok(stat) = ctx.backend().lstat(&child).await else {
            continue;
        };

        used += cost;
        entries.push(entry3 {
            fileid: stat.ino,
            name: name.as_str().into(),
            cookie: (index + 1) as cookie3,
        });
    }

    Ok(ReadDirReply { entries, eof, cookieverf: generation.to_le_bytes() })
}

fn join(dir: &str, name: &str) -> String {
    if dir == "/" {
        format!("/{name}")
    } else {
        format!("{dir}/{name}")
    }
}

/// FNV1a-32 over the concatenated entry names; the mount/fsstat layer uses
/// this to notice content changes on removable media.
pub async fn directory_hash(ctx: &Context, path: &str) -> u32 {
    let Ok(names) = ctx.backend().read_dir(path).await else {
        return 0;
    };
    let mut hval = 0;
    for name in &names {
        hval = fnv1a_32(name.as_bytes(), hval);
    }
    hval
}
