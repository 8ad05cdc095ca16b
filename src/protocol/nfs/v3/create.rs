//! CREATE procedure (procedure 8, RFC 1813 section 3.3.8).
//!
//! UNCHECKED creates or truncates, GUARDED creates exclusively, EXCLUSIVE
//! creates exclusively but stays idempotent across retries: the client's
//! 8-byte verifier is stored in the new file's atime/mtime, and a later
//! EEXIST is forgiven when the stored verifier matches.

use std::io::{Read, Write};

use tracing::{debug, error};

use super::{cat_name, chown_new_object, join};
use crate::attr;
use crate::backend::{FsError, FsStat};
use crate::errors::create_err;
use crate::exports::exports_rw;
use crate::fh;
use crate::protocol::rpc;
use crate::protocol::xdr::nfs3::file::createhow3;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

fn verifier_times(verf: &nfs3::createverf3) -> (i64, i64) {
    let atime = u32::from_le_bytes(verf[0..4].try_into().expect("verifier is 8 bytes"));
    let mtime = u32::from_le_bytes(verf[4..8].try_into().expect("verifier is 8 bytes"));
    (i64::from(atime), i64::from(mtime))
}

/// A retried EXCLUSIVE create matches iff the stored atime/mtime equal the
/// verifier halves.
fn check_create_verifier(stat: &FsStat, verf: &nfs3::createverf3) -> bool {
    let (atime, mtime) = verifier_times(verf);
    stat.atime == atime && stat.mtime == mtime
}

async fn store_create_verifier(
    ctx: &rpc::Context,
    path: &str,
    verf: &nfs3::createverf3,
) -> Result<(), FsError> {
    let (atime, mtime) = verifier_times(verf);
    ctx.backend().set_times(path, atime, mtime).await
}

pub async fn nfsproc3_create(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let args = deserialize::<nfs3::file::CREATE3args>(input)?;
    debug!("nfsproc3_create({xid}, {args:?})");

    let Some(dir_path) = fh::fh_decomp(context.backend(), &args.where_dir.dir).await else {
        xdr::rpc::make_success_reply(xid).serialize(output)?;
        nfs3::nfsstat3::NFS3ERR_STALE.serialize(output)?;
        nfs3::wcc_data::default().serialize(output)?;
        return Ok(());
    };

    let pre = attr::get_pre(context, &dir_path).await;
    let opts = context.exports_options(&dir_path);

    let (mut status, obj_path) = match cat_name(Some(&dir_path), &args.where_dir.name) {
        Ok(obj) => (exports_rw(opts.as_ref()), Some(obj)),
        Err(err) => (join(err, exports_rw(opts.as_ref())), None),
    };

    // GUARDED and EXCLUSIVE both map to an exclusive create.
    let excl = !matches!(args.how, createhow3::UNCHECKED(_));
    let new_mode = match &args.how {
        createhow3::UNCHECKED(attrs) | createhow3::GUARDED(attrs) => attr::create_mode(attrs),
        createhow3::EXCLUSIVE(_) => attr::create_mode(&nfs3::sattr3::default()),
    };

    let mut resok: Option<(nfs3::post_op_fh3, nfs3::post_op_attr)> = None;
    if let (nfs3::nfsstat3::NFS3_OK, Some(obj_path)) = (status, obj_path.as_deref()) {
        match context.backend().open_create(obj_path, excl, new_mode).await {
            Ok(()) => match context.backend().lstat(obj_path).await {
                Ok(stat) => {
                    chown_new_object(context, obj_path, opts.as_ref()).await;
                    if let createhow3::EXCLUSIVE(verf) = &args.how {
                        if let Err(err) = store_create_verifier(context, obj_path, verf).await {
                            error!("storing create verifier on {obj_path} failed: {err:?}");
                        }
                    }
                    resok = Some((
                        fh::fh_comp_post(stat.ino, obj_path),
                        attr::get_post(context, obj_path).await,
                    ));
                }
                Err(FsError::NotFound) => status = nfs3::nfsstat3::NFS3ERR_NOENT,
                Err(_) => status = nfs3::nfsstat3::NFS3ERR_IO,
            },
            Err(FsError::Exists) if matches!(args.how, createhow3::EXCLUSIVE(_)) => {
                let createhow3::EXCLUSIVE(verf) = &args.how else { unreachable!() };
                match context.backend().lstat(obj_path).await {
                    Ok(stat) if check_create_verifier(&stat, verf) => {
                        // Same verifier: this is our own earlier create, retried.
                        resok = Some((
                            fh::fh_comp_post(stat.ino, obj_path),
                            attr::get_post_buf(&stat, context.config().readable_executables),
                        ));
                    }
                    Ok(_) => status = nfs3::nfsstat3::NFS3ERR_EXIST,
                    Err(err) => status = create_err(err),
                }
            }
            Err(err) => status = create_err(err),
        }
    }

    let wcc = nfs3::wcc_data { before: pre, after: attr::get_post(context, &dir_path).await };
    xdr::rpc::make_success_reply(xid).serialize(output)?;
    match resok {
        Some((obj, obj_attributes)) => {
            nfs3::nfsstat3::NFS3_OK.serialize(output)?;
            obj.serialize(output)?;
            obj_attributes.serialize(output)?;
            wcc.serialize(output)?;
        }
        None => {
            status.serialize(output)?;
            wcc.serialize(output)?;
        }
    }
    Ok(())
}
