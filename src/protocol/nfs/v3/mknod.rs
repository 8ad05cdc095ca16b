//! MKNOD procedure (procedure 11, RFC 1813 section 3.3.11): create device
//! nodes, FIFOs, and sockets. Regular files, directories, and symlinks have
//! their own procedures and are rejected here with INVAL.

use std::io::{Read, Write};

use tracing::debug;

use super::{cat_name, chown_new_object, join3};
use crate::attr::{self, S_IFBLK, S_IFCHR};
use crate::errors::mknod_err;
use crate::exports::exports_rw;
use crate::fh;
use crate::protocol::rpc;
use crate::protocol::xdr::nfs3::dir::mknoddata3;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

/// What to actually create, derived from the request payload.
enum NodePlan {
    Device { mode: u32, dev: u64 },
    Fifo { mode: u32 },
    Socket { mode: u32 },
}

/// Validates the MKNOD payload against the target path and extracts the
/// creation parameters. Device numbers pack as `(specdata1 << 8) | specdata2`.
fn mknod_args(what: &mknoddata3, obj_path: &str) -> Result<NodePlan, nfs3::nfsstat3> {
    match what {
        mknoddata3::device(ftype, data) => {
            let type_bits = match ftype {
                nfs3::ftype3::NF3CHR => S_IFCHR,
                nfs3::ftype3::NF3BLK => S_IFBLK,
                _ => return Err(nfs3::nfsstat3::NFS3ERR_INVAL),
            };
            let dev = (u64::from(data.spec.specdata1) << 8) | u64::from(data.spec.specdata2);
            Ok(NodePlan::Device {
                mode: attr::create_mode(&data.dev_attributes) | type_bits,
                dev,
            })
        }
        mknoddata3::pipe(nfs3::ftype3::NF3SOCK, attrs) => {
            if obj_path.len() + 1 > nfs3::UNIX_PATH_MAX {
                return Err(nfs3::nfsstat3::NFS3ERR_NAMETOOLONG);
            }
            Ok(NodePlan::Socket { mode: attr::create_mode(attrs) })
        }
        mknoddata3::pipe(nfs3::ftype3::NF3FIFO, attrs) => {
            Ok(NodePlan::Fifo { mode: attr::create_mode(attrs) })
        }
        _ => Err(nfs3::nfsstat3::NFS3ERR_INVAL),
    }
}

pub async fn nfsproc3_mknod(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let args = deserialize::<nfs3::dir::MKNOD3args>(input)?;
    debug!("nfsproc3_mknod({xid}, {args:?})");

    let Some(dir_path) = fh::fh_decomp(context.backend(), &args.where_dir.dir).await else {
        xdr::rpc::make_success_reply(xid).serialize(output)?;
        nfs3::nfsstat3::NFS3ERR_STALE.serialize(output)?;
        nfs3::wcc_data::default().serialize(output)?;
        return Ok(());
    };

    let pre = attr::get_pre(context, &dir_path).await;
    let opts = context.exports_options(&dir_path);

    let (name_status, obj_path) = match cat_name(Some(&dir_path), &args.where_dir.name) {
        Ok(obj) => (nfs3::nfsstat3::NFS3_OK, Some(obj)),
        Err(err) => (err, None),
    };
    let plan = obj_path.as_deref().map(|obj| mknod_args(&args.what, obj));
    let plan_status = match &plan {
        Some(Err(err)) => *err,
        _ => nfs3::nfsstat3::NFS3_OK,
    };
    let mut status = join3(name_status, plan_status, exports_rw(opts.as_ref()));

    let mut resok: Option<(nfs3::post_op_fh3, nfs3::post_op_attr)> = None;
    if let (nfs3::nfsstat3::NFS3_OK, Some(obj_path), Some(Ok(plan))) =
        (status, obj_path.as_deref(), plan)
    {
        let result = match plan {
            NodePlan::Device { mode, dev } => context.backend().mknod(obj_path, mode, dev).await,
            NodePlan::Fifo { mode } => context.backend().mkfifo(obj_path, mode).await,
            NodePlan::Socket { mode } => context.backend().mksocket(obj_path, mode).await,
        };
        match result {
            Ok(()) => {
                chown_new_object(context, obj_path, opts.as_ref()).await;
                let want = attr::type_to_mode(args.what.ftype());
                resok = Some((
                    fh::fh_comp_type(context.backend(), obj_path, Some(want)).await,
                    attr::get_post(context, obj_path).await,
                ));
            }
            Err(err) => status = mknod_err(err),
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
