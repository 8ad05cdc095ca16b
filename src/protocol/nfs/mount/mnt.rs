//! MOUNT MNT procedure (procedure 1, RFC 1813 Appendix I.4.2): validate a
//! mount request and hand out the directory filehandle.

use std::io::{Read, Write};

use tracing::{debug, warn};

use crate::attr::S_IFDIR;
use crate::backend::FsError;
use crate::exports::OPT_INSECURE;
use crate::fh;
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, mount, nfs3, Serialize};

async fn mnt_status(
    context: &rpc::Context,
    vers: u32,
    requested: &str,
) -> Result<(String, nfs3::nfs_fh3), mount::mountstat3> {
    if vers != mount::VERSION {
        warn!("{} attempted mount with protocol version {vers}", context.client_host());
        return Err(mount::mountstat3::MNT3ERR_INVAL);
    }

    let path = match context.backend().realpath(requested).await {
        Ok(path) => path,
        Err(FsError::NotFound) => return Err(mount::mountstat3::MNT3ERR_NOENT),
        Err(err) => {
            debug!("realpath of {requested} failed: {err:?}");
            return Err(mount::mountstat3::MNT3ERR_NOENT);
        }
    };

    if path.len() + 1 > nfs3::NFS_MAXPATHLEN {
        warn!("{} attempted to mount jumbo path", context.client_host());
        return Err(mount::mountstat3::MNT3ERR_NAMETOOLONG);
    }

    let Some(opts) = context.exports_options(&path) else {
        debug!("{path} not exported to {}", context.client_host());
        return Err(mount::mountstat3::MNT3ERR_ACCES);
    };

    // Unless the export is marked insecure, mounts must come from a
    // privileged source port.
    if opts.options & OPT_INSECURE == 0 && context.client_addr.port() >= 1024 {
        warn!(
            "{} attempted mount from unprivileged port {}",
            context.client_host(),
            context.client_addr.port()
        );
        return Err(mount::mountstat3::MNT3ERR_ACCES);
    }

    if !context.backend().accept_mount(context.client_addr.ip(), &path).await {
        debug!("{path} mount vetoed by backend for {}", context.client_host());
        return Err(mount::mountstat3::MNT3ERR_ACCES);
    }

    match fh::fh_comp_type(context.backend(), &path, Some(S_IFDIR)).await {
        nfs3::post_op_fh3::handle(handle) => Ok((path, handle)),
        nfs3::post_op_fh3::Void => {
            warn!("{} attempted to mount non-directory {path}", context.client_host());
            Err(mount::mountstat3::MNT3ERR_NOTDIR)
        }
    }
}

pub async fn mountproc3_mnt(
    xid: u32,
    vers: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let raw_path = deserialize::<mount::dirpath>(input)?;
    let requested = String::from_utf8_lossy(&raw_path).into_owned();
    debug!("mountproc3_mnt({xid}, {requested:?})");

    match mnt_status(context, vers, &requested).await {
        Ok((path, handle)) => {
            // The table records the path as the client asked for it.
            context.server().add_mount(&context.client_host(), &requested);
            let response = mount::mountres3_ok {
                fhandle: handle.data,
                auth_flavors: vec![xdr::rpc::auth_flavor::AUTH_UNIX as u32],
            };
            debug!("{xid} --> mounted {path}");
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            mount::mountstat3::MNT3_OK.serialize(output)?;
            response.serialize(output)?;
        }
        Err(status) => {
            debug!("{xid} --> {status:?}");
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            status.serialize(output)?;
        }
    }
    Ok(())
}
