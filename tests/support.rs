//! Shared fixtures for the integration tests: a server over a temporary
//! directory plus helpers to call handlers the way the RPC layer does.

#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use num_traits::FromPrimitive;
use tempfile::TempDir;

use nfs_subtree::backend::{FSBackend, PosixBackend};
use nfs_subtree::exports::ExportTable;
use nfs_subtree::protocol::nfs::mount::handle_mount;
use nfs_subtree::protocol::nfs::v3::handle_nfs;
use nfs_subtree::protocol::rpc::{Context, TransactionTracker, Transport};
use nfs_subtree::server::{Server, ServerConfig};
use nfs_subtree::xdr::{self, deserialize, mount, nfs3, Serialize};

/// A server rooted at a fresh temporary directory. Dropping it removes the
/// directory, so keep the fixture alive for the duration of the test.
pub struct TestFs {
    pub server: Arc<Server>,
    pub root: TempDir,
}

/// Builds a server over a tempdir and installs the given exports source.
/// Export paths are virtual: `/` is the tempdir itself.
pub async fn test_fs(exports: &str) -> TestFs {
    let root = tempfile::tempdir().expect("create tempdir");
    let backend = Arc::new(PosixBackend::new(root.path()));
    let server = Arc::new(Server::new(backend, ServerConfig::default()));
    install_exports(&server, exports).await;
    TestFs { server, root }
}

pub async fn install_exports(server: &Arc<Server>, exports: &str) {
    let table = ExportTable::parse(exports, server.backend().as_ref())
        .await
        .expect("parse exports");
    server.install_exports(table);
}

impl TestFs {
    /// Context for a client at `ip`, calling from a privileged source port,
    /// as the TCP transport would build it.
    pub fn context(&self, ip: &str) -> Context {
        self.context_at(&format!("{ip}:1023"))
    }

    /// Context for a client at a full `ip:port` address.
    pub fn context_at(&self, addr: &str) -> Context {
        Context {
            local_port: 2049,
            client_addr: addr.parse().expect("client address"),
            transport: Transport::Tcp,
            auth: xdr::rpc::auth_unix::default(),
            rq_vers: 3,
            server: self.server.clone(),
            transaction_tracker: Arc::new(TransactionTracker::new(Duration::from_secs(60))),
        }
    }
}

fn call_body(prog: u32, vers: u32, proc: u32) -> xdr::rpc::call_body {
    xdr::rpc::call_body {
        rpcvers: 2,
        prog,
        vers,
        proc,
        cred: xdr::rpc::opaque_auth::default(),
        verf: xdr::rpc::opaque_auth::default(),
    }
}

/// Runs one NFS3 procedure through the dispatcher and returns the reply
/// positioned after the RPC header.
pub async fn call_nfs(
    context: &Context,
    proc: nfs3::NFSProgram,
    args: &impl Serialize,
) -> Cursor<Vec<u8>> {
    let mut input = Cursor::new(Vec::new());
    args.serialize(&mut input).expect("serialize args");
    input.set_position(0);

    let mut output = Cursor::new(Vec::new());
    handle_nfs(
        7,
        call_body(nfs3::PROGRAM, nfs3::VERSION, proc as u32),
        &mut input,
        &mut output,
        context,
    )
    .await
    .expect("handle_nfs");

    open_reply(output.into_inner())
}

/// Runs one MOUNT3 procedure through the dispatcher.
pub async fn call_mount(
    context: &Context,
    proc: mount::MountProgram,
    vers: u32,
    args: &impl Serialize,
) -> Cursor<Vec<u8>> {
    let mut input = Cursor::new(Vec::new());
    args.serialize(&mut input).expect("serialize args");
    input.set_position(0);

    let mut output = Cursor::new(Vec::new());
    handle_mount(
        7,
        call_body(mount::PROGRAM, vers, proc as u32),
        &mut input,
        &mut output,
        context,
    )
    .await
    .expect("handle_mount");

    open_reply(output.into_inner())
}

/// Consumes the RPC reply header, leaving the cursor at the procedure
/// result.
pub fn open_reply(bytes: Vec<u8>) -> Cursor<Vec<u8>> {
    let mut cursor = Cursor::new(bytes);
    let msg = deserialize::<xdr::rpc::rpc_msg>(&mut cursor).expect("deserialize rpc reply");
    match msg.body {
        xdr::rpc::rpc_body::REPLY(xdr::rpc::reply_body::MSG_ACCEPTED(reply)) => {
            assert!(matches!(reply.reply_data, xdr::rpc::accept_body::SUCCESS));
        }
        other => panic!("unexpected reply body: {other:?}"),
    }
    cursor
}

pub fn read_nfs_status(cursor: &mut Cursor<Vec<u8>>) -> nfs3::nfsstat3 {
    let raw = deserialize::<u32>(cursor).expect("read status");
    nfs3::nfsstat3::from_u32(raw).expect("valid nfsstat3")
}

pub fn read_mount_status(cursor: &mut Cursor<Vec<u8>>) -> mount::mountstat3 {
    let raw = deserialize::<u32>(cursor).expect("read status");
    mount::mountstat3::from_u32(raw).expect("valid mountstat3")
}

/// LOOKUP helper: returns the object filehandle, panicking on error status.
pub async fn lookup(context: &Context, dir: &nfs3::nfs_fh3, name: &str) -> nfs3::nfs_fh3 {
    let args = nfs3::diropargs3 { dir: dir.clone(), name: name.into() };
    let mut reply = call_nfs(context, nfs3::NFSProgram::NFSPROC3_LOOKUP, &args).await;
    let status = read_nfs_status(&mut reply);
    assert_eq!(status, nfs3::nfsstat3::NFS3_OK, "lookup of {name} failed");
    deserialize::<nfs3::nfs_fh3>(&mut reply).expect("lookup result handle")
}

/// The root filehandle as MNT would hand it out.
pub async fn root_handle(fs: &TestFs) -> nfs3::nfs_fh3 {
    let stat = fs
        .server
        .backend()
        .lstat("/")
        .await
        .expect("stat of export root");
    nfs_subtree::fh::fh_comp(stat.ino, "/")
}
