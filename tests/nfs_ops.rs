//! End-to-end NFS3 procedure behaviour against a real directory tree.

mod support;

use nfs_subtree::xdr::nfs3::file::{createhow3, stable_how, CREATE3args, WRITE3args};
use nfs_subtree::xdr::nfs3::{self, dir};
use nfs_subtree::xdr::{deserialize, Deserialize};
use support::{call_nfs, lookup, read_nfs_status, root_handle, test_fs};

use std::io::Cursor;

fn read_as<T: Deserialize + Default>(cursor: &mut Cursor<Vec<u8>>) -> T {
    deserialize::<T>(cursor).expect("deserialize reply body")
}

#[tokio::test]
async fn read_detects_eof_exactly_at_file_end() {
    let fs = test_fs("/ (rw)").await;
    std::fs::write(fs.root.path().join("f"), vec![7u8; 100]).expect("create file");

    let ctx = fs.context("10.0.0.5");
    let root = root_handle(&fs).await;
    let handle = lookup(&ctx, &root, "f").await;

    let args = nfs3::file::READ3args { file: handle.clone(), offset: 50, count: 200 };
    let mut reply = call_nfs(&ctx, nfs3::NFSProgram::NFSPROC3_READ, &args).await;
    assert_eq!(read_nfs_status(&mut reply), nfs3::nfsstat3::NFS3_OK);
    let resok: nfs3::file::READ3resok = read_as(&mut reply);
    assert_eq!(resok.count, 50);
    assert!(resok.eof);
    assert_eq!(resok.data.len(), 50);

    let args = nfs3::file::READ3args { file: handle, offset: 50, count: 40 };
    let mut reply = call_nfs(&ctx, nfs3::NFSProgram::NFSPROC3_READ, &args).await;
    assert_eq!(read_nfs_status(&mut reply), nfs3::nfsstat3::NFS3_OK);
    let resok: nfs3::file::READ3resok = read_as(&mut reply);
    assert_eq!(resok.count, 40);
    assert!(!resok.eof);
}

#[tokio::test]
async fn read_only_export_rejects_writes_but_serves_reads() {
    let fs = test_fs("/ (ro)").await;
    std::fs::write(fs.root.path().join("f"), b"steady").expect("create file");

    let ctx = fs.context("10.0.0.5");
    let root = root_handle(&fs).await;
    let handle = lookup(&ctx, &root, "f").await;

    let args = WRITE3args {
        file: handle.clone(),
        offset: 0,
        count: 4,
        stable: stable_how::FILE_SYNC,
        data: b"data".to_vec(),
    };
    let mut reply = call_nfs(&ctx, nfs3::NFSProgram::NFSPROC3_WRITE, &args).await;
    assert_eq!(read_nfs_status(&mut reply), nfs3::nfsstat3::NFS3ERR_ROFS);

    let args = nfs3::file::READ3args { file: handle, offset: 0, count: 6 };
    let mut reply = call_nfs(&ctx, nfs3::NFSProgram::NFSPROC3_READ, &args).await;
    assert_eq!(read_nfs_status(&mut reply), nfs3::nfsstat3::NFS3_OK);
    let resok: nfs3::file::READ3resok = read_as(&mut reply);
    assert_eq!(resok.data, b"steady");
}

async fn exclusive_create(
    ctx: &support::TestFs,
    root: &nfs3::nfs_fh3,
    name: &str,
    verf: nfs3::createverf3,
) -> (nfs3::nfsstat3, Option<nfs3::nfs_fh3>) {
    let context = ctx.context("10.0.0.5");
    let args = CREATE3args {
        where_dir: nfs3::diropargs3 { dir: root.clone(), name: name.into() },
        how: createhow3::EXCLUSIVE(verf),
    };
    let mut reply = call_nfs(&context, nfs3::NFSProgram::NFSPROC3_CREATE, &args).await;
    let status = read_nfs_status(&mut reply);
    if status != nfs3::nfsstat3::NFS3_OK {
        return (status, None);
    }
    let obj: nfs3::post_op_fh3 = read_as(&mut reply);
    match obj {
        nfs3::post_op_fh3::handle(handle) => (status, Some(handle)),
        nfs3::post_op_fh3::Void => (status, None),
    }
}

#[tokio::test]
async fn exclusive_create_is_idempotent_per_verifier() {
    let fs = test_fs("/ (rw)").await;
    let root = root_handle(&fs).await;

    let verf = [1, 2, 3, 4, 5, 6, 7, 8];
    let (status, first) = exclusive_create(&fs, &root, "excl", verf).await;
    assert_eq!(status, nfs3::nfsstat3::NFS3_OK);
    let first = first.expect("create returns a handle");

    // Same verifier: the retry of our own create succeeds with the same
    // handle.
    let (status, retry) = exclusive_create(&fs, &root, "excl", verf).await;
    assert_eq!(status, nfs3::nfsstat3::NFS3_OK);
    assert_eq!(retry.expect("retry returns a handle"), first);

    // Different verifier: somebody else's file.
    let (status, _) = exclusive_create(&fs, &root, "excl", [0x11; 8]).await;
    assert_eq!(status, nfs3::nfsstat3::NFS3ERR_EXIST);
}

#[tokio::test]
async fn write_and_commit_share_the_process_verifier() {
    let fs = test_fs("/ (rw)").await;
    std::fs::write(fs.root.path().join("wf"), b"xxxxxx").expect("create file");

    let ctx = fs.context("10.0.0.5");
    let root = root_handle(&fs).await;
    let handle = lookup(&ctx, &root, "wf").await;

    let args = WRITE3args {
        file: handle.clone(),
        offset: 2,
        count: 4,
        stable: stable_how::UNSTABLE,
        data: b"data".to_vec(),
    };
    let mut reply = call_nfs(&ctx, nfs3::NFSProgram::NFSPROC3_WRITE, &args).await;
    assert_eq!(read_nfs_status(&mut reply), nfs3::nfsstat3::NFS3_OK);
    let write_res: nfs3::file::WRITE3resok = read_as(&mut reply);
    assert_eq!(write_res.count, 4);
    assert_eq!(write_res.committed, stable_how::FILE_SYNC);

    let args = nfs3::file::COMMIT3args { file: handle, offset: 0, count: 0 };
    let mut reply = call_nfs(&ctx, nfs3::NFSProgram::NFSPROC3_COMMIT, &args).await;
    assert_eq!(read_nfs_status(&mut reply), nfs3::nfsstat3::NFS3_OK);
    let commit_res: nfs3::file::COMMIT3resok = read_as(&mut reply);
    assert_eq!(commit_res.verf, write_res.verf);

    assert_eq!(std::fs::read(fs.root.path().join("wf")).expect("read back"), b"xxdata");
}

#[tokio::test]
async fn inlined_handle_goes_stale_after_rename() {
    let fs = test_fs("/ (rw)").await;
    std::fs::create_dir(fs.root.path().join("a")).expect("mkdir");
    std::fs::write(fs.root.path().join("a/x"), b"content").expect("create file");

    let ctx = fs.context("10.0.0.5");
    let root = root_handle(&fs).await;
    let dir = lookup(&ctx, &root, "a").await;
    let handle = lookup(&ctx, &dir, "x").await;

    let args = dir::RENAME3args {
        from: nfs3::diropargs3 { dir: dir.clone(), name: "x".into() },
        to: nfs3::diropargs3 { dir, name: "y".into() },
    };
    let mut reply = call_nfs(&ctx, nfs3::NFSProgram::NFSPROC3_RENAME, &args).await;
    assert_eq!(read_nfs_status(&mut reply), nfs3::nfsstat3::NFS3_OK);

    let mut reply = call_nfs(&ctx, nfs3::NFSProgram::NFSPROC3_GETATTR, &handle).await;
    assert_eq!(read_nfs_status(&mut reply), nfs3::nfsstat3::NFS3ERR_STALE);
}

#[tokio::test]
async fn names_with_slashes_are_rejected() {
    let fs = test_fs("/ (rw)").await;
    let ctx = fs.context("10.0.0.5");
    let root = root_handle(&fs).await;

    let args = nfs3::diropargs3 { dir: root, name: "../etc".into() };
    let mut reply = call_nfs(&ctx, nfs3::NFSProgram::NFSPROC3_LOOKUP, &args).await;
    assert_eq!(read_nfs_status(&mut reply), nfs3::nfsstat3::NFS3ERR_ACCES);
}

#[tokio::test]
async fn mknod_fifo_roundtrips_through_lookup() {
    let fs = test_fs("/ (rw)").await;
    let ctx = fs.context("10.0.0.5");
    let root = root_handle(&fs).await;

    let args = dir::MKNOD3args {
        where_dir: nfs3::diropargs3 { dir: root.clone(), name: "fifo1".into() },
        what: dir::mknoddata3::pipe(nfs3::ftype3::NF3FIFO, nfs3::sattr3::default()),
    };
    let mut reply = call_nfs(&ctx, nfs3::NFSProgram::NFSPROC3_MKNOD, &args).await;
    assert_eq!(read_nfs_status(&mut reply), nfs3::nfsstat3::NFS3_OK);

    let args = nfs3::diropargs3 { dir: root, name: "fifo1".into() };
    let mut reply = call_nfs(&ctx, nfs3::NFSProgram::NFSPROC3_LOOKUP, &args).await;
    assert_eq!(read_nfs_status(&mut reply), nfs3::nfsstat3::NFS3_OK);
    let _object: nfs3::nfs_fh3 = read_as(&mut reply);
    let obj_attributes: nfs3::post_op_attr = read_as(&mut reply);
    let nfs3::post_op_attr::attributes(attrs) = obj_attributes else {
        panic!("lookup returns attributes");
    };
    assert_eq!(attrs.ftype, nfs3::ftype3::NF3FIFO);
}

#[tokio::test]
async fn mknod_rejects_regular_files() {
    let fs = test_fs("/ (rw)").await;
    let ctx = fs.context("10.0.0.5");
    let root = root_handle(&fs).await;

    let args = dir::MKNOD3args {
        where_dir: nfs3::diropargs3 { dir: root, name: "reg".into() },
        what: dir::mknoddata3::other(nfs3::ftype3::NF3REG),
    };
    let mut reply = call_nfs(&ctx, nfs3::NFSProgram::NFSPROC3_MKNOD, &args).await;
    assert_eq!(read_nfs_status(&mut reply), nfs3::nfsstat3::NFS3ERR_INVAL);
}

#[derive(Debug)]
struct ReadDirReply {
    cookieverf: nfs3::cookieverf3,
    names: Vec<String>,
    eof: bool,
}

async fn readdir(
    ctx: &nfs_subtree::protocol::rpc::Context,
    dir_fh: &nfs3::nfs_fh3,
    cookie: u64,
    cookieverf: nfs3::cookieverf3,
    count: u32,
) -> Result<ReadDirReply, nfs3::nfsstat3> {
    let args = dir::READDIR3args { dir: dir_fh.clone(), cookie, cookieverf, count };
    let mut reply = call_nfs(ctx, nfs3::NFSProgram::NFSPROC3_READDIR, &args).await;
    let status = read_nfs_status(&mut reply);
    if status != nfs3::nfsstat3::NFS3_OK {
        return Err(status);
    }
    let _dir_attributes: nfs3::post_op_attr = read_as(&mut reply);
    let cookieverf: nfs3::cookieverf3 = read_as(&mut reply);
    let mut names = Vec::new();
    while read_as::<bool>(&mut reply) {
        let entry: dir::entry3 = read_as(&mut reply);
        names.push(String::from_utf8_lossy(entry.name.as_ref()).into_owned());
    }
    let eof: bool = read_as(&mut reply);
    Ok(ReadDirReply { cookieverf, names, eof })
}

#[tokio::test]
async fn readdir_pages_and_invalidates_cookies_on_mutation() {
    let fs = test_fs("/ (rw)").await;
    for name in ["a", "b", "c"] {
        std::fs::write(fs.root.path().join(name), b"x").expect("create file");
    }

    let ctx = fs.context("10.0.0.5");
    let root = root_handle(&fs).await;

    let full = readdir(&ctx, &root, 0, [0; 8], 4096).await.expect("first readdir");
    assert_eq!(full.names, ["a", "b", "c"]);
    assert!(full.eof);

    // Resume mid-listing with the verifier we were handed.
    let rest = readdir(&ctx, &root, 1, full.cookieverf, 4096).await.expect("resume");
    assert_eq!(rest.names, ["b", "c"]);
    assert!(rest.eof);

    // A directory mutation bumps the generation and orphans old cookies.
    let args = nfs3::diropargs3 { dir: root.clone(), name: "b".into() };
    let mut reply = call_nfs(&ctx, nfs3::NFSProgram::NFSPROC3_REMOVE, &args).await;
    assert_eq!(read_nfs_status(&mut reply), nfs3::nfsstat3::NFS3_OK);

    let stale = readdir(&ctx, &root, 1, full.cookieverf, 4096).await;
    assert_eq!(stale.unwrap_err(), nfs3::nfsstat3::NFS3ERR_BAD_COOKIE);

    // Restarting from zero recovers.
    let fresh = readdir(&ctx, &root, 0, [0; 8], 4096).await.expect("restart");
    assert_eq!(fresh.names, ["a", "c"]);
}

#[tokio::test]
async fn readdir_with_zero_budget_returns_no_entries() {
    let fs = test_fs("/ (rw)").await;
    std::fs::write(fs.root.path().join("only"), b"x").expect("create file");

    let ctx = fs.context("10.0.0.5");
    let root = root_handle(&fs).await;

    let reply = readdir(&ctx, &root, 0, [0; 8], 0).await.expect("readdir");
    assert!(reply.names.is_empty());
    assert!(!reply.eof, "entries remain behind the zero budget");
}

#[tokio::test]
async fn setattr_honours_the_ctime_guard() {
    let fs = test_fs("/ (rw)").await;
    std::fs::write(fs.root.path().join("g"), b"longer than two").expect("create file");

    let ctx = fs.context("10.0.0.5");
    let root = root_handle(&fs).await;
    let handle = lookup(&ctx, &root, "g").await;

    let mut reply = call_nfs(&ctx, nfs3::NFSProgram::NFSPROC3_GETATTR, &handle).await;
    assert_eq!(read_nfs_status(&mut reply), nfs3::nfsstat3::NFS3_OK);
    let attrs: nfs3::fattr3 = read_as(&mut reply);

    let truncate_to_two = nfs3::sattr3 {
        size: nfs3::set_size3::size(2),
        ..Default::default()
    };

    // Wrong guard ctime: nothing happens.
    let args = nfs3::SETATTR3args {
        object: handle.clone(),
        new_attributes: truncate_to_two,
        guard: nfs3::sattrguard3::obj_ctime(nfs3::nfstime3 {
            seconds: attrs.ctime.seconds.wrapping_add(1000),
            nseconds: 0,
        }),
    };
    let mut reply = call_nfs(&ctx, nfs3::NFSProgram::NFSPROC3_SETATTR, &args).await;
    assert_eq!(read_nfs_status(&mut reply), nfs3::nfsstat3::NFS3ERR_NOT_SYNC);

    // Matching guard: the truncate applies.
    let args = nfs3::SETATTR3args {
        object: handle,
        new_attributes: truncate_to_two,
        guard: nfs3::sattrguard3::obj_ctime(attrs.ctime),
    };
    let mut reply = call_nfs(&ctx, nfs3::NFSProgram::NFSPROC3_SETATTR, &args).await;
    assert_eq!(read_nfs_status(&mut reply), nfs3::nfsstat3::NFS3_OK);
    assert_eq!(
        std::fs::metadata(fs.root.path().join("g")).expect("stat").len(),
        2
    );
}

#[tokio::test]
async fn readdirplus_is_not_supported() {
    let fs = test_fs("/ (rw)").await;
    let ctx = fs.context("10.0.0.5");
    let root = root_handle(&fs).await;

    let args = dir::READDIRPLUS3args {
        dir: root,
        cookie: 0,
        cookieverf: [0; 8],
        dircount: 1024,
        maxcount: 4096,
    };
    let mut reply = call_nfs(&ctx, nfs3::NFSProgram::NFSPROC3_READDIRPLUS, &args).await;
    assert_eq!(read_nfs_status(&mut reply), nfs3::nfsstat3::NFS3ERR_NOTSUPP);
    let dir_attributes: nfs3::post_op_attr = read_as(&mut reply);
    assert!(matches!(dir_attributes, nfs3::post_op_attr::Void));
}

#[tokio::test]
async fn directory_hash_follows_content() {
    let fs = test_fs("/ (rw)").await;
    let ctx = fs.context("10.0.0.5");

    let empty = nfs_subtree::readdir::directory_hash(&ctx, "/").await;
    assert_eq!(empty, 0);

    std::fs::write(fs.root.path().join("media"), b"x").expect("create file");
    let with_file = nfs_subtree::readdir::directory_hash(&ctx, "/").await;
    assert_ne!(with_file, 0);
    assert_eq!(
        with_file,
        nfs_subtree::exports::fnv1a_32(b"media", 0),
        "hash chains the entry names"
    );

    std::fs::remove_file(fs.root.path().join("media")).expect("remove file");
    assert_eq!(nfs_subtree::readdir::directory_hash(&ctx, "/").await, 0);
}

#[tokio::test]
async fn invalid_handles_are_stale() {
    let fs = test_fs("/ (rw)").await;
    let ctx = fs.context("10.0.0.5");

    let bogus = nfs3::nfs_fh3 { data: vec![0; 8] };
    let mut reply = call_nfs(&ctx, nfs3::NFSProgram::NFSPROC3_GETATTR, &bogus).await;
    assert_eq!(read_nfs_status(&mut reply), nfs3::nfsstat3::NFS3ERR_STALE);
}
