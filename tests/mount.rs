//! MOUNT3 protocol flow: MNT validation, the advisory mount table, and the
//! EXPORT listing.

mod support;

use nfs_subtree::xdr::{deserialize, mount, nfs3};
use support::{call_mount, read_mount_status, test_fs};

use std::io::Cursor;

async fn mnt(
    fs: &support::TestFs,
    client: &str,
    vers: u32,
    path: &str,
) -> (mount::mountstat3, Option<mount::mountres3_ok>) {
    let ctx = fs.context(client);
    let args: mount::dirpath = path.as_bytes().to_vec();
    let mut reply = call_mount(&ctx, mount::MountProgram::MOUNTPROC3_MNT, vers, &args).await;
    let status = read_mount_status(&mut reply);
    if status != mount::mountstat3::MNT3_OK {
        return (status, None);
    }
    let resok = deserialize::<mount::mountres3_ok>(&mut reply).expect("mount result");
    (status, Some(resok))
}

async fn dump(fs: &support::TestFs, client: &str) -> Vec<(String, String)> {
    let ctx = fs.context(client);
    let mut reply: Cursor<Vec<u8>> =
        call_mount(&ctx, mount::MountProgram::MOUNTPROC3_DUMP, mount::VERSION, &Vec::<u8>::new())
            .await;
    let list = deserialize::<mount::mountlist>(&mut reply).expect("mount list");
    list.0
        .into_iter()
        .map(|body| {
            (
                String::from_utf8_lossy(&body.ml_hostname).into_owned(),
                String::from_utf8_lossy(&body.ml_directory).into_owned(),
            )
        })
        .collect()
}

#[tokio::test]
async fn mnt_happy_path_registers_the_mount() {
    let fs = test_fs("/ 10.0.0.0/24(rw)").await;

    let (status, resok) = mnt(&fs, "10.0.0.5", mount::VERSION, "/").await;
    assert_eq!(status, mount::mountstat3::MNT3_OK);
    let resok = resok.expect("mount succeeded");

    assert_eq!(resok.auth_flavors, vec![1], "AUTH_UNIX only");

    // The handle names the export root.
    let handle = nfs3::nfs_fh3 { data: resok.fhandle };
    assert!(nfs_subtree::fh::nfh_valid(&handle));
    assert_eq!(handle.data[8], 0, "root handles carry no inline path");

    assert_eq!(dump(&fs, "10.0.0.5").await, vec![("10.0.0.5".to_string(), "/".to_string())]);
}

#[tokio::test]
async fn mnt_rejects_foreign_subnets() {
    let fs = test_fs("/ 10.0.0.0/24(rw)").await;
    let (status, _) = mnt(&fs, "10.1.0.5", mount::VERSION, "/").await;
    assert_eq!(status, mount::mountstat3::MNT3ERR_ACCES);
    assert!(dump(&fs, "10.0.0.5").await.is_empty());
}

#[tokio::test]
async fn mnt_requires_a_privileged_port_unless_insecure() {
    let fs = test_fs("/ 10.0.0.0/24(rw)").await;

    let ctx = fs.context_at("10.0.0.5:40000");
    let args: mount::dirpath = b"/".to_vec();
    let mut reply = call_mount(&ctx, mount::MountProgram::MOUNTPROC3_MNT, mount::VERSION, &args).await;
    assert_eq!(read_mount_status(&mut reply), mount::mountstat3::MNT3ERR_ACCES);

    support::install_exports(&fs.server, "/ 10.0.0.0/24(rw,insecure)").await;
    let mut reply = call_mount(&ctx, mount::MountProgram::MOUNTPROC3_MNT, mount::VERSION, &args).await;
    assert_eq!(read_mount_status(&mut reply), mount::mountstat3::MNT3_OK);
}

#[tokio::test]
async fn mnt_rejects_wrong_protocol_version() {
    let fs = test_fs("/ 10.0.0.0/24(rw)").await;
    let (status, _) = mnt(&fs, "10.0.0.5", 2, "/").await;
    assert_eq!(status, mount::mountstat3::MNT3ERR_INVAL);
}

#[tokio::test]
async fn mnt_rejects_missing_paths_and_non_directories() {
    let fs = test_fs("/ 10.0.0.0/24(rw)").await;
    std::fs::write(fs.root.path().join("plain"), b"x").expect("create file");

    let (status, _) = mnt(&fs, "10.0.0.5", mount::VERSION, "/nope").await;
    assert_eq!(status, mount::mountstat3::MNT3ERR_NOENT);

    let (status, _) = mnt(&fs, "10.0.0.5", mount::VERSION, "/plain").await;
    assert_eq!(status, mount::mountstat3::MNT3ERR_NOTDIR);
}

#[tokio::test]
async fn umnt_and_umntall_clear_this_hosts_entries() {
    let fs = test_fs("/ 10.0.0.0/24(rw)").await;
    std::fs::create_dir(fs.root.path().join("d")).expect("mkdir");

    mnt(&fs, "10.0.0.5", mount::VERSION, "/").await;
    mnt(&fs, "10.0.0.5", mount::VERSION, "/d").await;
    mnt(&fs, "10.0.0.6", mount::VERSION, "/").await;
    assert_eq!(dump(&fs, "10.0.0.5").await.len(), 3);

    // UMNT drops only the matching (host, directory) pair.
    let ctx = fs.context("10.0.0.5");
    let args: mount::dirpath = b"/d".to_vec();
    call_mount(&ctx, mount::MountProgram::MOUNTPROC3_UMNT, mount::VERSION, &args).await;
    let entries = dump(&fs, "10.0.0.5").await;
    assert_eq!(entries.len(), 2);
    assert!(!entries.contains(&("10.0.0.5".to_string(), "/d".to_string())));

    // UMNTALL clears everything this host registered, and nothing else.
    call_mount(&ctx, mount::MountProgram::MOUNTPROC3_UMNTALL, mount::VERSION, &Vec::<u8>::new())
        .await;
    assert_eq!(dump(&fs, "10.0.0.5").await, vec![("10.0.0.6".to_string(), "/".to_string())]);
}

#[tokio::test]
async fn export_lists_the_table_with_groups() {
    let fs = test_fs("/ 10.0.0.0/24(rw) 192.168.1.7(ro)").await;

    let ctx = fs.context("10.0.0.5");
    let mut reply =
        call_mount(&ctx, mount::MountProgram::MOUNTPROC3_EXPORT, mount::VERSION, &Vec::<u8>::new())
            .await;
    let table = deserialize::<mount::exports>(&mut reply).expect("exports list");

    assert_eq!(table.0.len(), 1);
    assert_eq!(table.0[0].ex_dir, b"/");
    assert_eq!(
        table.0[0].ex_groups,
        vec![b"10.0.0.0/24".to_vec(), b"192.168.1.7".to_vec()]
    );
}

#[tokio::test]
async fn mnt_of_subdirectory_inlines_the_path() {
    let fs = test_fs("/ 10.0.0.0/24(rw)").await;
    std::fs::create_dir(fs.root.path().join("d")).expect("mkdir");

    let (status, resok) = mnt(&fs, "10.0.0.5", mount::VERSION, "/d").await;
    assert_eq!(status, mount::mountstat3::MNT3_OK);
    let handle = nfs3::nfs_fh3 { data: resok.expect("mounted").fhandle };
    let decoded = nfs_subtree::fh::FileHandle::from_nfs(&handle).expect("valid handle");
    assert_eq!(decoded.inline_path(), Some("/d"));
}
