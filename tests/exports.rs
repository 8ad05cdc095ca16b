//! Export table behaviour: parsing, client matching, fsid stability, and
//! squash policy.

use std::net::Ipv4Addr;

use nfs_subtree::backend::PosixBackend;
use nfs_subtree::exports::{
    exports_rw, fnv1a_32, normpath, squash_ids, ExportTable, ANON_NOTSPECIAL, OPT_NO_ROOT_SQUASH,
    OPT_REMOVABLE, OPT_RW,
};
use nfs_subtree::xdr::nfs3::nfsstat3;
use nfs_subtree::xdr::rpc::auth_unix;

fn ip(s: &str) -> Ipv4Addr {
    s.parse().expect("IPv4 literal")
}

async fn table(exports: &str, backend: &PosixBackend) -> ExportTable {
    ExportTable::parse(exports, backend).await.expect("parse exports")
}

fn fixture() -> (tempfile::TempDir, PosixBackend) {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::create_dir_all(dir.path().join("data/sub")).expect("create subtree");
    std::fs::create_dir_all(dir.path().join("other")).expect("create subtree");
    let backend = PosixBackend::new(dir.path());
    (dir, backend)
}

#[tokio::test]
async fn cidr_and_literal_hosts_match() {
    let (_dir, backend) = fixture();
    let table = table("/data 10.0.0.0/24(rw) 192.168.1.7(ro)", &backend).await;

    let in_net = table.options("/data/file", ip("10.0.0.5")).expect("matched");
    assert_ne!(in_net.options & OPT_RW, 0);

    let literal = table.options("/data/file", ip("192.168.1.7")).expect("matched");
    assert_eq!(literal.options & OPT_RW, 0);

    assert!(table.options("/data/file", ip("10.0.1.5")).is_none());
    assert!(table.options("/other", ip("10.0.0.5")).is_none());
}

#[tokio::test]
async fn netmask_form_matches() {
    let (_dir, backend) = fixture();
    let table = table("/data 10.0.0.0/255.255.255.0(rw)", &backend).await;
    assert!(table.options("/data", ip("10.0.0.99")).is_some());
    assert!(table.options("/data", ip("10.0.1.1")).is_none());
}

#[tokio::test]
async fn longest_prefix_wins() {
    let (_dir, backend) = fixture();
    let table = table("/data (ro)\n/data/sub (rw)", &backend).await;

    let outer = table.options("/data/file", ip("10.0.0.1")).expect("outer");
    assert_eq!(outer.options & OPT_RW, 0);

    let inner = table.options("/data/sub/file", ip("10.0.0.1")).expect("inner");
    assert_ne!(inner.options & OPT_RW, 0);
    assert_eq!(inner.path, "/data/sub");
}

#[tokio::test]
async fn dotdot_traversal_never_matches() {
    let (_dir, backend) = fixture();
    let table = table("/data (rw)", &backend).await;
    assert!(table.options("/data/../etc/passwd", ip("10.0.0.1")).is_none());
}

#[tokio::test]
async fn default_entry_is_read_only_root_squashed() {
    let (_dir, backend) = fixture();
    let table = table("/data", &backend).await;
    let opts = table.options("/data", ip("203.0.113.9")).expect("anon host matches anyone");
    assert_eq!(opts.options & OPT_RW, 0);
    assert_eq!(opts.options & OPT_NO_ROOT_SQUASH, 0);
    assert_eq!(exports_rw(Some(&opts)), nfsstat3::NFS3ERR_ROFS);
    assert_eq!(exports_rw(None), nfsstat3::NFS3ERR_ROFS);
}

#[tokio::test]
async fn fsid_is_stable_with_top_bit_set() {
    let (_dir, backend) = fixture();
    let first = table("/data (rw)", &backend).await;
    let second = table("/data (ro)", &backend).await;

    let a = first.options("/data", ip("10.0.0.1")).expect("matched").fsid;
    let b = second.options("/data", ip("10.0.0.1")).expect("matched").fsid;
    assert_eq!(a, b, "fsid depends only on the path as typed");
    assert_ne!(a & 0x8000_0000, 0);
    assert_eq!(a & 0x7FFF_FFFF, fnv1a_32(b"/data", 0) & 0x7FFF_FFFF);
}

#[tokio::test]
async fn removable_export_skips_canonicalisation() {
    let (_dir, backend) = fixture();

    // The backing path does not exist, which fails realpath.
    assert!(ExportTable::parse("/cdrom (rw)", &backend).await.is_err());

    let table = table("//cdrom/ (rw,removable)", &backend).await;
    let opts = table.options("/cdrom/file", ip("10.0.0.1")).expect("normpath match");
    assert_ne!(opts.options & OPT_REMOVABLE, 0);
    assert_eq!(opts.path, "/cdrom");
}

#[tokio::test]
async fn unknown_options_are_ignored() {
    let (_dir, backend) = fixture();
    let table = table("/data 10.0.0.0/24(rw,async,wdelay)", &backend).await;
    let opts = table.options("/data", ip("10.0.0.1")).expect("matched");
    assert_ne!(opts.options & OPT_RW, 0);
}

#[tokio::test]
async fn anon_ids_reach_squash() {
    let (_dir, backend) = fixture();
    let table = table("/data 10.0.0.0/24(rw,all_squash,anonuid=4242,anongid=99)", &backend).await;
    let opts = table.options("/data", ip("10.0.0.1")).expect("matched");
    assert_eq!(opts.anonuid, 4242);
    assert_eq!(opts.anongid, 99);

    let caller = auth_unix { uid: 1000, gid: 1000, ..Default::default() };
    assert_eq!(squash_ids(&caller, &opts), (4242, 99));
}

#[tokio::test]
async fn root_squash_defaults_to_nobody() {
    let (_dir, backend) = fixture();
    let table = table("/data 10.0.0.0/24(rw)", &backend).await;
    let opts = table.options("/data", ip("10.0.0.1")).expect("matched");
    assert_eq!(opts.anonuid, ANON_NOTSPECIAL);

    let root = auth_unix { uid: 0, gid: 0, ..Default::default() };
    assert_eq!(squash_ids(&root, &opts), (65534, 65534));

    let user = auth_unix { uid: 1000, gid: 100, ..Default::default() };
    assert_eq!(squash_ids(&user, &opts), (1000, 100));
}

#[tokio::test]
async fn no_root_squash_keeps_root() {
    let (_dir, backend) = fixture();
    let table = table("/data 10.0.0.0/24(rw,no_root_squash)", &backend).await;
    let opts = table.options("/data", ip("10.0.0.1")).expect("matched");

    let root = auth_unix { uid: 0, gid: 0, ..Default::default() };
    assert_eq!(squash_ids(&root, &opts), (0, 0));
}

#[test]
fn normpath_collapses_slashes() {
    assert_eq!(normpath("///x///y/"), "/x/y");
    assert_eq!(normpath("/x/y"), "/x/y");
    assert_eq!(normpath("/"), "/");
    assert_eq!(normpath("//"), "/");
}

#[test]
fn fnv1a_reference_values() {
    // FNV-1a with offset basis 0, as the original computes fsids.
    assert_eq!(fnv1a_32(b"", 0), 0);
    let one = fnv1a_32(b"a", 0);
    assert_eq!(one, 0x61u32.wrapping_mul(0x0100_0193));
    assert_eq!(fnv1a_32(b"bc", fnv1a_32(b"a", 0)), fnv1a_32(b"abc", 0));
}
