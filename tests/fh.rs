//! Filehandle codec laws: wire layout, validation boundaries, and
//! resolution including the long-path fallback through the backend.

use std::sync::Arc;

use nfs_subtree::backend::{FSBackend, PosixBackend};
use nfs_subtree::fh::{fh_comp, fh_decomp, nfh_valid, FileHandle, FH_MINLEN};
use nfs_subtree::xdr::nfs3::nfs_fh3;

#[test]
fn root_handle_layout() {
    let handle = fh_comp(42, "/");
    assert_eq!(handle.data.len(), FH_MINLEN);
    assert_eq!(&handle.data[0..8], &42u64.to_le_bytes());
    assert_eq!(handle.data[8], 0);
    assert!(nfh_valid(&handle));
}

#[test]
fn short_path_is_inlined() {
    let handle = fh_comp(7, "/a/b.txt");
    // ino, length class, path bytes, NUL
    assert_eq!(handle.data.len(), 9 + "/a/b.txt".len() + 1);
    assert_eq!(*handle.data.last().unwrap(), 0);

    let decoded = FileHandle::from_nfs(&handle).expect("valid handle");
    assert_eq!(decoded.ino, 7);
    assert_eq!(decoded.inline_path(), Some("/a/b.txt"));
}

#[test]
fn inline_boundary_is_32_bytes() {
    let path32 = format!("/{}", "a".repeat(31));
    let handle = fh_comp(1, &path32);
    assert_eq!(handle.data.len(), 9 + 33, "32-byte path inlines with its NUL");

    let path33 = format!("/{}", "a".repeat(32));
    let long = fh_comp(1, &path33);
    assert_eq!(long.data.len(), FH_MINLEN, "33-byte path is not inlined");
    assert!(long.data[8] >= 34);
    assert!(nfh_valid(&long));
}

#[test]
fn wire_length_never_exceeds_rfc_limit() {
    for len in [0usize, 1, 5, 31, 32, 100, 1000] {
        let path = if len == 0 { "/".to_string() } else { format!("/{}", "x".repeat(len)) };
        let handle = fh_comp(9, &path);
        assert!(handle.data.len() >= 9 && handle.data.len() <= 42, "{path}");
    }
}

#[test]
fn undersized_and_oversized_handles_are_invalid() {
    assert!(!nfh_valid(&nfs_fh3 { data: vec![0; 8] }));
    assert!(!nfh_valid(&nfs_fh3 { data: vec![0; 65] }));
    assert!(!nfh_valid(&nfs_fh3 { data: Vec::new() }));
}

#[test]
fn declared_length_must_match_length_class() {
    // Claims a 5-byte inline path but carries none.
    let mut data = 1u64.to_le_bytes().to_vec();
    data.push(5);
    assert!(!nfh_valid(&nfs_fh3 { data }));

    // Long-path class with trailing garbage.
    let mut data = 1u64.to_le_bytes().to_vec();
    data.push(40);
    data.extend_from_slice(&[1, 2, 3]);
    assert!(!nfh_valid(&nfs_fh3 { data }));
}

#[test]
fn zero_inode_is_invalid() {
    let handle = fh_comp(0, "/a");
    assert!(!nfh_valid(&handle));
}

#[tokio::test]
async fn decomp_resolves_inline_and_root() {
    let dir = tempfile::tempdir().expect("tempdir");
    let backend = PosixBackend::new(dir.path());

    assert_eq!(fh_decomp(&backend, &fh_comp(1, "/")).await.as_deref(), Some("/"));
    assert_eq!(
        fh_decomp(&backend, &fh_comp(1, "/some/file")).await.as_deref(),
        Some("/some/file")
    );
}

#[tokio::test]
async fn long_path_resolves_through_inode_index() {
    let dir = tempfile::tempdir().expect("tempdir");
    let backend = Arc::new(PosixBackend::new(dir.path()));

    let name = "a".repeat(40);
    let vpath = format!("/{name}");
    std::fs::write(dir.path().join(&name), b"payload").expect("create file");

    // Stat feeds the inode index, as every handler does before composing a
    // handle.
    let stat = backend.lstat(&vpath).await.expect("lstat");
    let handle = fh_comp(stat.ino, &vpath);
    assert_eq!(handle.data.len(), FH_MINLEN);

    assert_eq!(fh_decomp(backend.as_ref(), &handle).await.as_deref(), Some(vpath.as_str()));

    // Once the object is gone the index entry is dropped, not re-served.
    std::fs::remove_file(dir.path().join(&name)).expect("remove file");
    assert_eq!(fh_decomp(backend.as_ref(), &handle).await, None);
}
