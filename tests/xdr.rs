//! Serialization laws of the XDR layer: every encoded value is 4-byte
//! aligned and round-trips to itself.

use std::fmt::Debug;

use nfs_subtree::xdr::{deserialize, mount, nfs3, Deserialize, Serialize};

fn check<T>(src: &T)
where
    T: Serialize + Deserialize + Default + PartialEq + Debug,
{
    let mut buf = Vec::new();
    src.serialize(&mut buf).expect("serialize");
    assert_eq!(buf.len() % 4, 0, "{src:?} not padded to 4 bytes");

    let decoded = deserialize::<T>(&mut buf.as_slice()).expect("deserialize");
    assert_eq!(src, &decoded);
}

fn check_multi<T>(values: &[T])
where
    T: Serialize + Deserialize + Default + PartialEq + Debug + Clone,
{
    values.iter().for_each(check);
}

#[test]
fn scalar_bijection() {
    check_multi(&[true, false]);
    check_multi(&[i32::MIN, -1i32, 0i32, 1i32, i32::MAX]);
    check_multi(&[i64::MIN, -1i64, 0i64, 1i64, i64::MAX]);
    check_multi(&[u32::MIN, 1u32, u32::MAX]);
    check_multi(&[u64::MIN, 1u64, u64::MAX]);
}

#[test]
fn opaque_bijection() {
    check_multi(&[
        Vec::new(),
        vec![1u8],
        vec![1u8, 2, 3],
        vec![1u8, 2, 3, 4],
        vec![1u8, 2, 3, 4, 5],
    ]);
    check_multi(&[Vec::<u32>::new(), vec![7u32], vec![1u32, 2, 3]]);
}

#[test]
fn string_bijection() {
    check_multi(&[
        String::new(),
        String::from("abc"),
        String::from("abc1234+-"),
    ]);
    check_multi(&[
        nfs3::nfsstring::from("x"),
        nfs3::nfsstring::from("some file name"),
        nfs3::nfsstring::from(""),
    ]);
}

#[test]
fn fixed_opaque_bijection() {
    check(&[0u8; 8]);
    check(&[0xABu8; 8]);
}

#[test]
fn handle_bijection() {
    check_multi(&[
        nfs3::nfs_fh3::default(),
        nfs3::nfs_fh3 { data: vec![1, 2, 3, 4, 5, 6, 7, 8, 9] },
    ]);
}

#[test]
fn mount_list_chain() {
    let list = mount::mountlist(vec![
        mount::mountbody {
            ml_hostname: b"10.0.0.5".to_vec(),
            ml_directory: b"/srv/data".to_vec(),
        },
        mount::mountbody {
            ml_hostname: b"10.0.0.6".to_vec(),
            ml_directory: b"/srv/other".to_vec(),
        },
    ]);

    let mut buf = Vec::new();
    list.serialize(&mut buf).expect("serialize mountlist");
    let decoded = deserialize::<mount::mountlist>(&mut buf.as_slice()).expect("deserialize");
    assert_eq!(decoded.0.len(), 2);
    assert_eq!(decoded.0[0].ml_hostname, b"10.0.0.5");
    assert_eq!(decoded.0[1].ml_directory, b"/srv/other");
}

#[test]
fn exports_chain() {
    let table = mount::exports(vec![mount::exportnode {
        ex_dir: b"/srv/data".to_vec(),
        ex_groups: vec![b"10.0.0.0/24".to_vec(), b"backup".to_vec()],
    }]);

    let mut buf = Vec::new();
    table.serialize(&mut buf).expect("serialize exports");
    let decoded = deserialize::<mount::exports>(&mut buf.as_slice()).expect("deserialize");
    assert_eq!(decoded.0.len(), 1);
    assert_eq!(decoded.0[0].ex_groups.len(), 2);
}
