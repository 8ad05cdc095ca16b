//! XDR structures for the MOUNT version 3 protocol (RFC 1813 Appendix I).
//!
//! Besides the MNT result this includes the optional-data chains the DUMP and
//! EXPORT procedures return: XDR encodes a linked list as a `value_follows`
//! boolean before every node, with FALSE terminating the chain.

#![allow(dead_code)]
#![allow(non_camel_case_types)]

use std::io::{Read, Write};

use num_derive::{FromPrimitive, ToPrimitive};

use super::{
    deserialize, Deserialize, DeserializeEnum, DeserializeStruct, Serialize, SerializeEnum,
    SerializeStruct,
};

/// RPC program number of the MOUNT service.
pub const PROGRAM: u32 = 100005;
/// Protocol version implemented by this server.
pub const VERSION: u32 = 3;

/// Maximum bytes in a path name.
pub const MNTPATHLEN: u32 = 1024;
/// Maximum bytes in a host or group name.
pub const MNTNAMLEN: u32 = 255;
/// Maximum bytes in a version 3 filehandle.
pub const FHSIZE3: u32 = 64;

/// Filehandle as carried by the MOUNT protocol (same bytes as `nfs_fh3`).
pub type fhandle3 = Vec<u8>;
/// Directory path on the server.
pub type dirpath = Vec<u8>;
/// Host or group name.
pub type name = Vec<u8>;

/// Status codes of MOUNT version 3 operations.
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum mountstat3 {
    MNT3_OK = 0,
    MNT3ERR_PERM = 1,
    MNT3ERR_NOENT = 2,
    MNT3ERR_IO = 5,
    MNT3ERR_ACCES = 13,
    MNT3ERR_NOTDIR = 20,
    MNT3ERR_INVAL = 22,
    MNT3ERR_NAMETOOLONG = 63,
    MNT3ERR_NOTSUPP = 10004,
    MNT3ERR_SERVERFAULT = 10006,
}
SerializeEnum!(mountstat3);
DeserializeEnum!(mountstat3);

/// Success body of MNT: the directory filehandle plus the authentication
/// flavors the server will accept on NFS requests.
#[derive(Clone, Debug, Default)]
pub struct mountres3_ok {
    pub fhandle: fhandle3,
    pub auth_flavors: Vec<u32>,
}
SerializeStruct!(mountres3_ok, fhandle, auth_flavors);
DeserializeStruct!(mountres3_ok, fhandle, auth_flavors);

/// One DUMP entry: which host mounted which directory.
#[derive(Clone, Debug, Default)]
pub struct mountbody {
    pub ml_hostname: name,
    pub ml_directory: dirpath,
}

/// The DUMP reply chain.
#[derive(Clone, Debug, Default)]
pub struct mountlist(pub Vec<mountbody>);

impl Serialize for mountlist {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        for body in &self.0 {
            true.serialize(dest)?;
            body.ml_hostname.serialize(dest)?;
            body.ml_directory.serialize(dest)?;
        }
        false.serialize(dest)
    }
}

impl Deserialize for mountlist {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        self.0.clear();
        while deserialize::<bool>(src)? {
            let ml_hostname = deserialize::<name>(src)?;
            let ml_directory = deserialize::<dirpath>(src)?;
            self.0.push(mountbody { ml_hostname, ml_directory });
        }
        Ok(())
    }
}

/// One EXPORT entry: an exported directory and the groups it is offered to.
#[derive(Clone, Debug, Default)]
pub struct exportnode {
    pub ex_dir: dirpath,
    pub ex_groups: Vec<name>,
}

/// The EXPORT reply chain.
#[derive(Clone, Debug, Default)]
pub struct exports(pub Vec<exportnode>);

impl Serialize for exports {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        for node in &self.0 {
            true.serialize(dest)?;
            node.ex_dir.serialize(dest)?;
            for group in &node.ex_groups {
                true.serialize(dest)?;
                group.serialize(dest)?;
            }
            false.serialize(dest)?;
        }
        false.serialize(dest)
    }
}

impl Deserialize for exports {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        self.0.clear();
        while deserialize::<bool>(src)? {
            let ex_dir = deserialize::<dirpath>(src)?;
            let mut ex_groups = Vec::new();
            while deserialize::<bool>(src)? {
                ex_groups.push(deserialize::<name>(src)?);
            }
            self.0.push(exportnode { ex_dir, ex_groups });
        }
        Ok(())
    }
}

/// Procedure numbers for MOUNT version 3.
#[allow(clippy::upper_case_acronyms)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum MountProgram {
    MOUNTPROC3_NULL = 0,
    MOUNTPROC3_MNT = 1,
    MOUNTPROC3_DUMP = 2,
    MOUNTPROC3_UMNT = 3,
    MOUNTPROC3_UMNTALL = 4,
    MOUNTPROC3_EXPORT = 5,
    INVALID,
}
