//! XDR data types and constants for NFS version 3 (RFC 1813).
//!
//! Naming follows the RFC so the structures can be read side by side with the
//! protocol specification. Operation-specific argument/result structs live in
//! the `dir`, `file`, and `fs` submodules.

#![allow(dead_code)]
// Preserve the RFC's naming conventions for wire structures.
#![allow(non_camel_case_types)]

use std::fmt;
use std::io::{Read, Write};

use num_derive::{FromPrimitive, ToPrimitive};

pub(crate) use super::{
    deserialize, invalid_data, Deserialize, DeserializeBoolUnion, DeserializeEnum,
    DeserializeStruct, Serialize, SerializeBoolUnion, SerializeEnum, SerializeStruct,
};

pub mod dir;
pub mod file;
pub mod fs;

/// RPC program number of the NFS service.
pub const PROGRAM: u32 = 100003;
/// Protocol version implemented by this server.
pub const VERSION: u32 = 3;

/// Maximum size in bytes of an opaque filehandle.
pub const NFS3_FHSIZE: u32 = 64;
/// Size of the READDIR cookie verifier.
pub const NFS3_COOKIEVERFSIZE: u32 = 8;
/// Size of the EXCLUSIVE-create verifier.
pub const NFS3_CREATEVERFSIZE: u32 = 8;
/// Size of the WRITE/COMMIT verifier.
pub const NFS3_WRITEVERFSIZE: u32 = 8;

/// Longest pathname the server will handle.
pub const NFS_MAXPATHLEN: usize = 1024;
/// Per-READ/WRITE transfer cap over TCP.
pub const NFS_MAXDATA_TCP: u32 = 32768;
/// Per-READ/WRITE transfer cap over UDP.
pub const NFS_MAXDATA_UDP: u32 = 8192;
/// Longest path a Unix-domain socket can be bound to.
pub const UNIX_PATH_MAX: usize = 108;

/// Byte string used for filenames and paths. Not required to be UTF-8.
#[derive(Default, Clone, PartialEq, Eq)]
pub struct nfsstring(pub Vec<u8>);

impl nfsstring {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for nfsstring {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

impl From<&[u8]> for nfsstring {
    fn from(value: &[u8]) -> Self {
        Self(value.into())
    }
}

impl From<&str> for nfsstring {
    fn from(value: &str) -> Self {
        Self(value.as_bytes().into())
    }
}

impl AsRef<[u8]> for nfsstring {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl std::ops::Deref for nfsstring {
    type Target = Vec<u8>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Debug for nfsstring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Display for nfsstring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(&self.0))
    }
}

impl Serialize for nfsstring {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        self.0.serialize(dest)
    }
}

impl Deserialize for nfsstring {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        self.0.deserialize(src)
    }
}

/// Procedure numbers for NFS version 3.
#[allow(clippy::upper_case_acronyms)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum NFSProgram {
    NFSPROC3_NULL = 0,
    NFSPROC3_GETATTR = 1,
    NFSPROC3_SETATTR = 2,
    NFSPROC3_LOOKUP = 3,
    NFSPROC3_ACCESS = 4,
    NFSPROC3_READLINK = 5,
    NFSPROC3_READ = 6,
    NFSPROC3_WRITE = 7,
    NFSPROC3_CREATE = 8,
    NFSPROC3_MKDIR = 9,
    NFSPROC3_SYMLINK = 10,
    NFSPROC3_MKNOD = 11,
    NFSPROC3_REMOVE = 12,
    NFSPROC3_RMDIR = 13,
    NFSPROC3_RENAME = 14,
    NFSPROC3_LINK = 15,
    NFSPROC3_READDIR = 16,
    NFSPROC3_READDIRPLUS = 17,
    NFSPROC3_FSSTAT = 18,
    NFSPROC3_FSINFO = 19,
    NFSPROC3_PATHCONF = 20,
    NFSPROC3_COMMIT = 21,
    INVALID = 22,
}

pub type opaque = u8;
pub type filename3 = nfsstring;
pub type nfspath3 = nfsstring;
pub type fileid3 = u64;
pub type cookie3 = u64;
pub type cookieverf3 = [opaque; NFS3_COOKIEVERFSIZE as usize];
pub type createverf3 = [opaque; NFS3_CREATEVERFSIZE as usize];
pub type writeverf3 = [opaque; NFS3_WRITEVERFSIZE as usize];
pub type uid3 = u32;
pub type gid3 = u32;
pub type size3 = u64;
pub type offset3 = u64;
pub type mode3 = u32;
pub type count3 = u32;

/// Status codes for NFS version 3 operations (RFC 1813 section 2.6).
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum nfsstat3 {
    NFS3_OK = 0,
    /// Caller is neither privileged nor the owner of the target.
    NFS3ERR_PERM = 1,
    NFS3ERR_NOENT = 2,
    /// Hard I/O error while processing the operation.
    NFS3ERR_IO = 5,
    NFS3ERR_NXIO = 6,
    NFS3ERR_ACCES = 13,
    NFS3ERR_EXIST = 17,
    NFS3ERR_XDEV = 18,
    NFS3ERR_NODEV = 19,
    NFS3ERR_NOTDIR = 20,
    NFS3ERR_ISDIR = 21,
    NFS3ERR_INVAL = 22,
    NFS3ERR_FBIG = 27,
    NFS3ERR_NOSPC = 28,
    NFS3ERR_ROFS = 30,
    NFS3ERR_MLINK = 31,
    NFS3ERR_NAMETOOLONG = 63,
    NFS3ERR_NOTEMPTY = 66,
    NFS3ERR_DQUOT = 69,
    /// The filehandle no longer names a live object.
    NFS3ERR_STALE = 70,
    NFS3ERR_REMOTE = 71,
    /// The filehandle failed internal consistency checks.
    NFS3ERR_BADHANDLE = 10001,
    NFS3ERR_NOT_SYNC = 10002,
    /// READDIR cookie is from a previous directory generation.
    NFS3ERR_BAD_COOKIE = 10003,
    NFS3ERR_NOTSUPP = 10004,
    NFS3ERR_TOOSMALL = 10005,
    NFS3ERR_SERVERFAULT = 10006,
    NFS3ERR_BADTYPE = 10007,
    NFS3ERR_JUKEBOX = 10008,
}
SerializeEnum!(nfsstat3);
DeserializeEnum!(nfsstat3);

/// File type (RFC 1813 section 2.3.5).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum ftype3 {
    #[default]
    NF3REG = 1,
    NF3DIR = 2,
    NF3BLK = 3,
    NF3CHR = 4,
    NF3LNK = 5,
    NF3SOCK = 6,
    NF3FIFO = 7,
}
SerializeEnum!(ftype3);
DeserializeEnum!(ftype3);

/// Major/minor numbers of a device special file.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct specdata3 {
    pub specdata1: u32,
    pub specdata2: u32,
}
SerializeStruct!(specdata3, specdata1, specdata2);
DeserializeStruct!(specdata3, specdata1, specdata2);

/// Opaque filehandle, at most [`NFS3_FHSIZE`] bytes. The server chooses the
/// internal layout (see the `fh` module); clients must treat it as a blob.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct nfs_fh3 {
    pub data: Vec<u8>,
}
SerializeStruct!(nfs_fh3, data);
DeserializeStruct!(nfs_fh3, data);

/// Timestamp. This server only populates whole seconds.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct nfstime3 {
    pub seconds: u32,
    pub nseconds: u32,
}
SerializeStruct!(nfstime3, seconds, nseconds);
DeserializeStruct!(nfstime3, seconds, nseconds);

/// Full file attributes (RFC 1813 section 2.3.5).
#[derive(Copy, Clone, Debug, Default)]
pub struct fattr3 {
    pub ftype: ftype3,
    pub mode: mode3,
    pub nlink: u32,
    pub uid: uid3,
    pub gid: gid3,
    pub size: size3,
    /// Bytes actually allocated on the backing store.
    pub used: size3,
    pub rdev: specdata3,
    pub fsid: u64,
    pub fileid: fileid3,
    pub atime: nfstime3,
    pub mtime: nfstime3,
    pub ctime: nfstime3,
}
SerializeStruct!(
    fattr3, ftype, mode, nlink, uid, gid, size, used, rdev, fsid, fileid, atime, mtime, ctime
);
DeserializeStruct!(
    fattr3, ftype, mode, nlink, uid, gid, size, used, rdev, fsid, fileid, atime, mtime, ctime
);

/// Before-image used for weak cache consistency (RFC 1813 section 2.3.8).
#[derive(Copy, Clone, Debug, Default)]
pub struct wcc_attr {
    pub size: size3,
    pub mtime: nfstime3,
    pub ctime: nfstime3,
}
SerializeStruct!(wcc_attr, size, mtime, ctime);
DeserializeStruct!(wcc_attr, size, mtime, ctime);

/// Optional pre-operation attributes.
#[derive(Copy, Clone, Debug, Default)]
#[repr(u32)]
pub enum pre_op_attr {
    #[default]
    Void,
    attributes(wcc_attr),
}
SerializeBoolUnion!(pre_op_attr, attributes, wcc_attr);
DeserializeBoolUnion!(pre_op_attr, attributes, wcc_attr);

/// Optional post-operation attributes, returned by nearly every procedure.
#[derive(Copy, Clone, Debug, Default)]
#[repr(u32)]
pub enum post_op_attr {
    #[default]
    Void,
    attributes(fattr3),
}
SerializeBoolUnion!(post_op_attr, attributes, fattr3);
DeserializeBoolUnion!(post_op_attr, attributes, fattr3);

/// Before/after attribute pair for mutating operations.
#[derive(Copy, Clone, Debug, Default)]
pub struct wcc_data {
    pub before: pre_op_attr,
    pub after: post_op_attr,
}
SerializeStruct!(wcc_data, before, after);
DeserializeStruct!(wcc_data, before, after);

/// Optional filehandle in CREATE-family results.
#[derive(Clone, Debug, Default)]
#[repr(u32)]
pub enum post_op_fh3 {
    #[default]
    Void,
    handle(nfs_fh3),
}
SerializeBoolUnion!(post_op_fh3, handle, nfs_fh3);
DeserializeBoolUnion!(post_op_fh3, handle, nfs_fh3);

#[derive(Copy, Clone, Debug, Default)]
#[repr(u32)]
pub enum set_mode3 {
    #[default]
    Void,
    mode(mode3),
}
SerializeBoolUnion!(set_mode3, mode, mode3);
DeserializeBoolUnion!(set_mode3, mode, mode3);

#[derive(Copy, Clone, Debug, Default)]
#[repr(u32)]
pub enum set_uid3 {
    #[default]
    Void,
    uid(uid3),
}
SerializeBoolUnion!(set_uid3, uid, uid3);
DeserializeBoolUnion!(set_uid3, uid, uid3);

#[derive(Copy, Clone, Debug, Default)]
#[repr(u32)]
pub enum set_gid3 {
    #[default]
    Void,
    gid(gid3),
}
SerializeBoolUnion!(set_gid3, gid, gid3);
DeserializeBoolUnion!(set_gid3, gid, gid3);

#[derive(Copy, Clone, Debug, Default)]
#[repr(u32)]
pub enum set_size3 {
    #[default]
    Void,
    size(size3),
}
SerializeBoolUnion!(set_size3, size, size3);
DeserializeBoolUnion!(set_size3, size, size3);

/// How SETATTR should change atime: keep, stamp server time, or take the
/// client's value.
#[derive(Copy, Clone, Debug, Default)]
#[repr(u32)]
pub enum set_atime {
    #[default]
    DONT_CHANGE,
    SET_TO_SERVER_TIME,
    SET_TO_CLIENT_TIME(nfstime3),
}

impl Serialize for set_atime {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        match self {
            set_atime::DONT_CHANGE => 0_u32.serialize(dest),
            set_atime::SET_TO_SERVER_TIME => 1_u32.serialize(dest),
            set_atime::SET_TO_CLIENT_TIME(v) => {
                2_u32.serialize(dest)?;
                v.serialize(dest)
            }
        }
    }
}

impl Deserialize for set_atime {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        match deserialize::<u32>(src)? {
            0 => *self = set_atime::DONT_CHANGE,
            1 => *self = set_atime::SET_TO_SERVER_TIME,
            2 => *self = set_atime::SET_TO_CLIENT_TIME(deserialize(src)?),
            how => return Err(invalid_data(format!("invalid set_atime value: {how}"))),
        }
        Ok(())
    }
}

/// `set_atime`'s counterpart for mtime.
#[derive(Copy, Clone, Debug, Default)]
#[repr(u32)]
pub enum set_mtime {
    #[default]
    DONT_CHANGE,
    SET_TO_SERVER_TIME,
    SET_TO_CLIENT_TIME(nfstime3),
}

impl Serialize for set_mtime {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        match self {
            set_mtime::DONT_CHANGE => 0_u32.serialize(dest),
            set_mtime::SET_TO_SERVER_TIME => 1_u32.serialize(dest),
            set_mtime::SET_TO_CLIENT_TIME(v) => {
                2_u32.serialize(dest)?;
                v.serialize(dest)
            }
        }
    }
}

impl Deserialize for set_mtime {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        match deserialize::<u32>(src)? {
            0 => *self = set_mtime::DONT_CHANGE,
            1 => *self = set_mtime::SET_TO_SERVER_TIME,
            2 => *self = set_mtime::SET_TO_CLIENT_TIME(deserialize(src)?),
            how => return Err(invalid_data(format!("invalid set_mtime value: {how}"))),
        }
        Ok(())
    }
}

/// Settable attributes carried by SETATTR and the create-family procedures.
#[derive(Copy, Clone, Debug, Default)]
pub struct sattr3 {
    pub mode: set_mode3,
    pub uid: set_uid3,
    pub gid: set_gid3,
    pub size: set_size3,
    pub atime: set_atime,
    pub mtime: set_mtime,
}
SerializeStruct!(sattr3, mode, uid, gid, size, atime, mtime);
DeserializeStruct!(sattr3, mode, uid, gid, size, atime, mtime);

/// Directory handle plus a name within it.
#[derive(Clone, Debug, Default)]
pub struct diropargs3 {
    pub dir: nfs_fh3,
    pub name: filename3,
}
SerializeStruct!(diropargs3, dir, name);
DeserializeStruct!(diropargs3, dir, name);

/// Attributes and target path for SYMLINK.
#[derive(Clone, Debug, Default)]
pub struct symlinkdata3 {
    pub symlink_attributes: sattr3,
    pub symlink_data: nfspath3,
}
SerializeStruct!(symlinkdata3, symlink_attributes, symlink_data);
DeserializeStruct!(symlinkdata3, symlink_attributes, symlink_data);

// ACCESS procedure bits (RFC 1813 section 3.3.4).
pub const ACCESS3_READ: u32 = 0x0001;
pub const ACCESS3_LOOKUP: u32 = 0x0002;
pub const ACCESS3_MODIFY: u32 = 0x0004;
pub const ACCESS3_EXTEND: u32 = 0x0008;
pub const ACCESS3_DELETE: u32 = 0x0010;
pub const ACCESS3_EXECUTE: u32 = 0x0020;

/// CREATE dispositions (RFC 1813 section 3.3.8).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum createmode3 {
    #[default]
    UNCHECKED = 0,
    GUARDED = 1,
    EXCLUSIVE = 2,
}
SerializeEnum!(createmode3);
DeserializeEnum!(createmode3);

/// Optional ctime guard for SETATTR.
#[derive(Copy, Clone, Debug, Default)]
#[repr(u32)]
pub enum sattrguard3 {
    #[default]
    Void,
    obj_ctime(nfstime3),
}
SerializeBoolUnion!(sattrguard3, obj_ctime, nfstime3);
DeserializeBoolUnion!(sattrguard3, obj_ctime, nfstime3);

/// Arguments of the SETATTR procedure.
#[derive(Clone, Debug, Default)]
pub struct SETATTR3args {
    pub object: nfs_fh3,
    pub new_attributes: sattr3,
    pub guard: sattrguard3,
}
SerializeStruct!(SETATTR3args, object, new_attributes, guard);
DeserializeStruct!(SETATTR3args, object, new_attributes, guard);
