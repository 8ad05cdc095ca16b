//! XDR structures for directory operations: MKDIR, SYMLINK, MKNOD, RENAME,
//! READDIR, and READDIRPLUS (RFC 1813 sections 3.3.9-3.3.17).

#![allow(dead_code)]
#![allow(non_camel_case_types)]

use std::io::{Read, Write};

use super::*;

/// Arguments of MKDIR (procedure 9).
#[derive(Clone, Debug, Default)]
pub struct MKDIR3args {
    pub dirops: diropargs3,
    pub attributes: sattr3,
}
SerializeStruct!(MKDIR3args, dirops, attributes);
DeserializeStruct!(MKDIR3args, dirops, attributes);

/// Arguments of SYMLINK (procedure 10).
#[derive(Clone, Debug, Default)]
pub struct SYMLINK3args {
    pub dirops: diropargs3,
    pub symlink: symlinkdata3,
}
SerializeStruct!(SYMLINK3args, dirops, symlink);
DeserializeStruct!(SYMLINK3args, dirops, symlink);

/// Arguments of RENAME (procedure 14).
#[derive(Clone, Debug, Default)]
pub struct RENAME3args {
    pub from: diropargs3,
    pub to: diropargs3,
}
SerializeStruct!(RENAME3args, from, to);
DeserializeStruct!(RENAME3args, from, to);

/// One READDIR entry. The cookie names the position just past this entry.
#[derive(Clone, Debug, Default)]
pub struct entry3 {
    pub fileid: fileid3,
    pub name: filename3,
    pub cookie: cookie3,
}
SerializeStruct!(entry3, fileid, name, cookie);
DeserializeStruct!(entry3, fileid, name, cookie);

/// Arguments of READDIR (procedure 16). `cookie == 0` starts from the
/// beginning; `count` bounds the encoded reply size in bytes.
#[derive(Clone, Debug, Default)]
pub struct READDIR3args {
    pub dir: nfs_fh3,
    pub cookie: cookie3,
    pub cookieverf: cookieverf3,
    pub count: count3,
}
SerializeStruct!(READDIR3args, dir, cookie, cookieverf, count);
DeserializeStruct!(READDIR3args, dir, cookie, cookieverf, count);

/// Arguments of READDIRPLUS (procedure 17). Decoded only to produce the
/// NOTSUPP reply this server returns.
#[derive(Clone, Debug, Default)]
pub struct READDIRPLUS3args {
    pub dir: nfs_fh3,
    pub cookie: cookie3,
    pub cookieverf: cookieverf3,
    pub dircount: count3,
    pub maxcount: count3,
}
SerializeStruct!(READDIRPLUS3args, dir, cookie, cookieverf, dircount, maxcount);
DeserializeStruct!(READDIRPLUS3args, dir, cookie, cookieverf, dircount, maxcount);

/// Device numbers plus attributes for MKNOD of a CHR/BLK node.
#[derive(Clone, Debug, Default)]
pub struct devicedata3 {
    pub dev_attributes: sattr3,
    pub spec: specdata3,
}
SerializeStruct!(devicedata3, dev_attributes, spec);
DeserializeStruct!(devicedata3, dev_attributes, spec);

/// Type-discriminated MKNOD payload (RFC 1813 section 3.3.11). Device types
/// carry device numbers, FIFO/SOCK only attributes, and the remaining types
/// carry nothing (the handler rejects them with INVAL).
#[derive(Clone, Debug)]
pub enum mknoddata3 {
    device(ftype3, devicedata3),
    pipe(ftype3, sattr3),
    other(ftype3),
}

impl Default for mknoddata3 {
    fn default() -> mknoddata3 {
        mknoddata3::other(ftype3::NF3REG)
    }
}

impl mknoddata3 {
    pub fn ftype(&self) -> ftype3 {
        match self {
            mknoddata3::device(t, _) | mknoddata3::pipe(t, _) | mknoddata3::other(t) => *t,
        }
    }
}

impl Serialize for mknoddata3 {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        match self {
            mknoddata3::device(t, v) => {
                t.serialize(dest)?;
                v.serialize(dest)
            }
            mknoddata3::pipe(t, v) => {
                t.serialize(dest)?;
                v.serialize(dest)
            }
            mknoddata3::other(t) => t.serialize(dest),
        }
    }
}

impl Deserialize for mknoddata3 {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        let ftype = deserialize::<ftype3>(src)?;
        *self = match ftype {
            ftype3::NF3CHR | ftype3::NF3BLK => mknoddata3::device(ftype, deserialize(src)?),
            ftype3::NF3SOCK | ftype3::NF3FIFO => mknoddata3::pipe(ftype, deserialize(src)?),
            _ => mknoddata3::other(ftype),
        };
        Ok(())
    }
}

/// Arguments of MKNOD (procedure 11).
#[derive(Clone, Debug, Default)]
pub struct MKNOD3args {
    pub where_dir: diropargs3,
    pub what: mknoddata3,
}
SerializeStruct!(MKNOD3args, where_dir, what);
DeserializeStruct!(MKNOD3args, where_dir, what);
