//! XDR structures for file operations: READ, WRITE, CREATE, LINK, and COMMIT
//! (RFC 1813 sections 3.3.6-3.3.8, 3.3.15, 3.3.21).

#![allow(dead_code)]
#![allow(non_camel_case_types)]

use std::io::{Read, Write};

use num_derive::{FromPrimitive, ToPrimitive};

use super::*;

/// Arguments of READ (procedure 6).
#[derive(Clone, Debug, Default)]
pub struct READ3args {
    pub file: nfs_fh3,
    pub offset: offset3,
    pub count: count3,
}
SerializeStruct!(READ3args, file, offset, count);
DeserializeStruct!(READ3args, file, offset, count);

/// Success body of READ.
#[derive(Clone, Debug, Default)]
pub struct READ3resok {
    pub file_attributes: post_op_attr,
    pub count: count3,
    pub eof: bool,
    pub data: Vec<u8>,
}
SerializeStruct!(READ3resok, file_attributes, count, eof, data);
DeserializeStruct!(READ3resok, file_attributes, count, eof, data);

/// Stability requested by a WRITE and reported back in its result.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum stable_how {
    #[default]
    UNSTABLE = 0,
    DATA_SYNC = 1,
    FILE_SYNC = 2,
}
SerializeEnum!(stable_how);
DeserializeEnum!(stable_how);

/// Arguments of WRITE (procedure 7).
#[derive(Clone, Debug, Default)]
pub struct WRITE3args {
    pub file: nfs_fh3,
    pub offset: offset3,
    pub count: count3,
    pub stable: stable_how,
    pub data: Vec<u8>,
}
SerializeStruct!(WRITE3args, file, offset, count, stable, data);
DeserializeStruct!(WRITE3args, file, offset, count, stable, data);

/// Success body of WRITE.
#[derive(Clone, Debug, Default)]
pub struct WRITE3resok {
    pub file_wcc: wcc_data,
    pub count: count3,
    pub committed: stable_how,
    pub verf: writeverf3,
}
SerializeStruct!(WRITE3resok, file_wcc, count, committed, verf);
DeserializeStruct!(WRITE3resok, file_wcc, count, committed, verf);

/// CREATE disposition union: UNCHECKED and GUARDED carry initial attributes,
/// EXCLUSIVE carries the client's verifier.
#[derive(Clone, Debug)]
pub enum createhow3 {
    UNCHECKED(sattr3),
    GUARDED(sattr3),
    EXCLUSIVE(createverf3),
}

impl Default for createhow3 {
    fn default() -> createhow3 {
        createhow3::UNCHECKED(sattr3::default())
    }
}

impl createhow3 {
    pub fn mode(&self) -> createmode3 {
        match self {
            createhow3::UNCHECKED(_) => createmode3::UNCHECKED,
            createhow3::GUARDED(_) => createmode3::GUARDED,
            createhow3::EXCLUSIVE(_) => createmode3::EXCLUSIVE,
        }
    }
}

impl Serialize for createhow3 {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        self.mode().serialize(dest)?;
        match self {
            createhow3::UNCHECKED(attr) | createhow3::GUARDED(attr) => attr.serialize(dest),
            createhow3::EXCLUSIVE(verf) => verf.serialize(dest),
        }
    }
}

impl Deserialize for createhow3 {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        *self = match deserialize::<createmode3>(src)? {
            createmode3::UNCHECKED => createhow3::UNCHECKED(deserialize(src)?),
            createmode3::GUARDED => createhow3::GUARDED(deserialize(src)?),
            createmode3::EXCLUSIVE => createhow3::EXCLUSIVE(deserialize(src)?),
        };
        Ok(())
    }
}

/// Arguments of CREATE (procedure 8).
#[derive(Clone, Debug, Default)]
pub struct CREATE3args {
    pub where_dir: diropargs3,
    pub how: createhow3,
}
SerializeStruct!(CREATE3args, where_dir, how);
DeserializeStruct!(CREATE3args, where_dir, how);

/// Arguments of LINK (procedure 15).
#[derive(Clone, Debug, Default)]
pub struct LINK3args {
    pub file: nfs_fh3,
    pub link: diropargs3,
}
SerializeStruct!(LINK3args, file, link);
DeserializeStruct!(LINK3args, file, link);

/// Arguments of COMMIT (procedure 21).
#[derive(Clone, Debug, Default)]
pub struct COMMIT3args {
    pub file: nfs_fh3,
    pub offset: offset3,
    pub count: count3,
}
SerializeStruct!(COMMIT3args, file, offset, count);
DeserializeStruct!(COMMIT3args, file, offset, count);

/// Success body of COMMIT.
#[derive(Clone, Debug, Default)]
pub struct COMMIT3resok {
    pub file_wcc: wcc_data,
    pub verf: writeverf3,
}
SerializeStruct!(COMMIT3resok, file_wcc, verf);
DeserializeStruct!(COMMIT3resok, file_wcc, verf);
