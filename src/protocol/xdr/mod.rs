//! XDR (External Data Representation, RFC 4506) serialization layer.
//!
//! Everything that crosses the wire implements the [`Serialize`] and
//! [`Deserialize`] traits. Scalars are 4/8-byte big-endian quantities,
//! variable-length opaques carry a length prefix and are padded to a
//! multiple of four bytes. Structs, enums, and the RFC's `bool`-discriminated
//! unions get their implementations from the `SerializeStruct!`,
//! `SerializeEnum!`, and `SerializeBoolUnion!` macro families (and their
//! `Deserialize*` counterparts).

use std::io::{Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

pub mod mount;
pub mod nfs3;
pub mod rpc;

/// Byte order used for all XDR scalars.
pub type XdrEndian = BigEndian;

/// Serializes a value into an XDR byte stream.
pub trait Serialize {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()>;
}

/// Deserializes a value from an XDR byte stream, in place.
pub trait Deserialize {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()>;
}

/// Reads a `T` from the stream starting from its default value.
pub fn deserialize<T: Deserialize + Default>(src: &mut impl Read) -> std::io::Result<T> {
    let mut value = T::default();
    value.deserialize(src)?;
    Ok(value)
}

pub(crate) fn invalid_data(msg: String) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, msg)
}

impl Serialize for bool {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        dest.write_u32::<XdrEndian>(u32::from(*self))
    }
}

impl Deserialize for bool {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        *self = src.read_u32::<XdrEndian>()? > 0;
        Ok(())
    }
}

impl Serialize for u32 {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        dest.write_u32::<XdrEndian>(*self)
    }
}

impl Deserialize for u32 {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        *self = src.read_u32::<XdrEndian>()?;
        Ok(())
    }
}

impl Serialize for i32 {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        dest.write_i32::<XdrEndian>(*self)
    }
}

impl Deserialize for i32 {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        *self = src.read_i32::<XdrEndian>()?;
        Ok(())
    }
}

impl Serialize for u64 {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        dest.write_u64::<XdrEndian>(*self)
    }
}

impl Deserialize for u64 {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        *self = src.read_u64::<XdrEndian>()?;
        Ok(())
    }
}

impl Serialize for i64 {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        dest.write_i64::<XdrEndian>(*self)
    }
}

impl Deserialize for i64 {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        *self = src.read_i64::<XdrEndian>()?;
        Ok(())
    }
}

/// Fixed-size opaques are written raw, without a length prefix.
impl<const N: usize> Serialize for [u8; N] {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        dest.write_all(self)
    }
}

impl<const N: usize> Deserialize for [u8; N] {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        src.read_exact(self)
    }
}

/// Variable-length opaque: length prefix, bytes, zero padding to 4.
impl Serialize for Vec<u8> {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        let length = u32::try_from(self.len())
            .map_err(|_| invalid_data("opaque exceeds XDR length".into()))?;
        length.serialize(dest)?;
        dest.write_all(self)?;
        let pad = (4 - length % 4) % 4;
        dest.write_all(&[0u8; 4][..pad as usize])
    }
}

impl Deserialize for Vec<u8> {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        let length = deserialize::<u32>(src)?;
        self.resize(length as usize, 0);
        src.read_exact(self)?;
        let pad = (4 - length % 4) % 4;
        let mut scratch = [0u8; 4];
        src.read_exact(&mut scratch[..pad as usize])
    }
}

impl Serialize for Vec<u32> {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        let length = u32::try_from(self.len())
            .map_err(|_| invalid_data("array exceeds XDR length".into()))?;
        length.serialize(dest)?;
        for item in self {
            item.serialize(dest)?;
        }
        Ok(())
    }
}

impl Deserialize for Vec<u32> {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        let length = deserialize::<u32>(src)?;
        self.resize(length as usize, 0);
        for item in self.iter_mut() {
            item.deserialize(src)?;
        }
        Ok(())
    }
}

/// XDR strings share the opaque encoding; the bytes must be UTF-8.
impl Serialize for String {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        self.as_bytes().to_vec().serialize(dest)
    }
}

impl Deserialize for String {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        let bytes = deserialize::<Vec<u8>>(src)?;
        *self = String::from_utf8(bytes)
            .map_err(|_| invalid_data("string is not valid UTF-8".into()))?;
        Ok(())
    }
}

/// Implements [`Serialize`] for a struct by writing each field in order.
#[macro_export]
macro_rules! SerializeStruct {
    ($t:ident, $($field:ident),+ $(,)?) => {
        impl $crate::protocol::xdr::Serialize for $t {
            fn serialize<W: std::io::Write>(&self, dest: &mut W) -> std::io::Result<()> {
                $($crate::protocol::xdr::Serialize::serialize(&self.$field, dest)?;)+
                Ok(())
            }
        }
    };
}

/// Implements [`Deserialize`] for a struct by reading each field in order.
#[macro_export]
macro_rules! DeserializeStruct {
    ($t:ident, $($field:ident),+ $(,)?) => {
        impl $crate::protocol::xdr::Deserialize for $t {
            fn deserialize<R: std::io::Read>(&mut self, src: &mut R) -> std::io::Result<()> {
                $($crate::protocol::xdr::Deserialize::deserialize(&mut self.$field, src)?;)+
                Ok(())
            }
        }
    };
}

/// Implements [`Serialize`] for a fieldless `repr(u32)` enum.
#[macro_export]
macro_rules! SerializeEnum {
    ($t:ident) => {
        impl $crate::protocol::xdr::Serialize for $t {
            fn serialize<W: std::io::Write>(&self, dest: &mut W) -> std::io::Result<()> {
                $crate::protocol::xdr::Serialize::serialize(&(*self as u32), dest)
            }
        }
    };
}

/// Implements [`Deserialize`] for a fieldless `repr(u32)` enum via
/// `num_traits::FromPrimitive`; unknown discriminants are an error.
#[macro_export]
macro_rules! DeserializeEnum {
    ($t:ident) => {
        impl $crate::protocol::xdr::Deserialize for $t {
            fn deserialize<R: std::io::Read>(&mut self, src: &mut R) -> std::io::Result<()> {
                let raw = $crate::protocol::xdr::deserialize::<u32>(src)?;
                match <$t as num_traits::cast::FromPrimitive>::from_u32(raw) {
                    Some(value) => {
                        *self = value;
                        Ok(())
                    }
                    None => Err($crate::protocol::xdr::invalid_data(format!(
                        "invalid {} discriminant: {raw}",
                        stringify!($t)
                    ))),
                }
            }
        }
    };
}

/// Implements [`Serialize`] for the RFC's `bool`-discriminated optional union:
/// `Void` writes FALSE, the payload case writes TRUE followed by the payload.
#[macro_export]
macro_rules! SerializeBoolUnion {
    ($t:ident, $case:ident, $ty:ty) => {
        impl $crate::protocol::xdr::Serialize for $t {
            fn serialize<W: std::io::Write>(&self, dest: &mut W) -> std::io::Result<()> {
                match self {
                    $t::Void => $crate::protocol::xdr::Serialize::serialize(&false, dest),
                    $t::$case(v) => {
                        $crate::protocol::xdr::Serialize::serialize(&true, dest)?;
                        $crate::protocol::xdr::Serialize::serialize(v, dest)
                    }
                }
            }
        }
    };
}

/// Deserialize counterpart of `SerializeBoolUnion!`.
#[macro_export]
macro_rules! DeserializeBoolUnion {
    ($t:ident, $case:ident, $ty:ty) => {
        impl $crate::protocol::xdr::Deserialize for $t {
            fn deserialize<R: std::io::Read>(&mut self, src: &mut R) -> std::io::Result<()> {
                let follows = $crate::protocol::xdr::deserialize::<bool>(src)?;
                *self = if follows {
                    $t::$case($crate::protocol::xdr::deserialize::<$ty>(src)?)
                } else {
                    $t::Void
                };
                Ok(())
            }
        }
    };
}

pub use crate::{
    DeserializeBoolUnion, DeserializeEnum, DeserializeStruct, SerializeBoolUnion, SerializeEnum,
    SerializeStruct,
};
