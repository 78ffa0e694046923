//! Big-endian payload primitives shared by every message in the registry:
//! fixed-width integers, length-prefixed strings, optionals and arrays.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::CodecError;

/// Something that can be appended to an outgoing frame payload.
pub trait Encode {
    fn encode(&self, buf: &mut BytesMut);
}

/// Something that can be read back off an incoming frame payload.
pub trait Decode: Sized {
    fn decode(buf: &mut Bytes) -> Result<Self, CodecError>;
}

macro_rules! impl_int_primitive {
    ($ty:ty, $put:ident, $get:ident, $name:literal) => {
        impl Encode for $ty {
            fn encode(&self, buf: &mut BytesMut) {
                buf.$put(*self);
            }
        }

        impl Decode for $ty {
            fn decode(buf: &mut Bytes) -> Result<Self, CodecError> {
                if buf.remaining() < std::mem::size_of::<$ty>() {
                    return Err(CodecError::UnexpectedEof($name));
                }
                Ok(buf.$get())
            }
        }
    };
}

impl_int_primitive!(u8, put_u8, get_u8, "u8");
impl_int_primitive!(u16, put_u16, get_u16, "u16");
impl_int_primitive!(u32, put_u32, get_u32, "u32");
impl_int_primitive!(u64, put_u64, get_u64, "u64");
impl_int_primitive!(i64, put_i64, get_i64, "i64");

/// A u16-length-prefixed UTF-8 string, per §4.1.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScString(pub String);

impl From<String> for ScString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ScString {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl std::ops::Deref for ScString {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

impl Encode for ScString {
    fn encode(&self, buf: &mut BytesMut) {
        let bytes = self.0.as_bytes();
        (bytes.len() as u16).encode(buf);
        buf.put_slice(bytes);
    }
}

impl Decode for ScString {
    fn decode(buf: &mut Bytes) -> Result<Self, CodecError> {
        let len = u16::decode(buf)? as usize;
        if buf.remaining() < len {
            return Err(CodecError::UnexpectedEof("string body"));
        }
        let bytes = buf.copy_to_bytes(len);
        let s = String::from_utf8_lossy(&bytes).into_owned();
        Ok(ScString(s))
    }
}

/// A u16-length-prefixed raw byte blob (used for encrypted message
/// content, where the server never interprets the bytes).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScBytes(pub Vec<u8>);

impl Encode for ScBytes {
    fn encode(&self, buf: &mut BytesMut) {
        (self.0.len() as u16).encode(buf);
        buf.put_slice(&self.0);
    }
}

impl Decode for ScBytes {
    fn decode(buf: &mut Bytes) -> Result<Self, CodecError> {
        let len = u16::decode(buf)? as usize;
        if buf.remaining() < len {
            return Err(CodecError::UnexpectedEof("bytes body"));
        }
        Ok(ScBytes(buf.copy_to_bytes(len).to_vec()))
    }
}

/// `u8` present-flag then `T`, per §4.1's "optional T".
impl<T: Encode> Encode for Option<T> {
    fn encode(&self, buf: &mut BytesMut) {
        match self {
            Some(v) => {
                1u8.encode(buf);
                v.encode(buf);
            }
            None => 0u8.encode(buf),
        }
    }
}

impl<T: Decode> Decode for Option<T> {
    fn decode(buf: &mut Bytes) -> Result<Self, CodecError> {
        match u8::decode(buf)? {
            0 => Ok(None),
            _ => Ok(Some(T::decode(buf)?)),
        }
    }
}

/// `u16` count then items, per §4.1's "arrays".
impl<T: Encode> Encode for Vec<T> {
    fn encode(&self, buf: &mut BytesMut) {
        (self.len() as u16).encode(buf);
        for item in self {
            item.encode(buf);
        }
    }
}

impl<T: Decode> Decode for Vec<T> {
    fn decode(buf: &mut Bytes) -> Result<Self, CodecError> {
        let count = u16::decode(buf)? as usize;
        let mut items = Vec::with_capacity(count.min(4096));
        for _ in 0..count {
            items.push(T::decode(buf)?);
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip<T: Encode + Decode + PartialEq + std::fmt::Debug>(value: T) {
        let mut buf = BytesMut::new();
        value.encode(&mut buf);
        let mut frozen = buf.freeze();
        let decoded = T::decode(&mut frozen).expect("decode");
        assert_eq!(value, decoded);
        assert!(frozen.is_empty());
    }

    #[test]
    fn roundtrips_integers() {
        roundtrip(7u8);
        roundtrip(1234u16);
        roundtrip(0xdeadbeefu32);
        roundtrip(0xdeadbeef_cafef00du64);
        roundtrip(-42i64);
    }

    #[test]
    fn roundtrips_string() {
        roundtrip(ScString::from("hello, \u{1F980}"));
        roundtrip(ScString::from(""));
    }

    #[test]
    fn roundtrips_option() {
        roundtrip(Some(ScString::from("present")));
        roundtrip(None::<ScString>);
    }

    #[test]
    fn roundtrips_array() {
        roundtrip(vec![1u32, 2, 3]);
        roundtrip(Vec::<u32>::new());
    }

    #[test]
    fn string_decode_fails_on_truncated_body() {
        let mut buf = BytesMut::new();
        10u16.encode(&mut buf); // claims 10 bytes
        buf.put_slice(b"abc"); // only provides 3
        let mut frozen = buf.freeze();
        assert!(matches!(
            ScString::decode(&mut frozen),
            Err(CodecError::UnexpectedEof(_))
        ));
    }
}
