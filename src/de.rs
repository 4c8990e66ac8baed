//! Deserialization.
//!
//! A [`Decoder`] is also a serde `Deserializer`, for types that derive `Deserialize` instead of
//! implementing [`Decode`](crate::Decode). Serde builds fresh values rather than decoding into
//! existing ones, and raw bytes are handed to visitors as strings whenever they're valid UTF-8.

use std::io::Read;

use serde::de::{self, DeserializeOwned, DeserializeSeed, Visitor};
use tracing::debug;

use crate::{
    decode::{Decoder, Head},
    element::Element,
    error::{Error, Result},
    marker::{Category, Marker, NIL},
};

impl<R: Read> Decoder<R> {
    /// Deserialize the next value in the stream with serde.
    pub fn deserialize<T: DeserializeOwned>(&mut self) -> Result<T> {
        self.reset_depth();
        let result = T::deserialize(&mut *self);
        if let Err(ref err) = result {
            debug!(error = %err, "deserialize failed");
        }
        result
    }

    fn read_raw(&mut self, tag: u8, len: usize) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.decode_raw(&mut buf, Head { tag, len: Some(len) })?;
        Ok(buf)
    }
}

/// Deserialize one value from a byte source.
pub fn from_reader<R: Read, T: DeserializeOwned>(reader: R) -> Result<T> {
    Decoder::new(reader).deserialize()
}

/// Deserialize one value from a byte slice.
pub fn from_slice<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
    from_reader(data)
}

fn visit_element<'de, R: Read, V: Visitor<'de>>(
    de: &mut Decoder<R>,
    tag: u8,
    elem: Element,
    visitor: V,
) -> Result<V::Value> {
    match elem {
        Element::Nil => visitor.visit_unit(),
        Element::Bool(v) => visitor.visit_bool(v),
        Element::Int(v) => visitor.visit_i64(v),
        Element::Uint(v) => visitor.visit_u64(v),
        Element::F32(v) => visitor.visit_f32(v),
        Element::F64(v) => visitor.visit_f64(v),
        Element::Container(Category::RawBytes, len) => {
            match String::from_utf8(de.read_raw(tag, len)?) {
                Ok(s) => visitor.visit_string(s),
                Err(e) => visitor.visit_byte_buf(e.into_bytes()),
            }
        }
        Element::Container(Category::Sequence, len) => {
            de.enter()?;
            let mut access = SeqAccess { de: &mut *de, left: len };
            let value = visitor.visit_seq(&mut access)?;
            let left = access.left;
            if left != 0 {
                return Err(Error::SerdeFail(format!(
                    "{} sequence elements were not consumed",
                    left
                )));
            }
            de.leave();
            Ok(value)
        }
        Element::Container(Category::Map, len) => {
            de.enter()?;
            let mut access = MapAccess { de: &mut *de, left: len };
            let value = visitor.visit_map(&mut access)?;
            let left = access.left;
            if left != 0 {
                return Err(Error::SerdeFail(format!(
                    "{} map entries were not consumed",
                    left
                )));
            }
            de.leave();
            Ok(value)
        }
    }
}

impl<'de, 'a, R: Read> de::Deserializer<'de> for &'a mut Decoder<R> {
    type Error = Error;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let tag = self.read_tag()?;
        let elem = self.read_element(tag, None)?;
        visit_element(self, tag, elem, visitor)
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let tag = self.read_tag()?;
        match self.read_element(tag, None)? {
            Element::Container(Category::RawBytes, len) => {
                visitor.visit_byte_buf(self.read_raw(tag, len)?)
            }
            elem => visit_element(self, tag, elem, visitor),
        }
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_byte_buf(visitor)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        if self.peek_tag()? == NIL {
            self.read_tag()?;
            visitor.visit_none()
        } else {
            visitor.visit_some(self)
        }
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        let tag = self.peek_tag()?;
        match Marker::from_u8(tag) {
            Marker::FixMap(1) => {
                self.read_tag()?;
                self.enter()?;
                let value = visitor.visit_enum(EnumAccess {
                    de: &mut *self,
                    has_value: true,
                })?;
                self.leave();
                Ok(value)
            }
            m if m.category() == Some(Category::RawBytes) => visitor.visit_enum(EnumAccess {
                de: self,
                has_value: false,
            }),
            _ => Err(Error::SerdeFail(
                "expected a size-1 map or a string".to_string(),
            )),
        }
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str
        string unit unit_struct seq tuple tuple_struct map struct identifier ignored_any
    }
}

struct EnumAccess<'a, R> {
    de: &'a mut Decoder<R>,
    has_value: bool,
}

impl<'de, 'a, R: Read> de::EnumAccess<'de> for EnumAccess<'a, R> {
    type Error = Error;
    type Variant = Self;

    fn variant_seed<V>(self, seed: V) -> Result<(V::Value, Self::Variant)>
    where
        V: DeserializeSeed<'de>,
    {
        let val = seed.deserialize(&mut *self.de)?;
        Ok((val, self))
    }
}

impl<'de, 'a, R: Read> de::VariantAccess<'de> for EnumAccess<'a, R> {
    type Error = Error;

    fn unit_variant(self) -> Result<()> {
        if self.has_value {
            Err(Error::SerdeFail(
                "invalid type: non-unit variant, expected unit variant".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    fn newtype_variant_seed<T>(self, seed: T) -> Result<T::Value>
    where
        T: DeserializeSeed<'de>,
    {
        if self.has_value {
            seed.deserialize(&mut *self.de)
        } else {
            Err(Error::SerdeFail(
                "invalid type: unit variant, expected newtype variant".to_string(),
            ))
        }
    }

    fn struct_variant<V>(self, _fields: &'static [&'static str], visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        if self.has_value {
            de::Deserializer::deserialize_map(&mut *self.de, visitor)
        } else {
            Err(Error::SerdeFail(
                "invalid type: unit variant, expected struct variant".to_string(),
            ))
        }
    }

    fn tuple_variant<V>(self, len: usize, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        if self.has_value {
            de::Deserializer::deserialize_tuple(&mut *self.de, len, visitor)
        } else {
            Err(Error::SerdeFail(
                "invalid type: unit variant, expected tuple variant".to_string(),
            ))
        }
    }
}

struct SeqAccess<'a, R> {
    de: &'a mut Decoder<R>,
    left: usize,
}

impl<'de, 'a, R: Read> de::SeqAccess<'de> for SeqAccess<'a, R> {
    type Error = Error;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>>
    where
        T: DeserializeSeed<'de>,
    {
        if self.left > 0 {
            self.left -= 1;
            let val = seed.deserialize(&mut *self.de)?;
            Ok(Some(val))
        } else {
            Ok(None)
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.left)
    }
}

struct MapAccess<'a, R> {
    de: &'a mut Decoder<R>,
    left: usize,
}

impl<'de, 'a, R: Read> de::MapAccess<'de> for MapAccess<'a, R> {
    type Error = Error;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>>
    where
        K: DeserializeSeed<'de>,
    {
        if self.left > 0 {
            self.left -= 1;
            Ok(Some(seed.deserialize(&mut *self.de)?))
        } else {
            Ok(None)
        }
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value>
    where
        V: DeserializeSeed<'de>,
    {
        seed.deserialize(&mut *self.de)
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.left)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{error::Fault, timestamp::Timestamp, value::Value};
    use serde::Deserialize;
    use serde_bytes::ByteBuf;
    use std::collections::BTreeMap;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Config {
        name: String,
        port: u16,
        tags: Vec<String>,
        #[serde(default)]
        limit: Option<i32>,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    enum Command {
        Stop,
        Move(i8),
        Jump { height: u32 },
    }

    #[test]
    fn derived_struct() {
        // {"name": "db", "port": 5432, "tags": ["a"], "limit": nil}
        let data = [
            0x84, 0xa4, b'n', b'a', b'm', b'e', 0xa2, b'd', b'b', 0xa4, b'p', b'o', b'r', b't',
            0xcd, 0x15, 0x38, 0xa4, b't', b'a', b'g', b's', 0x91, 0xa1, b'a', 0xa5, b'l', b'i',
            b'm', b'i', b't', 0xc0,
        ];
        let c: Config = from_slice(&data).unwrap();
        assert_eq!(
            c,
            Config {
                name: "db".into(),
                port: 5432,
                tags: vec!["a".into()],
                limit: None,
            }
        );
    }

    #[test]
    fn enums() {
        let c: Command = from_slice(&[0xa4, b'S', b't', b'o', b'p']).unwrap();
        assert_eq!(c, Command::Stop);
        let c: Command = from_slice(&[0x81, 0xa4, b'M', b'o', b'v', b'e', 0xff]).unwrap();
        assert_eq!(c, Command::Move(-1));
        let data = [
            0x81, 0xa4, b'J', b'u', b'm', b'p', 0x81, 0xa6, b'h', b'e', b'i', b'g', b'h', b't',
            0x03,
        ];
        let c: Command = from_slice(&data).unwrap();
        assert_eq!(c, Command::Jump { height: 3 });
        assert!(from_slice::<Command>(&[0x92, 0x01, 0x02]).is_err());
    }

    #[test]
    fn bytes_and_strings() {
        let b: ByteBuf = from_slice(&[0xa2, b'h', b'i']).unwrap();
        assert_eq!(b.as_slice(), b"hi");
        let v: Value = from_slice(&[0xa2, b'h', b'i']).unwrap();
        assert_eq!(v, Value::from("hi"));
        let v: Value = from_slice(&[0xa2, 0xff, 0xfe]).unwrap();
        assert_eq!(v, Value::Bin(vec![0xff, 0xfe]));
    }

    #[test]
    fn values_and_maps() {
        let v: Value = from_slice(&[0x82, 0xa1, b'a', 0x01, 0xa1, b'b', 0xcc, 0xff]).unwrap();
        assert_eq!(v["a"], Value::Int(1));
        assert_eq!(v["b"], Value::Uint(255));
        let m: BTreeMap<String, Option<bool>> =
            from_slice(&[0x82, 0xa1, b'x', 0xc3, 0xa1, b'y', 0xc0]).unwrap();
        assert_eq!(m["x"], Some(true));
        assert_eq!(m["y"], None);
    }

    #[test]
    fn timestamp() {
        let t: Timestamp = from_slice(&[0x92, 0x0a, 0x05]).unwrap();
        assert_eq!(t, Timestamp::from_utc(10, 5).unwrap());
    }

    #[test]
    fn unconsumed_elements() {
        let err = from_slice::<(u8, u8)>(&[0x93, 0x01, 0x02, 0x03]).unwrap_err();
        assert!(matches!(err, Error::SerdeFail(_)));
        let t: (u8, u8) = from_slice(&[0x92, 0x01, 0x02]).unwrap();
        assert_eq!(t, (1, 2));
    }

    #[test]
    fn sequential() {
        let data = [0x01, 0xa1, b'z'];
        let mut dec = Decoder::new(&data[..]);
        let n: u32 = dec.deserialize().unwrap();
        let s: String = dec.deserialize().unwrap();
        assert_eq!((n, s.as_str()), (1, "z"));
    }

    #[test]
    fn limits_and_faults() {
        let mut data = vec![0x91; 200];
        data.push(0xc0);
        let err = from_slice::<Value>(&data).unwrap_err();
        assert_eq!(err.kind(), Fault::Limit);
        let err = from_slice::<Value>(&[0xc1]).unwrap_err();
        assert_eq!(err.kind(), Fault::Format);
        let err = from_slice::<u64>(&[0xcf, 0x00]).unwrap_err();
        assert_eq!(err.kind(), Fault::Read);
    }
}
