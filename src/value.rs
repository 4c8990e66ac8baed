use std::borrow::Cow;
use std::io::Read;
use std::ops::Index;

use crate::{
    decode::{Decode, Decoder, Head},
    error::{self, Result},
    record::RecordValue,
    resolve::Context,
};

/// A dynamically typed value, for destinations whose shape isn't known until the bytes arrive.
///
/// `Nil` is an open slot: decoding into it infers the variant from the wire, asking the decoder's
/// resolver what to build for containers. A `Value` that already holds a container is decoded
/// into in place, the same way the matching typed destination would be.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Str(String),
    Bin(Vec<u8>),
    Array(Vec<Value>),
    /// Key-value pairs in wire order.
    Map(Vec<(Value, Value)>),
    Record(RecordValue),
}

impl Value {
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Value::Bool(_))
    }

    pub fn is_int(&self) -> bool {
        matches!(self, Value::Int(_))
    }

    pub fn is_uint(&self) -> bool {
        matches!(self, Value::Uint(_))
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Value::Float(_))
    }

    pub fn is_str(&self) -> bool {
        matches!(self, Value::Str(_))
    }

    pub fn is_bin(&self) -> bool {
        matches!(self, Value::Bin(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Value::Map(_))
    }

    pub fn is_record(&self) -> bool {
        matches!(self, Value::Record(_))
    }

    /// True for the variants a resolver may hand back for an open container.
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            Value::Str(_) | Value::Bin(_) | Value::Array(_) | Value::Map(_) | Value::Record(_)
        )
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Nil => "Nil",
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::Uint(_) => "Uint",
            Value::Float(_) => "Float",
            Value::Str(_) => "Str",
            Value::Bin(_) => "Bin",
            Value::Array(_) => "Array",
            Value::Map(_) => "Map",
            Value::Record(_) => "Record",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        if let Value::Bool(v) = *self {
            Some(v)
        } else {
            None
        }
    }

    /// The value as an i64, if it's an integer that fits.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Int(v) => Some(v),
            Value::Uint(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    /// The value as a u64, if it's a non-negative integer.
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Value::Int(v) => u64::try_from(v).ok(),
            Value::Uint(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        if let Value::Float(v) = *self {
            Some(v)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        if let Value::Str(ref v) = *self {
            Some(v.as_str())
        } else {
            None
        }
    }

    pub fn as_slice(&self) -> Option<&[u8]> {
        if let Value::Bin(ref v) = *self {
            Some(v.as_slice())
        } else {
            None
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        if let Value::Array(ref v) = *self {
            Some(v.as_slice())
        } else {
            None
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut Vec<Value>> {
        if let Value::Array(ref mut v) = *self {
            Some(v)
        } else {
            None
        }
    }

    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        if let Value::Map(ref v) = *self {
            Some(v.as_slice())
        } else {
            None
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut Vec<(Value, Value)>> {
        if let Value::Map(ref mut v) = *self {
            Some(v)
        } else {
            None
        }
    }

    pub fn as_record(&self) -> Option<&RecordValue> {
        if let Value::Record(ref v) = *self {
            Some(v)
        } else {
            None
        }
    }

    /// Look up a string key in a map or a record.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(pairs) => pairs
                .iter()
                .find(|(k, _)| k.as_str() == Some(key))
                .map(|(_, v)| v),
            Value::Record(rec) => rec.get(key),
            _ => None,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Nil
    }
}

static NIL: Value = Value::Nil;

impl Index<usize> for Value {
    type Output = Value;

    fn index(&self, index: usize) -> &Self::Output {
        self.as_array().and_then(|v| v.get(index)).unwrap_or(&NIL)
    }
}

impl Index<&str> for Value {
    type Output = Value;

    fn index(&self, index: &str) -> &Self::Output {
        self.get(index).unwrap_or(&NIL)
    }
}

impl Decode for Value {
    fn decode_tagged<R: Read>(
        &mut self,
        dec: &mut Decoder<R>,
        head: Head,
        ctx: Context<'_>,
    ) -> Result<()> {
        match self {
            Value::Str(v) => v.decode_tagged(dec, head, ctx),
            Value::Bin(v) => v.decode_tagged(dec, head, ctx),
            Value::Array(v) => v.decode_tagged(dec, head, ctx),
            Value::Map(v) => dec.decode_entries(v, head),
            Value::Record(v) => v.decode_tagged(dec, head, ctx),
            _ => dec.decode_open(self, head, ctx),
        }
    }

    fn reset(&mut self) {
        *self = Value::Nil;
    }

    /// Raw-byte map keys are read as strings, and must be valid UTF-8.
    fn coerce_key(&mut self) -> Result<()> {
        if let Value::Bin(bytes) = self {
            match String::from_utf8(std::mem::take(bytes)) {
                Ok(s) => *self = Value::Str(s),
                Err(e) => {
                    return Err(error::Error::mismatch(
                        "UTF-8 map key",
                        format_args!("{} raw bytes", e.as_bytes().len()),
                    ))
                }
            }
        }
        Ok(())
    }
}

macro_rules! impl_value_from {
    ($t: ty, $p: ident) => {
        impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::$p(v)
            }
        }
    };
}

macro_rules! impl_value_from_integer {
    ($t: ty, $p: ident, $w: ty) => {
        impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::$p(v as $w)
            }
        }
    };
}

impl_value_from!(bool, Bool);
impl_value_from!(f64, Float);
impl_value_from!(String, Str);
impl_value_from!(Vec<u8>, Bin);
impl_value_from!(Vec<Value>, Array);
impl_value_from!(Vec<(Value, Value)>, Map);
impl_value_from!(RecordValue, Record);
impl_value_from_integer!(i8, Int, i64);
impl_value_from_integer!(i16, Int, i64);
impl_value_from_integer!(i32, Int, i64);
impl_value_from_integer!(i64, Int, i64);
impl_value_from_integer!(isize, Int, i64);
impl_value_from_integer!(u8, Uint, u64);
impl_value_from_integer!(u16, Uint, u64);
impl_value_from_integer!(u32, Uint, u64);
impl_value_from_integer!(u64, Uint, u64);
impl_value_from_integer!(usize, Uint, u64);

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v as f64)
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Value::Nil
    }
}

impl<'a> From<&'a str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl<'a> From<Cow<'a, str>> for Value {
    fn from(v: Cow<'a, str>) -> Self {
        Value::Str(v.into_owned())
    }
}

impl<'a> From<&'a [u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bin(v.into())
    }
}

impl<V: Into<Value>> std::iter::FromIterator<V> for Value {
    fn from_iter<T: IntoIterator<Item = V>>(iter: T) -> Self {
        let v: Vec<Value> = iter.into_iter().map(Into::into).collect();
        Value::Array(v)
    }
}

macro_rules! impl_try_from_value {
    ($t: ty, $p: ident) => {
        impl TryFrom<Value> for $t {
            type Error = Value;
            fn try_from(v: Value) -> Result<Self, Self::Error> {
                match v {
                    Value::$p(v) => Ok(v),
                    _ => Err(v),
                }
            }
        }
    };
}

macro_rules! impl_try_from_value_integer {
    ($t: ty) => {
        impl TryFrom<Value> for $t {
            type Error = Value;
            fn try_from(v: Value) -> Result<Self, Self::Error> {
                match v {
                    Value::Int(i) => TryFrom::try_from(i).map_err(|_| v),
                    Value::Uint(i) => TryFrom::try_from(i).map_err(|_| v),
                    _ => Err(v),
                }
            }
        }
    };
}

impl_try_from_value!(bool, Bool);
impl_try_from_value!(f64, Float);
impl_try_from_value!(String, Str);
impl_try_from_value!(Vec<u8>, Bin);
impl_try_from_value!(Vec<Value>, Array);
impl_try_from_value!(Vec<(Value, Value)>, Map);
impl_try_from_value!(RecordValue, Record);
impl_try_from_value_integer!(u8);
impl_try_from_value_integer!(u16);
impl_try_from_value_integer!(u32);
impl_try_from_value_integer!(u64);
impl_try_from_value_integer!(usize);
impl_try_from_value_integer!(i8);
impl_try_from_value_integer!(i16);
impl_try_from_value_integer!(i32);
impl_try_from_value_integer!(i64);
impl_try_from_value_integer!(isize);

impl serde::Serialize for Value {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        match self {
            Value::Nil => serializer.serialize_unit(),
            Value::Bool(v) => serializer.serialize_bool(*v),
            Value::Int(v) => serializer.serialize_i64(*v),
            Value::Uint(v) => serializer.serialize_u64(*v),
            Value::Float(v) => serializer.serialize_f64(*v),
            Value::Str(v) => serializer.serialize_str(v),
            Value::Bin(v) => serializer.serialize_bytes(v),
            Value::Array(v) => v.serialize(serializer),
            Value::Map(v) => {
                let mut map = serializer.serialize_map(Some(v.len()))?;
                for (k, v) in v {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            Value::Record(v) => v.serialize(serializer),
        }
    }
}

impl<'de> serde::Deserialize<'de> for Value {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::*;
        use std::fmt;

        struct ValueVisitor;
        impl<'de> Visitor<'de> for ValueVisitor {
            type Value = Value;

            fn expecting(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
                fmt.write_str("any MessagePack value")
            }

            fn visit_bool<E: Error>(self, v: bool) -> Result<Self::Value, E> {
                Ok(Value::Bool(v))
            }

            fn visit_i64<E: Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(Value::Int(v))
            }

            fn visit_u64<E: Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(Value::Uint(v))
            }

            fn visit_f32<E: Error>(self, v: f32) -> Result<Self::Value, E> {
                Ok(Value::Float(v as f64))
            }

            fn visit_f64<E: Error>(self, v: f64) -> Result<Self::Value, E> {
                Ok(Value::Float(v))
            }

            fn visit_str<E: Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(Value::Str(v.into()))
            }

            fn visit_string<E: Error>(self, v: String) -> Result<Self::Value, E> {
                Ok(Value::Str(v))
            }

            fn visit_bytes<E: Error>(self, v: &[u8]) -> Result<Self::Value, E> {
                Ok(Value::Bin(v.into()))
            }

            fn visit_byte_buf<E: Error>(self, v: Vec<u8>) -> Result<Self::Value, E> {
                Ok(Value::Bin(v))
            }

            fn visit_unit<E: Error>(self) -> Result<Self::Value, E> {
                Ok(Value::Nil)
            }

            fn visit_none<E: Error>(self) -> Result<Self::Value, E> {
                Ok(Value::Nil)
            }

            fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Self::Value, D::Error> {
                Value::deserialize(d)
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                // Allocate with the size hint, but be conservative.
                let mut seq = match access.size_hint() {
                    Some(size) => Vec::with_capacity(size.min(crate::PREALLOC_LIMIT)),
                    None => Vec::new(),
                };
                while let Some(elem) = access.next_element()? {
                    seq.push(elem);
                }
                Ok(Value::Array(seq))
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut map = match access.size_hint() {
                    Some(size) => Vec::with_capacity(size.min(crate::PREALLOC_LIMIT)),
                    None => Vec::new(),
                };
                while let Some((key, val)) = access.next_entry::<Value, Value>()? {
                    map.push((key, val));
                }
                Ok(Value::Map(map))
            }
        }

        deserializer.deserialize_any(ValueVisitor)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        error::{Error, Fault},
        resolve::{Resolver, ResolverFn, SimpleResolver},
        unmarshal, unmarshal_with,
    };
    use std::sync::Arc;

    fn open(data: &[u8]) -> Value {
        let mut v = Value::Nil;
        unmarshal(data, &mut v).unwrap();
        v
    }

    fn str_map(pairs: &[(&str, Value)]) -> Value {
        Value::Map(
            pairs
                .iter()
                .map(|(k, v)| (Value::from(*k), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn open_map() {
        let v = open(&[0x82, 0xa1, b'a', 0x01, 0xa1, b'b', 0x02]);
        assert_eq!(
            v,
            str_map(&[("a", Value::Int(1)), ("b", Value::Int(2))])
        );
        assert_eq!(v["a"], Value::Int(1));
        assert_eq!(v.get("b").and_then(Value::as_i64), Some(2));
        assert!(v["c"].is_nil());
    }

    #[test]
    fn open_scalars() {
        assert_eq!(open(&[0xc3]), Value::Bool(true));
        assert_eq!(open(&[0xf0]), Value::Int(-16));
        assert_eq!(open(&[0xcc, 0x80]), Value::Uint(128));
        assert_eq!(open(&[0xd1, 0xff, 0xfe]), Value::Int(-2));
        let mut data = vec![0xca];
        data.extend_from_slice(&2.5f32.to_bits().to_be_bytes());
        assert_eq!(open(&data), Value::Float(2.5));
    }

    #[test]
    fn nil_is_not_empty_container() {
        let mut v = Value::Array(vec![Value::Int(1)]);
        unmarshal(&[0xc0], &mut v).unwrap();
        assert_eq!(v, Value::Nil);
        assert_eq!(open(&[0xc0]), Value::Nil);
        let v = open(&[0x92, 0xc0, 0x01]);
        assert_eq!(v, Value::Array(vec![Value::Nil, Value::Int(1)]));
    }

    #[test]
    fn nested() {
        // {"xs": [1, "two", [true]]}
        let data = [
            0x81, 0xa2, b'x', b's', 0x93, 0x01, 0xa3, b't', b'w', b'o', 0x91, 0xc3,
        ];
        let v = open(&data);
        assert_eq!(v["xs"][0], Value::Int(1));
        assert_eq!(v["xs"][1].as_str(), Some("two"));
        assert_eq!(v["xs"][2][0], Value::Bool(true));
        assert_eq!(v["xs"].as_array().map(|a| a.len()), Some(3));
    }

    #[test]
    fn raw_bytes_follow_context_flags() {
        let resolver = SimpleResolver {
            str_at_root: false,
            str_in_sequence: true,
            str_in_map: false,
            ..SimpleResolver::default()
        };
        let resolver = Arc::new(resolver);

        let mut v = Value::Nil;
        unmarshal_with(&[0xa1, b'r'], &mut v, resolver.clone()).unwrap();
        assert_eq!(v, Value::Bin(b"r".to_vec()));

        let mut v = Value::Nil;
        unmarshal_with(&[0x91, 0xa1, b's'], &mut v, resolver.clone()).unwrap();
        assert_eq!(v, Value::Array(vec![Value::from("s")]));

        let mut v = Value::Nil;
        unmarshal_with(&[0x81, 0xa1, b'k', 0xa1, b'm'], &mut v, resolver).unwrap();
        assert_eq!(v, Value::Map(vec![(Value::from("k"), Value::Bin(b"m".to_vec()))]));
    }

    #[test]
    fn map_keys_coerced_to_strings() {
        let resolver = Arc::new(SimpleResolver {
            str_at_root: false,
            ..SimpleResolver::default()
        });
        let mut v = Value::Nil;
        // {"k": 1, 5: 2}
        unmarshal_with(&[0x82, 0xa1, b'k', 0x01, 0x05, 0x02], &mut v, resolver).unwrap();
        assert_eq!(
            v,
            Value::Map(vec![
                (Value::from("k"), Value::Int(1)),
                (Value::Int(5), Value::Int(2)),
            ])
        );
    }

    #[test]
    fn map_keys_must_be_utf8() {
        let resolver = Arc::new(SimpleResolver {
            str_at_root: false,
            ..SimpleResolver::default()
        });
        // Two distinct non-UTF-8 keys would both become "\u{fffd}" if read lossily
        let data = [0x82, 0xa1, 0xff, 0x01, 0xa1, 0xfe, 0x02];
        let mut v = Value::Nil;
        let err = unmarshal_with(&data, &mut v, resolver.clone()).unwrap_err();
        assert_eq!(err.kind(), Fault::Type);

        let mut v = Value::Nil;
        unmarshal_with(&[0x81, 0xa2, 0xc3, 0xa9, 0x01], &mut v, resolver).unwrap();
        assert_eq!(v["é"], Value::Int(1));
    }

    #[test]
    fn existing_containers_decoded_in_place() {
        let mut v = Value::Map(vec![
            (Value::from("a"), Value::Bin(vec![0])),
            (Value::from("z"), Value::Bool(true)),
        ]);
        unmarshal(&[0x81, 0xa1, b'a', 0xa2, 0x01, 0x02], &mut v).unwrap();
        assert_eq!(v["a"], Value::Bin(vec![1, 2]));
        assert_eq!(v["z"], Value::Bool(true));

        // A held string takes raw bytes, nothing else
        let mut v = Value::Str(String::new());
        let err = unmarshal(&[0x01], &mut v).unwrap_err();
        assert_eq!(err.kind(), Fault::Type);

        // Scalars are re-inferred
        let mut v = Value::Int(3);
        unmarshal(&[0xa1, b'q'], &mut v).unwrap();
        assert_eq!(v, Value::from("q"));
    }

    #[test]
    fn custom_resolver_by_key() {
        let resolver = ResolverFn::new(|ctx: &Context<'_>, len, category| {
            match ctx.key_str() {
                Some("blob") => Value::Bin(Vec::new()),
                _ => SimpleResolver::default().resolve(ctx, len, category),
            }
        });
        let data = [
            0x82, 0xa4, b'b', b'l', b'o', b'b', 0xa1, 0xff, 0xa4, b'n', b'a', b'm', b'e', 0xa1,
            b'x',
        ];
        let mut v = Value::Nil;
        unmarshal_with(&data, &mut v, Arc::new(resolver)).unwrap();
        assert_eq!(v["blob"], Value::Bin(vec![0xff]));
        assert_eq!(v["name"], Value::from("x"));
    }

    #[test]
    fn sequence_shape_is_decoded_into() {
        let resolver = Arc::new(SimpleResolver {
            sequence_shape: Some(Value::Array(vec![Value::Bin(Vec::new())])),
            ..SimpleResolver::default()
        });
        let mut v = Value::Nil;
        unmarshal_with(&[0x92, 0xa1, 0x41, 0xa1, 0x42], &mut v, resolver).unwrap();
        assert_eq!(
            v,
            Value::Array(vec![Value::Bin(vec![0x41]), Value::from("B")])
        );
    }

    #[test]
    fn large_declared_sequence() {
        let mut v = Value::Nil;
        let err = unmarshal(&[0xdd, 0xff, 0xff, 0xff, 0xff, 0x01, 0x02], &mut v).unwrap_err();
        assert!(matches!(err, Error::Io(_) | Error::ShortRead { .. }));
    }

    #[test]
    fn conversions() {
        assert_eq!(Value::from(5u8), Value::Uint(5));
        assert_eq!(Value::from(-5i32), Value::Int(-5));
        assert_eq!(Value::Uint(7).as_i64(), Some(7));
        assert_eq!(Value::Int(-1).as_u64(), None);
        assert_eq!(u8::try_from(Value::Int(300)), Err(Value::Int(300)));
        assert_eq!(i16::try_from(Value::Uint(300)), Ok(300));
        let v: Value = vec![1i64, 2].into_iter().collect();
        assert_eq!(v, Value::Array(vec![Value::Int(1), Value::Int(2)]));
        assert!(!Value::Nil.is_container());
        assert!(Value::Bin(Vec::new()).is_container());
    }
}
