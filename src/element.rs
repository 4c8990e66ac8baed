use std::fmt;
use std::io::Read;

use crate::{
    error::{Error, Result},
    marker::{Category, Marker},
    reader::ByteReader,
    value::Value,
};

/// One step of the wire format: either a fully decoded scalar, or the header of a container
/// whose body has not been read yet.
#[derive(Clone, Debug, PartialEq)]
pub enum Element {
    Nil,
    Bool(bool),
    Int(i64),
    Uint(u64),
    F32(f32),
    F64(f64),
    Container(Category, usize),
}

impl Element {
    pub fn name(&self) -> &'static str {
        use self::Element::*;
        match self {
            Nil => "Nil",
            Bool(_) => "Bool",
            Int(_) => "Int",
            Uint(_) => "Uint",
            F32(_) => "F32",
            F64(_) => "F64",
            Container(Category::RawBytes, _) => "Raw",
            Container(Category::Sequence, _) => "Array",
            Container(Category::Map, _) => "Map",
        }
    }

    /// The scalar as a `Value`, or `None` for a container header.
    pub fn into_scalar(self) -> Option<Value> {
        Some(match self {
            Element::Nil => Value::Nil,
            Element::Bool(v) => Value::Bool(v),
            Element::Int(v) => Value::Int(v),
            Element::Uint(v) => Value::Uint(v),
            Element::F32(v) => Value::Float(v as f64),
            Element::F64(v) => Value::Float(v),
            Element::Container(..) => return None,
        })
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Element::Container(_, len) => write!(f, "{} of length {}", self.name(), len),
            _ => f.write_str(self.name()),
        }
    }
}

/// Which fixnum ranges a numeric destination accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Fixnum {
    /// 0x00-0x7f and 0xe0-0xff
    Signed,
    /// 0x00-0x7f
    Unsigned,
    /// bool and float destinations take no fixnums at all
    Never,
}

impl<R: Read> ByteReader<R> {
    /// Decode everything about a value that can be known from its tag without a destination:
    /// scalars are read completely, containers only up to their length. If `known_len` is set,
    /// the container length has already been consumed and isn't read again.
    pub fn read_element(&mut self, tag: u8, known_len: Option<usize>) -> Result<Element> {
        use self::Marker::*;
        let marker = Marker::from_u8(tag);
        if let Some(category) = marker.category() {
            let len = match known_len {
                Some(len) => len,
                None => self.read_container_len(tag, category)?,
            };
            return Ok(Element::Container(category, len));
        }
        let elem = match marker {
            Nil => Element::Nil,
            False => Element::Bool(false),
            True => Element::Bool(true),
            F32 => Element::F32(f32::from_bits(self.read_u32()?)),
            F64 => Element::F64(f64::from_bits(self.read_u64()?)),
            UInt8 => Element::Uint(self.read_u8()? as u64),
            UInt16 => Element::Uint(self.read_u16()? as u64),
            UInt32 => Element::Uint(self.read_u32()? as u64),
            UInt64 => Element::Uint(self.read_u64()?),
            Int8 => Element::Int(self.read_u8()? as i8 as i64),
            Int16 => Element::Int(self.read_u16()? as i16 as i64),
            Int32 => Element::Int(self.read_u32()? as i32 as i64),
            Int64 => Element::Int(self.read_u64()? as i64),
            PosFixInt(v) => Element::Int(v as i64),
            NegFixInt(v) => Element::Int(v as i64),
            _ => return Err(Error::bad_tag(tag, "value")),
        };
        Ok(elem)
    }

    /// Decode a scalar for a statically typed numeric or boolean destination. Fixnums are only
    /// accepted in the ranges the destination's signedness allows; containers and nil are not
    /// scalars here.
    pub(crate) fn read_scalar(&mut self, tag: u8, fixnum: Fixnum) -> Result<Element> {
        use self::Marker::*;
        match Marker::from_u8(tag) {
            PosFixInt(v) if fixnum == Fixnum::Signed => Ok(Element::Int(v as i64)),
            PosFixInt(v) if fixnum == Fixnum::Unsigned => Ok(Element::Uint(v as u64)),
            NegFixInt(v) if fixnum == Fixnum::Signed => Ok(Element::Int(v as i64)),
            False | True | F32 | F64 | UInt8 | UInt16 | UInt32 | UInt64 | Int8 | Int16
            | Int32 | Int64 => self.read_element(tag, None),
            _ => Err(Error::bad_tag(tag, "scalar")),
        }
    }
}
