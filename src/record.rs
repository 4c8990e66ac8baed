//! Structs decoded from maps by field name.
//!
//! A record's wire form is a map from field names to field values. Each record type lists its
//! field names once; the name-to-index table built from that list is cached per type, so a type's
//! fields are only ever looked up from a `HashMap` after the first decode.

use std::any::TypeId;
use std::collections::HashMap;
use std::io::Read;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::{
    decode::{Decode, Decoder, Head},
    error::{Error, Result},
    marker::Category,
    resolve::Context,
    value::Value,
};

/// A struct whose fields are decoded by name. Usually implemented with [`impl_record!`].
pub trait Record: 'static {
    /// Type name, used in error messages.
    const NAME: &'static str;
    /// Wire names of the fields, in declaration order.
    const FIELDS: &'static [&'static str];

    /// Decode the next value in the stream into the field at `index` in [`FIELDS`](Self::FIELDS).
    fn decode_field<R: Read>(&mut self, index: usize, dec: &mut Decoder<R>) -> Result<()>;
}

/// Maps a record's wire field names to their indices.
#[derive(Clone, Debug)]
pub struct FieldMap {
    names: HashMap<&'static str, usize>,
}

impl FieldMap {
    fn new(fields: &'static [&'static str]) -> Self {
        Self {
            names: fields.iter().enumerate().map(|(i, name)| (*name, i)).collect(),
        }
    }

    pub fn index(&self, name: &str) -> Option<usize> {
        self.names.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

static FIELD_MAPS: OnceLock<RwLock<HashMap<TypeId, Arc<FieldMap>>>> = OnceLock::new();

/// Get the field map for `T`, building it on first use.
pub fn field_map<T: Record>() -> Arc<FieldMap> {
    let cache = FIELD_MAPS.get_or_init(Default::default);
    let id = TypeId::of::<T>();
    if let Some(map) = cache.read().get(&id) {
        return map.clone();
    }
    cache
        .write()
        .entry(id)
        .or_insert_with(|| {
            debug!(record = T::NAME, fields = T::FIELDS.len(), "built field map");
            Arc::new(FieldMap::new(T::FIELDS))
        })
        .clone()
}

/// Decode a map body into a record. Every key must name one of the record's fields; fields that
/// don't appear keep whatever they held before.
pub fn decode_record<T: Record, R: Read>(
    rec: &mut T,
    dec: &mut Decoder<R>,
    head: Head,
) -> Result<()> {
    let len = dec.head_len(head, Category::Map)?;
    if len == 0 {
        return Ok(());
    }
    let fields = field_map::<T>();
    let mut key = String::new();
    dec.enter()?;
    for _ in 0..len {
        key.clear();
        dec.decode_next(&mut key, Context::Root)?;
        let index = fields.index(&key).ok_or_else(|| Error::UnknownField {
            record: T::NAME,
            field: key.clone(),
        })?;
        trace!(record = T::NAME, field = T::FIELDS[index], "matched field");
        rec.decode_field(index, dec)?;
    }
    dec.leave();
    Ok(())
}

/// Implement [`Record`] and [`Decode`] for a struct with named fields.
///
/// Each field is decoded from the map key of the same name, unless a different wire name is
/// given with `=>`. The struct must implement `Default`, which nil decodes to, and every field
/// type must implement `Decode`.
///
/// ```
/// # use msgpack_decode::{impl_record, unmarshal};
/// #[derive(Default, Debug, PartialEq)]
/// struct Point {
///     x: i32,
///     y: i32,
/// }
///
/// impl_record!(Point { x, y => "Y" });
///
/// let mut p = Point::default();
/// unmarshal(&[0x82, 0xa1, b'x', 0x01, 0xa1, b'Y', 0x02], &mut p).unwrap();
/// assert_eq!(p, Point { x: 1, y: 2 });
/// ```
#[macro_export]
macro_rules! impl_record {
    (@wire $field:ident => $wire:literal) => {
        $wire
    };
    (@wire $field:ident) => {
        stringify!($field)
    };
    ($name:ident { $($field:ident $(=> $wire:literal)?),* $(,)? }) => {
        impl $crate::Record for $name {
            const NAME: &'static str = stringify!($name);
            const FIELDS: &'static [&'static str] =
                &[$($crate::impl_record!(@wire $field $(=> $wire)?)),*];

            #[allow(unused_assignments, unused_mut, unused_variables)]
            fn decode_field<R: ::std::io::Read>(
                &mut self,
                index: usize,
                dec: &mut $crate::Decoder<R>,
            ) -> $crate::Result<()> {
                let mut i = 0usize;
                $(
                    if index == i {
                        let name = <Self as $crate::Record>::FIELDS[i];
                        return dec.decode_next(&mut self.$field, $crate::Context::Field { name });
                    }
                    i += 1;
                )*
                Ok(())
            }
        }

        impl $crate::Decode for $name {
            fn decode_tagged<R: ::std::io::Read>(
                &mut self,
                dec: &mut $crate::Decoder<R>,
                head: $crate::Head,
                _ctx: $crate::Context<'_>,
            ) -> $crate::Result<()> {
                $crate::record::decode_record(self, dec, head)
            }

            fn reset(&mut self) {
                *self = ::std::default::Default::default();
            }
        }
    };
}

/// A record whose field names are chosen at runtime, for use inside a [`Value`].
///
/// Decoding only accepts the names it already holds; any other key is an error. Resolvers can hand
/// one back for maps that must match a fixed schema.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecordValue {
    fields: Vec<(String, Value)>,
}

impl RecordValue {
    /// A record with the given field names, each holding `Value::Nil`.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: names.into_iter().map(|n| (n.into(), Value::Nil)).collect(),
        }
    }

    /// Add a field, or replace the value of an existing one.
    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        let name = name.into();
        match self.get_mut(&name) {
            Some(slot) => *slot = value,
            None => self.fields.push((name, value)),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.fields
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Decode for RecordValue {
    fn decode_tagged<R: Read>(
        &mut self,
        dec: &mut Decoder<R>,
        head: Head,
        _ctx: Context<'_>,
    ) -> Result<()> {
        let len = dec.head_len(head, Category::Map)?;
        if len == 0 {
            return Ok(());
        }
        let mut key = String::new();
        dec.enter()?;
        for _ in 0..len {
            key.clear();
            dec.decode_next(&mut key, Context::Root)?;
            let (name, value) = self
                .fields
                .iter_mut()
                .find(|(n, _)| *n == key)
                .ok_or_else(|| Error::UnknownField {
                    record: "RecordValue",
                    field: key.clone(),
                })?;
            trace!(field = name.as_str(), "matched field");
            dec.decode_next(value, Context::Field { name: name.as_str() })?;
        }
        dec.leave();
        Ok(())
    }

    /// Clears the values, keeping the field names.
    fn reset(&mut self) {
        for (_, value) in self.fields.iter_mut() {
            *value = Value::Nil;
        }
    }
}

impl serde::Serialize for RecordValue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in self.fields.iter() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
