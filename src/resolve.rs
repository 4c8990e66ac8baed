//! Picking a concrete container for an open [`Value`] slot.
//!
//! When the decoder meets a raw-bytes, sequence, or map header while decoding into a
//! [`Value::Nil`], it doesn't know what shape the caller wants. It asks a [`Resolver`], telling it
//! where the slot lives: at the top level, as a sequence element, as a map value, or as a record
//! field.

use std::any::Any;
use std::fmt;

use crate::{marker::Category, value::Value, PREALLOC_LIMIT};

/// Where an open slot sits in the value being decoded.
#[derive(Clone, Copy)]
pub enum Context<'a> {
    /// A bare destination with no parent container. Map keys are decoded in this context too.
    Root,
    /// Element `index` of a sequence of length `len`.
    Element { index: usize, len: usize },
    /// The value half of a map entry. The key is whatever key type the map uses: `Value` for
    /// open maps, `String` for the usual typed ones.
    MapValue { key: &'a dyn Any },
    /// A record field, by wire name. Raw bytes here follow the same rule as at the top level.
    Field { name: &'a str },
}

impl<'a> Context<'a> {
    /// The map key as a string, if the parent is a map with string-like keys.
    pub fn key_str(&self) -> Option<&'a str> {
        match *self {
            Context::MapValue { key } => {
                if let Some(s) = key.downcast_ref::<String>() {
                    Some(s.as_str())
                } else {
                    key.downcast_ref::<Value>().and_then(Value::as_str)
                }
            }
            _ => None,
        }
    }

    /// The field's wire name, if the parent is a record.
    pub fn field(&self) -> Option<&'a str> {
        match *self {
            Context::Field { name } => Some(name),
            _ => None,
        }
    }

    /// The sequence index, if the parent is a sequence.
    pub fn index(&self) -> Option<usize> {
        match *self {
            Context::Element { index, .. } => Some(index),
            _ => None,
        }
    }
}

impl<'a> fmt::Debug for Context<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Context::Root => f.write_str("Root"),
            Context::Element { index, len } => f
                .debug_struct("Element")
                .field("index", &index)
                .field("len", &len)
                .finish(),
            Context::MapValue { .. } => match self.key_str() {
                Some(key) => f.debug_struct("MapValue").field("key", &key).finish(),
                None => f.debug_struct("MapValue").finish_non_exhaustive(),
            },
            Context::Field { name } => f.debug_struct("Field").field("name", &name).finish(),
        }
    }
}

/// Materializes a container for an open slot.
///
/// The returned value must be a container variant matching the wire category: `Str` or `Bin`
/// for raw bytes, `Array` for a sequence, `Map` or `Record` for a map. The decoder then decodes
/// the container body into it; any other variant fails the decode. Resolvers are shared between
/// decoders, so they must not depend on per-decode state.
pub trait Resolver: Send + Sync {
    fn resolve(&self, context: &Context<'_>, len: usize, category: Category) -> Value;
}

/// Adapts a closure into a [`Resolver`].
///
/// ```
/// # use msgpack_decode::{Category, Context, ResolverFn, SimpleResolver, Resolver, Value};
/// let resolver = ResolverFn::new(|ctx: &Context<'_>, len, category| {
///     match (ctx.key_str(), category) {
///         (Some("blob"), Category::RawBytes) => Value::Bin(Vec::new()),
///         _ => SimpleResolver::default().resolve(ctx, len, category),
///     }
/// });
/// # let _ = resolver;
/// ```
pub struct ResolverFn<F>(pub F);

impl<F> ResolverFn<F>
where
    F: Fn(&Context<'_>, usize, Category) -> Value + Send + Sync,
{
    pub fn new(f: F) -> Self {
        ResolverFn(f)
    }
}

impl<F> Resolver for ResolverFn<F>
where
    F: Fn(&Context<'_>, usize, Category) -> Value + Send + Sync,
{
    fn resolve(&self, context: &Context<'_>, len: usize, category: Category) -> Value {
        (self.0)(context, len, category)
    }
}

impl<F> fmt::Debug for ResolverFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("ResolverFn")
    }
}

/// The default resolver, driven by a handful of options.
///
/// - Maps become `Value::Map`, or a clone of `map_shape` if one is set.
/// - Sequences become an empty `Value::Array` with room for `len` elements, or a clone of
///   `sequence_shape` if one is set. Elements the shape doesn't already hold are decoded as open
///   `Value::Nil` slots.
/// - Raw bytes become `Value::Str` or `Value::Bin`: `str_in_map` decides for map values,
///   `str_in_sequence` for sequence elements, and `str_at_root` for everything else, record
///   fields included.
#[derive(Clone, Debug, PartialEq)]
pub struct SimpleResolver {
    pub map_shape: Option<Value>,
    pub sequence_shape: Option<Value>,
    pub str_at_root: bool,
    pub str_in_sequence: bool,
    pub str_in_map: bool,
}

impl Default for SimpleResolver {
    fn default() -> Self {
        Self {
            map_shape: None,
            sequence_shape: None,
            str_at_root: true,
            str_in_sequence: true,
            str_in_map: true,
        }
    }
}

impl Resolver for SimpleResolver {
    fn resolve(&self, context: &Context<'_>, len: usize, category: Category) -> Value {
        match category {
            Category::Map => self.map_shape.clone().unwrap_or(Value::Map(Vec::new())),
            Category::Sequence => match &self.sequence_shape {
                Some(shape) => shape.clone(),
                None => Value::Array(Vec::with_capacity(len.min(PREALLOC_LIMIT))),
            },
            Category::RawBytes => {
                let as_str = match context {
                    Context::Root | Context::Field { .. } => self.str_at_root,
                    Context::Element { .. } => self.str_in_sequence,
                    Context::MapValue { .. } => self.str_in_map,
                };
                if as_str {
                    Value::Str(String::new())
                } else {
                    Value::Bin(Vec::new())
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{error::Fault, record::RecordValue, unmarshal_with};
    use std::sync::Arc;

    #[test]
    fn defaults() {
        let r = SimpleResolver::default();
        assert_eq!(r.resolve(&Context::Root, 2, Category::Map), Value::Map(Vec::new()));
        match r.resolve(&Context::Root, 3, Category::Sequence) {
            Value::Array(v) => {
                assert!(v.is_empty());
                assert!(v.capacity() >= 3);
            }
            other => panic!("expected an array, got {:?}", other),
        }
        match r.resolve(&Context::Root, u32::MAX as usize, Category::Sequence) {
            Value::Array(v) => assert!(v.capacity() < 2 * PREALLOC_LIMIT),
            other => panic!("expected an array, got {:?}", other),
        }
        assert_eq!(
            r.resolve(&Context::Root, 3, Category::RawBytes),
            Value::Str(String::new())
        );
    }

    #[test]
    fn raw_bytes_by_context() {
        let r = SimpleResolver {
            str_at_root: false,
            str_in_sequence: true,
            str_in_map: false,
            ..SimpleResolver::default()
        };
        let key = Value::from("k");
        assert!(r.resolve(&Context::Root, 1, Category::RawBytes).is_bin());
        assert!(r
            .resolve(&Context::Element { index: 0, len: 1 }, 1, Category::RawBytes)
            .is_str());
        assert!(r
            .resolve(&Context::MapValue { key: &key }, 1, Category::RawBytes)
            .is_bin());
        let r = SimpleResolver {
            str_at_root: false,
            str_in_map: true,
            ..SimpleResolver::default()
        };
        assert!(r
            .resolve(&Context::Field { name: "f" }, 1, Category::RawBytes)
            .is_bin());
    }

    #[test]
    fn shapes() {
        let record = Value::Record(RecordValue::new(["k"]));
        let r = SimpleResolver {
            map_shape: Some(record.clone()),
            sequence_shape: Some(Value::Array(vec![Value::Bin(Vec::new())])),
            ..SimpleResolver::default()
        };
        assert_eq!(r.resolve(&Context::Root, 0, Category::Map), record);
        assert_eq!(
            r.resolve(&Context::Root, 2, Category::Sequence),
            Value::Array(vec![Value::Bin(Vec::new())])
        );
    }

    #[test]
    fn shape_must_match_wire_category() {
        let r = Arc::new(SimpleResolver {
            map_shape: Some(Value::Array(Vec::new())),
            ..SimpleResolver::default()
        });
        // {"k": 7}
        let data = [0x81, 0xa1, b'k', 0x07];
        let mut v = Value::Nil;
        let err = unmarshal_with(&data, &mut v, r).unwrap_err();
        assert_eq!(err.kind(), Fault::Usage);
        assert_eq!(v, Value::Nil);
    }

    #[test]
    fn context_keys() {
        let s = String::from("name");
        let v = Value::from("other");
        let n = 5u32;
        assert_eq!(Context::MapValue { key: &s }.key_str(), Some("name"));
        assert_eq!(Context::MapValue { key: &v }.key_str(), Some("other"));
        assert_eq!(Context::MapValue { key: &n }.key_str(), None);
        assert_eq!(Context::Element { index: 4, len: 9 }.index(), Some(4));
        assert_eq!(Context::Root.key_str(), None);
        assert_eq!(Context::Field { name: "f" }.field(), Some("f"));
        assert_eq!(Context::Field { name: "f" }.key_str(), None);
    }

    #[test]
    fn closure_resolver() {
        let r = ResolverFn::new(|ctx, _len, _cat| {
            if ctx.index() == Some(1) {
                Value::Bin(Vec::new())
            } else {
                Value::Str(String::new())
            }
        });
        assert!(r
            .resolve(&Context::Element { index: 1, len: 2 }, 0, Category::RawBytes)
            .is_bin());
        assert!(r.resolve(&Context::Root, 0, Category::RawBytes).is_str());
    }
}
