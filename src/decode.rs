//! The recursive decoder and the destinations it can decode into.
//!
//! Every destination type implements [`Decode`]. The [`Decoder`] reads one tag byte, handles nil
//! itself, and hands everything else to the destination, which pulls as much of the value from
//! the decoder as its kind requires. Destinations are decoded into in place: existing strings,
//! vectors, and map entries are reused rather than rebuilt.

use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};
use std::io::Read;
use std::sync::Arc;

use serde_bytes::ByteBuf;
use tracing::{debug, trace};

use crate::{
    depth_tracking::DepthTracker,
    element::{Element, Fixnum},
    error::{Error, Result},
    marker::{Category, Marker, NIL},
    reader::ByteReader,
    resolve::{Context, Resolver, SimpleResolver},
    value::Value,
    MAX_DEPTH, PREALLOC_LIMIT,
};

/// The part of a value already consumed by the time a destination sees it: the tag byte, and for
/// containers materialized by a resolver, the length that followed it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Head {
    pub tag: u8,
    pub len: Option<usize>,
}

impl Head {
    pub fn new(tag: u8) -> Self {
        Self { tag, len: None }
    }
}

/// A type that values can be decoded into.
///
/// Implementations receive the value's [`Head`] after the tag has been read, and must consume
/// exactly the rest of the value from the decoder. Nil never reaches `decode_tagged`; the decoder
/// calls [`reset`](Decode::reset) instead.
pub trait Decode {
    /// Decode the rest of a value whose tag has already been read.
    fn decode_tagged<R: Read>(
        &mut self,
        dec: &mut Decoder<R>,
        head: Head,
        ctx: Context<'_>,
    ) -> Result<()>;

    /// Set the destination to its zero value.
    fn reset(&mut self);

    #[doc(hidden)]
    fn byte_slots(_slots: &mut [Self]) -> Option<&mut [u8]>
    where
        Self: Sized,
    {
        None
    }

    #[doc(hidden)]
    fn byte_vec(_vec: &mut Vec<Self>) -> Option<&mut Vec<u8>>
    where
        Self: Sized,
    {
        None
    }

    #[doc(hidden)]
    fn coerce_key(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Decodes a stream of values from a byte source.
///
/// A decoder can be used for any number of sequential top-level decodes. Each one starts from a
/// fresh tag byte; nothing but the source position carries over between them.
pub struct Decoder<R> {
    reader: ByteReader<R>,
    resolver: Arc<dyn Resolver>,
    depth: DepthTracker,
}

impl<R: Read> Decoder<R> {
    /// Create a decoder using the default [`SimpleResolver`].
    pub fn new(reader: R) -> Self {
        Self::with_resolver(reader, Arc::new(SimpleResolver::default()))
    }

    /// Create a decoder that asks `resolver` what to build for open containers.
    pub fn with_resolver(reader: R, resolver: Arc<dyn Resolver>) -> Self {
        Self {
            reader: ByteReader::new(reader),
            resolver,
            depth: DepthTracker::new(MAX_DEPTH),
        }
    }

    /// Set the maximum container nesting depth. Defaults to [`MAX_DEPTH`].
    pub fn max_depth(mut self, limit: usize) -> Self {
        self.depth.set_limit(limit);
        self
    }

    pub fn depth_limit(&self) -> usize {
        self.depth.limit()
    }

    pub fn get_ref(&self) -> &R {
        self.reader.get_ref()
    }

    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }

    pub fn resolver(&self) -> &Arc<dyn Resolver> {
        &self.resolver
    }

    /// Decode the next value in the stream into `dest`.
    pub fn decode<T: Decode>(&mut self, dest: &mut T) -> Result<()> {
        self.decode_value(Some(dest))
    }

    /// Decode the next value in the stream into `dest`. Fails before reading anything if there's
    /// no destination.
    pub fn decode_value<T: Decode>(&mut self, dest: Option<&mut T>) -> Result<()> {
        let dest = dest.ok_or_else(|| {
            Error::Usage(format!(
                "no destination given for {}",
                std::any::type_name::<T>()
            ))
        })?;
        self.reset_depth();
        let result = self.decode_next(dest, Context::Root);
        if let Err(ref err) = result {
            debug!(error = %err, kind = ?err.kind(), "decode failed");
        }
        result
    }

    /// Read a tag and decode the value it starts into `dest`.
    pub fn decode_next<T: Decode>(&mut self, dest: &mut T, ctx: Context<'_>) -> Result<()> {
        let tag = self.reader.read_tag()?;
        self.decode_head(dest, Head::new(tag), ctx)
    }

    /// Decode a value whose head has already been read.
    pub fn decode_head<T: Decode>(
        &mut self,
        dest: &mut T,
        head: Head,
        ctx: Context<'_>,
    ) -> Result<()> {
        if head.tag == NIL {
            dest.reset();
            return Ok(());
        }
        dest.decode_tagged(self, head, ctx)
    }

    /// The container length for `head`, reading it from the stream unless it's already known.
    pub fn head_len(&mut self, head: Head, category: Category) -> Result<usize> {
        match head.len {
            Some(len) => Ok(len),
            None => self.reader.read_container_len(head.tag, category),
        }
    }

    /// Decode the next value's head without a destination. See [`ByteReader::read_element`].
    pub fn read_element(&mut self, tag: u8, known_len: Option<usize>) -> Result<Element> {
        self.reader.read_element(tag, known_len)
    }

    pub fn read_tag(&mut self) -> Result<u8> {
        self.reader.read_tag()
    }

    pub fn peek_tag(&mut self) -> Result<u8> {
        self.reader.peek_tag()
    }

    /// Read exactly `buf.len()` bytes of value body.
    pub fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        self.reader.read_exact(buf)
    }

    /// Decode a raw-bytes body into `buf`, reusing its storage. A zero-length body leaves `buf`
    /// untouched.
    pub fn decode_raw(&mut self, buf: &mut Vec<u8>, head: Head) -> Result<()> {
        let len = self.head_len(head, Category::RawBytes)?;
        if len == 0 {
            return Ok(());
        }
        buf.clear();
        if len <= buf.capacity().max(PREALLOC_LIMIT) {
            buf.resize(len, 0);
            return self.reader.read_exact(buf);
        }
        // Grow only as fast as the source actually delivers.
        while buf.len() < len {
            let start = buf.len();
            buf.resize(start + (len - start).min(PREALLOC_LIMIT), 0);
            self.reader.read_exact(&mut buf[start..])?;
        }
        Ok(())
    }

    /// Decode a raw-bytes body into a fixed buffer, zeroing whatever the body doesn't cover.
    pub fn decode_raw_fixed(&mut self, buf: &mut [u8], head: Head) -> Result<()> {
        let len = self.head_len(head, Category::RawBytes)?;
        if len == 0 {
            return Ok(());
        }
        if len > buf.len() {
            return Err(Error::LengthMismatch {
                capacity: buf.len(),
                actual: len,
            });
        }
        let (body, rest) = buf.split_at_mut(len);
        self.reader.read_exact(body)?;
        rest.fill(0);
        Ok(())
    }

    /// Decode a sequence into `vec`, resizing it to the sequence length. Existing elements are
    /// decoded into in place; new ones start from `T::default()`.
    pub fn decode_seq<T: Decode + Default>(&mut self, vec: &mut Vec<T>, head: Head) -> Result<()> {
        let len = self.head_len(head, Category::Sequence)?;
        vec.truncate(len);
        vec.reserve(len.min(PREALLOC_LIMIT).saturating_sub(vec.len()));
        self.enter()?;
        for index in 0..len {
            if index == vec.len() {
                vec.push(T::default());
            }
            self.decode_next(&mut vec[index], Context::Element { index, len })?;
        }
        self.leave();
        Ok(())
    }

    fn decode_elements<T: Decode>(&mut self, slots: &mut [T]) -> Result<()> {
        let len = slots.len();
        self.enter()?;
        for (index, slot) in slots.iter_mut().enumerate() {
            self.decode_next(slot, Context::Element { index, len })?;
        }
        self.leave();
        Ok(())
    }

    /// Decode a map body into `map`. Each key is decoded fresh; its value is decoded into the
    /// existing entry if there is one.
    ///
    /// `String` keys are read lossily, so two keys that differ only in invalid UTF-8 land on the
    /// same entry and the later value wins. Open `Value` keys reject invalid UTF-8 instead.
    pub fn decode_entries<K, V, M>(&mut self, map: &mut M, head: Head) -> Result<()>
    where
        K: Decode + Default + 'static,
        V: Decode + Default,
        M: Entries<K, V>,
    {
        let len = self.head_len(head, Category::Map)?;
        if len == 0 {
            return Ok(());
        }
        self.enter()?;
        for _ in 0..len {
            let mut key = K::default();
            self.decode_next(&mut key, Context::Root)?;
            key.coerce_key()?;
            let mut value = map.take_entry(&key).unwrap_or_default();
            self.decode_next(&mut value, Context::MapValue { key: &key })?;
            map.put_entry(key, value);
        }
        self.leave();
        Ok(())
    }

    /// Decode into an open slot: scalars are stored directly, containers are built by the
    /// resolver and then decoded into.
    pub(crate) fn decode_open(
        &mut self,
        slot: &mut Value,
        head: Head,
        ctx: Context<'_>,
    ) -> Result<()> {
        let (category, len) = match self.reader.read_element(head.tag, head.len)? {
            Element::Container(category, len) => (category, len),
            scalar => {
                *slot = scalar.into_scalar().unwrap_or_default();
                return Ok(());
            }
        };
        let mut resolved = self.resolver.resolve(&ctx, len, category);
        let fits = matches!(
            (category, &resolved),
            (Category::RawBytes, Value::Str(_) | Value::Bin(_))
                | (Category::Sequence, Value::Array(_))
                | (Category::Map, Value::Map(_) | Value::Record(_))
        );
        if !fits {
            return Err(Error::Usage(format!(
                "resolver returned {} for a {} of length {}",
                resolved.kind_name(),
                category.name(),
                len
            )));
        }
        trace!(
            ?ctx,
            len,
            category = category.name(),
            kind = resolved.kind_name(),
            "resolved open slot"
        );
        resolved.decode_tagged(
            self,
            Head {
                tag: head.tag,
                len: Some(len),
            },
            ctx,
        )?;
        *slot = resolved;
        Ok(())
    }

    pub(crate) fn reset_depth(&mut self) {
        self.depth.reset()
    }

    pub(crate) fn enter(&mut self) -> Result<()> {
        self.depth.enter()
    }

    pub(crate) fn leave(&mut self) {
        self.depth.leave()
    }
}

/// Map storage the decoder can fill, one entry at a time.
pub trait Entries<K, V> {
    /// Remove and return the existing value for `key`, if any.
    fn take_entry(&mut self, key: &K) -> Option<V>;
    fn put_entry(&mut self, key: K, value: V);
}

impl<K: Ord, V> Entries<K, V> for BTreeMap<K, V> {
    fn take_entry(&mut self, key: &K) -> Option<V> {
        self.remove(key)
    }

    fn put_entry(&mut self, key: K, value: V) {
        self.insert(key, value);
    }
}

impl<K: Eq + Hash, V, S: BuildHasher> Entries<K, V> for HashMap<K, V, S> {
    fn take_entry(&mut self, key: &K) -> Option<V> {
        self.remove(key)
    }

    fn put_entry(&mut self, key: K, value: V) {
        self.insert(key, value);
    }
}

/// Wire-ordered pairs, as held by [`Value::Map`]. Lookup is linear.
impl<K: PartialEq, V: Default> Entries<K, V> for Vec<(K, V)> {
    fn take_entry(&mut self, key: &K) -> Option<V> {
        self.iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| std::mem::take(v))
    }

    fn put_entry(&mut self, key: K, value: V) {
        match self.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.push((key, value)),
        }
    }
}

fn describe(tag: u8) -> String {
    format!("{:?} (0x{:02x})", Marker::from_u8(tag), tag)
}

impl Decode for bool {
    fn decode_tagged<R: Read>(
        &mut self,
        dec: &mut Decoder<R>,
        head: Head,
        _ctx: Context<'_>,
    ) -> Result<()> {
        match dec.reader.read_scalar(head.tag, Fixnum::Never)? {
            Element::Bool(v) => {
                *self = v;
                Ok(())
            }
            other => Err(Error::mismatch("bool", other)),
        }
    }

    fn reset(&mut self) {
        *self = false;
    }
}

macro_rules! impl_decode_int {
    ($fixnum:expr, $($t:ty),*) => {
        $(
            impl Decode for $t {
                fn decode_tagged<R: Read>(
                    &mut self,
                    dec: &mut Decoder<R>,
                    head: Head,
                    _ctx: Context<'_>,
                ) -> Result<()> {
                    *self = match dec.reader.read_scalar(head.tag, $fixnum)? {
                        Element::Int(v) => v as $t,
                        Element::Uint(v) => v as $t,
                        other => return Err(Error::mismatch(stringify!($t), other)),
                    };
                    Ok(())
                }

                fn reset(&mut self) {
                    *self = 0;
                }
            }
        )*
    };
}

impl_decode_int!(Fixnum::Signed, i8, i16, i32, i64, isize);
impl_decode_int!(Fixnum::Unsigned, u16, u32, u64, usize);

// u8 is both an integer and the element type of byte buffers.
impl Decode for u8 {
    fn decode_tagged<R: Read>(
        &mut self,
        dec: &mut Decoder<R>,
        head: Head,
        _ctx: Context<'_>,
    ) -> Result<()> {
        *self = match dec.reader.read_scalar(head.tag, Fixnum::Unsigned)? {
            Element::Int(v) => v as u8,
            Element::Uint(v) => v as u8,
            other => return Err(Error::mismatch("u8", other)),
        };
        Ok(())
    }

    fn reset(&mut self) {
        *self = 0;
    }

    fn byte_slots(slots: &mut [u8]) -> Option<&mut [u8]> {
        Some(slots)
    }

    fn byte_vec(vec: &mut Vec<u8>) -> Option<&mut Vec<u8>> {
        Some(vec)
    }
}

macro_rules! impl_decode_float {
    ($($t:ty),*) => {
        $(
            impl Decode for $t {
                fn decode_tagged<R: Read>(
                    &mut self,
                    dec: &mut Decoder<R>,
                    head: Head,
                    _ctx: Context<'_>,
                ) -> Result<()> {
                    *self = match dec.reader.read_scalar(head.tag, Fixnum::Never)? {
                        Element::F32(v) => v as $t,
                        Element::F64(v) => v as $t,
                        other => return Err(Error::mismatch(stringify!($t), other)),
                    };
                    Ok(())
                }

                fn reset(&mut self) {
                    *self = 0.0;
                }
            }
        )*
    };
}

impl_decode_float!(f32, f64);

fn bytes_into_string(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes)
        .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

impl Decode for String {
    fn decode_tagged<R: Read>(
        &mut self,
        dec: &mut Decoder<R>,
        head: Head,
        _ctx: Context<'_>,
    ) -> Result<()> {
        if Marker::from_u8(head.tag).category() != Some(Category::RawBytes) {
            return Err(Error::mismatch("String", describe(head.tag)));
        }
        let mut bytes = std::mem::take(self).into_bytes();
        let result = dec.decode_raw(&mut bytes, head);
        *self = bytes_into_string(bytes);
        result
    }

    fn reset(&mut self) {
        self.clear();
    }
}

impl<T: Decode + Default> Decode for Vec<T> {
    fn decode_tagged<R: Read>(
        &mut self,
        dec: &mut Decoder<R>,
        head: Head,
        _ctx: Context<'_>,
    ) -> Result<()> {
        if let Some(bytes) = T::byte_vec(self) {
            return dec.decode_raw(bytes, head);
        }
        dec.decode_seq(self, head)
    }

    fn reset(&mut self) {
        self.clear();
    }
}

impl Decode for ByteBuf {
    fn decode_tagged<R: Read>(
        &mut self,
        dec: &mut Decoder<R>,
        head: Head,
        _ctx: Context<'_>,
    ) -> Result<()> {
        dec.decode_raw(&mut **self, head)
    }

    fn reset(&mut self) {
        self.clear();
    }
}

impl<T: Decode, const N: usize> Decode for [T; N] {
    fn decode_tagged<R: Read>(
        &mut self,
        dec: &mut Decoder<R>,
        head: Head,
        _ctx: Context<'_>,
    ) -> Result<()> {
        if let Some(bytes) = T::byte_slots(&mut self[..]) {
            return dec.decode_raw_fixed(bytes, head);
        }
        let len = dec.head_len(head, Category::Sequence)?;
        if len > N {
            return Err(Error::LengthMismatch {
                capacity: N,
                actual: len,
            });
        }
        let (body, rest) = self.split_at_mut(len);
        for slot in rest {
            slot.reset();
        }
        dec.decode_elements(body)
    }

    fn reset(&mut self) {
        for slot in self.iter_mut() {
            slot.reset();
        }
    }
}

impl<T: Decode + Default> Decode for Option<T> {
    fn decode_tagged<R: Read>(
        &mut self,
        dec: &mut Decoder<R>,
        head: Head,
        ctx: Context<'_>,
    ) -> Result<()> {
        self.get_or_insert_with(T::default)
            .decode_tagged(dec, head, ctx)
    }

    fn reset(&mut self) {
        *self = None;
    }
}

impl<T: Decode> Decode for Box<T> {
    fn decode_tagged<R: Read>(
        &mut self,
        dec: &mut Decoder<R>,
        head: Head,
        ctx: Context<'_>,
    ) -> Result<()> {
        (**self).decode_tagged(dec, head, ctx)
    }

    fn reset(&mut self) {
        (**self).reset();
    }
}

impl<K, V> Decode for BTreeMap<K, V>
where
    K: Decode + Default + Ord + 'static,
    V: Decode + Default,
{
    fn decode_tagged<R: Read>(
        &mut self,
        dec: &mut Decoder<R>,
        head: Head,
        _ctx: Context<'_>,
    ) -> Result<()> {
        dec.decode_entries(self, head)
    }

    fn reset(&mut self) {
        self.clear();
    }
}

impl<K, V, S> Decode for HashMap<K, V, S>
where
    K: Decode + Default + Eq + Hash + 'static,
    V: Decode + Default,
    S: BuildHasher,
{
    fn decode_tagged<R: Read>(
        &mut self,
        dec: &mut Decoder<R>,
        head: Head,
        _ctx: Context<'_>,
    ) -> Result<()> {
        dec.decode_entries(self, head)
    }

    fn reset(&mut self) {
        self.clear();
    }
}
