//! A streaming decoder for the classic MessagePack wire format.
//!
//! Values are decoded from any [`std::io::Read`] source straight into a destination that already
//! exists: plain Rust types, structs registered with [`impl_record!`], or a dynamically typed
//! [`Value`]. Destinations are filled in place, so existing strings, vectors, and map entries are
//! reused, and record fields missing from the input keep what they held.
//!
//! The format handled here is the original one, before string/binary were split:
//!
//! - nil, booleans, 32- and 64-bit floats
//! - signed and unsigned integers of 8 to 64 bits, plus positive and negative fixnums
//! - raw byte strings, sequences, and maps, each with inline, 16-bit, and 32-bit lengths
//!
//! Nil decodes to a destination's zero value. When a [`Value::Nil`] meets a container, a
//! [`Resolver`] picks what to build for it based on where the value sits; [`SimpleResolver`] is
//! the default policy.
//!
//! ```
//! # use msgpack_decode::{unmarshal, Value};
//! let mut v = Value::Nil;
//! unmarshal(&[0x82, 0xa1, b'a', 0x01, 0xa1, b'b', 0x02], &mut v).unwrap();
//! assert_eq!(v["a"], Value::Int(1));
//! assert_eq!(v["b"], Value::Int(2));
//! ```
//!
//! A [`Decoder`] is also a serde `Deserializer`; see [`from_slice`] and [`from_reader`].

use std::sync::Arc;

mod de;
mod decode;
mod depth_tracking;
mod element;
mod error;
mod marker;
mod reader;
pub mod record;
mod resolve;
mod timestamp;
mod value;

pub use de::{from_reader, from_slice};
pub use decode::{Decode, Decoder, Entries, Head};
pub use element::Element;
pub use error::{Error, Fault, Result};
pub use marker::{Category, Descriptor, Marker};
pub use reader::ByteReader;
pub use record::{Record, RecordValue};
pub use resolve::{Context, Resolver, ResolverFn, SimpleResolver};
pub use timestamp::Timestamp;
pub use value::Value;

/// Default limit on how deeply sequences, maps, and records may nest.
pub const MAX_DEPTH: usize = 100;

/// The most elements or bytes reserved up front on the strength of a length read from the wire.
/// Anything longer grows as the body is actually read.
pub const PREALLOC_LIMIT: usize = 4096;

/// Decode one value from `data` into `dest`, using the default resolver.
pub fn unmarshal<T: Decode>(data: &[u8], dest: &mut T) -> Result<()> {
    Decoder::new(data).decode(dest)
}

/// Decode one value from `data` into `dest`, asking `resolver` what to build for open containers.
pub fn unmarshal_with<T: Decode>(
    data: &[u8],
    dest: &mut T,
    resolver: Arc<dyn Resolver>,
) -> Result<()> {
    Decoder::with_resolver(data, resolver).decode(dest)
}
