/// MessagePack format markers, as decoded from a single tag byte.
///
/// This is the classic format: raw bytes have no separate string/binary families, and there are
/// no extension types. Everything outside the recognized ranges is `Reserved`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Marker {
    PosFixInt(u8),
    FixMap(u8),
    FixArray(u8),
    FixRaw(u8),
    Nil,
    Reserved,
    False,
    True,
    F32,
    F64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Int8,
    Int16,
    Int32,
    Int64,
    Raw16,
    Raw32,
    Array16,
    Array32,
    Map16,
    Map32,
    NegFixInt(i8),
}

pub const NIL: u8 = 0xc0;

impl Marker {
    /// Construct a marker from a single byte.
    pub fn from_u8(n: u8) -> Marker {
        match n {
            0x00..=0x7f => Marker::PosFixInt(n),
            0x80..=0x8f => Marker::FixMap(n & 0x0F),
            0x90..=0x9f => Marker::FixArray(n & 0x0F),
            0xa0..=0xbf => Marker::FixRaw(n & 0x1F),
            0xc0 => Marker::Nil,
            0xc2 => Marker::False,
            0xc3 => Marker::True,
            0xca => Marker::F32,
            0xcb => Marker::F64,
            0xcc => Marker::UInt8,
            0xcd => Marker::UInt16,
            0xce => Marker::UInt32,
            0xcf => Marker::UInt64,
            0xd0 => Marker::Int8,
            0xd1 => Marker::Int16,
            0xd2 => Marker::Int32,
            0xd3 => Marker::Int64,
            0xda => Marker::Raw16,
            0xdb => Marker::Raw32,
            0xdc => Marker::Array16,
            0xdd => Marker::Array32,
            0xde => Marker::Map16,
            0xdf => Marker::Map32,
            0xe0..=0xff => Marker::NegFixInt(n as i8),
            // 0xc1, plus the ranges later MessagePack revisions use for bin/ext/str8
            _ => Marker::Reserved,
        }
    }

    /// The container category this marker opens, if any.
    pub fn category(self) -> Option<Category> {
        match self {
            Marker::FixRaw(_) | Marker::Raw16 | Marker::Raw32 => Some(Category::RawBytes),
            Marker::FixArray(_) | Marker::Array16 | Marker::Array32 => Some(Category::Sequence),
            Marker::FixMap(_) | Marker::Map16 | Marker::Map32 => Some(Category::Map),
            _ => None,
        }
    }
}

impl From<u8> for Marker {
    fn from(val: u8) -> Marker {
        Marker::from_u8(val)
    }
}

/// The three kinds of length-prefixed value in the wire format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    RawBytes,
    Sequence,
    Map,
}

/// How a category encodes its length: the inline mask, and the 16-bit and 32-bit length tags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Descriptor {
    pub mask: u8,
    pub tag16: u8,
    pub tag32: u8,
}

impl Category {
    pub fn descriptor(self) -> Descriptor {
        match self {
            Category::RawBytes => Descriptor {
                mask: 0xa0,
                tag16: 0xda,
                tag32: 0xdb,
            },
            Category::Sequence => Descriptor {
                mask: 0x90,
                tag16: 0xdc,
                tag32: 0xdd,
            },
            Category::Map => Descriptor {
                mask: 0x80,
                tag16: 0xde,
                tag32: 0xdf,
            },
        }
    }

    /// Largest length the inline form can carry.
    pub fn inline_max(self) -> u8 {
        match self {
            Category::RawBytes => 0x1f,
            Category::Sequence | Category::Map => 0x0f,
        }
    }

    /// Returns the inline length if `tag` is in this category's fixed range.
    pub fn inline_len(self, tag: u8) -> Option<usize> {
        let mask = self.descriptor().mask;
        if tag & mask == mask && (tag ^ mask) <= self.inline_max() {
            Some((tag ^ mask) as usize)
        } else {
            None
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Category::RawBytes => "raw bytes",
            Category::Sequence => "sequence",
            Category::Map => "map",
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn reserved() {
        for tag in [0xc1u8, 0xc4, 0xc9, 0xd4, 0xd9] {
            assert_eq!(Marker::from_u8(tag), Marker::Reserved, "0x{:x}", tag);
        }
    }

    #[test]
    fn reserved_count() {
        let reserved = (0..=255u8)
            .filter(|&tag| Marker::from_u8(tag) == Marker::Reserved)
            .count();
        // 0xc1, 0xc4-0xc9, 0xd4-0xd9
        assert_eq!(reserved, 13);
    }

    #[test]
    fn fixnums() {
        assert_eq!(Marker::from_u8(0x7f), Marker::PosFixInt(127));
        assert_eq!(Marker::from_u8(0xe0), Marker::NegFixInt(-32));
        assert_eq!(Marker::from_u8(0xff), Marker::NegFixInt(-1));
    }

    #[test]
    fn inline_ranges() {
        assert_eq!(Category::RawBytes.inline_len(0xa0), Some(0));
        assert_eq!(Category::RawBytes.inline_len(0xbf), Some(31));
        assert_eq!(Category::Sequence.inline_len(0x9f), Some(15));
        assert_eq!(Category::Map.inline_len(0x85), Some(5));
        // Bits match the mask, but the tag is outside the fixed range
        assert_eq!(Category::RawBytes.inline_len(0xe5), None);
        assert_eq!(Category::Sequence.inline_len(0xd0), None);
        assert_eq!(Category::Map.inline_len(0x93), None);
        assert_eq!(Category::Map.inline_len(0xc0), None);
    }

    #[test]
    fn categories() {
        assert_eq!(Marker::from_u8(0xdb).category(), Some(Category::RawBytes));
        assert_eq!(Marker::from_u8(0x91).category(), Some(Category::Sequence));
        assert_eq!(Marker::from_u8(0xdf).category(), Some(Category::Map));
        assert_eq!(Marker::from_u8(0xc3).category(), None);
    }
}
