use std::fmt;
use std::io;

use serde::de;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The broad class a decoding failure falls into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fault {
    /// The byte source failed or ran dry.
    Read,
    /// A tag byte isn't part of the wire format.
    Format,
    /// The wire shape doesn't fit the destination.
    Type,
    /// A record got a key it has no field for.
    Field,
    /// The decoder was called with something it can't decode into.
    Usage,
    /// A configured parsing limit was hit.
    Limit,
}

#[derive(Debug)]
pub enum Error {
    /// The underlying byte source returned an error.
    Io(io::Error),
    /// The byte source returned fewer bytes than needed, even after a retry.
    ShortRead { expected: usize, actual: usize },
    /// A tag byte was not recognized at the given decoding step. This includes the reserved
    /// 0xc1 tag.
    BadTag { tag: u8, step: &'static str },
    /// The decoded value can't be stored in the destination's type.
    TypeMismatch {
        expected: &'static str,
        actual: String,
    },
    /// A sequence was longer than the fixed-size array it was decoded into.
    LengthMismatch { capacity: usize, actual: usize },
    /// A record's wire key didn't match any of its fields.
    UnknownField { record: &'static str, field: String },
    /// The destination handle or resolver output can't be decoded into.
    Usage(String),
    /// Decoding hit a parsing limit, like the maximum nesting depth.
    ParseLimit(String),
    /// Occurs when serde deserialization fails
    SerdeFail(String),
}

impl Error {
    pub(crate) fn bad_tag(tag: u8, step: &'static str) -> Self {
        Error::BadTag { tag, step }
    }

    pub(crate) fn mismatch(expected: &'static str, actual: impl fmt::Display) -> Self {
        Error::TypeMismatch {
            expected,
            actual: actual.to_string(),
        }
    }

    /// Which class of failure this is.
    pub fn kind(&self) -> Fault {
        match *self {
            Error::Io(_) | Error::ShortRead { .. } => Fault::Read,
            Error::BadTag { .. } => Fault::Format,
            Error::TypeMismatch { .. } | Error::LengthMismatch { .. } => Fault::Type,
            Error::UnknownField { .. } => Fault::Field,
            Error::Usage(_) => Fault::Usage,
            Error::ParseLimit(_) => Fault::Limit,
            Error::SerdeFail(_) => Fault::Type,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Io(ref err) => write!(f, "Read failed: {}", err),
            Error::ShortRead { expected, actual } => write!(
                f,
                "Incorrect number of bytes read: expected {}, got {}",
                expected, actual
            ),
            Error::BadTag { tag, step } => write!(
                f,
                "Unrecognized descriptor byte 0x{:02x} while decoding {}",
                tag, step
            ),
            Error::TypeMismatch {
                expected,
                ref actual,
            } => write!(f, "Can't decode {} into {}", actual, expected),
            Error::LengthMismatch { capacity, actual } => write!(
                f,
                "Array length {} must be >= container length {}",
                capacity, actual
            ),
            Error::UnknownField { record, ref field } => {
                write!(f, "Record {} has no field named {:?}", record, field)
            }
            Error::Usage(ref msg) => write!(f, "Invalid decode call: {}", msg),
            Error::ParseLimit(ref err) => write!(f, "Hit parsing limit: {}", err),
            Error::SerdeFail(ref msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            Error::Io(ref err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl de::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::SerdeFail(msg.to_string())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn kinds() {
        let io = Error::from(io::Error::new(io::ErrorKind::Other, "gone"));
        assert_eq!(io.kind(), Fault::Read);
        assert_eq!(
            Error::ShortRead {
                expected: 4,
                actual: 1
            }
            .kind(),
            Fault::Read
        );
        assert_eq!(Error::bad_tag(0xc1, "value").kind(), Fault::Format);
        assert_eq!(Error::mismatch("String", "map").kind(), Fault::Type);
        assert_eq!(
            Error::UnknownField {
                record: "Point",
                field: "z".into()
            }
            .kind(),
            Fault::Field
        );
        assert_eq!(Error::Usage("nope".into()).kind(), Fault::Usage);
    }

    #[test]
    fn display() {
        let err = Error::bad_tag(0xc1, "value");
        assert_eq!(
            err.to_string(),
            "Unrecognized descriptor byte 0xc1 while decoding value"
        );
        let err = Error::LengthMismatch {
            capacity: 2,
            actual: 3,
        };
        assert_eq!(err.to_string(), "Array length 2 must be >= container length 3");
    }

    #[test]
    fn io_source() {
        use std::error::Error as _;
        let err = Error::from(io::Error::new(io::ErrorKind::Other, "gone"));
        assert!(err.source().is_some());
        assert!(Error::Usage(String::new()).source().is_none());
    }
}
