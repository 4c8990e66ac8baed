use std::cmp;
use std::fmt;
use std::io::Read;
use std::ops;
use std::time;

use serde::{
    de::{Deserialize, Deserializer},
    ser::{Serialize, Serializer},
};

use crate::{
    decode::{Decode, Decoder, Head},
    error::Result,
    resolve::Context,
};

const NANOS_PER_SEC: i64 = 1_000_000_000;
const MAX_NANOSEC: u32 = 999_999_999;

/// A UTC instant: seconds since the Unix epoch plus a nanosecond offset into that second.
///
/// On the wire a timestamp is a two-element sequence of signed integers, `[seconds,
/// nanoseconds]`. The pair doesn't need to be normalized; decoding folds any excess or negative
/// nanoseconds into the seconds.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Timestamp {
    sec: i64,
    nano: u32,
}

impl Timestamp {
    /// Create a timestamp from seconds and nanoseconds since the epoch, normalizing the
    /// nanoseconds into `0..1_000_000_000`. Saturates at the representable range.
    pub fn from_unix(secs: i64, nanos: i64) -> Timestamp {
        let carry = nanos.div_euclid(NANOS_PER_SEC);
        let nano = nanos.rem_euclid(NANOS_PER_SEC) as u32;
        match secs.checked_add(carry) {
            Some(sec) => Timestamp { sec, nano },
            None if carry < 0 => Timestamp::min_value(),
            None => Timestamp::max_value(),
        }
    }

    /// Create a timestamp from an already-normalized seconds + nanoseconds value
    pub fn from_utc(sec: i64, nano: u32) -> Option<Timestamp> {
        if nano > MAX_NANOSEC {
            None
        } else {
            Some(Timestamp { sec, nano })
        }
    }

    pub fn from_sec(sec: i64) -> Timestamp {
        Timestamp { sec, nano: 0 }
    }

    /// Minimum possible time that can be represented
    pub fn min_value() -> Timestamp {
        Timestamp {
            sec: i64::MIN,
            nano: 0,
        }
    }

    /// Maximum possible time that can be represented
    pub fn max_value() -> Timestamp {
        Timestamp {
            sec: i64::MAX,
            nano: MAX_NANOSEC,
        }
    }

    /// Add 1 nanosecond to timestamp. Saturates at [`max_value`](Self::max_value).
    pub fn next(self) -> Timestamp {
        if self.nano < MAX_NANOSEC {
            Timestamp {
                nano: self.nano + 1,
                ..self
            }
        } else {
            match self.sec.checked_add(1) {
                Some(sec) => Timestamp { sec, nano: 0 },
                None => self,
            }
        }
    }

    /// Subtract 1 nanosecond from timestamp. Saturates at [`min_value`](Self::min_value).
    pub fn prev(self) -> Timestamp {
        if self.nano > 0 {
            Timestamp {
                nano: self.nano - 1,
                ..self
            }
        } else {
            match self.sec.checked_sub(1) {
                Some(sec) => Timestamp {
                    sec,
                    nano: MAX_NANOSEC,
                },
                None => self,
            }
        }
    }

    /// Return the UNIX timestamp (number of seconds since January 1, 1970 0:00:00 UTC).
    pub fn timestamp_utc(&self) -> i64 {
        self.sec
    }

    /// Returns the number of nanoseconds past the second count.
    pub fn timestamp_subsec_nanos(&self) -> u32 {
        self.nano
    }

    /// Create a Timestamp based on the current system time.
    pub fn now() -> Timestamp {
        Timestamp::from(time::SystemTime::now())
    }

    /// Convert to a `SystemTime`, if the platform can represent this instant.
    pub fn to_system_time(&self) -> Option<time::SystemTime> {
        let epoch = time::SystemTime::UNIX_EPOCH;
        let whole = time::Duration::from_secs(self.sec.unsigned_abs());
        let at_sec = if self.sec >= 0 {
            epoch.checked_add(whole)?
        } else {
            epoch.checked_sub(whole)?
        };
        at_sec.checked_add(time::Duration::from_nanos(self.nano as u64))
    }
}

impl From<time::SystemTime> for Timestamp {
    fn from(t: time::SystemTime) -> Self {
        let (sign, d) = match t.duration_since(time::SystemTime::UNIX_EPOCH) {
            Ok(d) => (1, d),
            Err(e) => (-1, e.duration()),
        };
        let secs = i64::try_from(d.as_secs()).unwrap_or(i64::MAX);
        Timestamp::from_unix(sign * secs, sign * d.subsec_nanos() as i64)
    }
}

/// Adds whole seconds, saturating at the representable range.
impl ops::Add<i64> for Timestamp {
    type Output = Timestamp;
    fn add(self, rhs: i64) -> Self {
        match self.sec.checked_add(rhs) {
            Some(sec) => Timestamp { sec, ..self },
            None if rhs < 0 => Timestamp::min_value(),
            None => Timestamp::max_value(),
        }
    }
}

/// Subtracts whole seconds, saturating at the representable range.
impl ops::Sub<i64> for Timestamp {
    type Output = Timestamp;
    fn sub(self, rhs: i64) -> Self {
        match self.sec.checked_sub(rhs) {
            Some(sec) => Timestamp { sec, ..self },
            None if rhs < 0 => Timestamp::max_value(),
            None => Timestamp::min_value(),
        }
    }
}

impl cmp::Ord for Timestamp {
    fn cmp(&self, other: &Timestamp) -> cmp::Ordering {
        if self.sec == other.sec {
            self.nano.cmp(&other.nano)
        } else {
            self.sec.cmp(&other.sec)
        }
    }
}

impl cmp::PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Timestamp) -> Option<cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "UTC: {} sec + {} ns", self.sec, self.nano)
    }
}

impl Decode for Timestamp {
    fn decode_tagged<R: Read>(
        &mut self,
        dec: &mut Decoder<R>,
        head: Head,
        ctx: Context<'_>,
    ) -> Result<()> {
        let mut raw = [self.sec, self.nano as i64];
        raw.decode_tagged(dec, head, ctx)?;
        *self = Timestamp::from_unix(raw[0], raw[1]);
        Ok(())
    }

    fn reset(&mut self) {
        *self = Timestamp::default();
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (self.sec, self.nano as i64).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (secs, nanos) = <(i64, i64)>::deserialize(deserializer)?;
        Ok(Timestamp::from_unix(secs, nanos))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{error::Fault, unmarshal};

    fn encode(secs: i64, nanos: i64) -> Vec<u8> {
        let mut data = vec![0x92, 0xd3];
        data.extend_from_slice(&secs.to_be_bytes());
        data.push(0xd3);
        data.extend_from_slice(&nanos.to_be_bytes());
        data
    }

    #[test]
    fn decode_pair() {
        let mut t = Timestamp::default();
        unmarshal(&encode(1_600_000_000, 500), &mut t).unwrap();
        assert_eq!(t.timestamp_utc(), 1_600_000_000);
        assert_eq!(t.timestamp_subsec_nanos(), 500);

        // Small integers need not use the 64-bit form
        let mut t = Timestamp::default();
        unmarshal(&[0x92, 0x05, 0x01], &mut t).unwrap();
        assert_eq!(t, Timestamp::from_utc(5, 1).unwrap());
    }

    #[test]
    fn normalized() {
        let mut t = Timestamp::default();
        unmarshal(&encode(10, -1), &mut t).unwrap();
        assert_eq!(t, Timestamp::from_utc(9, 999_999_999).unwrap());
        unmarshal(&encode(10, 2_500_000_000), &mut t).unwrap();
        assert_eq!(t, Timestamp::from_utc(12, 500_000_000).unwrap());
        assert_eq!(Timestamp::from_unix(i64::MAX, NANOS_PER_SEC), Timestamp::max_value());
        assert_eq!(Timestamp::from_unix(i64::MIN, -1), Timestamp::min_value());
    }

    #[test]
    fn nil_is_epoch() {
        let mut t = Timestamp::from_sec(99);
        unmarshal(&[0xc0], &mut t).unwrap();
        assert_eq!(t, Timestamp::from_sec(0));
    }

    #[test]
    fn too_many_elements() {
        let mut t = Timestamp::default();
        let err = unmarshal(&[0x93, 0x01, 0x02, 0x03], &mut t).unwrap_err();
        assert_eq!(err.kind(), Fault::Type);
        let err = unmarshal(&[0xa1, 0x01], &mut t).unwrap_err();
        assert_eq!(err.kind(), Fault::Format);
    }

    #[test]
    fn ordering() {
        let a = Timestamp::from_utc(1, 5).unwrap();
        assert!(a < a.next());
        assert!(a.prev() < a);
        assert_eq!(Timestamp::from_sec(1).prev(), Timestamp::from_utc(0, MAX_NANOSEC).unwrap());
        assert!(Timestamp::from_sec(-1) < Timestamp::from_sec(0));
        assert_eq!((a + 2) - 2, a);
    }

    #[test]
    fn saturating_arithmetic() {
        assert_eq!(Timestamp::max_value().next(), Timestamp::max_value());
        assert_eq!(Timestamp::min_value().prev(), Timestamp::min_value());
        assert_eq!(Timestamp::from_sec(1) + i64::MAX, Timestamp::max_value());
        assert_eq!(Timestamp::from_sec(-1) - i64::MAX, Timestamp::min_value());
        assert_eq!(Timestamp::from_sec(-2) + i64::MIN, Timestamp::min_value());
        assert_eq!(Timestamp::from_sec(1) - i64::MIN, Timestamp::max_value());
    }

    #[test]
    fn system_time() {
        let t = Timestamp::from_utc(1_000, 250).unwrap();
        let sys = t.to_system_time().unwrap();
        assert_eq!(Timestamp::from(sys), t);
        let before = Timestamp::from_unix(-3, 100);
        assert_eq!(Timestamp::from(before.to_system_time().unwrap()), before);
        assert!(Timestamp::now() > Timestamp::from_sec(1_500_000_000));
    }
}
