//! Record keys
//!
//! Keys follow the engine's ordering rules: every number sorts before every
//! date, every date before every string. Within a kind, numbers and dates
//! compare numerically and strings compare by UTF-16 code units.

use std::cmp::Ordering;
use std::fmt;

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

/// Map key used for dates in the JSON form of a key.
const DATE_TAG: &str = "$date";

/// Map key used for infinite numbers, which JSON cannot represent.
const NUMBER_TAG: &str = "$number";

const INFINITY: &str = "Infinity";
const NEG_INFINITY: &str = "-Infinity";

/// Largest integer a double represents exactly (2^53).
pub(crate) const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// A record key.
#[derive(Debug, Clone)]
pub enum Key {
    Number(f64),
    /// Milliseconds since the Unix epoch.
    Date(f64),
    String(String),
}

impl Key {
    /// NaN is never a valid key. Numbers may be infinite; dates must be
    /// finite, as an invalid `Date` is not a key.
    pub fn is_valid(&self) -> bool {
        match self {
            Key::Number(n) => !n.is_nan(),
            Key::Date(ms) => ms.is_finite(),
            Key::String(_) => true,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Key::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Key::String(s) => Some(s),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Key::Number(_) => 0,
            Key::Date(_) => 1,
            Key::String(_) => 2,
        }
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Key::Number(a), Key::Number(b)) | (Key::Date(a), Key::Date(b)) => {
                a.partial_cmp(b).unwrap_or(Ordering::Equal)
            }
            (Key::String(a), Key::String(b)) => a.encode_utf16().cmp(b.encode_utf16()),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Key {}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Number(n) => write!(f, "{}", n),
            Key::Date(ms) => write!(f, "Date({})", ms),
            Key::String(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::String(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::String(s)
    }
}

impl From<i32> for Key {
    fn from(n: i32) -> Self {
        Key::Number(n as f64)
    }
}

impl From<i64> for Key {
    fn from(n: i64) -> Self {
        Key::Number(n as f64)
    }
}

impl From<u32> for Key {
    fn from(n: u32) -> Self {
        Key::Number(n as f64)
    }
}

impl From<f64> for Key {
    fn from(n: f64) -> Self {
        Key::Number(n)
    }
}

/// Serialize a double the way `JSON.stringify` prints it: integral values
/// without a fractional part.
pub(crate) fn serialize_number<S: Serializer>(n: f64, serializer: S) -> Result<S::Ok, S::Error> {
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        serializer.serialize_i64(n as i64)
    } else {
        serializer.serialize_f64(n)
    }
}

impl Serialize for Key {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Key::Number(n) if n.is_infinite() => {
                let text = if *n > 0.0 { INFINITY } else { NEG_INFINITY };
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(NUMBER_TAG, text)?;
                map.end()
            }
            Key::Number(n) => serialize_number(*n, serializer),
            Key::String(s) => serializer.serialize_str(s),
            Key::Date(ms) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(DATE_TAG, ms)?;
                map.end()
            }
        }
    }
}

struct KeyVisitor;

impl<'de> Visitor<'de> for KeyVisitor {
    type Value = Key;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a number, a string, {\"$date\": <ms>} or {\"$number\": \"Infinity\"}")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Key, E> {
        Ok(Key::Number(v as f64))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Key, E> {
        Ok(Key::Number(v as f64))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Key, E> {
        Ok(Key::Number(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Key, E> {
        Ok(Key::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Key, E> {
        Ok(Key::String(v))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Key, A::Error> {
        let mut key = None;
        while let Some(name) = map.next_key::<String>()? {
            if key.is_some() {
                return Err(de::Error::custom("a tagged key has exactly one entry"));
            }
            key = Some(match name.as_str() {
                DATE_TAG => Key::Date(map.next_value::<f64>()?),
                NUMBER_TAG => match map.next_value::<String>()?.as_str() {
                    INFINITY => Key::Number(f64::INFINITY),
                    NEG_INFINITY => Key::Number(f64::NEG_INFINITY),
                    other => {
                        return Err(de::Error::invalid_value(
                            de::Unexpected::Str(other),
                            &"\"Infinity\" or \"-Infinity\"",
                        ))
                    }
                },
                _ => return Err(de::Error::unknown_field(&name, &[DATE_TAG, NUMBER_TAG])),
            });
        }
        key.ok_or_else(|| de::Error::missing_field(DATE_TAG))
    }
}

impl<'de> Deserialize<'de> for Key {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(KeyVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_kind_ordering() {
        let mut keys = vec![
            Key::from("a"),
            Key::Date(0.0),
            Key::from(10),
            Key::from(-5),
            Key::Date(-1.0),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                Key::from(-5),
                Key::from(10),
                Key::Date(-1.0),
                Key::Date(0.0),
                Key::from("a"),
            ]
        );
    }

    #[test]
    fn test_number_and_date_with_same_value_differ() {
        assert_ne!(Key::Number(1.0), Key::Date(1.0));
        assert!(Key::Number(1e12) < Key::Date(0.0));
    }

    #[test]
    fn test_strings_compare_by_code_units() {
        // U+FF61 is one UTF-16 unit; U+1F600 is a surrogate pair starting at 0xD83D
        assert!(Key::from("\u{1F600}") < Key::from("\u{FF61}"));
        assert!(Key::from("B") < Key::from("a"));
    }

    #[test]
    fn test_nan_is_invalid() {
        assert!(!Key::Number(f64::NAN).is_valid());
        assert!(!Key::Date(f64::NAN).is_valid());
        assert!(Key::from("auto").is_valid());
    }

    #[test]
    fn test_json_form() {
        assert_eq!(serde_json::to_string(&Key::from(1)).unwrap(), "1");
        assert_eq!(serde_json::to_string(&Key::Number(1.5)).unwrap(), "1.5");
        assert_eq!(serde_json::to_string(&Key::from("x")).unwrap(), "\"x\"");
        assert_eq!(
            serde_json::to_string(&Key::Date(1700000000000.0)).unwrap(),
            r#"{"$date":1700000000000.0}"#
        );

        let parsed: Vec<Key> =
            serde_json::from_str(r#"[3, 2.5, "k", {"$date": 12}]"#).unwrap();
        assert_eq!(
            parsed,
            vec![
                Key::from(3),
                Key::Number(2.5),
                Key::from("k"),
                Key::Date(12.0)
            ]
        );
    }

    #[test]
    fn test_json_rejects_other_shapes() {
        assert!(serde_json::from_str::<Key>("true").is_err());
        assert!(serde_json::from_str::<Key>(r#"{"when": 1}"#).is_err());
        assert!(serde_json::from_str::<Key>("null").is_err());
        assert!(serde_json::from_str::<Key>(r#"{"$number": "NaN"}"#).is_err());
        assert!(serde_json::from_str::<Key>(r#"{"$date": 1, "$number": "Infinity"}"#).is_err());
    }

    #[test]
    fn test_infinite_numbers_use_tagged_form() {
        let keys = vec![Key::Number(f64::NEG_INFINITY), Key::Number(f64::INFINITY)];
        let json = serde_json::to_string(&keys).unwrap();
        assert_eq!(json, r#"[{"$number":"-Infinity"},{"$number":"Infinity"}]"#);
        assert_eq!(serde_json::from_str::<Vec<Key>>(&json).unwrap(), keys);
    }

    #[test]
    fn test_infinite_dates_are_invalid() {
        assert!(Key::Number(f64::INFINITY).is_valid());
        assert!(!Key::Date(f64::INFINITY).is_valid());
    }
}
