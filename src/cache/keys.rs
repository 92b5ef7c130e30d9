//! Key and value helpers shared by the facade and the key builder

use super::errors::{CacheError, CacheResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Separator between key segments
pub const KEY_SEPARATOR: &str = ":";

/// `true` for an absent, empty or whitespace-only value
pub fn is_null_or_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

/// Join the non-blank parts with `:`
pub fn build_key<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    parts
        .into_iter()
        .filter(|part| !part.as_ref().trim().is_empty())
        .map(|part| part.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(KEY_SEPARATOR)
}

/// Encode a value for the store: strings raw, everything else as JSON
pub fn encode_value<T: Serialize + ?Sized>(value: &T) -> CacheResult<String> {
    match serde_json::to_value(value)? {
        Value::String(raw) => Ok(raw),
        other => Ok(other.to_string()),
    }
}

/// Decode a stored value written by [`encode_value`]
///
/// Parsed as JSON unless the raw text is a quoted literal; otherwise, or
/// when parsing fails, offered to `T` as a plain string.
pub fn decode_value<T: DeserializeOwned>(raw: String) -> CacheResult<T> {
    match serde_json::from_str::<T>(&raw) {
        Ok(value) if !looks_like_json_string(&raw) => Ok(value),
        parsed => match serde_json::from_value::<T>(Value::String(raw)) {
            Ok(value) => Ok(value),
            Err(_) => parsed.map_err(|e| CacheError::Serialization(e.to_string())),
        },
    }
}

// A raw string that happens to be a quoted JSON literal must come back verbatim
fn looks_like_json_string(raw: &str) -> bool {
    raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Profile {
        id: u64,
        name: String,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    enum Status {
        Active,
    }

    #[test]
    fn test_build_key_skips_blank_parts() {
        assert_eq!(build_key(["order", "", "  ", "42"]), "order:42");
        assert_eq!(build_key(Vec::<String>::new()), "");
    }

    #[test]
    fn test_is_null_or_blank() {
        assert!(is_null_or_blank(None));
        assert!(is_null_or_blank(Some("")));
        assert!(is_null_or_blank(Some(" \t")));
        assert!(!is_null_or_blank(Some("x")));
    }

    #[test]
    fn test_strings_are_stored_raw() {
        assert_eq!(encode_value("hello").unwrap(), "hello");
        assert_eq!(encode_value(&Status::Active).unwrap(), "Active");
        assert_eq!(encode_value(&42u32).unwrap(), "42");
    }

    #[test]
    fn test_decode_prefers_string_for_string_targets() {
        let numeric: String = decode_value("123".to_string()).unwrap();
        assert_eq!(numeric, "123");
        let quoted: String = decode_value("\"quoted\"".to_string()).unwrap();
        assert_eq!(quoted, "\"quoted\"");
        let number: u32 = decode_value("123".to_string()).unwrap();
        assert_eq!(number, 123);
        let status: Status = decode_value("Active".to_string()).unwrap();
        assert_eq!(status, Status::Active);
    }

    #[test]
    fn test_structs_are_json() {
        let profile = Profile {
            id: 7,
            name: "ana".into(),
        };
        let raw = encode_value(&profile).unwrap();
        assert_eq!(raw, r#"{"id":7,"name":"ana"}"#);
        assert_eq!(decode_value::<Profile>(raw).unwrap(), profile);
        assert!(decode_value::<Profile>("not json".to_string()).is_err());
    }
}
