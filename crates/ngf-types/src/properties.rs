//! Typed property lists attached to `Play` requests.
//!
//! A property list maps short string keys to values of one of four primitive
//! types. The service itself does not interpret properties; it logs them and
//! passes them along. Clients use them to describe how an event should be
//! rendered (sound file, vibration pattern, volume, and so on).
//!
//! Keys are truncated to [`MAX_KEY_LENGTH`] characters and string values to
//! [`MAX_VALUE_LENGTH`] characters when inserted, whether through the setters
//! or through deserialization.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use ts_rs::TS;

/// Maximum number of characters kept from a property key.
pub const MAX_KEY_LENGTH: usize = 32;

/// Maximum number of characters kept from a string property value.
pub const MAX_VALUE_LENGTH: usize = 512;

/// The type tag of a [`PropertyValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    /// UTF-8 string.
    String,
    /// Signed 32-bit integer.
    Integer,
    /// Unsigned 32-bit integer.
    Unsigned,
    /// Boolean.
    Boolean,
}

/// A single property value.
///
/// Serialized with an explicit type tag so that integer and unsigned values
/// survive a round trip through JSON:
///
/// ```text
/// {"type": "unsigned", "value": 80}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    /// UTF-8 string value.
    String(String),
    /// Signed 32-bit integer value.
    Integer(i32),
    /// Unsigned 32-bit integer value.
    Unsigned(u32),
    /// Boolean value.
    Boolean(bool),
}

impl PropertyValue {
    /// Return the type tag of this value.
    pub const fn value_type(&self) -> PropertyType {
        match self {
            Self::String(_) => PropertyType::String,
            Self::Integer(_) => PropertyType::Integer,
            Self::Unsigned(_) => PropertyType::Unsigned,
            Self::Boolean(_) => PropertyType::Boolean,
        }
    }
}

impl core::fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Unsigned(u) => write!(f, "{u}"),
            Self::Boolean(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        Self::Integer(value)
    }
}

impl From<u32> for PropertyValue {
    fn from(value: u32) -> Self {
        Self::Unsigned(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

/// An ordered set of key/value properties.
///
/// Setting a key that is already present replaces its value. Lookups apply
/// the same key truncation as inserts, so any key longer than
/// [`MAX_KEY_LENGTH`] finds the entry stored under its first
/// [`MAX_KEY_LENGTH`] characters.
///
/// On the wire the list is a bare JSON object from key to tagged value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PropertyList(BTreeMap<String, PropertyValue>);

impl PropertyList {
    /// Create an empty property list.
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    fn lookup(&self, key: &str) -> Option<&PropertyValue> {
        self.0.get(key_prefix(key))
    }

    /// Insert a value under `key`, applying the key and value length limits.
    pub fn set(&mut self, key: &str, value: impl Into<PropertyValue>) {
        let key = truncate_chars(key.to_owned(), MAX_KEY_LENGTH);
        let value = match value.into() {
            PropertyValue::String(s) => PropertyValue::String(truncate_chars(s, MAX_VALUE_LENGTH)),
            other => other,
        };
        self.0.insert(key, value);
    }

    /// Insert a string value.
    pub fn set_string(&mut self, key: &str, value: &str) {
        self.set(key, value);
    }

    /// Insert a signed integer value.
    pub fn set_integer(&mut self, key: &str, value: i32) {
        self.set(key, value);
    }

    /// Insert an unsigned integer value.
    pub fn set_unsigned(&mut self, key: &str, value: u32) {
        self.set(key, value);
    }

    /// Insert a boolean value.
    pub fn set_boolean(&mut self, key: &str, value: bool) {
        self.set(key, value);
    }

    /// Look up the raw value for `key`.
    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.lookup(key)
    }

    /// Look up a string value. Returns `None` if the key is missing or the
    /// stored value is not a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.lookup(key) {
            Some(PropertyValue::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Look up a signed integer value.
    pub fn get_integer(&self, key: &str) -> Option<i32> {
        match self.lookup(key) {
            Some(PropertyValue::Integer(i)) => Some(*i),
            _ => None,
        }
    }

    /// Look up an unsigned integer value.
    pub fn get_unsigned(&self, key: &str) -> Option<u32> {
        match self.lookup(key) {
            Some(PropertyValue::Unsigned(u)) => Some(*u),
            _ => None,
        }
    }

    /// Look up a boolean value.
    pub fn get_boolean(&self, key: &str) -> Option<bool> {
        match self.lookup(key) {
            Some(PropertyValue::Boolean(b)) => Some(*b),
            _ => None,
        }
    }

    /// Return the type of the value stored under `key`.
    pub fn value_type(&self, key: &str) -> Option<PropertyType> {
        self.lookup(key).map(PropertyValue::value_type)
    }

    /// Iterate over all keys in sorted order.
    ///
    /// The order is by key, not by insertion, so two lists with the same
    /// entries always log and serialize identically.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Iterate over all entries in sorted key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the list has no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<PropertyValue>> FromIterator<(K, V)> for PropertyList {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut list = Self::new();
        for (key, value) in iter {
            list.set(key.as_ref(), value);
        }
        list
    }
}

impl<'de> Deserialize<'de> for PropertyList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, PropertyValue>::deserialize(deserializer)?;
        Ok(raw.into_iter().collect())
    }
}

/// Parse a decimal signed integer. Surrounding whitespace is ignored.
///
/// The whole string must be a number: trailing garbage such as `"12abc"`,
/// an out-of-range value or an empty string yields `None` rather than a
/// partial or zero result.
pub fn parse_integer(value: &str) -> Option<i32> {
    value.trim().parse().ok()
}

/// Parse a decimal unsigned integer. Surrounding whitespace is ignored.
///
/// Strict in the same way as [`parse_integer`]; negative input is `None`.
pub fn parse_unsigned(value: &str) -> Option<u32> {
    value.trim().parse().ok()
}

/// Parse a boolean the way property files spell it.
///
/// Values starting with `TRUE`, `true`, `True` or `1` are true; everything
/// else is false.
pub fn parse_boolean(value: &str) -> bool {
    ["TRUE", "true", "True", "1"]
        .iter()
        .any(|prefix| value.starts_with(prefix))
}

/// The part of `key` that survives truncation to [`MAX_KEY_LENGTH`].
fn key_prefix(key: &str) -> &str {
    key.char_indices()
        .nth(MAX_KEY_LENGTH)
        .and_then(|(idx, _)| key.get(..idx))
        .unwrap_or(key)
}

/// Truncate `s` to at most `max` characters without splitting a code point.
fn truncate_chars(mut s: String, max: usize) -> String {
    if let Some((idx, _)) = s.char_indices().nth(max) {
        s.truncate(idx);
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_getters_only_match_stored_type() {
        let mut list = PropertyList::new();
        list.set_string("audio", "/usr/share/sounds/beep.wav");
        list.set_integer("offset", -3);
        list.set_unsigned("volume", 80);
        list.set_boolean("repeat", true);

        assert_eq!(list.get_str("audio"), Some("/usr/share/sounds/beep.wav"));
        assert_eq!(list.get_integer("offset"), Some(-3));
        assert_eq!(list.get_unsigned("volume"), Some(80));
        assert_eq!(list.get_boolean("repeat"), Some(true));

        assert_eq!(list.get_integer("volume"), None);
        assert_eq!(list.get_str("repeat"), None);
        assert_eq!(list.get_boolean("missing"), None);
    }

    #[test]
    fn value_type_reports_stored_type() {
        let list: PropertyList = [("a", PropertyValue::from(1_u32)), ("b", PropertyValue::from(false))]
            .into_iter()
            .collect();
        assert_eq!(list.value_type("a"), Some(PropertyType::Unsigned));
        assert_eq!(list.value_type("b"), Some(PropertyType::Boolean));
        assert_eq!(list.value_type("c"), None);
    }

    #[test]
    fn setting_existing_key_replaces_value() {
        let mut list = PropertyList::new();
        list.set_string("audio", "first.wav");
        list.set_unsigned("audio", 3);
        assert_eq!(list.len(), 1);
        assert_eq!(list.get_unsigned("audio"), Some(3));
    }

    #[test]
    fn keys_and_values_are_truncated() {
        let mut list = PropertyList::new();
        let long_key = "k".repeat(40);
        let long_value = "v".repeat(600);
        list.set_string(&long_key, &long_value);

        let key: Vec<&str> = list.keys().collect();
        assert_eq!(key.first().map(|k| k.len()), Some(MAX_KEY_LENGTH));
        let stored = list.get_str(&"k".repeat(MAX_KEY_LENGTH)).unwrap_or_default();
        assert_eq!(stored.len(), MAX_VALUE_LENGTH);
    }

    #[test]
    fn over_long_lookup_key_finds_truncated_entry() {
        let mut list = PropertyList::new();
        let long_key = "k".repeat(40);
        list.set_string(&long_key, "v");
        list.set_unsigned(&"u".repeat(40), 9);

        assert_eq!(list.get_str(&long_key), Some("v"));
        assert_eq!(list.get(&long_key), Some(&PropertyValue::from("v")));
        assert_eq!(list.value_type(&long_key), Some(PropertyType::String));
        assert_eq!(list.get_unsigned(&"u".repeat(35)), Some(9));
        assert_eq!(list.get_str(&"k".repeat(31)), None);
    }

    #[test]
    fn lookup_prefix_respects_char_boundaries() {
        let mut list = PropertyList::new();
        let key = "ä".repeat(40);
        list.set_boolean(&key, true);
        assert_eq!(list.get_boolean(&key), Some(true));
        assert_eq!(key_prefix(&key).chars().count(), MAX_KEY_LENGTH);
    }

    #[test]
    fn keys_iterate_in_sorted_order() {
        let mut list = PropertyList::new();
        list.set_string("zeta", "z");
        list.set_string("alpha", "a");
        list.set_string("mid", "m");
        assert_eq!(list.keys().collect::<Vec<_>>(), vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn typescript_binding_is_a_bare_map() {
        use ts_rs::TS;

        let inline = PropertyList::inline();
        assert!(!inline.contains("entries"), "unexpected wrapper: {inline}");
        assert!(inline.contains("PropertyValue"), "missing value type: {inline}");
    }

    #[test]
    fn serialized_list_is_a_bare_object() {
        let mut list = PropertyList::new();
        list.set_boolean("repeat", true);
        let json = serde_json::to_value(&list).unwrap_or_default();
        assert!(json.get("entries").is_none());
        assert_eq!(json["repeat"]["value"], true);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let truncated = truncate_chars("ääää".to_owned(), 2);
        assert_eq!(truncated, "ää");
    }

    #[test]
    fn deserialization_applies_limits() {
        let mut raw = serde_json::Map::new();
        raw.insert(
            "x".repeat(50),
            serde_json::json!({"type": "string", "value": "ok"}),
        );
        raw.insert(
            "volume".to_owned(),
            serde_json::json!({"type": "unsigned", "value": 5}),
        );
        let json = serde_json::Value::Object(raw);
        let list: PropertyList = serde_json::from_value(json).unwrap_or_default();
        assert_eq!(list.len(), 2);
        assert_eq!(list.get_str(&"x".repeat(MAX_KEY_LENGTH)), Some("ok"));
        assert_eq!(list.get_unsigned("volume"), Some(5));
    }

    #[test]
    fn serialized_values_carry_type_tag() {
        let mut list = PropertyList::new();
        list.set_integer("offset", 7);
        let json = serde_json::to_value(&list).unwrap_or_default();
        assert_eq!(json["offset"]["type"], "integer");
        assert_eq!(json["offset"]["value"], 7);
    }

    #[test]
    fn parse_helpers() {
        assert_eq!(parse_integer("-12"), Some(-12));
        assert_eq!(parse_integer("abc"), None);
        assert_eq!(parse_unsigned(" 42 "), Some(42));
        assert_eq!(parse_unsigned("-1"), None);
        assert_eq!(parse_integer("12abc"), None);
        assert_eq!(parse_unsigned("7 apples"), None);
        assert_eq!(parse_integer(""), None);
        assert_eq!(parse_unsigned("4294967296"), None);

        assert!(parse_boolean("TRUE"));
        assert!(parse_boolean("true"));
        assert!(parse_boolean("True"));
        assert!(parse_boolean("1"));
        assert!(!parse_boolean("false"));
        assert!(!parse_boolean("0"));
        assert!(!parse_boolean("yes"));
    }
}
