use std::collections::btree_map;
use std::collections::BTreeMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TransportError};

/// A single value stored in a [`Bundle`].
///
/// Integers always travel as a 64-bit signed `Long`; narrower types are
/// reconstructed by the codec layer from an accompanying type tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BundleValue {
    Text(String),
    Long(i64),
    Bytes(Bytes),
    TextArray(Vec<String>),
    Bundle(Bundle),
}

/// Flat, string-keyed transport structure exchanged across the process boundary.
///
/// Keys are kept ordered so the serialized form is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Bundle {
    entries: BTreeMap<String, BundleValue>,
}

impl Bundle {
    /// Create an empty bundle.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Iterate over all keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, BundleValue> {
        self.entries.iter()
    }

    /// Insert a raw value, replacing any previous value under `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: BundleValue) -> Option<BundleValue> {
        self.entries.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<BundleValue> {
        self.entries.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&BundleValue> {
        self.entries.get(key)
    }

    pub fn put_string(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.insert(key, BundleValue::Text(value.into()));
    }

    pub fn put_long(&mut self, key: impl Into<String>, value: i64) {
        self.insert(key, BundleValue::Long(value));
    }

    pub fn put_bytes(&mut self, key: impl Into<String>, value: impl Into<Bytes>) {
        self.insert(key, BundleValue::Bytes(value.into()));
    }

    pub fn put_string_array(&mut self, key: impl Into<String>, value: Vec<String>) {
        self.insert(key, BundleValue::TextArray(value));
    }

    pub fn put_bundle(&mut self, key: impl Into<String>, value: Bundle) {
        self.insert(key, BundleValue::Bundle(value));
    }

    /// Builder-style [`put_string`](Self::put_string).
    pub fn with_string(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.put_string(key, value);
        self
    }

    /// Builder-style [`put_bundle`](Self::put_bundle).
    pub fn with_bundle(mut self, key: impl Into<String>, value: Bundle) -> Self {
        self.put_bundle(key, value);
        self
    }

    /// Text value under `key`, or `None` if absent or of another type.
    pub fn get_string(&self, key: &str) -> Option<&str> {
        match self.entries.get(key) {
            Some(BundleValue::Text(value)) => Some(value),
            _ => None,
        }
    }

    pub fn get_long(&self, key: &str) -> Option<i64> {
        match self.entries.get(key) {
            Some(BundleValue::Long(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn get_bytes(&self, key: &str) -> Option<&Bytes> {
        match self.entries.get(key) {
            Some(BundleValue::Bytes(value)) => Some(value),
            _ => None,
        }
    }

    pub fn get_string_array(&self, key: &str) -> Option<&[String]> {
        match self.entries.get(key) {
            Some(BundleValue::TextArray(value)) => Some(value),
            _ => None,
        }
    }

    pub fn get_bundle(&self, key: &str) -> Option<&Bundle> {
        match self.entries.get(key) {
            Some(BundleValue::Bundle(value)) => Some(value),
            _ => None,
        }
    }
}

impl FromIterator<(String, BundleValue)> for Bundle {
    fn from_iter<I: IntoIterator<Item = (String, BundleValue)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Bundle {
    type Item = (&'a String, &'a BundleValue);
    type IntoIter = btree_map::Iter<'a, String, BundleValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Serialize a bundle into the byte payload carried by a remote invocation.
pub fn encode_payload(bundle: &Bundle) -> Result<Bytes> {
    serde_json::to_vec(bundle)
        .map(Bytes::from)
        .map_err(TransportError::Payload)
}

/// Deserialize a byte payload back into a bundle.
pub fn decode_payload(payload: &[u8]) -> Result<Bundle> {
    serde_json::from_slice(payload).map_err(TransportError::Payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_getters_reject_other_types() {
        let mut bundle = Bundle::new();
        bundle.put_string("name", "pebble");
        bundle.put_long("count", 3);

        assert_eq!(bundle.get_string("name"), Some("pebble"));
        assert_eq!(bundle.get_long("name"), None);
        assert_eq!(bundle.get_string("count"), None);
        assert_eq!(bundle.get_long("count"), Some(3));
        assert!(bundle.get_bundle("missing").is_none());
    }

    #[test]
    fn payload_survives_the_process_boundary() {
        let mut inner = Bundle::new();
        inner.put_bytes("blob", vec![0u8, 1, 255]);
        inner.put_long("negative", -42);

        let mut outer = Bundle::new();
        outer.put_string("ACTION", "SEND_DATA_TO_WATCH");
        outer.put_string_array("WATCHES_ID", vec!["a".into(), "b".into()]);
        outer.put_bundle("DATA_DICTIONARY", inner);

        let payload = encode_payload(&outer).unwrap();
        let decoded = decode_payload(&payload).unwrap();

        assert_eq!(decoded, outer);
        assert_eq!(
            decoded
                .get_bundle("DATA_DICTIONARY")
                .and_then(|b| b.get_bytes("blob"))
                .map(|b| b.as_ref()),
            Some(&[0u8, 1, 255][..])
        );
    }

    #[test]
    fn keys_are_sorted() {
        let mut bundle = Bundle::new();
        bundle.put_long("b", 1);
        bundle.put_long("a", 2);
        bundle.put_long("c", 3);

        let keys: Vec<&str> = bundle.keys().collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn decode_rejects_garbage() {
        let result = decode_payload(b"not a bundle");
        assert!(matches!(result, Err(TransportError::Payload(_))));
    }
}
