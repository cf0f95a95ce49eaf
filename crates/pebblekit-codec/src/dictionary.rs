//! Typed dictionary codec.
//!
//! A [`Dictionary`] maps unsigned 32-bit keys to typed items. On the wire each
//! entry becomes two bundle fields: `{key}_TYPE` holding the type tag and
//! `{key}_VALUE` holding the payload. Every integer variant travels as a
//! 64-bit signed value and is narrowed back on decode.

use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;
use pebblekit_transport::{Bundle, BundleValue};
use tracing::warn;

use crate::error::{CodecError, Result};

/// Fixed size of the dictionary header on the watch side.
pub const DICTIONARY_HEADER_SIZE: usize = 1;

/// Per-tuple overhead: 4-byte key, 1-byte type, 2-byte length.
pub const TUPLE_HEADER_SIZE: usize = 7;

const TYPE_SUFFIX: &str = "_TYPE";
const VALUE_SUFFIX: &str = "_VALUE";

/// Ordered key -> item map. Keys are unique and iterate in ascending order.
pub type Dictionary = BTreeMap<u32, DictionaryItem>;

/// Type tag of a [`DictionaryItem`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemType {
    ByteArray,
    String,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
}

impl ItemType {
    pub const fn as_str(self) -> &'static str {
        match self {
            ItemType::ByteArray => "ByteArray",
            ItemType::String => "String",
            ItemType::Int8 => "Int8",
            ItemType::UInt8 => "UInt8",
            ItemType::Int16 => "Int16",
            ItemType::UInt16 => "UInt16",
            ItemType::Int32 => "Int32",
            ItemType::UInt32 => "UInt32",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "ByteArray" => ItemType::ByteArray,
            "String" => ItemType::String,
            "Int8" => ItemType::Int8,
            "UInt8" => ItemType::UInt8,
            "Int16" => ItemType::Int16,
            "UInt16" => ItemType::UInt16,
            "Int32" => ItemType::Int32,
            "UInt32" => ItemType::UInt32,
            _ => return None,
        })
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single typed dictionary value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DictionaryItem {
    Bytes(Bytes),
    Text(String),
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
}

impl DictionaryItem {
    pub fn item_type(&self) -> ItemType {
        match self {
            DictionaryItem::Bytes(_) => ItemType::ByteArray,
            DictionaryItem::Text(_) => ItemType::String,
            DictionaryItem::Int8(_) => ItemType::Int8,
            DictionaryItem::UInt8(_) => ItemType::UInt8,
            DictionaryItem::Int16(_) => ItemType::Int16,
            DictionaryItem::UInt16(_) => ItemType::UInt16,
            DictionaryItem::Int32(_) => ItemType::Int32,
            DictionaryItem::UInt32(_) => ItemType::UInt32,
        }
    }

    /// Serialized payload size on the watch side.
    ///
    /// Text counts its UTF-8 bytes.
    pub fn size(&self) -> usize {
        match self {
            DictionaryItem::Bytes(bytes) => bytes.len(),
            DictionaryItem::Text(text) => text.len(),
            DictionaryItem::Int8(_) | DictionaryItem::UInt8(_) => 1,
            DictionaryItem::Int16(_) | DictionaryItem::UInt16(_) => 2,
            DictionaryItem::Int32(_) | DictionaryItem::UInt32(_) => 4,
        }
    }

    fn to_wire(&self) -> BundleValue {
        match self {
            DictionaryItem::Bytes(bytes) => BundleValue::Bytes(bytes.clone()),
            DictionaryItem::Text(text) => BundleValue::Text(text.clone()),
            DictionaryItem::Int8(v) => BundleValue::Long(i64::from(*v)),
            DictionaryItem::UInt8(v) => BundleValue::Long(i64::from(*v)),
            DictionaryItem::Int16(v) => BundleValue::Long(i64::from(*v)),
            DictionaryItem::UInt16(v) => BundleValue::Long(i64::from(*v)),
            DictionaryItem::Int32(v) => BundleValue::Long(i64::from(*v)),
            DictionaryItem::UInt32(v) => BundleValue::Long(i64::from(*v)),
        }
    }

    // Integers narrow with two's-complement wrap, matching the watch side.
    fn from_wire(key: u32, item_type: ItemType, value: Option<&BundleValue>) -> Result<Self> {
        let missing = || CodecError::MissingValue(key);
        let item = match (item_type, value) {
            (ItemType::ByteArray, Some(BundleValue::Bytes(b))) => DictionaryItem::Bytes(b.clone()),
            (ItemType::String, Some(BundleValue::Text(s))) => DictionaryItem::Text(s.clone()),
            (ItemType::Int8, Some(BundleValue::Long(v))) => DictionaryItem::Int8(*v as i8),
            (ItemType::UInt8, Some(BundleValue::Long(v))) => DictionaryItem::UInt8(*v as u8),
            (ItemType::Int16, Some(BundleValue::Long(v))) => DictionaryItem::Int16(*v as i16),
            (ItemType::UInt16, Some(BundleValue::Long(v))) => DictionaryItem::UInt16(*v as u16),
            (ItemType::Int32, Some(BundleValue::Long(v))) => DictionaryItem::Int32(*v as i32),
            (ItemType::UInt32, Some(BundleValue::Long(v))) => DictionaryItem::UInt32(*v as u32),
            _ => return Err(missing()),
        };
        Ok(item)
    }
}

impl fmt::Display for DictionaryItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DictionaryItem::Bytes(bytes) => {
                for b in bytes.iter() {
                    write!(f, "{b:02x}")?;
                }
                Ok(())
            }
            DictionaryItem::Text(text) => f.write_str(text),
            DictionaryItem::Int8(v) => write!(f, "{v}"),
            DictionaryItem::UInt8(v) => write!(f, "{v}"),
            DictionaryItem::Int16(v) => write!(f, "{v}"),
            DictionaryItem::UInt16(v) => write!(f, "{v}"),
            DictionaryItem::Int32(v) => write!(f, "{v}"),
            DictionaryItem::UInt32(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for DictionaryItem {
    fn from(value: &str) -> Self {
        DictionaryItem::Text(value.to_string())
    }
}

impl From<String> for DictionaryItem {
    fn from(value: String) -> Self {
        DictionaryItem::Text(value)
    }
}

impl From<Bytes> for DictionaryItem {
    fn from(value: Bytes) -> Self {
        DictionaryItem::Bytes(value)
    }
}

impl From<Vec<u8>> for DictionaryItem {
    fn from(value: Vec<u8>) -> Self {
        DictionaryItem::Bytes(Bytes::from(value))
    }
}

macro_rules! item_from_int {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for DictionaryItem {
            fn from(value: $ty) -> Self {
                DictionaryItem::$variant(value)
            }
        })*
    };
}

item_from_int! {
    i8 => Int8,
    u8 => UInt8,
    i16 => Int16,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
}

/// Encode a dictionary into its bundle form.
pub fn encode_dictionary(dictionary: &Dictionary) -> Bundle {
    let mut bundle = Bundle::new();
    for (key, item) in dictionary {
        bundle.put_string(
            format!("{key}{TYPE_SUFFIX}"),
            item.item_type().as_str(),
        );
        bundle.insert(format!("{key}{VALUE_SUFFIX}"), item.to_wire());
    }
    bundle
}

/// Decode a bundle back into a dictionary.
///
/// Entries that cannot be decoded are skipped with a warning; the rest of
/// the dictionary is still returned.
pub fn decode_dictionary(bundle: &Bundle) -> Dictionary {
    let mut dictionary = Dictionary::new();
    for field in bundle.keys() {
        let Some(prefix) = field.strip_suffix(TYPE_SUFFIX) else {
            continue;
        };
        match decode_entry(bundle, field, prefix) {
            Ok((key, item)) => {
                dictionary.insert(key, item);
            }
            Err(err) => warn!(field = %field, error = %err, "skipping dictionary entry"),
        }
    }
    dictionary
}

fn decode_entry(bundle: &Bundle, type_field: &str, prefix: &str) -> Result<(u32, DictionaryItem)> {
    let key: u32 = prefix
        .parse()
        .map_err(|_| CodecError::InvalidKey(prefix.to_string()))?;
    let tag = bundle.get_string(type_field).ok_or(CodecError::UnknownType {
        key,
        tag: "<missing>".to_string(),
    })?;
    let item_type = ItemType::from_tag(tag).ok_or_else(|| CodecError::UnknownType {
        key,
        tag: tag.to_string(),
    })?;
    let value = bundle.get(&format!("{prefix}{VALUE_SUFFIX}"));
    Ok((key, DictionaryItem::from_wire(key, item_type, value)?))
}

/// Total serialized size of a dictionary on the watch side.
pub fn dictionary_size(dictionary: &Dictionary) -> usize {
    DICTIONARY_HEADER_SIZE
        + dictionary
            .values()
            .map(|item| TUPLE_HEADER_SIZE + item.size())
            .sum::<usize>()
}

/// Check a dictionary against a watch-side buffer size.
///
/// Returns the serialized size when it fits.
pub fn check_fits(dictionary: &Dictionary, buffer_len: usize) -> Result<usize> {
    let size = dictionary_size(dictionary);
    if size > buffer_len {
        return Err(CodecError::TooLarge {
            size,
            max: buffer_len,
        });
    }
    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dictionary {
        Dictionary::from([
            (0, DictionaryItem::from("hello")),
            (1, DictionaryItem::Int8(-5)),
            (2, DictionaryItem::UInt8(250)),
            (3, DictionaryItem::Int16(-1234)),
            (4, DictionaryItem::UInt16(65_000)),
            (5, DictionaryItem::Int32(i32::MIN)),
            (6, DictionaryItem::UInt32(u32::MAX)),
            (7, DictionaryItem::from(vec![0xde, 0xad, 0xbe, 0xef])),
            (u32::MAX, DictionaryItem::from("")),
        ])
    }

    #[test]
    fn decode_inverts_encode() {
        let dictionary = sample();
        let bundle = encode_dictionary(&dictionary);
        assert_eq!(decode_dictionary(&bundle), dictionary);
    }

    #[test]
    fn wire_fields_use_tag_and_long() {
        let dictionary = Dictionary::from([(7, DictionaryItem::UInt32(u32::MAX))]);
        let bundle = encode_dictionary(&dictionary);
        assert_eq!(bundle.get_string("7_TYPE"), Some("UInt32"));
        assert_eq!(bundle.get_long("7_VALUE"), Some(4_294_967_295));
        assert_eq!(bundle.len(), 2);
    }

    #[test]
    fn empty_dictionary_is_empty_bundle() {
        let bundle = encode_dictionary(&Dictionary::new());
        assert!(bundle.is_empty());
        assert!(decode_dictionary(&bundle).is_empty());
    }

    #[test]
    fn narrowing_wraps_out_of_range_values() {
        let mut bundle = Bundle::new();
        bundle.put_string("1_TYPE", "Int8");
        bundle.put_long("1_VALUE", 200);
        bundle.put_string("2_TYPE", "UInt16");
        bundle.put_long("2_VALUE", -1);
        let dictionary = decode_dictionary(&bundle);
        assert_eq!(dictionary[&1], DictionaryItem::Int8(-56));
        assert_eq!(dictionary[&2], DictionaryItem::UInt16(u16::MAX));
    }

    #[test]
    fn bad_entries_are_skipped() {
        let mut bundle = encode_dictionary(&Dictionary::from([(1, DictionaryItem::from("ok"))]));
        bundle.put_string("2_TYPE", "Float64");
        bundle.put_long("2_VALUE", 3);
        bundle.put_string("3_TYPE", "Int32");
        bundle.put_string("3_VALUE", "not a number");
        bundle.put_string("4_TYPE", "UInt8");
        bundle.put_string("abc_TYPE", "UInt8");
        bundle.put_long("abc_VALUE", 1);
        bundle.put_string("-1_TYPE", "UInt8");
        bundle.put_long("-1_VALUE", 1);

        let dictionary = decode_dictionary(&bundle);
        assert_eq!(dictionary, Dictionary::from([(1, DictionaryItem::from("ok"))]));
    }

    #[test]
    fn item_sizes() {
        assert_eq!(DictionaryItem::from("abc").size(), 3);
        assert_eq!(DictionaryItem::from("").size(), 0);
        assert_eq!(DictionaryItem::from("é").size(), 2);
        assert_eq!(DictionaryItem::from(vec![1u8, 2, 3]).size(), 3);
        assert_eq!(DictionaryItem::UInt8(1).size(), 1);
        assert_eq!(DictionaryItem::Int16(1).size(), 2);
        assert_eq!(DictionaryItem::UInt32(1).size(), 4);
    }

    #[test]
    fn dictionary_size_counts_headers() {
        assert_eq!(dictionary_size(&Dictionary::new()), 1);
        let dictionary = Dictionary::from([
            (1, DictionaryItem::from("abc")),
            (2, DictionaryItem::Int32(7)),
        ]);
        assert_eq!(dictionary_size(&dictionary), 1 + (7 + 3) + (7 + 4));
    }

    #[test]
    fn text_fits_exactly_at_its_utf8_length() {
        let dictionary = Dictionary::from([(1, DictionaryItem::from("hi"))]);
        assert_eq!(DictionaryItem::from("hi").size(), 2);
        assert_eq!(dictionary_size(&dictionary), 10);
        assert_eq!(check_fits(&dictionary, 10), Ok(10));
        assert!(check_fits(&dictionary, 9).is_err());
    }

    #[test]
    fn check_fits_rejects_oversize() {
        let dictionary = Dictionary::from([(1, DictionaryItem::from(vec![0u8; 100]))]);
        assert_eq!(check_fits(&dictionary, 108), Ok(108));
        assert_eq!(
            check_fits(&dictionary, 107),
            Err(CodecError::TooLarge { size: 108, max: 107 })
        );
    }

    #[test]
    fn display_renders_bytes_as_hex() {
        assert_eq!(DictionaryItem::from(vec![0x0a, 0xff]).to_string(), "0aff");
        assert_eq!(DictionaryItem::Int8(-3).to_string(), "-3");
    }
}
