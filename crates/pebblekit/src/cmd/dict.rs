use bytes::Bytes;
use pebblekit_codec::{check_fits, dictionary_size, encode_dictionary, Dictionary, DictionaryItem};
use pebblekit_transport::Bundle;
use serde::Serialize;

use crate::cmd::DictArgs;
use crate::exit::{codec_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{bundle_value_text, print_json, schema_id, table, OutputFormat};

#[derive(Serialize)]
struct EntryOutput {
    key: u32,
    #[serde(rename = "type")]
    item_type: &'static str,
    value: String,
    size: usize,
}

#[derive(Serialize)]
struct DictOutput {
    schema_id: String,
    entries: Vec<EntryOutput>,
    fields: Bundle,
    size: usize,
    max_size: Option<usize>,
}

pub fn run(args: DictArgs, format: OutputFormat) -> CliResult<i32> {
    let dictionary = parse_entries(&args.entries)?;
    let size = match args.max_size {
        Some(max) => check_fits(&dictionary, max)
            .map_err(|err| codec_error("dictionary does not fit", err))?,
        None => dictionary_size(&dictionary),
    };

    let out = DictOutput {
        schema_id: schema_id("dictionary"),
        entries: dictionary
            .iter()
            .map(|(key, item)| EntryOutput {
                key: *key,
                item_type: item.item_type().as_str(),
                value: item.to_string(),
                size: item.size(),
            })
            .collect(),
        fields: encode_dictionary(&dictionary),
        size,
        max_size: args.max_size,
    };

    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => {
            let mut entries = table(["Key", "Type", "Value", "Bytes"]);
            for entry in &out.entries {
                entries.add_row(vec![
                    entry.key.to_string(),
                    entry.item_type.to_string(),
                    entry.value.clone(),
                    entry.size.to_string(),
                ]);
            }
            println!("{entries}");
            println!("Wire size: {} bytes", out.size);
        }
        OutputFormat::Pretty => {
            println!("Dictionary ({} entries, {} bytes):", out.entries.len(), out.size);
            for (field, value) in out.fields.iter() {
                println!("  {field:<16} {}", bundle_value_text(value));
            }
        }
    }

    Ok(SUCCESS)
}

/// Parse repeated `KEY=TYPE:VALUE` arguments into a dictionary.
///
/// Types: `text`, `bytes` (hex), `i8`, `u8`, `i16`, `u16`, `i32`, `u32`.
pub fn parse_entries(entries: &[String]) -> CliResult<Dictionary> {
    let mut dictionary = Dictionary::new();
    for entry in entries {
        let (key, item) = parse_entry(entry)?;
        if dictionary.insert(key, item).is_some() {
            return Err(CliError::new(USAGE, format!("duplicate dictionary key {key}")));
        }
    }
    Ok(dictionary)
}

fn parse_entry(entry: &str) -> CliResult<(u32, DictionaryItem)> {
    let invalid = |reason: &str| CliError::new(USAGE, format!("invalid entry '{entry}': {reason}"));

    let (key, typed) = entry
        .split_once('=')
        .ok_or_else(|| invalid("expected KEY=TYPE:VALUE"))?;
    let key: u32 = key
        .trim()
        .parse()
        .map_err(|_| invalid("key must be an unsigned 32-bit integer"))?;
    let (kind, value) = typed
        .split_once(':')
        .ok_or_else(|| invalid("expected TYPE:VALUE"))?;

    let out_of_range = || invalid(&format!("value out of range for {kind}"));
    let item = match kind {
        "text" => DictionaryItem::Text(value.to_string()),
        "bytes" => DictionaryItem::Bytes(parse_hex(value).ok_or_else(|| invalid("bad hex"))?),
        "i8" => DictionaryItem::Int8(value.parse().map_err(|_| out_of_range())?),
        "u8" => DictionaryItem::UInt8(value.parse().map_err(|_| out_of_range())?),
        "i16" => DictionaryItem::Int16(value.parse().map_err(|_| out_of_range())?),
        "u16" => DictionaryItem::UInt16(value.parse().map_err(|_| out_of_range())?),
        "i32" => DictionaryItem::Int32(value.parse().map_err(|_| out_of_range())?),
        "u32" => DictionaryItem::UInt32(value.parse().map_err(|_| out_of_range())?),
        other => return Err(invalid(&format!("unknown type '{other}'"))),
    };
    Ok((key, item))
}

fn parse_hex(input: &str) -> Option<Bytes> {
    let input = input.strip_prefix("0x").unwrap_or(input);
    if input.len() % 2 != 0 {
        return None;
    }
    (0..input.len())
        .step_by(2)
        .map(|i| input.get(i..i + 2).and_then(|pair| u8::from_str_radix(pair, 16).ok()))
        .collect::<Option<Vec<u8>>>()
        .map(Bytes::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_every_item_type() {
        let dictionary = parse_entries(&entries(&[
            "0=text:hello",
            "1=bytes:0x01ff",
            "2=i8:-5",
            "3=u8:255",
            "4=i16:-300",
            "5=u16:65535",
            "6=i32:-70000",
            "7=u32:4000000000",
        ]))
        .expect("entries should parse");

        assert_eq!(dictionary[&0], DictionaryItem::from("hello"));
        assert_eq!(dictionary[&1], DictionaryItem::from(vec![0x01, 0xff]));
        assert_eq!(dictionary[&2], DictionaryItem::Int8(-5));
        assert_eq!(dictionary[&7], DictionaryItem::UInt32(4_000_000_000));
    }

    #[test]
    fn text_values_may_contain_separators() {
        let dictionary =
            parse_entries(&entries(&["9=text:a=b:c"])).expect("entry should parse");
        assert_eq!(dictionary[&9], DictionaryItem::from("a=b:c"));
    }

    #[test]
    fn rejects_bad_entries_as_usage_errors() {
        for bad in [
            "nokey",
            "x=text:a",
            "1=float:1.0",
            "1=u8:256",
            "1=i8:-129",
            "1=bytes:abc",
            "1=bytes:zz",
            "1text",
        ] {
            let err = parse_entries(&entries(&[bad])).expect_err("entry should be rejected");
            assert_eq!(err.code, USAGE, "{bad}");
        }
    }

    #[test]
    fn rejects_duplicate_keys() {
        let err = parse_entries(&entries(&["1=u8:1", "1=u8:2"]))
            .expect_err("duplicate should be rejected");
        assert_eq!(err.code, USAGE);
    }
}
