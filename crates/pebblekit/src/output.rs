use std::collections::BTreeMap;
use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use pebblekit_codec::{ReceiveResult, TransmissionResults};
use pebblekit_transport::BundleValue;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

pub fn schema_id(name: &str) -> String {
    format!("https://schemas.3leaps.dev/pebblekit/cli/v1/{name}.schema.json")
}

pub fn print_json<T: Serialize>(out: &T) {
    println!(
        "{}",
        serde_json::to_string(out).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn table<I, S>(header: I) -> Table
where
    I: IntoIterator<Item = S>,
    S: Into<comfy_table::Cell>,
{
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

/// Per-watch outcomes keyed by watch id, as printed in JSON output.
pub fn results_map(results: &TransmissionResults) -> BTreeMap<String, String> {
    results
        .iter()
        .map(|(watch, result)| (watch.to_string(), result.to_string()))
        .collect()
}

/// Human-readable rendering of per-watch outcomes.
pub fn print_results(title: &str, results: &BTreeMap<String, String>, pretty: bool) {
    if pretty {
        println!("{title}:");
        for (watch, result) in results {
            println!("  {watch:<16} {result}");
        }
        return;
    }
    let mut out = table(["Watch", "Result"]);
    for (watch, result) in results {
        out.add_row(vec![watch.as_str(), result.as_str()]);
    }
    println!("{out}");
}

pub fn receive_text(result: Option<&ReceiveResult>) -> String {
    match result {
        Some(result) => result.to_string(),
        None => "UNREACHABLE".to_string(),
    }
}

pub fn bundle_value_text(value: &BundleValue) -> String {
    match value {
        BundleValue::Text(text) => format!("{text:?}"),
        BundleValue::Long(v) => v.to_string(),
        BundleValue::Bytes(bytes) => {
            let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
            format!("0x{hex}")
        }
        BundleValue::TextArray(items) => format!("{items:?}"),
        BundleValue::Bundle(bundle) => format!("<bundle, {} fields>", bundle.len()),
    }
}
