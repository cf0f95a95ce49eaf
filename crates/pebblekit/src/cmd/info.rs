use pebblekit_codec::{ConnectedWatch, Watchapp, WatchappType};
use pebblekit_provider::{Cell, Resource, ResourceSource, Table};
use serde::Serialize;
use serde_json::Value;

use crate::cmd::InfoArgs;
use crate::exit::{provider_error, CliResult, SUCCESS};
use crate::output::{print_json, schema_id, table, OutputFormat};
use crate::sim::{Loopback, SimOptions};

#[derive(Serialize)]
struct InfoOutput {
    schema_id: String,
    resource: String,
    columns: Vec<&'static str>,
    rows: Vec<Vec<Value>>,
}

pub async fn run(args: InfoArgs, format: OutputFormat) -> CliResult<i32> {
    let resource =
        Resource::parse(&args.path).map_err(|err| provider_error("query failed", err))?;

    let active_app = args.active_app.map(|id| Watchapp {
        id,
        name: args.app_name.clone(),
        app_type: WatchappType::Watchapp,
    });
    let loopback = Loopback::start(&SimOptions {
        watches: args.connected.clone(),
        install_mediator: true,
        active_app,
    })
    .await?;

    let projection: Option<Vec<&str>> = args
        .columns
        .as_ref()
        .map(|columns| columns.iter().map(String::as_str).collect());
    let result = loopback
        .provider()
        .fetch(&resource, projection.as_deref())
        .await;

    let out = InfoOutput {
        schema_id: schema_id("provider-query"),
        resource: resource.path(),
        columns: result.columns.clone(),
        rows: json_rows(&result),
    };
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => {
            let mut rendered = table(out.columns.iter().copied());
            for row in &result.rows {
                rendered.add_row(row.iter().map(Cell::to_string).collect::<Vec<_>>());
            }
            println!("{rendered}");
        }
        OutputFormat::Pretty
            if resource == Resource::ConnectedWatches && args.columns.is_none() =>
        {
            let watches = result.to_connected_watches();
            println!("{} ({} watches):", out.resource, watches.len());
            for watch in &watches {
                println!("  {}", watch_summary(watch));
            }
        }
        OutputFormat::Pretty => {
            println!("{} ({} rows):", out.resource, result.rows.len());
            for row in &result.rows {
                for (column, cell) in out.columns.iter().zip(row) {
                    println!("  {column:<24} {cell}");
                }
                println!();
            }
        }
    }

    Ok(SUCCESS)
}

fn watch_summary(watch: &ConnectedWatch) -> String {
    format!(
        "{:<16} {} ({}, firmware {})",
        watch.id.to_string(),
        watch.name,
        watch.platform,
        watch.firmware_version()
    )
}

fn json_rows(table: &Table) -> Vec<Vec<Value>> {
    table
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|cell| match cell {
                    Cell::Text(text) => Value::from(text.as_str()),
                    Cell::Integer(value) => Value::from(*value),
                    Cell::Null => Value::Null,
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cells_map_to_json_scalars() {
        let table = Table {
            columns: vec!["ID", "FIRMWARE_VERSION_MAJOR", "FIRMWARE_VERSION_TAG"],
            rows: vec![vec![
                Cell::Text("watch-1".into()),
                Cell::Integer(4),
                Cell::Null,
            ]],
        };
        assert_eq!(
            json_rows(&table),
            vec![vec![Value::from("watch-1"), Value::from(4), Value::Null]]
        );
    }

    #[test]
    fn watch_summary_includes_firmware_version() {
        let watch = ConnectedWatch {
            id: "watch-1".into(),
            name: "Pebble Time".into(),
            platform: "basalt".into(),
            revision: "snowy_dvt".into(),
            firmware_major: 4,
            firmware_minor: 4,
            firmware_patch: 2,
            firmware_tag: Some("beta3".into()),
        };
        let summary = watch_summary(&watch);
        assert!(summary.starts_with("watch-1"));
        assert!(summary.ends_with("Pebble Time (basalt, firmware 4.4.2-beta3)"));
    }
}
