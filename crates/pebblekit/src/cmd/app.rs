use std::collections::BTreeMap;

use pebblekit_codec::WatchIdentifier;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::cmd::{start_sim, AppAction, AppArgs};
use crate::exit::{CliError, CliResult, FAILURE, SUCCESS};
use crate::output::{print_json, print_results, results_map, schema_id, OutputFormat};

#[derive(Serialize)]
struct AppOutput {
    schema_id: String,
    action: &'static str,
    watchapp: Uuid,
    results: BTreeMap<String, String>,
}

pub async fn run(args: AppArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.timeouts.peer_config()?;
    let loopback = start_sim(&args.sim).await?;
    let sender = loopback.sender(config);

    let watches = args
        .watches
        .map(|ids| ids.into_iter().map(WatchIdentifier::from).collect());
    let (action, results) = match args.action {
        AppAction::Start => ("start", sender.start_app(args.uuid, watches).await),
        AppAction::Stop => ("stop", sender.stop_app(args.uuid, watches).await),
    };
    sender.close();
    let results = results.ok_or_else(|| CliError::unreachable("mediator app"))?;
    info!(action, watchapp = %args.uuid, watches = results.len(), "app control completed");

    let all_succeeded = results.values().all(|result| result.is_success());
    let out = AppOutput {
        schema_id: schema_id("app-control"),
        action,
        watchapp: args.uuid,
        results: results_map(&results),
    };
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => print_results(action, &out.results, false),
        OutputFormat::Pretty => {
            let title = format!("{} {}", action, out.watchapp);
            print_results(&title, &out.results, true);
        }
    }

    Ok(if all_succeeded { SUCCESS } else { FAILURE })
}
