use std::collections::BTreeMap;
use std::sync::Arc;

use pebblekit_codec::{check_fits, Dictionary, TransmissionResults, WatchIdentifier};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::cmd::dict::parse_entries;
use crate::cmd::{start_sim, SendArgs};
use crate::exit::{codec_error, CliError, CliResult, FAILURE, SUCCESS};
use crate::output::{print_json, print_results, receive_text, results_map, schema_id, OutputFormat};
use crate::sim::{AckListener, Loopback};

#[derive(Serialize)]
struct SendOutput {
    schema_id: String,
    watchapp: Uuid,
    results: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    echo: Option<BTreeMap<String, String>>,
}

pub async fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let dictionary = parse_entries(&args.entries)?;
    if let Some(max) = args.max_size {
        check_fits(&dictionary, max).map_err(|err| codec_error("dictionary does not fit", err))?;
    }
    let config = args.timeouts.peer_config()?;
    let loopback = start_sim(&args.sim).await?;

    let watches = args
        .watches
        .map(|ids| ids.into_iter().map(WatchIdentifier::from).collect());
    let sender = loopback.sender(config);
    let results = sender
        .send_data_to_watch(args.uuid, dictionary.clone(), watches)
        .await;
    sender.close();
    let results = results.ok_or_else(|| CliError::unreachable("mediator app"))?;
    info!(watchapp = %args.uuid, watches = results.len(), "send completed");

    let echo = if args.echo {
        Some(echo(&loopback, config, args.uuid, &dictionary, &results).await)
    } else {
        None
    };

    let out = SendOutput {
        schema_id: schema_id("send-result"),
        watchapp: args.uuid,
        results: results_map(&results),
        echo,
    };
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table | OutputFormat::Pretty => {
            let pretty = matches!(format, OutputFormat::Pretty);
            print_results(&format!("Sent to {}", out.watchapp), &out.results, pretty);
            if let Some(echo) = &out.echo {
                print_results("Echo", echo, pretty);
            }
        }
    }

    Ok(exit_code(&results))
}

/// Replay the dictionary from every watch that accepted it into this
/// client's listener, the way the mediator would forward a watch reply.
async fn echo(
    loopback: &Loopback,
    config: pebblekit_peer::PeerConfig,
    watchapp: Uuid,
    dictionary: &Dictionary,
    results: &TransmissionResults,
) -> BTreeMap<String, String> {
    loopback.listen(Arc::new(AckListener));
    let connector = loopback.connector(config);
    let mut replies = BTreeMap::new();
    for (watch, result) in results {
        if !result.is_success() {
            continue;
        }
        let reply = connector
            .send_on_message_received(watchapp, dictionary.clone(), watch.clone())
            .await;
        replies.insert(watch.to_string(), receive_text(reply.as_ref()));
    }
    connector.close();
    replies
}

fn exit_code(results: &TransmissionResults) -> i32 {
    if results.values().all(|result| result.is_success()) {
        SUCCESS
    } else {
        FAILURE
    }
}
