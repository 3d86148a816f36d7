//! `panelink watch`: stream realtime events until Ctrl-C.

use chrono::Utc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use url::Url;

use panelink_api::message::channels;
use panelink_api::{WsTransport, resolve_endpoint};
use panelink_config::Config;
use panelink_core::{ConnectionState, RealtimeClient};

use crate::cli::{GlobalOpts, WatchArgs};
use crate::error::CliError;
use crate::output;

const ALL_CHANNELS: [&str; 4] = [
    channels::SERVER_STATUS,
    channels::TRAFFIC,
    channels::CLIENTS,
    channels::INBOUNDS,
];

pub async fn handle(args: WatchArgs, config: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let origin = super::origin(config, global)?;
    let credential = config.credential()?;
    let explicit = match args.endpoint {
        Some(ref raw) => Some(Url::parse(raw).map_err(|e| CliError::Validation {
            field: "endpoint".into(),
            reason: format!("{raw}: {e}"),
        })?),
        None => config.endpoint()?,
    };
    let endpoint = resolve_endpoint(explicit.as_ref(), &origin, credential.as_ref())?;

    let channels = pick_channels(args.channel, &config.realtime.channels);
    info!(?channels, "watching");

    let client = RealtimeClient::spawn(WsTransport::new(), endpoint, config.realtime_config()?);
    client.set_channels(channels);
    let mut messages = client.subscribe();
    let mut state = client.state();
    client.connect();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let result = loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("interrupted, disconnecting");
                break Ok(());
            }
            changed = state.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let current = *state.borrow_and_update();
                info!(state = %current, "connection state");
                if current == ConnectionState::Blocked {
                    break Err(CliError::AuthFailed {
                        message: "realtime connection rejected by the panel".into(),
                    });
                }
            }
            message = messages.recv() => match message {
                Ok(message) => {
                    output::print_output(&output::render_message(global.output, &message, Utc::now()));
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "output fell behind, messages dropped"),
                Err(RecvError::Closed) => break Ok(()),
            },
        }
    };

    client.disconnect();
    client.shutdown();
    result
}

/// CLI channels win, then configured channels, then every known channel.
fn pick_channels(from_cli: Vec<String>, from_config: &[String]) -> Vec<String> {
    if !from_cli.is_empty() {
        from_cli
    } else if !from_config.is_empty() {
        from_config.to_vec()
    } else {
        ALL_CHANNELS.iter().map(|c| (*c).to_owned()).collect()
    }
}
