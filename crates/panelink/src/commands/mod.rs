//! Command dispatch and the client wiring shared by all commands.

mod get;
mod send;
mod watch;

use url::Url;

use panelink_api::ApiClient;
use panelink_config::{Config, config_path};
use panelink_core::CachedClient;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

pub async fn dispatch(cmd: Command, config: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Get(args) => get::handle(args, config, global).await,
        Command::Send(args) => send::handle(args, config, global).await,
        Command::Watch(args) => watch::handle(args, config, global).await,
    }
}

/// Panel origin, with a dedicated error when none is configured.
fn origin(config: &Config, global: &GlobalOpts) -> Result<Url, CliError> {
    if config.server.origin.is_none() {
        return Err(CliError::NoOrigin {
            path: global
                .config
                .clone()
                .unwrap_or_else(config_path)
                .display()
                .to_string(),
        });
    }
    Ok(config.origin()?)
}

fn cached_client(config: &Config, global: &GlobalOpts) -> Result<CachedClient, CliError> {
    let origin = origin(config, global)?;
    let credential = config.credential()?;
    let api = ApiClient::new(origin, credential.as_ref(), &config.transport_config())?;
    Ok(CachedClient::new(api, config.cache_policy()))
}
