//! `panelink send`: mutating requests. A success invalidates the cached
//! region of the touched resource.

use panelink_api::{ApiRequest, Method};
use panelink_config::Config;

use crate::cli::{GlobalOpts, SendArgs};
use crate::error::CliError;
use crate::output;

pub async fn handle(args: SendArgs, config: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let method = parse_method(&args.method)?;
    let mut request = ApiRequest::new(method, args.path);
    if let Some(ref raw) = args.body {
        request = request.with_body(serde_json::from_str(raw)?);
    }

    let client = super::cached_client(config, global)?;
    let response = client.execute(&request).await?;
    output::print_output(&output::render_body(global.output, &response));
    Ok(())
}

fn parse_method(raw: &str) -> Result<Method, CliError> {
    let method = match raw.to_ascii_uppercase().as_str() {
        "POST" => Method::POST,
        "PUT" => Method::PUT,
        "PATCH" => Method::PATCH,
        "DELETE" => Method::DELETE,
        _ => {
            return Err(CliError::Validation {
                field: "method".into(),
                reason: format!("expected POST, PUT, PATCH or DELETE, got '{raw}'"),
            });
        }
    };
    Ok(method)
}
