//! `panelink get`: cached reads.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use panelink_config::Config;

use crate::cli::{GetArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

pub async fn handle(args: GetArgs, config: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let client = super::cached_client(config, global)?;
    let query = collect_query(args.query);

    let mut last = None;
    for round in 1..=args.repeat {
        let response = client.get(&args.path, query.clone()).await?;
        let stats = client.stats();
        debug!(
            round,
            status = response.status,
            hits = stats.hits,
            misses = stats.misses,
            size = stats.size,
            "read complete"
        );
        last = Some(response);
    }

    if let Some(response) = last {
        output::print_output(&output::render_body(global.output, &response));
    }
    Ok(())
}

/// Fold `key=value` pairs into a query map; a repeated key becomes a list.
fn collect_query(pairs: Vec<(String, Value)>) -> BTreeMap<String, Value> {
    let mut query: BTreeMap<String, Value> = BTreeMap::new();
    for (key, value) in pairs {
        match query.remove(&key) {
            None => {
                query.insert(key, value);
            }
            Some(Value::Array(mut items)) => {
                items.push(value);
                query.insert(key, Value::Array(items));
            }
            Some(previous) => {
                query.insert(key, Value::Array(vec![previous, value]));
            }
        }
    }
    query
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn repeated_keys_become_lists() {
        let query = collect_query(vec![
            ("tag".into(), json!("a")),
            ("node".into(), json!(1)),
            ("tag".into(), json!("b")),
            ("tag".into(), json!("c")),
        ]);
        assert_eq!(query.get("tag"), Some(&json!(["a", "b", "c"])));
        assert_eq!(query.get("node"), Some(&json!(1)));
    }
}
