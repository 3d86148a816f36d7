//! Output formatting for command results and streamed events.

use std::io::{self, Write};

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use panelink_api::{ApiResponse, ServerMessage};

use crate::cli::OutputFormat;

/// Render a response body. JSON bodies follow `--output`; anything else is
/// printed as text.
pub fn render_body(format: OutputFormat, response: &ApiResponse) -> String {
    if response.body.is_empty() {
        return String::new();
    }
    match response.json::<Value>() {
        Ok(value) => render_json(format, &value),
        Err(_) => response.text(),
    }
}

/// Render one realtime message, tagged with the local receive time.
pub fn render_message(
    format: OutputFormat,
    message: &ServerMessage,
    received_at: DateTime<Utc>,
) -> String {
    let mut value = serde_json::to_value(message).unwrap_or(Value::Null);
    if let Value::Object(ref mut map) = value {
        map.insert(
            "received_at".into(),
            Value::String(received_at.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
    }
    render_json(format, &value)
}

fn render_json(format: OutputFormat, value: &Value) -> String {
    let rendered = match format {
        OutputFormat::Pretty => serde_json::to_string_pretty(value),
        OutputFormat::Json => serde_json::to_string(value),
    };
    rendered.unwrap_or_default()
}

/// Print a line to stdout. A closed pipe is not an error.
pub fn print_output(output: &str) {
    if output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}
