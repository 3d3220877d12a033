//! Shared terminal formatting

use glow_api_client::ApiError;
use owo_colors::OwoColorize;
use serde_json::{Value, json};

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

/// Print a section banner
pub fn header(title: &str) {
    println!();
    println!("{}", RULE.blue());
    println!("  {}", title.blue().bold());
    println!("{}", RULE.blue());
    println!();
}

/// Print a value as indented JSON
pub fn pretty(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(_) => println!("{value}"),
    }
}

/// JSON representation of a failed call
#[must_use]
pub fn error_json(err: &ApiError) -> Value {
    json!({
        "success": false,
        "error": {
            "kind": err.kind(),
            "status": err.status(),
            "message": err.body().map_or_else(|| err.to_string(), |b| b.message.clone()),
            "code": err.code(),
            "details": err.body().and_then(|b| b.details.clone()),
        }
    })
}
