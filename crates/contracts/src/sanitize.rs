use std::sync::OnceLock;

use regex::Regex;

static MARKUP: OnceLock<Regex> = OnceLock::new();

fn markup() -> &'static Regex {
    MARKUP.get_or_init(|| Regex::new(r"<[^>]*>").expect("markup pattern must compile"))
}

/// Removes every `<...>` span and trims the remainder.
pub fn strip_markup(raw: &str) -> String {
    markup().replace_all(raw, "").trim().to_string()
}

/// Only a literal JSON `true` counts as true.
pub fn coerce_flag(value: &serde_json::Value) -> bool {
    matches!(value, serde_json::Value::Bool(true))
}
