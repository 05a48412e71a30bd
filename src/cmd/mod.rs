//! Subcommands and the helpers they share

pub mod build;
pub mod resolve;

use chrono::Local;
use serde_json::Value;
use std::collections::HashMap;

/// Host architecture under the name distributions use for it
pub fn host_architecture() -> &'static str {
    match std::env::consts::ARCH {
        "arm" => "armhfp",
        "powerpc" => "ppc",
        "powerpc64" => "ppc64",
        other => other,
    }
}

/// Variables every manifest can reference
pub fn template_vars(architecture: &str) -> HashMap<String, Value> {
    let now = Local::now();

    let mut vars = HashMap::new();
    vars.insert("architecture".to_string(), Value::from(architecture));
    vars.insert("today".to_string(), Value::from(now.format("%Y%m%d").to_string()));
    vars.insert("now".to_string(), Value::from(now.format("%H:%M:%S").to_string()));
    vars
}
