//! Reserved `com.autobox.*` labels written at launch and read back on discovery.

use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::HashMap;

pub const LABEL_PREFIX: &str = "com.autobox";
pub const SIMULATION_LABEL: &str = "com.autobox.simulation";
pub const NAME_LABEL: &str = "com.autobox.name";
pub const CONFIG_PATH_LABEL: &str = "com.autobox.config_path";
pub const CREATED_AT_LABEL: &str = "com.autobox.created_at";

/// Length of the short simulation id.
pub const SHORT_ID_LEN: usize = 12;

pub fn simulation_labels(
    name: &str,
    config_path: &str,
    created_at: DateTime<Utc>,
) -> HashMap<String, String> {
    HashMap::from([
        (SIMULATION_LABEL.to_string(), "true".to_string()),
        (NAME_LABEL.to_string(), name.to_string()),
        (CONFIG_PATH_LABEL.to_string(), config_path.to_string()),
        (
            CREATED_AT_LABEL.to_string(),
            created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        ),
    ])
}

/// Runtime-side label filter selecting managed simulations.
pub fn managed_label_filter() -> String {
    format!("{SIMULATION_LABEL}=true")
}

pub fn is_managed(labels: &HashMap<String, String>) -> bool {
    labels.get(SIMULATION_LABEL).map(String::as_str) == Some("true")
}

/// First 12 characters of a container id, or the whole id when shorter.
pub fn short_id(container_id: &str) -> &str {
    container_id.get(..SHORT_ID_LEN).unwrap_or(container_id)
}
