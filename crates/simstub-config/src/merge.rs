use toml::{Table, Value};
use tracing::debug;

use crate::config::Config;
use crate::error::ConfigError;

/// Top-level tables a config file may contain.
const SECTIONS: [&str; 4] = ["server", "session", "machine", "log"];

/// Layer the TOML text of one config file over `base`.
///
/// Keys present in the overlay win; everything else keeps its `base`
/// value. `origin` names the file in errors and logs.
///
/// # Errors
///
/// [`ConfigError::Parse`] if the overlay is not TOML or the merged table
/// no longer fits the schema, [`ConfigError::Validation`] for a section
/// that does not exist (usually a typo such as `[sever]`).
pub fn merge_configs(base: &Config, overlay_toml: &str, origin: &str) -> Result<Config, ConfigError> {
    let overlay: Table = overlay_toml
        .parse()
        .map_err(|e: toml::de::Error| ConfigError::Parse(format!("{origin}: {e}")))?;

    if let Some(unknown) = overlay.keys().find(|key| !SECTIONS.contains(&key.as_str())) {
        return Err(ConfigError::Validation {
            field: unknown.clone(),
            message: format!("unknown section in {origin}"),
        });
    }

    let mut merged = match Value::try_from(base) {
        Ok(Value::Table(table)) => table,
        Ok(_) => Table::new(),
        Err(e) => return Err(ConfigError::Parse(e.to_string())),
    };
    let mut overridden = Vec::new();
    overlay_table(&mut merged, overlay, "", &mut overridden);
    if !overridden.is_empty() {
        debug!(origin, keys = %overridden.join(", "), "config overrides");
    }

    Value::Table(merged)
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::Parse(format!("{origin}: {e}")))
}

// Sections merge key by key; any other value replaces the base outright.
fn overlay_table(base: &mut Table, overlay: Table, prefix: &str, overridden: &mut Vec<String>) {
    for (key, value) in overlay {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match (base.get_mut(&key), value) {
            (Some(Value::Table(inner)), Value::Table(nested)) => {
                overlay_table(inner, nested, &path, overridden);
            }
            (_, value) => {
                overridden.push(path);
                base.insert(key, value);
            }
        }
    }
}
