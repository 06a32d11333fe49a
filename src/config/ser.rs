use crate::config::{Commands, Symbols};
use serde::Deserialize;
use std::path::PathBuf;
use toml::{Table, Value};

/// Session file layout, every key is present after merging a user file over the preset.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct SessionFile {
    pub tag: String,
    pub iterations: u32,
    pub log_path: PathBuf,
    pub format: String,
    #[serde(default)]
    pub command_timeout_ms: Option<u64>,
    #[serde(default)]
    pub engine_log: Option<PathBuf>,
    pub resume_after_arm: bool,
    pub step_out_limit: usize,
    pub commands: Commands,
    pub symbols: Symbols,
}

impl SessionFile {
    /// Parse user supplied toml and lay it over the preset.
    pub fn parse(preset: &str, user: &str) -> Result<Self, toml::de::Error> {
        let mut base: Table = toml::from_str(preset)?;
        let user: Table = toml::from_str(user)?;
        merge(&mut base, user);
        Value::Table(base).try_into()
    }
}

/// Deep merge of `over` into `base`, nested tables are merged key by key.
fn merge(base: &mut Table, over: Table) {
    for (key, value) in over {
        if let Value::Table(over) = value {
            if let Some(Value::Table(inner)) = base.get_mut(&key) {
                merge(inner, over);
                continue;
            }
            base.insert(key, Value::Table(over));
        } else {
            base.insert(key, value);
        }
    }
}
