use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::Result;
use crate::persist::PersistenceMode;

pub const DEFAULT_CONFIG: &str = "devicedb.json";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// SQLite file to keep entries in; entries stay in memory when absent.
    #[serde(default)]
    pub database_file: Option<String>,
    pub log_filter: String,
}

impl Settings {
    /// Reads defaults, then the optional config file, then `DEVICEDB_*` environment variables.
    pub fn load(path: &str) -> Result<Self> {
        let settings = Config::builder()
            .set_default("log_filter", "info")?
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("DEVICEDB"))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    pub fn persistence_mode(&self) -> PersistenceMode {
        match &self.database_file {
            Some(path) => PersistenceMode::File(path.clone()),
            None => PersistenceMode::Memory,
        }
    }
}
