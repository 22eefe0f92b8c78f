use thiserror::Error;

#[derive(Error, Debug)]
pub enum DevicedbError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Persistence error: {0}")]
    Persistence(String),
    #[error("Data corruption: {message}")]
    DataCorruption { message: String },
    #[error("Definition error in {container}.{field}: {message}")]
    Definition { container: String, field: String, message: String },
    #[error("Name collision: '{name}' is reserved and cannot be used by {container}")]
    NameCollision { container: String, name: String },
    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },
    #[error("Binding error: {0}")]
    Binding(String),
    #[error("Duplicate entry: {0}")]
    Duplicate(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Lock poisoned: {0}")]
    Lock(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DevicedbError>;

// Helper conversions
impl From<rusqlite::Error> for DevicedbError {
    fn from(e: rusqlite::Error) -> Self { Self::Persistence(e.to_string()) }
}
impl From<serde_json::Error> for DevicedbError {
    fn from(e: serde_json::Error) -> Self { Self::DataCorruption { message: e.to_string() } }
}
impl From<config::ConfigError> for DevicedbError {
    fn from(e: config::ConfigError) -> Self { Self::Config(e.to_string()) }
}
impl<T> From<std::sync::PoisonError<T>> for DevicedbError {
    fn from(e: std::sync::PoisonError<T>) -> Self { Self::Lock(e.to_string()) }
}
