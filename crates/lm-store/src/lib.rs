//! SQLite persistence and TOML configuration for `lm-core` state.

pub mod config;
pub mod error;
pub mod schema;
pub mod store;

pub use config::{load_config, resolve_data_dir};
pub use error::{Result, StoreError};
pub use store::Store;
