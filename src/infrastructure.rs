//! Infrastructure: HTTP transport, configuration, logging bootstrap, and
//! the CSV spreadsheet collaborators.

pub mod config;
pub mod http;
pub mod logging;
pub mod sheet;

pub use config::{AppConfig, ConfigManager};
pub use http::{HttpClient, HttpClientConfig};
pub use sheet::{read_csv, write_partitions, InputBatch};
