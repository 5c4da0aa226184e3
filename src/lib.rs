pub mod activity;
pub mod config;
pub mod error;
pub mod index;
pub mod ingest;
pub mod retention;
pub mod server;
pub mod stats;
pub mod store;

pub use error::{IndexerError, Result};
