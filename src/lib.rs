pub mod cache;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod extractor;
pub mod fetcher;
pub mod index;
pub mod loader;
pub mod matcher;
mod metrics;
mod server;
pub mod service;
pub mod utils;

pub use config::Opts;
pub use service::{SearchResponse, SearchService};
