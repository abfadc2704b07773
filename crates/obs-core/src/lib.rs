pub mod config;
pub mod error;
pub mod export;
pub mod fetch;
pub mod sources;

pub use config::Endpoints;
pub use error::{Result, SourceError};
pub use fetch::{FetchError, Fetcher, FileFetcher, HttpFetcher};
