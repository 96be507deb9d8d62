//! Error types shared across the crate.
//!
//! Failures of individual HTTP calls are not errors here: they are carried
//! as [`crate::api::FetchResult`] values and folded into warnings by the
//! pool builder. This enum covers the conditions that actually stop a run.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config file error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A rebuild produced zero articles and there is no usable cache.
    #[error("No articles are available right now; please try again later")]
    NoContent,
}

pub type Result<T> = std::result::Result<T, Error>;
