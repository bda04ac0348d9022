//!
//! src/errors.rs  Andrew Belles  Oct 2nd, 2025
//!
//! Defines enums and methods of error conversion
//! for errors the stats service uses
//!
//!

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StatsError {
    #[error("config error: {0}")]
    Config(String),
    #[error("http error: {0}")]
    Http(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("schema error: {0}")]
    Schema(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("render error: {0}")]
    Render(#[from] std::fmt::Error)
}

impl From<reqwest::Error> for StatsError {
    fn from(e: reqwest::Error) -> Self { StatsError::Http(e.to_string()) }
}

impl From<serde_json::Error> for StatsError {
    fn from(e: serde_json::Error) -> Self { StatsError::Parse(e.to_string()) }
}
