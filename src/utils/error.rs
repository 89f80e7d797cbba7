use thiserror::Error;

use crate::extractor::ExtractError;
use crate::fetcher::FetchError;
use crate::sites::RegistryError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    #[error("Site registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;
