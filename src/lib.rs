pub mod alert;
pub mod config;
pub mod extractor;
pub mod fetcher;
pub mod models;
pub mod scheduler;
pub mod sites;
pub mod store;
pub mod utils;

// Re-export commonly used types
pub use config::AppConfig;
pub use utils::error::AppError;

pub type Result<T> = std::result::Result<T, AppError>;
