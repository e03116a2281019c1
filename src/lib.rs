pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod stream;
pub mod transcript;

pub use config::AppConfig;
pub use error::ChatError;
