pub mod config;
pub mod core;
pub mod credentials;
pub mod error;
pub mod logger;
pub mod prelude;
