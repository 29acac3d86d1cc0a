pub mod cli;
pub mod error;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod roadmap;
pub mod services;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use cli::{Cli, Commands};
pub use error::AppError;
pub use models::{Config, OutputFormat};
