pub mod config;
pub mod error;
pub mod fetch;
pub mod output;
pub mod server;
pub mod stops;
pub mod vehicles;

pub use error::{Error, Result};
