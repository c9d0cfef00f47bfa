#![forbid(unsafe_code)]

mod config;
mod engine;
mod error;
mod record;

pub use config::*;
pub use engine::*;
pub use error::*;
pub use record::*;
