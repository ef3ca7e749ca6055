pub mod config;
pub mod error;
pub mod logging;

pub mod checksum;
pub mod concat;
pub mod download;
pub mod existence;
pub mod extract;
pub mod layout;
pub mod manifest;
pub mod pipeline;
pub mod pool;
pub mod runner;
pub mod transcode;

pub use error::{PrepError, Result};
