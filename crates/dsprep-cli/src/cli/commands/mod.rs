//! CLI command handlers, one per file.

mod checksum;
mod download;
mod prepare;

pub use checksum::run_checksum;
pub use download::run_download;
#[cfg(test)]
pub(crate) use download::starting_message;
pub use prepare::run_prepare;
