//! CLI for dsprep.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use dsprep_core::checksum::DigestAlgorithm;
use dsprep_core::config::{self, PrepConfig};
use std::path::{Path, PathBuf};

use commands::{run_checksum, run_download, run_prepare};

/// Top-level CLI for dsprep.
#[derive(Debug, Parser)]
#[command(name = "dsprep")]
#[command(about = "dsprep: download and prepare speech datasets", long_about = None)]
pub struct Cli {
    /// Config file to use instead of ~/.config/dsprep/config.toml.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download every file named in the download list.
    Download {
        /// Directory to download into (created if missing).
        #[arg(long, value_name = "DIR")]
        save_dir: Option<PathBuf>,
        /// Download list, one URL per line.
        #[arg(long, value_name = "FILE")]
        list_file: Option<PathBuf>,
        /// Parallel downloads.
        #[arg(long, value_name = "N", allow_negative_numbers = true)]
        workers: Option<i64>,
        /// Only download lines containing this substring.
        #[arg(long, value_name = "S", conflicts_with = "all")]
        filter: Option<String>,
        /// Download every line regardless of the configured filter.
        #[arg(long)]
        all: bool,
    },

    /// Concatenate parts, then optionally extract and convert.
    Prepare {
        /// Directory holding the downloaded parts.
        #[arg(long, value_name = "DIR")]
        save_dir: Option<PathBuf>,
        /// Concatenation list (`pattern output md5` per line).
        #[arg(long, value_name = "FILE")]
        list_file: Option<PathBuf>,
        /// Delete part files once their output verifies.
        #[arg(long)]
        remove_parts: bool,
        /// Only report which archives are present.
        #[arg(long)]
        check_only: bool,
        /// Extract the archives and copy the audio into the dataset dir.
        #[arg(long)]
        extract: bool,
        /// Convert audio to mono 16 kHz WAV.
        #[arg(long)]
        convert: bool,
        /// Worker count for concatenation and conversion (values below 1 mean 1).
        #[arg(long, value_name = "N", allow_negative_numbers = true)]
        max_workers: Option<i64>,
        /// Ask ffmpeg for hardware-accelerated decoding.
        #[arg(long)]
        use_hwaccel: bool,
    },

    /// Print the digest of a file.
    Checksum {
        /// Path to the file.
        path: PathBuf,
        #[arg(long, value_enum, default_value_t = AlgoArg::Md5)]
        algo: AlgoArg,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AlgoArg {
    Md5,
    Sha256,
}

impl From<AlgoArg> for DigestAlgorithm {
    fn from(a: AlgoArg) -> Self {
        match a {
            AlgoArg::Md5 => DigestAlgorithm::Md5,
            AlgoArg::Sha256 => DigestAlgorithm::Sha256,
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<PrepConfig> {
    match path {
        Some(p) => config::load_from_path(p),
        None => config::load_or_init(),
    }
}

impl CliCommand {
    pub fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let mut cfg = load_config(cli.config.as_deref())?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Download {
                save_dir,
                list_file,
                workers,
                filter,
                all,
            } => {
                if let Some(dir) = save_dir {
                    cfg.save_dir = dir;
                }
                if let Some(list) = list_file {
                    cfg.download_list = list;
                }
                if let Some(n) = workers {
                    cfg.download_workers = n;
                }
                if all {
                    cfg.download_filter = None;
                } else if filter.is_some() {
                    cfg.download_filter = filter;
                }
                run_download(&cfg)?;
            }
            CliCommand::Prepare {
                save_dir,
                list_file,
                remove_parts,
                check_only,
                extract,
                convert,
                max_workers,
                use_hwaccel,
            } => {
                if let Some(dir) = save_dir {
                    cfg.save_dir = dir;
                }
                if let Some(list) = list_file {
                    cfg.list_file = list;
                }
                if max_workers.is_some() {
                    cfg.max_workers = max_workers;
                }
                let opts = dsprep_core::pipeline::PrepareOptions {
                    remove_parts,
                    check_only,
                    extract,
                    convert,
                    use_hwaccel,
                };
                run_prepare(&cfg, &opts)?;
            }
            CliCommand::Checksum { path, algo } => run_checksum(&path, algo.into())?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
