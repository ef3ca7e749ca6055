//! Tests for the download subcommand and global options.

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::Parser;
use std::path::Path;

#[test]
fn cli_parse_download_defaults() {
    match parse(&["dsprep", "download"]) {
        CliCommand::Download {
            save_dir,
            list_file,
            workers,
            filter,
            all,
        } => {
            assert!(save_dir.is_none());
            assert!(list_file.is_none());
            assert!(workers.is_none());
            assert!(filter.is_none());
            assert!(!all);
        }
        _ => panic!("expected Download"),
    }
}

#[test]
fn cli_parse_download_overrides() {
    match parse(&[
        "dsprep",
        "download",
        "--save-dir",
        "/data/vox",
        "--list-file",
        "parts.txt",
        "--workers",
        "4",
        "--filter",
        "aac",
    ]) {
        CliCommand::Download {
            save_dir,
            list_file,
            workers,
            filter,
            all,
        } => {
            assert_eq!(save_dir.as_deref(), Some(Path::new("/data/vox")));
            assert_eq!(list_file.as_deref(), Some(Path::new("parts.txt")));
            assert_eq!(workers, Some(4));
            assert_eq!(filter.as_deref(), Some("aac"));
            assert!(!all);
        }
        _ => panic!("expected Download with overrides"),
    }
}

#[test]
fn cli_parse_download_filter_conflicts_with_all() {
    assert!(Cli::try_parse_from(["dsprep", "download", "--filter", "mp4", "--all"]).is_err());
}

#[test]
fn cli_parse_global_config_after_subcommand() {
    let cli = Cli::try_parse_from(["dsprep", "download", "--config", "/etc/dsprep.toml"]).unwrap();
    assert_eq!(cli.config.as_deref(), Some(Path::new("/etc/dsprep.toml")));
}

#[test]
fn cli_parse_requires_subcommand() {
    assert!(Cli::try_parse_from(["dsprep"]).is_err());
}

#[test]
fn starting_message_names_url_and_file() {
    let item = dsprep_core::manifest::WorkItem::new(
        "https://h/get?file=vox2_dev_mp4_partaa",
        "vox2_dev_mp4_partaa",
    );
    assert_eq!(
        crate::cli::commands::starting_message(&item),
        "Starting download: https://h/get?file=vox2_dev_mp4_partaa -> vox2_dev_mp4_partaa"
    );
}
