use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::pool::{clamp_workers, ExecutionKind};

/// Program names (or absolute paths) of the external tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    pub curl: String,
    pub tar: String,
    /// Parallel gzip used as tar's decompressor when found on PATH.
    pub pigz: String,
    pub rsync: String,
    pub ffmpeg: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            curl: "curl".to_string(),
            tar: "tar".to_string(),
            pigz: "pigz".to_string(),
            rsync: "rsync".to_string(),
            ffmpeg: "ffmpeg".to_string(),
        }
    }
}

/// Audio normalization parameters passed to ffmpeg.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscodeConfig {
    /// Extension of the files to convert (without dot).
    pub source_ext: String,
    /// Extension of the converted files (without dot).
    pub target_ext: String,
    pub channels: u32,
    pub sample_rate: u32,
    pub codec: String,
    /// Source files live exactly this many directories below the dataset
    /// dir (speaker/video/clip).
    pub depth: usize,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            source_ext: "m4a".to_string(),
            target_ext: "wav".to_string(),
            channels: 1,
            sample_rate: 16_000,
            codec: "pcm_s16le".to_string(),
            depth: 3,
        }
    }
}

/// Where extracted archives put their audio and where it should end up.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Candidate directories (relative to the save dir) tried in order after
    /// extraction; the first one that exists is copied.
    pub source_candidates: Vec<String>,
    /// Dataset directory (relative to the save dir) the audio is copied into
    /// and transcoded from.
    pub dataset_dir: String,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            source_candidates: vec!["dev/aac".to_string(), "aac".to_string()],
            dataset_dir: "voxceleb2".to_string(),
        }
    }
}

/// Configuration loaded from `~/.config/dsprep/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrepConfig {
    /// Directory downloads land in and preparation works on.
    pub save_dir: PathBuf,
    /// Concatenation list (`part output md5` per line).
    pub list_file: PathBuf,
    /// Download list (`url ...` per line).
    pub download_list: PathBuf,
    /// Parallel downloads.
    pub download_workers: i64,
    /// Parallel concatenation/transcoding workers. Unset = CPUs - 1.
    pub max_workers: Option<i64>,
    /// Only download lines containing this substring. Unset = every line.
    pub download_filter: Option<String>,
    /// Archives the concatenation step is expected to produce.
    pub expected_archives: Vec<String>,
    /// Kill any external command running longer than this.
    pub command_timeout_secs: Option<u64>,
    pub tools: ToolPaths,
    pub transcode: TranscodeConfig,
    pub layout: LayoutConfig,
}

impl Default for PrepConfig {
    fn default() -> Self {
        Self {
            save_dir: PathBuf::from("data"),
            list_file: PathBuf::from("lists/files.txt"),
            download_list: PathBuf::from("lists/fileparts.txt"),
            download_workers: crate::pool::DEFAULT_IO_WORKERS as i64,
            max_workers: None,
            download_filter: Some("mp4".to_string()),
            expected_archives: vec!["vox2_aac.zip".to_string(), "vox2_mp4.zip".to_string()],
            command_timeout_secs: None,
            tools: ToolPaths::default(),
            transcode: TranscodeConfig::default(),
            layout: LayoutConfig::default(),
        }
    }
}

impl PrepConfig {
    /// Worker count for CPU-bound phases, clamped to at least one.
    pub fn effective_max_workers(&self) -> usize {
        match self.max_workers {
            Some(n) => clamp_workers(n),
            None => ExecutionKind::Process.default_workers(),
        }
    }

    pub fn effective_download_workers(&self) -> usize {
        clamp_workers(self.download_workers)
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_secs
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
    }

    pub fn dataset_dir(&self) -> PathBuf {
        self.save_dir.join(&self.layout.dataset_dir)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("dsprep")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from the default location, creating a default file if
/// none exists.
pub fn load_or_init() -> Result<PrepConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = PrepConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from_path(&path)
}

/// Load configuration from an explicit file. Missing keys take defaults.
pub fn load_from_path(path: &Path) -> Result<PrepConfig> {
    let data = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: PrepConfig =
        toml::from_str(&data).with_context(|| format!("parse {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = PrepConfig::default();
        assert_eq!(cfg.save_dir, PathBuf::from("data"));
        assert_eq!(cfg.list_file, PathBuf::from("lists/files.txt"));
        assert_eq!(cfg.download_list, PathBuf::from("lists/fileparts.txt"));
        assert_eq!(cfg.effective_download_workers(), 8);
        assert_eq!(cfg.download_filter.as_deref(), Some("mp4"));
        assert_eq!(cfg.expected_archives, vec!["vox2_aac.zip", "vox2_mp4.zip"]);
        assert_eq!(cfg.transcode.sample_rate, 16_000);
        assert_eq!(cfg.transcode.channels, 1);
        assert_eq!(cfg.transcode.codec, "pcm_s16le");
        assert!(cfg.command_timeout().is_none());
        assert!(cfg.effective_max_workers() >= 1);
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = PrepConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: PrepConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.save_dir, cfg.save_dir);
        assert_eq!(parsed.download_workers, cfg.download_workers);
        assert_eq!(parsed.expected_archives, cfg.expected_archives);
        assert_eq!(parsed.layout.source_candidates, cfg.layout.source_candidates);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let toml = r#"
            save_dir = "/srv/vox"
            max_workers = 0
            command_timeout_secs = 600

            [tools]
            ffmpeg = "/opt/ffmpeg/bin/ffmpeg"
        "#;
        let cfg: PrepConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.save_dir, PathBuf::from("/srv/vox"));
        assert_eq!(cfg.effective_max_workers(), 1);
        assert_eq!(cfg.command_timeout(), Some(Duration::from_secs(600)));
        assert_eq!(cfg.tools.ffmpeg, "/opt/ffmpeg/bin/ffmpeg");
        assert_eq!(cfg.tools.curl, "curl");
        assert_eq!(cfg.list_file, PathBuf::from("lists/files.txt"));
        assert_eq!(cfg.dataset_dir(), PathBuf::from("/srv/vox/voxceleb2"));
    }

    #[test]
    fn negative_download_workers_clamp() {
        let cfg: PrepConfig = toml::from_str("download_workers = -3").unwrap();
        assert_eq!(cfg.effective_download_workers(), 1);
    }

    #[test]
    fn zero_timeout_means_none() {
        let cfg: PrepConfig = toml::from_str("command_timeout_secs = 0").unwrap();
        assert!(cfg.command_timeout().is_none());
    }

    #[test]
    fn load_from_path_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "download_workers = \"many\"").unwrap();
        let err = load_from_path(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("parse"));

        fs::write(&path, "[transcode]\nsample_rate = 8000\n").unwrap();
        let cfg = load_from_path(&path).unwrap();
        assert_eq!(cfg.transcode.sample_rate, 8000);
        assert_eq!(cfg.transcode.source_ext, "m4a");
    }
}
