// TOML configuration: file sections plus flag overrides -> engine config.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use aircheck_engine::{ProxyAuth, ProxyConfig, ProxyType, RecorderConfig};
use chrono::{NaiveTime, Weekday};
use serde::Deserialize;
use url::Url;

use crate::cli::Args;
use crate::error::{CliError, Result};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    pub schedule: ScheduleSection,
    pub stream: StreamSection,
    pub storage: StorageSection,
    #[serde(default)]
    pub encoder: EncoderSection,
    #[serde(default)]
    pub proxy: Option<ProxySection>,
    #[serde(default)]
    pub process: ProcessSection,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduleSection {
    /// Window start, `HH:MM` or `HH:MM:SS` local time.
    pub start: String,
    /// Window end, same formats as `start`.
    pub end: String,
    /// Active weekdays, e.g. ["mon", "wed", "friday"].
    pub days: Vec<String>,
    #[serde(default = "default_lead_secs")]
    pub start_lead_secs: u64,
    #[serde(default = "default_pad_secs")]
    pub end_pad_secs: u64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StreamSection {
    pub playlist_url: String,
    #[serde(default = "default_poll_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_workers")]
    pub fetch_workers: usize,
    #[serde(default = "default_extension")]
    pub segment_extension: String,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageSection {
    /// Segments land in a per-day subdirectory of this directory; the
    /// encoded output file lands in the directory itself.
    pub base_dir: PathBuf,
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
    #[serde(default = "default_file_name")]
    pub file_name: String,
    #[serde(default = "default_file_suffix")]
    pub file_suffix: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EncoderSection {
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,
    #[serde(default = "default_bitrate")]
    pub bitrate_kbps: u32,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_channels")]
    pub channels: u32,
}

impl Default for EncoderSection {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            bitrate_kbps: default_bitrate(),
            sample_rate: default_sample_rate(),
            channels: default_channels(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProxySection {
    pub url: String,
    #[serde(default = "default_proxy_kind")]
    pub kind: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessSection {
    /// Keep recording windows back to back instead of exiting after one.
    #[serde(default = "default_true")]
    pub continuous: bool,
    #[serde(default = "default_lock_file")]
    pub lock_file: PathBuf,
}

impl Default for ProcessSection {
    fn default() -> Self {
        Self {
            continuous: true,
            lock_file: default_lock_file(),
        }
    }
}

fn default_lead_secs() -> u64 {
    60
}
fn default_pad_secs() -> u64 {
    60
}
fn default_poll_secs() -> u64 {
    20
}
fn default_workers() -> usize {
    2
}
fn default_extension() -> String {
    ".ts".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_file_prefix() -> String {
    "%Y%m%d".to_string()
}
fn default_file_name() -> String {
    "aircheck".to_string()
}
fn default_file_suffix() -> String {
    "mp3".to_string()
}
fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}
fn default_bitrate() -> u32 {
    320
}
fn default_sample_rate() -> u32 {
    48000
}
fn default_channels() -> u32 {
    2
}
fn default_proxy_kind() -> String {
    "http".to_string()
}
fn default_true() -> bool {
    true
}
fn default_lock_file() -> PathBuf {
    PathBuf::from("aircheck.lock")
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| CliError::ConfigRead {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| CliError::ConfigParse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Merges file values with flag overrides into the engine config.
    pub fn build_recorder_config(&self, args: &Args) -> Result<RecorderConfig> {
        let playlist_url = args
            .playlist_url
            .as_deref()
            .unwrap_or(&self.stream.playlist_url);
        let playlist_url = Url::parse(playlist_url)
            .map_err(|e| CliError::invalid(format!("playlist URL `{playlist_url}`: {e}")))?;

        let start = parse_time(&self.schedule.start)?;
        let end = parse_time(&self.schedule.end)?;
        let weekdays = parse_weekdays(&self.schedule.days)?;

        let mut config = RecorderConfig::new(playlist_url, start, end);
        config.weekdays = weekdays;
        config.start_lead = Duration::from_secs(self.schedule.start_lead_secs);
        config.end_pad = Duration::from_secs(self.schedule.end_pad_secs);
        config.poll_interval = Duration::from_secs(self.stream.poll_interval_secs);
        config.fetch_workers = self.stream.fetch_workers;
        config.segment_extension = self.stream.segment_extension.clone();
        config.request_timeout = Duration::from_secs(self.stream.request_timeout_secs);
        config.base_dir = args
            .base_dir
            .clone()
            .unwrap_or_else(|| self.storage.base_dir.clone());
        config.continuous = !args.once && self.process.continuous;
        config.proxy = self.proxy_config(args)?;

        config.validate()?;
        Ok(config)
    }

    /// Flag-provided proxy settings take precedence over the file section.
    fn proxy_config(&self, args: &Args) -> Result<Option<ProxyConfig>> {
        if let Some(url) = &args.proxy {
            let proxy_type = proxy_type_for_url(url);
            let auth = args.proxy_username.as_ref().map(|username| ProxyAuth {
                username: username.clone(),
                password: args.proxy_password.clone().unwrap_or_default(),
            });
            return Ok(Some(ProxyConfig {
                url: url.clone(),
                proxy_type,
                auth,
            }));
        }

        let Some(section) = &self.proxy else {
            return Ok(None);
        };
        let proxy_type = match section.kind.to_ascii_lowercase().as_str() {
            "http" => ProxyType::Http,
            "https" => ProxyType::Https,
            "socks5" => ProxyType::Socks5,
            other => {
                return Err(CliError::invalid(format!(
                    "proxy kind `{other}` (expected http, https, or socks5)"
                )));
            }
        };
        let auth = section.username.as_ref().map(|username| ProxyAuth {
            username: username.clone(),
            password: section.password.clone().unwrap_or_default(),
        });
        Ok(Some(ProxyConfig {
            url: section.url.clone(),
            proxy_type,
            auth,
        }))
    }
}

fn proxy_type_for_url(url: &str) -> ProxyType {
    if url.starts_with("socks5") {
        ProxyType::Socks5
    } else if url.starts_with("https://") {
        ProxyType::Https
    } else {
        ProxyType::Http
    }
}

fn parse_time(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .map_err(|e| CliError::invalid(format!("time `{value}`: {e}")))
}

fn parse_weekdays(days: &[String]) -> Result<HashSet<Weekday>> {
    days.iter()
        .map(|day| {
            day.parse::<Weekday>()
                .map_err(|_| CliError::invalid(format!("weekday `{day}`")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    const EXAMPLE: &str = r#"
[schedule]
start = "09:30"
end = "10:00:00"
days = ["mon", "wednesday", "fri"]

[stream]
playlist_url = "https://radio.example.com/live/channel/index.m3u8"
poll_interval_secs = 20
fetch_workers = 2

[storage]
base_dir = "/data/recordings"

[process]
continuous = true
"#;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["aircheck"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn example_config_builds() {
        let app: AppConfig = toml::from_str(EXAMPLE).unwrap();
        let config = app.build_recorder_config(&args(&[])).unwrap();

        assert_eq!(config.start, NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        assert_eq!(config.end, NaiveTime::from_hms_opt(10, 0, 0).unwrap());
        assert_eq!(
            config.weekdays,
            HashSet::from([Weekday::Mon, Weekday::Wed, Weekday::Fri])
        );
        assert_eq!(config.fetch_workers, 2);
        assert!(config.continuous);
        assert_eq!(config.base_dir, PathBuf::from("/data/recordings"));
    }

    #[test]
    fn once_flag_overrides_continuous_mode() {
        let app: AppConfig = toml::from_str(EXAMPLE).unwrap();
        let config = app.build_recorder_config(&args(&["--once"])).unwrap();
        assert!(!config.continuous);
    }

    #[test]
    fn invalid_weekday_is_reported() {
        let broken = EXAMPLE.replace("\"mon\"", "\"blursday\"");
        let app: AppConfig = toml::from_str(&broken).unwrap();
        assert!(matches!(
            app.build_recorder_config(&args(&[])),
            Err(CliError::Invalid { .. })
        ));
    }

    #[test]
    fn proxy_flags_take_precedence() {
        let with_proxy = format!(
            "{EXAMPLE}\n[proxy]\nurl = \"http://proxy.internal:8080\"\nkind = \"http\"\n"
        );
        let app: AppConfig = toml::from_str(&with_proxy).unwrap();
        let config = app
            .build_recorder_config(&args(&["--proxy", "socks5://proxy.other:1080"]))
            .unwrap();
        let proxy = config.proxy.unwrap();
        assert_eq!(proxy.url, "socks5://proxy.other:1080");
        assert_eq!(proxy.proxy_type, ProxyType::Socks5);
    }

    #[test]
    fn load_reads_a_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aircheck.toml");
        std::fs::write(&path, EXAMPLE).unwrap();

        let app = AppConfig::load(&path).unwrap();
        assert_eq!(
            app.stream.playlist_url,
            "https://radio.example.com/live/channel/index.m3u8"
        );

        let missing = AppConfig::load(&dir.path().join("missing.toml"));
        assert!(matches!(missing, Err(CliError::ConfigRead { .. })));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let broken = format!("{EXAMPLE}\n[stream2]\nfoo = 1\n");
        assert!(toml::from_str::<AppConfig>(&broken).is_err());
    }
}
