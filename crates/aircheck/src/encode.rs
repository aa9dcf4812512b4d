// Encoder handoff: turn the ordered segment set into one audio file.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::RecorderError;

/// Consumes the ordered segment paths produced by a recording window.
/// The pipeline's responsibility ends at producing that ordered list.
#[async_trait]
pub trait Encoder: Send + Sync {
    async fn encode(&self, segments: &[PathBuf]) -> Result<PathBuf, RecorderError>;
}

/// Output file name from the `{prefix}-{name}.{suffix}` template.
///
/// Prefix and name parts containing `%` are treated as chrono format
/// patterns and expanded with `date`; anything else is used literally.
pub fn output_file_name(prefix: &str, name: &str, suffix: &str, date: NaiveDate) -> String {
    format!("{}-{}.{}", expand(prefix, date), expand(name, date), suffix)
}

fn expand(part: &str, date: NaiveDate) -> String {
    if !part.contains('%') {
        return part.to_string();
    }
    let mut expanded = String::new();
    match write!(expanded, "{}", date.format(part)) {
        Ok(()) => expanded,
        // An unparseable pattern falls back to the literal text.
        Err(_) => part.to_string(),
    }
}

/// Concatenates segments with ffmpeg's concat demuxer and encodes the
/// result to MP3.
pub struct FfmpegEncoder {
    ffmpeg_path: PathBuf,
    output_dir: PathBuf,
    file_prefix: String,
    file_name: String,
    file_suffix: String,
    bitrate_kbps: u32,
    sample_rate: u32,
    channels: u32,
}

impl FfmpegEncoder {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ffmpeg_path: PathBuf,
        output_dir: PathBuf,
        file_prefix: String,
        file_name: String,
        file_suffix: String,
        bitrate_kbps: u32,
        sample_rate: u32,
        channels: u32,
    ) -> Self {
        Self {
            ffmpeg_path,
            output_dir,
            file_prefix,
            file_name,
            file_suffix,
            bitrate_kbps,
            sample_rate,
            channels,
        }
    }

    fn output_path(&self, date: NaiveDate) -> PathBuf {
        self.output_dir.join(output_file_name(
            &self.file_prefix,
            &self.file_name,
            &self.file_suffix,
            date,
        ))
    }

    async fn write_concat_list(
        &self,
        list_path: &Path,
        segments: &[PathBuf],
    ) -> Result<(), RecorderError> {
        let mut body = String::with_capacity(segments.len() * 64);
        for segment in segments {
            // Single quotes per the concat demuxer's escaping rules.
            let escaped = segment.display().to_string().replace('\'', "'\\''");
            body.push_str("file '");
            body.push_str(&escaped);
            body.push_str("'\n");
        }
        fs::write(list_path, body).await?;
        Ok(())
    }
}

#[async_trait]
impl Encoder for FfmpegEncoder {
    async fn encode(&self, segments: &[PathBuf]) -> Result<PathBuf, RecorderError> {
        if segments.is_empty() {
            return Err(RecorderError::encode("no segments to encode"));
        }

        let output_path = self.output_path(Local::now().date_naive());
        let list_path = output_path.with_extension("concat");
        self.write_concat_list(&list_path, segments).await?;

        info!(
            segments = segments.len(),
            output = %output_path.display(),
            "starting ffmpeg encode"
        );
        let status = Command::new(&self.ffmpeg_path)
            .arg("-y")
            .arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-f")
            .arg("concat")
            .arg("-safe")
            .arg("0")
            .arg("-i")
            .arg(&list_path)
            .arg("-codec:a")
            .arg("libmp3lame")
            .arg("-b:a")
            .arg(format!("{}k", self.bitrate_kbps))
            .arg("-ar")
            .arg(self.sample_rate.to_string())
            .arg("-ac")
            .arg(self.channels.to_string())
            .arg(&output_path)
            .stdin(Stdio::null())
            .status()
            .await;

        if let Err(e) = fs::remove_file(&list_path).await {
            debug!(path = %list_path.display(), error = %e, "could not remove concat list");
        }

        let status = status?;
        if !status.success() {
            return Err(RecorderError::encode(format!("ffmpeg exited with {status}")));
        }
        Ok(output_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_parts_expand_date_patterns() {
        let date = NaiveDate::from_ymd_opt(2026, 8, 6).unwrap();
        assert_eq!(
            output_file_name("%Y%m%d", "morning-show", "mp3", date),
            "20260806-morning-show.mp3"
        );
    }

    #[test]
    fn literal_template_parts_pass_through() {
        let date = NaiveDate::from_ymd_opt(2026, 8, 6).unwrap();
        assert_eq!(
            output_file_name("radio", "capture", "mp3", date),
            "radio-capture.mp3"
        );
    }

    #[tokio::test]
    async fn concat_list_quotes_each_segment() {
        let dir = tempfile::tempdir().unwrap();
        let encoder = FfmpegEncoder::new(
            PathBuf::from("ffmpeg"),
            dir.path().to_path_buf(),
            "radio".to_string(),
            "capture".to_string(),
            "mp3".to_string(),
            320,
            48000,
            2,
        );
        let list_path = dir.path().join("capture.concat");
        encoder
            .write_concat_list(
                &list_path,
                &[
                    PathBuf::from("/data/20260806/ch-media-1.ts"),
                    PathBuf::from("/data/20260806/ch-media-2.ts"),
                ],
            )
            .await
            .unwrap();

        let body = std::fs::read_to_string(&list_path).unwrap();
        assert_eq!(
            body,
            "file '/data/20260806/ch-media-1.ts'\nfile '/data/20260806/ch-media-2.ts'\n"
        );
    }

    #[tokio::test]
    async fn empty_segment_list_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let encoder = FfmpegEncoder::new(
            PathBuf::from("ffmpeg"),
            dir.path().to_path_buf(),
            "radio".to_string(),
            "capture".to_string(),
            "mp3".to_string(),
            320,
            48000,
            2,
        );
        assert!(matches!(
            encoder.encode(&[]).await,
            Err(RecorderError::Encode { .. })
        ));
    }
}
