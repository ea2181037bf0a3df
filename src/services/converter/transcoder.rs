use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::bot::error::Error;
use crate::constants::limits::{MAX_MEDIA_DURATION_SECS, MP3_BITRATES, MP4_HEIGHTS};
use crate::utils::retry::{retry, RetryPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaFormat {
    Mp3 { bitrate_kbps: u32 },
    Mp4 { height: u32 },
}

impl MediaFormat {
    pub fn mp3(bitrate_kbps: u32) -> Result<Self, Error> {
        if MP3_BITRATES.contains(&bitrate_kbps) {
            Ok(MediaFormat::Mp3 { bitrate_kbps })
        } else {
            Err(Error::validation(format!("unsupported MP3 bitrate {} kbps", bitrate_kbps)))
        }
    }

    pub fn mp4(height: u32) -> Result<Self, Error> {
        if MP4_HEIGHTS.contains(&height) {
            Ok(MediaFormat::Mp4 { height })
        } else {
            Err(Error::validation(format!("unsupported MP4 quality {}p", height)))
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            MediaFormat::Mp3 { .. } => "mp3",
            MediaFormat::Mp4 { .. } => "mp4",
        }
    }

    pub fn label(&self) -> String {
        match self {
            MediaFormat::Mp3 { bitrate_kbps } => format!("MP3 {} kbps", bitrate_kbps),
            MediaFormat::Mp4 { height } => format!("MP4 {}p", height),
        }
    }
}

/// Metadata reported by the downloader
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MediaInfo {
    pub title: String,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub webpage_url: Option<String>,
}

impl MediaInfo {
    pub fn duration_secs(&self) -> u64 {
        self.duration.map(|d| d.max(0.0).round() as u64).unwrap_or(0)
    }

    pub fn ensure_within_limit(&self) -> Result<(), Error> {
        let secs = self.duration_secs();
        if secs > MAX_MEDIA_DURATION_SECS {
            return Err(Error::validation(format!(
                "media is {}:{:02} long, the limit is {} minutes",
                secs / 60,
                secs % 60,
                MAX_MEDIA_DURATION_SECS / 60
            )));
        }
        Ok(())
    }
}

/// Drives the external downloader/transcoder (yt-dlp, which calls ffmpeg)
#[derive(Debug, Clone)]
pub struct Transcoder {
    binary: String,
    temp_dir: PathBuf,
    policy: RetryPolicy,
}

impl Transcoder {
    pub fn new(binary: impl Into<String>, temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            temp_dir: temp_dir.into(),
            policy: RetryPolicy::default(),
        }
    }

    /// Fetch metadata, retrying transient failures
    pub async fn fetch_info(&self, url: &str) -> Result<MediaInfo, Error> {
        retry(self.policy, "metadata fetch", |attempt| async move {
            debug!("Fetching metadata for {} (attempt {})", url, attempt);

            let output = Command::new(&self.binary)
                .args(["--dump-single-json", "--no-playlist", "--no-warnings", url])
                .kill_on_drop(true)
                .output()
                .await?;

            if !output.status.success() {
                return Err(Error::ExternalService(last_line(&output.stderr)));
            }

            Ok(serde_json::from_slice::<MediaInfo>(&output.stdout)?)
        })
        .await
    }

    /// Download and convert, reporting whole-percent progress. Returns the
    /// path of the finished file inside the temp dir.
    pub async fn convert<F>(&self, url: &str, format: MediaFormat, mut on_progress: F) -> Result<PathBuf, Error>
    where
        F: FnMut(u8) + Send,
    {
        tokio::fs::create_dir_all(&self.temp_dir).await?;

        let stem = Uuid::new_v4().simple().to_string();
        let template = self.temp_dir.join(format!("{}.%(ext)s", stem));
        let output_path = self.temp_dir.join(format!("{}.{}", stem, format.extension()));

        let mut child = Command::new(&self.binary)
            .args(build_args(url, format, &template))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stderr_task = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let _ = stderr.read_to_end(&mut buf).await;
                buf
            })
        });

        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            let mut last = None;
            while let Some(line) = lines.next_line().await? {
                if let Some(percent) = parse_progress(&line) {
                    if last != Some(percent) {
                        last = Some(percent);
                        on_progress(percent);
                    }
                }
            }
        }

        let status = child.wait().await?;
        let stderr = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => Vec::new(),
        };

        if !status.success() {
            warn!("Conversion of {} exited with {}", url, status);
            remove_quietly(&output_path).await;
            return Err(Error::ExternalService(last_line(&stderr)));
        }

        if tokio::fs::metadata(&output_path).await.is_err() {
            return Err(Error::ExternalService(
                "converter finished without producing a file".to_string(),
            ));
        }

        info!("Converted {} to {}", url, format.label());
        Ok(output_path)
    }
}

pub fn build_args(url: &str, format: MediaFormat, output_template: &Path) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "--newline".into(),
        "--no-playlist".into(),
        "--no-warnings".into(),
        "-o".into(),
        output_template.to_string_lossy().into_owned(),
    ];

    match format {
        MediaFormat::Mp3 { bitrate_kbps } => {
            args.extend([
                "-x".into(),
                "--audio-format".into(),
                "mp3".into(),
                "--audio-quality".into(),
                format!("{}K", bitrate_kbps),
            ]);
        }
        MediaFormat::Mp4 { height } => {
            args.extend([
                "-f".into(),
                format!("bv*[height<={h}]+ba/b[height<={h}]", h = height),
                "--merge-output-format".into(),
                "mp4".into(),
            ]);
        }
    }

    args.push(url.to_string());
    args
}

/// `[download]  42.7% of 3.2MiB at ...` -> 42
pub fn parse_progress(line: &str) -> Option<u8> {
    let rest = line.trim_start().strip_prefix("[download]")?;
    let percent = rest.trim_start().split('%').next()?;
    let value: f32 = percent.trim().parse().ok()?;
    Some(value.clamp(0.0, 100.0) as u8)
}

const SUPPORTED_HOSTS: &[&str] = &[
    "youtube.com",
    "www.youtube.com",
    "m.youtube.com",
    "music.youtube.com",
    "youtu.be",
    "www.youtu.be",
];

/// Only http(s) YouTube links are accepted
pub fn is_supported_url(raw: &str) -> bool {
    let Ok(url) = Url::parse(raw.trim()) else {
        return false;
    };

    if !matches!(url.scheme(), "http" | "https") {
        return false;
    }

    url.host_str()
        .map(|host| {
            SUPPORTED_HOSTS
                .iter()
                .any(|allowed| host.eq_ignore_ascii_case(allowed))
        })
        .unwrap_or(false)
}

pub async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Could not remove {}: {}", path.display(), e);
        }
    }
}

fn last_line(output: &[u8]) -> String {
    String::from_utf8_lossy(output)
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("converter failed without output")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_progress() {
        assert_eq!(parse_progress("[download]  42.7% of 3.20MiB at 1.2MiB/s ETA 00:02"), Some(42));
        assert_eq!(parse_progress("[download] 100% of 3.20MiB in 00:03"), Some(100));
        assert_eq!(parse_progress("[download] Destination: /tmp/x.webm"), None);
        assert_eq!(parse_progress("[ExtractAudio] Destination: /tmp/x.mp3"), None);
    }

    #[test]
    fn test_format_validation() {
        assert!(MediaFormat::mp3(192).is_ok());
        assert!(MediaFormat::mp3(100).is_err());
        assert!(MediaFormat::mp4(720).is_ok());
        assert!(MediaFormat::mp4(2160).is_err());
    }

    #[test]
    fn test_build_args() {
        let template = Path::new("/tmp/conv/abc.%(ext)s");

        let mp3 = build_args("https://youtu.be/x", MediaFormat::Mp3 { bitrate_kbps: 320 }, template);
        assert!(mp3.windows(2).any(|w| w == ["--audio-quality", "320K"]));
        assert_eq!(mp3.last().map(String::as_str), Some("https://youtu.be/x"));

        let mp4 = build_args("https://youtu.be/x", MediaFormat::Mp4 { height: 480 }, template);
        assert!(mp4.contains(&"bv*[height<=480]+ba/b[height<=480]".to_string()));
        assert!(mp4.windows(2).any(|w| w == ["-o", "/tmp/conv/abc.%(ext)s"]));
    }

    #[test]
    fn test_supported_urls() {
        assert!(is_supported_url("https://www.youtube.com/watch?v=abc"));
        assert!(is_supported_url("https://youtu.be/abc"));
        assert!(is_supported_url("https://m.youtube.com/watch?v=abc"));
        assert!(!is_supported_url("https://example.com/youtube.com"));
        assert!(!is_supported_url("youtube.com/watch?v=abc"));
    }

    #[test]
    fn test_supported_url_variants() {
        assert!(is_supported_url("https://www.youtube.com:443/watch?v=abc"));
        assert!(is_supported_url("HTTPS://WWW.YOUTUBE.COM/watch?v=abc"));
        assert!(is_supported_url("https://user@www.youtube.com/watch?v=abc"));
        assert!(is_supported_url("https://music.youtube.com/watch?v=abc"));
        assert!(!is_supported_url("https://youtube.com@evil.example/watch?v=abc"));
        assert!(!is_supported_url("https://youtube.com.evil.example/watch"));
        assert!(!is_supported_url("ftp://www.youtube.com/watch?v=abc"));
    }

    #[test]
    fn test_duration_limit() {
        let info = |duration| MediaInfo {
            title: "clip".to_string(),
            duration: Some(duration),
            uploader: None,
            webpage_url: None,
        };

        assert!(info(1800.0).ensure_within_limit().is_ok());
        assert!(matches!(
            info(1801.0).ensure_within_limit(),
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_binary_fails_info_fetch() {
        let mut transcoder = Transcoder::new("definitely-not-a-real-binary-xyz", std::env::temp_dir());
        transcoder.policy = RetryPolicy {
            attempts: 2,
            attempt_timeout: std::time::Duration::from_secs(5),
            base_backoff: std::time::Duration::from_millis(1),
        };

        assert!(matches!(
            transcoder.fetch_info("https://youtu.be/x").await,
            Err(Error::Io(_))
        ));
    }
}
