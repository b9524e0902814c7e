use async_trait::async_trait;
use std::process::{Output, Stdio};
use tokio::process::Command;

use super::source::{ToolFailure, UrlDownloadReport, UrlDownloadRequest, UrlDownloader};
use super::ytdlp_errors::{analyze_ytdlp_error, extract_error_line, YtDlpErrorType};
use crate::core::config;
use crate::core::process::{run_with_timeout, tool_available, ProcessError};

/// `yt-dlp` CLI adapter.
///
/// Used as the Instagram fallback and as the only YouTube extractor. Files
/// land in the request's output directory; the info JSON printed on stdout
/// (`--dump-json --no-simulate`) supplies title and uploader.
#[derive(Debug, Clone)]
pub struct YtDlp {
    bin: String,
}

impl YtDlp {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    pub fn from_env() -> Self {
        Self::new(config::YTDL_BIN.as_str())
    }

    fn build_command(&self, request: &UrlDownloadRequest) -> Command {
        let template = request.output_dir.join("%(title).80s.%(ext)s");

        let mut cmd = Command::new(&self.bin);
        cmd.args(["--no-playlist", "--no-progress", "--restrict-filenames", "--no-mtime"])
            .arg("-f")
            .arg(&request.format)
            .arg("--max-filesize")
            .arg(format!("{}M", request.max_filesize_mb))
            .arg("-o")
            .arg(&template);

        if request.extract_audio {
            cmd.args(["-x", "--audio-format", "mp3"]);
        } else {
            cmd.args(["--merge-output-format", "mp4"]);
        }

        cmd.args(["--dump-json", "--no-simulate", "--"]).arg(&request.url);
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        cmd
    }
}

/// Title and uploader from the last JSON line of stdout.
fn parse_report(stdout: &str) -> UrlDownloadReport {
    let Some(info) = stdout
        .lines()
        .rev()
        .map(str::trim)
        .filter(|l| l.starts_with('{'))
        .find_map(|l| serde_json::from_str::<serde_json::Value>(l).ok())
    else {
        return UrlDownloadReport::default();
    };

    let field = |key: &str| {
        info.get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    UrlDownloadReport {
        title: field("title"),
        uploader: field("uploader").or_else(|| field("channel")),
    }
}

/// Text used for failure analysis: stderr plus the non-JSON lines of stdout.
///
/// The info JSON carries user-written titles and descriptions, which must
/// not decide the failure kind.
fn diagnostics(output: &Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut text: String = stdout
        .lines()
        .filter(|l| !l.trim_start().starts_with('{'))
        .flat_map(|l| [l, "\n"])
        .collect();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    text
}

#[async_trait]
impl UrlDownloader for YtDlp {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn is_available(&self) -> bool {
        tool_available(&self.bin, "--version").await
    }

    async fn download(&self, request: &UrlDownloadRequest) -> Result<UrlDownloadReport, ToolFailure> {
        log::info!(
            "📥 yt-dlp: {} (format {}, audio={})",
            request.url,
            request.format,
            request.extract_audio
        );

        let mut cmd = self.build_command(request);
        let output = run_with_timeout(&mut cmd, request.timeout)
            .await
            .map_err(|e| match e {
                ProcessError::Timeout { timeout, .. } => ToolFailure::Timeout(timeout),
                ref spawn if spawn.is_not_found() => ToolFailure::Unavailable(self.bin.clone()),
                other => ToolFailure::Failed {
                    kind: YtDlpErrorType::Unknown,
                    message: other.to_string(),
                },
            })?;

        let text = diagnostics(&output);
        let kind = analyze_ytdlp_error(&text);

        if !output.status.success() {
            let message = extract_error_line(&text);
            log::warn!("yt-dlp failed ({:?}): {}", kind, message);
            return Err(ToolFailure::Failed { kind, message });
        }

        // --max-filesize aborts the download but yt-dlp still exits 0
        if kind == YtDlpErrorType::FileTooLarge {
            return Err(ToolFailure::Failed {
                kind,
                message: extract_error_line(&text),
            });
        }

        Ok(parse_report(&String::from_utf8_lossy(&output.stdout)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::time::Duration;

    fn args_of(cmd: &Command) -> Vec<String> {
        cmd.as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_video_command() {
        let req = UrlDownloadRequest::best_under_cap(
            "https://youtu.be/x",
            Path::new("/tmp/yt_1"),
            50,
            Duration::from_secs(300),
        );
        let args = args_of(&YtDlp::new("yt-dlp").build_command(&req));
        assert!(args.contains(&"--no-playlist".to_string()));
        assert!(args.contains(&"50M".to_string()));
        assert!(args.contains(&"/tmp/yt_1/%(title).80s.%(ext)s".to_string()));
        assert!(!args.contains(&"-x".to_string()));
        assert_eq!(args.last().unwrap(), "https://youtu.be/x");
    }

    #[test]
    fn test_audio_command() {
        let req = UrlDownloadRequest::audio_only("https://youtu.be/x", Path::new("/tmp/yt_1"), 50, Duration::from_secs(1));
        let args = args_of(&YtDlp::new("yt-dlp").build_command(&req));
        let pos = args.iter().position(|a| a == "-x").unwrap();
        assert_eq!(args[pos + 1], "--audio-format");
        assert_eq!(args[pos + 2], "mp3");
        assert!(args.contains(&"bestaudio".to_string()));
    }

    #[test]
    fn test_parse_report_uses_last_json_line() {
        let stdout = "noise\n{\"title\": \"First\"}\n{\"title\": \"Clip\", \"uploader\": \"Chan\"}\n";
        let report = parse_report(stdout);
        assert_eq!(report.title.as_deref(), Some("Clip"));
        assert_eq!(report.uploader.as_deref(), Some("Chan"));
    }

    #[test]
    fn test_parse_report_without_json() {
        assert_eq!(parse_report("plain text"), UrlDownloadReport::default());
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let ytdlp = YtDlp::new("definitely-not-a-real-binary-7f3a");
        assert!(!ytdlp.is_available().await);
        let req = UrlDownloadRequest::audio_only("https://youtu.be/x", Path::new("/tmp"), 50, Duration::from_secs(5));
        assert_eq!(
            ytdlp.download(&req).await.unwrap_err(),
            ToolFailure::Unavailable("definitely-not-a-real-binary-7f3a".to_string())
        );
    }

    #[cfg(unix)]
    fn fake_ytdlp(dir: &Path, script: &str) -> YtDlp {
        use std::os::unix::fs::PermissionsExt;
        let bin = dir.join("yt-dlp");
        std::fs::write(&bin, format!("#!/bin/sh\n{}\n", script)).unwrap();
        std::fs::set_permissions(&bin, std::fs::Permissions::from_mode(0o755)).unwrap();
        YtDlp::new(bin.to_string_lossy())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_info_json_does_not_decide_failure_kind() {
        let dir = tempfile::tempdir().unwrap();
        let ytdlp = fake_ytdlp(
            dir.path(),
            r#"echo '{"description":"Book private lessons, login at my site"}'
echo 'ERROR: Unable to download video data: <urlopen error [Errno 104] Connection reset by peer>' >&2
exit 1"#,
        );
        let req = UrlDownloadRequest::best_under_cap("https://youtu.be/x", dir.path(), 50, Duration::from_secs(10));

        match ytdlp.download(&req).await.unwrap_err() {
            ToolFailure::Failed { kind, message } => {
                assert_eq!(kind, YtDlpErrorType::NetworkError);
                assert!(message.contains("Connection reset by peer"));
            }
            other => panic!("unexpected failure: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_size_abort_on_stdout_is_still_detected() {
        let dir = tempfile::tempdir().unwrap();
        let ytdlp = fake_ytdlp(
            dir.path(),
            r#"echo '{"title":"Clip"}'
echo '[download] File is larger than max-filesize (73400320 bytes > 52428800 bytes). Aborting.'"#,
        );
        let req = UrlDownloadRequest::best_under_cap("https://youtu.be/x", dir.path(), 50, Duration::from_secs(10));

        assert!(matches!(
            ytdlp.download(&req).await.unwrap_err(),
            ToolFailure::Failed { kind: YtDlpErrorType::FileTooLarge, .. }
        ));
    }
}
