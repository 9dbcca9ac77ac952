// Helper functions shared by extractors, tools and the web layer

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Command as TokioCommand;
use tokio::time::timeout;

use super::errors::DownloadError;

/// Run command with timeout, collecting stdout and stderr concurrently.
///
/// The child is killed when the timeout expires.
pub async fn run_output_with_timeout<S: AsRef<OsStr>>(
    program: &Path,
    args: &[S],
    limit: Duration,
) -> Result<std::process::Output, DownloadError> {
    let tool = tool_name(program);

    let mut child = TokioCommand::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| spawn_error(&tool, e))?;

    let mut stdout_pipe = child
        .stdout
        .take()
        .ok_or_else(|| missing_pipe(&tool, "stdout"))?;
    let mut stderr_pipe = child
        .stderr
        .take()
        .ok_or_else(|| missing_pipe(&tool, "stderr"))?;

    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stdout_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stderr_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });

    match timeout(limit, child.wait()).await {
        Ok(status) => {
            let status = status?;
            let stdout = join_pipe(stdout_task).await?;
            let stderr = join_pipe(stderr_task).await?;
            Ok(std::process::Output {
                status,
                stdout,
                stderr,
            })
        }
        Err(_) => {
            let _ = child.kill().await;
            stdout_task.abort();
            stderr_task.abort();
            Err(DownloadError::ProcessTimeout {
                tool,
                timeout: limit,
            })
        }
    }
}

async fn join_pipe(
    task: tokio::task::JoinHandle<std::io::Result<Vec<u8>>>,
) -> Result<Vec<u8>, DownloadError> {
    task.await
        .map_err(|e| DownloadError::Io(std::io::Error::other(e)))?
        .map_err(DownloadError::Io)
}

/// Error for a child whose piped stream could not be taken
pub fn missing_pipe(tool: &str, pipe: &str) -> DownloadError {
    DownloadError::Io(std::io::Error::other(format!(
        "Failed to capture {} from {}",
        pipe, tool
    )))
}

/// Map a spawn failure to `ToolNotFound` when the binary is missing.
pub fn spawn_error(tool: &str, e: std::io::Error) -> DownloadError {
    if e.kind() == std::io::ErrorKind::NotFound {
        DownloadError::ToolNotFound(tool.to_string())
    } else {
        DownloadError::Io(e)
    }
}

/// Short name of a program for logs and error messages
pub fn tool_name(program: &Path) -> String {
    program
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.display().to_string())
}

/// Find a binary in the usual install locations, then in PATH.
pub fn find_binary(binary_name: &str) -> Option<PathBuf> {
    let mut candidates = vec![
        PathBuf::from(format!("/opt/homebrew/bin/{}", binary_name)),
        PathBuf::from(format!("/usr/local/bin/{}", binary_name)),
        PathBuf::from(format!("/usr/bin/{}", binary_name)),
    ];
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(".local/bin").join(binary_name));
    }

    if let Some(found) = candidates.into_iter().find(|p| p.exists()) {
        return Some(found);
    }

    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(binary_name))
        .find(|p| p.is_file())
}

/// File name offered to the browser: title with spaces and slashes replaced.
pub fn attachment_filename(title: &str, ext: &str) -> String {
    let stem: String = title
        .trim()
        .chars()
        .map(|c| match c {
            ' ' | '/' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let stem = if stem.is_empty() { "download".to_string() } else { stem };
    format!("{}.{}", stem, ext)
}

/// `Content-Disposition` value with an ASCII fallback and an RFC 5987
/// `filename*` for titles outside ASCII.
pub fn content_disposition(filename: &str) -> String {
    let ascii: String = filename
        .chars()
        .map(|c| if c.is_ascii() && c != '"' { c } else { '_' })
        .collect();

    if ascii == filename {
        format!("attachment; filename=\"{}\"", ascii)
    } else {
        format!(
            "attachment; filename=\"{}\"; filename*=UTF-8''{}",
            ascii,
            urlencoding::encode(filename)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attachment_filename() {
        assert_eq!(attachment_filename("My Song / Live", "mp3"), "My_Song___Live.mp3");
        assert_eq!(attachment_filename("  ", "mp4"), "download.mp4");
    }

    #[test]
    fn test_content_disposition_ascii() {
        assert_eq!(
            content_disposition("clip.mp4"),
            "attachment; filename=\"clip.mp4\""
        );
    }

    #[test]
    fn test_content_disposition_unicode() {
        let value = content_disposition("Песня.mp3");
        assert!(value.starts_with("attachment; filename=\"_____.mp3\"; filename*=UTF-8''"));
        assert!(value.ends_with("%D0%9F%D0%B5%D1%81%D0%BD%D1%8F.mp3"));
        assert!(value.is_ascii());
    }

    #[tokio::test]
    async fn test_run_output_collects_both_pipes() {
        let out = run_output_with_timeout(
            Path::new("sh"),
            &["-c", "printf out; printf err >&2"],
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert!(out.status.success());
        assert_eq!(out.stdout, b"out");
        assert_eq!(out.stderr, b"err");
    }

    #[tokio::test]
    async fn test_run_output_times_out() {
        let err = run_output_with_timeout(Path::new("sh"), &["-c", "sleep 5"], Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::ProcessTimeout { .. }));
    }

    #[tokio::test]
    async fn test_missing_binary_is_tool_not_found() {
        let err = run_output_with_timeout(
            Path::new("definitely-not-a-real-binary-xyz"),
            &["--version"],
            Duration::from_secs(1),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DownloadError::ToolNotFound(_)));
    }
}
