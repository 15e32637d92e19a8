//! ffmpeg-backed [`TranscoderRunner`].

use crate::ports::transcoder::{TranscodeOutcome, TranscodeRequest, TranscoderRunner};
use async_trait::async_trait;
use std::ffi::OsString;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Segment duration of the HLS output, in seconds.
const SEGMENT_SECONDS: u32 = 10;

/// Number of stderr lines kept as diagnostic text.
const DIAGNOSTIC_TAIL_LINES: usize = 20;

#[derive(Clone, Debug)]
pub struct FfmpegTranscoder {
    binary: String,
    timeout: Duration,
}

impl FfmpegTranscoder {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    pub fn build_args(request: &TranscodeRequest) -> Vec<OsString> {
        let segment_pattern = request
            .output_manifest
            .with_file_name("segment_%03d.ts")
            .into_os_string();

        let mut args: Vec<OsString> = vec!["-y".into(), "-i".into()];
        args.push(request.input.clone().into_os_string());
        args.extend(
            [
                "-vf".to_string(),
                format!("scale={}", request.dimensions),
                "-c:v".to_string(),
                "libx264".to_string(),
                "-profile:v".to_string(),
                "baseline".to_string(),
                "-level".to_string(),
                "3.0".to_string(),
                "-c:a".to_string(),
                "aac".to_string(),
                "-start_number".to_string(),
                "0".to_string(),
                "-hls_time".to_string(),
                SEGMENT_SECONDS.to_string(),
                "-hls_list_size".to_string(),
                "0".to_string(),
                "-hls_segment_filename".to_string(),
            ]
            .into_iter()
            .map(OsString::from),
        );
        args.push(segment_pattern);
        args.push("-f".into());
        args.push("hls".into());
        args.push(request.output_manifest.clone().into_os_string());
        args
    }
}

#[async_trait]
impl TranscoderRunner for FfmpegTranscoder {
    async fn transcode(&self, request: &TranscodeRequest) -> TranscodeOutcome {
        let args = Self::build_args(request);
        debug!(binary = %self.binary, ?args, "Running transcoder");

        let child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(e) => {
                return TranscodeOutcome::Failure(format!(
                    "failed to spawn {}: {}",
                    self.binary, e
                ))
            }
        };

        // Dropping the wait future on timeout kills the child.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return TranscodeOutcome::Failure(format!("failed to wait for transcoder: {}", e)),
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs(), "Transcoder timed out, killed");
                return TranscodeOutcome::Failure(format!(
                    "transcoder timed out after {:?}",
                    self.timeout
                ));
            }
        };

        if output.status.code() == Some(0) {
            TranscodeOutcome::Success
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let lines: Vec<&str> = stderr.lines().collect();
            let tail = lines[lines.len().saturating_sub(DIAGNOSTIC_TAIL_LINES)..].join("\n");
            TranscodeOutcome::Failure(format!("exit status {}: {}", output.status, tail))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::renditions::Dimensions;
    use std::path::PathBuf;

    fn request(dir: &std::path::Path) -> TranscodeRequest {
        TranscodeRequest {
            input: dir.join("movie.mp4"),
            output_manifest: dir.join("movie-360p").join("playlist.m3u8"),
            dimensions: Dimensions {
                width: 640,
                height: 360,
            },
        }
    }

    fn arg_after<'a>(args: &'a [OsString], flag: &str) -> Option<&'a OsString> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|idx| args.get(idx + 1))
    }

    #[test]
    fn test_build_args_follow_hls_contract() {
        let req = request(&PathBuf::from("/work/users/42"));
        let args = FfmpegTranscoder::build_args(&req);

        assert_eq!(arg_after(&args, "-i").unwrap(), "/work/users/42/movie.mp4");
        assert_eq!(arg_after(&args, "-vf").unwrap(), "scale=640x360");
        assert_eq!(arg_after(&args, "-profile:v").unwrap(), "baseline");
        assert_eq!(arg_after(&args, "-hls_time").unwrap(), "10");
        assert_eq!(arg_after(&args, "-hls_list_size").unwrap(), "0");
        assert_eq!(arg_after(&args, "-f").unwrap(), "hls");
        assert_eq!(
            args.last().unwrap(),
            "/work/users/42/movie-360p/playlist.m3u8"
        );
    }

    #[tokio::test]
    async fn test_missing_binary_is_a_failure_outcome() {
        let transcoder = FfmpegTranscoder::new(
            "/definitely/not/a/transcoder",
            Duration::from_secs(5),
        );
        let outcome = transcoder.transcode(&request(&PathBuf::from("/tmp"))).await;

        match outcome {
            TranscodeOutcome::Failure(msg) => assert!(msg.contains("failed to spawn")),
            TranscodeOutcome::Success => panic!("expected failure"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_codes_and_timeout() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().unwrap();
        let script = |name: &str, body: &str| {
            let path = temp.path().join(name);
            std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path.to_string_lossy().to_string()
        };
        let ok = script("ok.sh", "exit 0");
        let broken = script("broken.sh", "echo 'Invalid data found' >&2\nexit 1");
        let hung = script("hung.sh", "sleep 10");
        let req = request(temp.path());

        let outcome = FfmpegTranscoder::new(ok, Duration::from_secs(5))
            .transcode(&req)
            .await;
        assert!(outcome.is_success());

        let outcome = FfmpegTranscoder::new(broken, Duration::from_secs(5))
            .transcode(&req)
            .await;
        match outcome {
            TranscodeOutcome::Failure(msg) => assert!(msg.contains("Invalid data found")),
            TranscodeOutcome::Success => panic!("expected failure"),
        }

        let outcome = FfmpegTranscoder::new(hung, Duration::from_millis(200))
            .transcode(&req)
            .await;
        match outcome {
            TranscodeOutcome::Failure(msg) => assert!(msg.contains("timed out")),
            TranscodeOutcome::Success => panic!("expected timeout"),
        }
    }
}
