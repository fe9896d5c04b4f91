//! FFmpeg-based DASH transcoder.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

use super::config::TranscoderConfig;
use super::error::TranscoderError;
use super::traits::Transcoder;
use super::types::HwAccel;

/// Prefix of every per-job output directory under the work dir.
pub const OUTPUT_DIR_PREFIX: &str = "dashcoder-out-";

/// Name of the manifest written into each output directory.
pub const MANIFEST_NAME: &str = "dash.mpd";

const STDERR_TAIL_LINES: usize = 20;

/// FFmpeg-based transcoder producing a multi-bitrate DASH ladder.
pub struct FfmpegTranscoder {
    config: TranscoderConfig,
}

impl FfmpegTranscoder {
    /// Creates a new FFmpeg transcoder with the given configuration.
    pub fn new(config: TranscoderConfig) -> Self {
        Self { config }
    }

    /// Creates a transcoder with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(TranscoderConfig::default())
    }

    pub fn config(&self) -> &TranscoderConfig {
        &self.config
    }

    /// Builds ffmpeg arguments for one DASH encode.
    pub fn build_args(
        &self,
        input_path: &Path,
        output_dir: &Path,
        audio_only: bool,
    ) -> Vec<String> {
        let qsv = self.config.hw_accel == HwAccel::Qsv;
        let mut args = Vec::with_capacity(65);

        if qsv {
            args.extend([
                "-hwaccel".to_string(),
                "qsv".to_string(),
                "-hwaccel_output_format".to_string(),
                "qsv".to_string(),
            ]);
        }

        args.extend([
            "-i".to_string(),
            input_path.to_string_lossy().to_string(),
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-progress".to_string(),
            "-".to_string(),
        ]);

        // Fixed GOP so segment boundaries line up across representations
        if !audio_only {
            args.extend([
                "-preset".to_string(),
                self.config.preset.as_str().to_string(),
                "-keyint_min".to_string(),
                "100".to_string(),
                "-g".to_string(),
                "100".to_string(),
                "-sc_threshold".to_string(),
                "0".to_string(),
            ]);
        }

        args.extend([
            "-r".to_string(),
            self.config.fps.to_string(),
            "-c:v".to_string(),
            self.config.hw_accel.video_codec().to_string(),
            "-c:a".to_string(),
            self.config.audio_codec.clone(),
        ]);

        if !qsv {
            args.extend(["-pix_fmt".to_string(), "yuv420p".to_string()]);
        }

        if !audio_only {
            let filter = self.config.hw_accel.scale_filter();
            for (i, quality) in self.config.qualities.iter().enumerate() {
                args.extend([
                    "-map".to_string(),
                    "v:0?".to_string(),
                    format!("-filter:v:{i}"),
                    format!("{filter}={}", quality.scale()),
                    format!("-b:v:{i}"),
                    quality.bitrate().to_string(),
                    format!("-maxrate:{i}"),
                    quality.max_bitrate().to_string(),
                    format!("-bufsize:{i}"),
                    quality.bufsize().to_string(),
                ]);
            }
        }

        args.extend([
            "-map".to_string(),
            "0:a".to_string(),
            "-init_seg_name".to_string(),
            "init$RepresentationID$.$ext$".to_string(),
            "-media_seg_name".to_string(),
            "chunk$RepresentationID$-$Number%05d$.$ext$".to_string(),
            "-use_template".to_string(),
            "1".to_string(),
            "-use_timeline".to_string(),
            "1".to_string(),
            "-seg_duration".to_string(),
            self.config.segment_secs.to_string(),
        ]);

        let adaptation_sets = if audio_only {
            "id=0,streams=a"
        } else {
            "id=0,streams=a id=1,streams=v"
        };
        args.extend(["-adaptation_sets".to_string(), adaptation_sets.to_string()]);

        args.extend(self.config.extra_ffmpeg_args.iter().cloned());

        args.extend([
            "-f".to_string(),
            "dash".to_string(),
            output_dir.join(MANIFEST_NAME).to_string_lossy().to_string(),
        ]);

        args
    }

    /// Path of the ffmpeg log file for a job.
    pub fn log_path(&self, job_id: &str) -> PathBuf {
        let file_name: String = job_id
            .chars()
            .map(|c| if c == '/' || c == '\\' { '_' } else { c })
            .collect();
        self.config.log_dir.join(format!("{file_name}.log"))
    }

    async fn create_output_dir(&self) -> Result<PathBuf, TranscoderError> {
        let work_dir = &self.config.work_dir;
        let failed = || TranscoderError::OutputDirectoryFailed {
            path: work_dir.clone(),
        };
        tokio::fs::create_dir_all(work_dir)
            .await
            .map_err(|_| failed())?;
        let dir = tempfile::Builder::new()
            .prefix(OUTPUT_DIR_PREFIX)
            .tempdir_in(work_dir)
            .map_err(|_| failed())?;
        Ok(dir.keep())
    }

    async fn open_log(&self, job_id: &str) -> Result<File, TranscoderError> {
        let path = self.log_path(job_id);
        let failed = |_| TranscoderError::LogFileFailed { path: path.clone() };
        tokio::fs::create_dir_all(&self.config.log_dir)
            .await
            .map_err(failed)?;
        File::create(&path).await.map_err(failed)
    }

    async fn run_encode(
        &self,
        job_id: &str,
        input: &Path,
        output_dir: &Path,
        audio_only: bool,
    ) -> Result<(), TranscoderError> {
        let args = self.build_args(input, output_dir, audio_only);
        debug!(job_id = %job_id, ?args, "ffmpeg args");

        let log_file = self.open_log(job_id).await?;

        let mut child = Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .current_dir(output_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    TranscoderError::FfmpegNotFound {
                        path: self.config.ffmpeg_path.clone(),
                    }
                } else {
                    TranscoderError::Io(e)
                }
            })?;

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            let _ = child.kill().await;
            return Err(TranscoderError::encode_failed(
                "ffmpeg output pipes were not captured",
                None,
            ));
        };
        let mut out_lines = BufReader::new(stdout).lines();
        let mut err_lines = BufReader::new(stderr).lines();
        let mut log = BufWriter::new(log_file);
        let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);

        let limit = self
            .config
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(Duration::MAX);

        // Both pipes go to the log; stderr tail is kept for the error.
        let result = timeout(limit, async {
            let (mut out_done, mut err_done) = (false, false);
            while !(out_done && err_done) {
                tokio::select! {
                    line = out_lines.next_line(), if !out_done => match line? {
                        Some(line) => {
                            log.write_all(line.as_bytes()).await?;
                            log.write_all(b"\n").await?;
                        }
                        None => out_done = true,
                    },
                    line = err_lines.next_line(), if !err_done => match line? {
                        Some(line) => {
                            log.write_all(line.as_bytes()).await?;
                            log.write_all(b"\n").await?;
                            if tail.len() == STDERR_TAIL_LINES {
                                tail.pop_front();
                            }
                            tail.push_back(line);
                        }
                        None => err_done = true,
                    },
                }
            }
            log.flush().await?;
            let status = child.wait().await?;
            Ok::<ExitStatus, std::io::Error>(status)
        })
        .await;

        match result {
            Ok(Ok(status)) if status.success() => {}
            Ok(Ok(status)) => {
                let stderr = if tail.is_empty() {
                    None
                } else {
                    Some(Vec::from(tail).join("\n"))
                };
                return Err(TranscoderError::encode_failed(
                    format!("FFmpeg exited with code: {:?}", status.code()),
                    stderr,
                ));
            }
            Ok(Err(e)) => {
                let _ = child.kill().await;
                return Err(TranscoderError::Io(e));
            }
            Err(_) => {
                let _ = child.kill().await;
                return Err(TranscoderError::Timeout {
                    timeout_secs: self.config.timeout_secs.unwrap_or_default(),
                });
            }
        }

        if !tokio::fs::try_exists(output_dir.join(MANIFEST_NAME))
            .await
            .unwrap_or(false)
        {
            return Err(TranscoderError::encode_failed("Manifest not created", None));
        }

        Ok(())
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn encode(
        &self,
        job_id: &str,
        input: &Path,
        audio_only: bool,
    ) -> Result<PathBuf, TranscoderError> {
        if !tokio::fs::try_exists(input).await.unwrap_or(false) {
            return Err(TranscoderError::InputNotFound {
                path: input.to_path_buf(),
            });
        }

        let output_dir = self.create_output_dir().await?;

        match self.run_encode(job_id, input, &output_dir, audio_only).await {
            Ok(()) => Ok(output_dir),
            Err(e) => {
                if let Err(rm) = tokio::fs::remove_dir_all(&output_dir).await {
                    warn!(
                        path = %output_dir.display(),
                        error = %rm,
                        "Failed to remove partial encode output"
                    );
                }
                Err(e)
            }
        }
    }

    async fn validate(&self) -> Result<(), TranscoderError> {
        let result = Command::new(&self.config.ffmpeg_path)
            .arg("-version")
            .output()
            .await;

        if let Err(e) = result {
            if e.kind() == std::io::ErrorKind::NotFound {
                return Err(TranscoderError::FfmpegNotFound {
                    path: self.config.ffmpeg_path.clone(),
                });
            }
            return Err(TranscoderError::Io(e));
        }

        tokio::fs::create_dir_all(&self.config.work_dir).await?;
        tokio::fs::create_dir_all(&self.config.log_dir).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcoder::types::Preset;
    use tempfile::TempDir;

    fn qsv_transcoder() -> FfmpegTranscoder {
        FfmpegTranscoder::new(
            TranscoderConfig::default()
                .with_hw_accel(HwAccel::Qsv)
                .with_preset(Preset::Veryslow),
        )
    }

    fn strs(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_build_args_audio_only_qsv() {
        let args = qsv_transcoder().build_args(Path::new("input.mp4"), Path::new("out"), true);

        let expected = strs(&[
            "-hwaccel",
            "qsv",
            "-hwaccel_output_format",
            "qsv",
            "-i",
            "input.mp4",
            "-y",
            "-hide_banner",
            "-progress",
            "-",
            "-r",
            "30",
            "-c:v",
            "h264_qsv",
            "-c:a",
            "aac",
            "-map",
            "0:a",
            "-init_seg_name",
            "init$RepresentationID$.$ext$",
            "-media_seg_name",
            "chunk$RepresentationID$-$Number%05d$.$ext$",
            "-use_template",
            "1",
            "-use_timeline",
            "1",
            "-seg_duration",
            "4",
            "-adaptation_sets",
            "id=0,streams=a",
            "-f",
            "dash",
        ]);
        assert_eq!(&args[..args.len() - 1], expected.as_slice());
        assert_eq!(
            args.last().map(PathBuf::from),
            Some(Path::new("out").join("dash.mpd"))
        );
    }

    #[test]
    fn test_build_args_video_qsv() {
        let args = qsv_transcoder().build_args(Path::new("input.mp4"), Path::new("out"), false);

        let expected = strs(&[
            "-hwaccel",
            "qsv",
            "-hwaccel_output_format",
            "qsv",
            "-i",
            "input.mp4",
            "-y",
            "-hide_banner",
            "-progress",
            "-",
            "-preset",
            "veryslow",
            "-keyint_min",
            "100",
            "-g",
            "100",
            "-sc_threshold",
            "0",
            "-r",
            "30",
            "-c:v",
            "h264_qsv",
            "-c:a",
            "aac",
            "-map",
            "v:0?",
            "-filter:v:0",
            "scale_qsv=-1:360",
            "-b:v:0",
            "365k",
            "-maxrate:0",
            "390k",
            "-bufsize:0",
            "640k",
            "-map",
            "v:0?",
            "-filter:v:1",
            "scale_qsv=-1:720",
            "-b:v:1",
            "4.5M",
            "-maxrate:1",
            "4.8M",
            "-bufsize:1",
            "8M",
            "-map",
            "v:0?",
            "-filter:v:2",
            "scale_qsv=-1:1080",
            "-b:v:2",
            "7.8M",
            "-maxrate:2",
            "8.3M",
            "-bufsize:2",
            "14M",
            "-map",
            "0:a",
            "-init_seg_name",
            "init$RepresentationID$.$ext$",
            "-media_seg_name",
            "chunk$RepresentationID$-$Number%05d$.$ext$",
            "-use_template",
            "1",
            "-use_timeline",
            "1",
            "-seg_duration",
            "4",
            "-adaptation_sets",
            "id=0,streams=a id=1,streams=v",
            "-f",
            "dash",
        ]);
        assert_eq!(&args[..args.len() - 1], expected.as_slice());
    }

    #[test]
    fn test_build_args_software() {
        let transcoder = FfmpegTranscoder::with_defaults();
        let args = transcoder.build_args(Path::new("in.mkv"), Path::new("out"), false);

        assert!(!args.contains(&"-hwaccel".to_string()));
        assert!(args.contains(&"libx264".to_string()));
        assert!(args.contains(&"scale=-1:720".to_string()));
        let pix = args.iter().position(|a| a == "-pix_fmt").unwrap();
        assert_eq!(args[pix + 1], "yuv420p");
        let preset = args.iter().position(|a| a == "-preset").unwrap();
        assert_eq!(args[preset + 1], "medium");
    }

    #[test]
    fn test_extra_args_precede_output() {
        let mut config = TranscoderConfig::default();
        config.extra_ffmpeg_args = vec!["-threads".to_string(), "2".to_string()];
        let args = FfmpegTranscoder::new(config).build_args(Path::new("a"), Path::new("o"), true);

        let threads = args.iter().position(|a| a == "-threads").unwrap();
        let format = args.iter().position(|a| a == "-f").unwrap();
        assert!(threads < format);
    }

    #[test]
    fn test_log_path_flattens_key_separators() {
        let transcoder = FfmpegTranscoder::new(
            TranscoderConfig::default().with_dirs(PathBuf::from("/w"), PathBuf::from("/logs")),
        );
        assert_eq!(
            transcoder.log_path("uploads/2024/clip.mp4"),
            PathBuf::from("/logs/uploads_2024_clip.mp4.log")
        );
    }

    #[tokio::test]
    async fn test_encode_missing_input() {
        let dir = TempDir::new().unwrap();
        let transcoder = FfmpegTranscoder::new(TranscoderConfig::default().with_dirs(
            dir.path().join("work"),
            dir.path().join("logs"),
        ));

        let result = transcoder
            .encode("job", &dir.path().join("missing.mp4"), false)
            .await;
        assert!(matches!(result, Err(TranscoderError::InputNotFound { .. })));
    }

    #[tokio::test]
    async fn test_encode_missing_binary_leaves_no_output() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.mp4");
        tokio::fs::write(&input, b"not really media").await.unwrap();
        let work = dir.path().join("work");
        let transcoder = FfmpegTranscoder::new(
            TranscoderConfig::default()
                .with_ffmpeg_path(PathBuf::from("/nonexistent/ffmpeg-binary"))
                .with_dirs(work.clone(), dir.path().join("logs")),
        );

        let result = transcoder.encode("job", &input, false).await;
        assert!(matches!(result, Err(TranscoderError::FfmpegNotFound { .. })));

        let mut entries = tokio::fs::read_dir(&work).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_validate_missing_binary() {
        let transcoder = FfmpegTranscoder::new(
            TranscoderConfig::default().with_ffmpeg_path(PathBuf::from("/nonexistent/ffmpeg")),
        );
        let result = transcoder.validate().await;
        assert!(matches!(result, Err(TranscoderError::FfmpegNotFound { .. })));
    }
}
