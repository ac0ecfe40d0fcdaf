//! ffmpeg/ffprobe plumbing. Probing and audio muxing go through the async
//! command API; the frame encoder and background decoders are synchronous
//! pipes because the compositor produces frames in a tight blocking loop.

use anyhow::{Context, Result};
use std::io::{Read, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command as StdCommand, Stdio};
use tokio::process::Command;

async fn run_cmd(args: &[String]) -> Result<()> {
    if args.is_empty() {
        return Ok(());
    }

    let mut cmd = Command::new(&args[0]);
    if args.len() > 1 {
        cmd.args(&args[1..]);
    }

    let status = cmd.status().await.context("Command execution failed")?;
    if !status.success() {
        return Err(anyhow::anyhow!("Command failed: {:?}", args));
    }

    Ok(())
}

pub async fn ffprobe_duration_seconds(path: &Path) -> Result<f64> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .output()
        .await
        .context("ffprobe duration failed")?;

    if !output.status.success() {
        return Err(anyhow::anyhow!("ffprobe failed"));
    }

    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let duration = text.parse::<f64>().unwrap_or(-1.0);
    if duration <= 0.1 {
        return Err(anyhow::anyhow!("Invalid duration"));
    }
    Ok(duration)
}

/// Encoder accepting raw RGB24 frames on stdin and muxing them with the
/// master narration WAV into an H.264 MP4.
pub struct FrameEncoder {
    child: Child,
    stdin: Option<ChildStdin>,
    frame_len: usize,
}

impl FrameEncoder {
    pub fn spawn(
        width: u32,
        height: u32,
        fps: u32,
        audio_path: &Path,
        out_path: &Path,
    ) -> Result<Self> {
        let video_size = format!("{}x{}", width, height);
        let framerate = fps.to_string();
        let mut child = StdCommand::new("ffmpeg")
            .args([
                "-y",
                "-hide_banner",
                "-loglevel",
                "error",
                "-f",
                "rawvideo",
                "-pixel_format",
                "rgb24",
                "-video_size",
                video_size.as_str(),
                "-framerate",
                framerate.as_str(),
                "-i",
                "-",
            ])
            .arg("-i")
            .arg(audio_path)
            .args([
                "-c:v",
                "libx264",
                "-pix_fmt",
                "yuv420p",
                "-preset",
                "medium",
                "-crf",
                "22",
                "-c:a",
                "aac",
                "-b:a",
                "192k",
                "-movflags",
                "+faststart",
                "-shortest",
            ])
            .arg(out_path)
            .stdin(Stdio::piped())
            .spawn()
            .context("failed to spawn ffmpeg encoder")?;

        let stdin = child.stdin.take();
        Ok(Self {
            child,
            stdin,
            frame_len: (width * height * 3) as usize,
        })
    }

    pub fn write_frame(&mut self, rgb: &[u8]) -> Result<()> {
        anyhow::ensure!(rgb.len() == self.frame_len, "bad frame size: {}", rgb.len());
        self.stdin
            .as_mut()
            .context("encoder stdin closed")?
            .write_all(rgb)
            .context("frame write failed")?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        drop(self.stdin.take());
        let status = self.child.wait().context("encoder wait failed")?;
        if !status.success() {
            return Err(anyhow::anyhow!("ffmpeg encoder exited with {}", status));
        }
        Ok(())
    }
}

/// Streaming decoder for one background video: loops the source, scales it
/// to the canvas, and hands out one RGB24 frame per call.
pub struct BackgroundStream {
    child: Child,
    stdout: ChildStdout,
    frame_len: usize,
}

impl BackgroundStream {
    pub fn spawn(video_path: &Path, width: u32, height: u32, fps: u32) -> Result<Self> {
        let filter = format!("scale={}:{},fps={}", width, height, fps);
        let mut child = StdCommand::new("ffmpeg")
            .args(["-hide_banner", "-loglevel", "error", "-stream_loop", "-1", "-i"])
            .arg(video_path)
            .args([
                "-an",
                "-vf",
                filter.as_str(),
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgb24",
                "-",
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("failed to spawn decoder for {}", video_path.display()))?;

        let stdout = child
            .stdout
            .take()
            .context("decoder stdout unavailable")?;

        Ok(Self {
            child,
            stdout,
            frame_len: (width * height * 3) as usize,
        })
    }

    /// Next frame, or None once the stream ends or breaks.
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        let mut buf = vec![0u8; self.frame_len];
        match self.stdout.read_exact(&mut buf) {
            Ok(()) => Some(buf),
            Err(_) => None,
        }
    }
}

impl Drop for BackgroundStream {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Mix looping background music under the narration track of a finished
/// video. `duration=first` pins the output to the narration length.
pub async fn mix_bgm(
    video_in: &Path,
    bgm_in: &Path,
    bgm_volume: f64,
    video_out: &Path,
) -> Result<bool> {
    let args = vec![
        "ffmpeg".to_string(),
        "-y".to_string(),
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-i".to_string(),
        video_in.display().to_string(),
        "-stream_loop".to_string(),
        "-1".to_string(),
        "-i".to_string(),
        bgm_in.display().to_string(),
        "-filter_complex".to_string(),
        format!(
            "[1:a]volume={:.3}[bgm];[0:a][bgm]amix=inputs=2:duration=first:dropout_transition=2[a]",
            bgm_volume
        ),
        "-map".to_string(),
        "0:v".to_string(),
        "-map".to_string(),
        "[a]".to_string(),
        "-c:v".to_string(),
        "copy".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        "192k".to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        video_out.display().to_string(),
    ];
    run_cmd(&args).await?;
    Ok(video_out.exists())
}
