//! Video decoding and encoding through external `ffmpeg` / `ffprobe` processes.
//!
//! Frames travel as raw `rgb24` over pipes: one decoder child writes them to stdout and one
//! encoder child reads them from stdin. Both are killed if dropped before completion.

use std::{
    env,
    io::{ErrorKind, Read, Write},
    path::{Path, PathBuf},
    process::{Child, ChildStdin, ChildStdout, Command, Stdio},
    thread::{self, JoinHandle},
};

use anyhow::{Context, Result, anyhow, bail};
use image::RgbImage;
use log::{debug, warn};
use serde::Deserialize;

use anonymizer_utils::config::VideoSettings;

use super::codec::{MediaCodec, VideoInfo, VideoReader, VideoWriter};

const FFMPEG_ENV: &str = "ANONYMIZER_FFMPEG";
const FFPROBE_ENV: &str = "ANONYMIZER_FFPROBE";

/// Locations of the ffmpeg binaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FfmpegTools {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl FfmpegTools {
    /// Resolve each binary: environment override first, then the configured path, then
    /// whatever `PATH` provides.
    pub fn resolve(settings: &VideoSettings) -> Self {
        Self {
            ffmpeg: resolve_tool(FFMPEG_ENV, settings.ffmpeg.as_deref(), "ffmpeg"),
            ffprobe: resolve_tool(FFPROBE_ENV, settings.ffprobe.as_deref(), "ffprobe"),
        }
    }

    /// Both binaries start and report a version.
    pub fn available(&self) -> bool {
        [&self.ffmpeg, &self.ffprobe].iter().all(|tool| {
            Command::new(tool)
                .arg("-version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .map(|status| status.success())
                .unwrap_or(false)
        })
    }
}

impl Default for FfmpegTools {
    fn default() -> Self {
        Self::resolve(&VideoSettings::default())
    }
}

fn resolve_tool(env_key: &str, configured: Option<&Path>, default_name: &str) -> PathBuf {
    if let Ok(value) = env::var(env_key)
        && !value.trim().is_empty()
    {
        return PathBuf::from(value);
    }
    configured
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(default_name))
}

/// Production [`MediaCodec`]: `image` for stills, ffmpeg for video.
#[derive(Debug, Clone)]
pub struct FfmpegCodec {
    tools: FfmpegTools,
    video_codec: String,
    crf: u8,
}

impl FfmpegCodec {
    pub fn new(tools: FfmpegTools, video_codec: impl Into<String>, crf: u8) -> Self {
        Self {
            tools,
            video_codec: video_codec.into(),
            crf,
        }
    }

    pub fn from_settings(settings: &VideoSettings) -> Self {
        Self::new(
            FfmpegTools::resolve(settings),
            settings.codec.clone(),
            settings.crf,
        )
    }

    pub fn tools(&self) -> &FfmpegTools {
        &self.tools
    }

    /// Read stream properties of the first video stream.
    pub fn probe(&self, path: &Path) -> Result<VideoInfo> {
        let output = Command::new(&self.tools.ffprobe)
            .args(["-v", "error", "-select_streams", "v:0", "-show_streams"])
            .args(["-show_format", "-print_format", "json"])
            .arg(path)
            .output()
            .with_context(|| format!("failed to run {}", self.tools.ffprobe.display()))?;
        if !output.status.success() {
            bail!(
                "ffprobe failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        let probe: ProbeOutput =
            serde_json::from_slice(&output.stdout).context("failed to parse ffprobe output")?;
        probe.into_info()
    }
}

impl Default for FfmpegCodec {
    fn default() -> Self {
        Self::from_settings(&VideoSettings::default())
    }
}

impl MediaCodec for FfmpegCodec {
    fn open_video(&self, path: &Path) -> Result<Box<dyn VideoReader>> {
        let info = self.probe(path)?;
        debug!(
            "Decoding {} ({}x{}, {} fps, ~{} frames)",
            path.display(),
            info.width,
            info.height,
            info.frame_rate,
            info.frame_count
        );
        let mut child = Command::new(&self.tools.ffmpeg)
            .args(["-v", "error", "-nostdin", "-noautorotate", "-i"])
            .arg(path)
            .args(["-map", "0:v:0", "-fps_mode", "passthrough"])
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to start {}", self.tools.ffmpeg.display()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("ffmpeg decoder has no stdout"))?;
        let stderr = drain_stderr(&mut child);

        Ok(Box::new(FfmpegReader {
            frame_len: info.width as usize * info.height as usize * 3,
            info,
            child,
            stdout,
            stderr: Some(stderr),
        }))
    }

    fn create_video(&self, path: &Path, info: &VideoInfo) -> Result<Box<dyn VideoWriter>> {
        let size = format!("{}x{}", info.width, info.height);
        let pixel_format = if info.width % 2 == 0 && info.height % 2 == 0 {
            "yuv420p"
        } else {
            "yuv444p"
        };
        let mut command = Command::new(&self.tools.ffmpeg);
        command
            .args(["-v", "error", "-y", "-f", "rawvideo", "-pix_fmt", "rgb24"])
            .args(["-s", &size, "-r", &info.frame_rate, "-i", "-", "-an"])
            .args(["-c:v", &self.video_codec]);
        if self.video_codec.starts_with("libx26") {
            command.args(["-crf", &self.crf.to_string()]);
        }
        command
            .args(["-pix_fmt", pixel_format, "-movflags", "+faststart"])
            .arg(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let mut child = command
            .spawn()
            .with_context(|| format!("failed to start {}", self.tools.ffmpeg.display()))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("ffmpeg encoder has no stdin"))?;
        let stderr = drain_stderr(&mut child);

        Ok(Box::new(FfmpegWriter {
            dimensions: (info.width, info.height),
            child,
            stdin: Some(stdin),
            stderr: Some(stderr),
            finished: false,
        }))
    }
}

// Collect stderr on a side thread so a chatty child never blocks on a full pipe.
fn drain_stderr(child: &mut Child) -> JoinHandle<String> {
    let pipe = child.stderr.take();
    thread::spawn(move || {
        let mut text = String::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_string(&mut text);
        }
        text
    })
}

fn join_stderr(handle: JoinHandle<String>) -> String {
    handle.join().unwrap_or_default().trim().to_string()
}

struct FfmpegReader {
    info: VideoInfo,
    frame_len: usize,
    child: Child,
    stdout: ChildStdout,
    stderr: Option<JoinHandle<String>>,
}

impl FfmpegReader {
    fn fail(&mut self, context: &str) -> anyhow::Error {
        let _ = self.child.kill();
        let _ = self.child.wait();
        let stderr = self.stderr.take().map(join_stderr).unwrap_or_default();
        anyhow!("{context}: {stderr}")
    }
}

impl VideoReader for FfmpegReader {
    fn info(&self) -> &VideoInfo {
        &self.info
    }

    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        let mut buffer = vec![0u8; self.frame_len];
        let mut filled = 0;
        while filled < buffer.len() {
            match self.stdout.read(&mut buffer[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(self.fail(&format!("reading decoded frame failed: {err}"))),
            }
        }

        if filled == 0 {
            let status = self.child.wait().context("failed to wait for ffmpeg decoder")?;
            if !status.success() {
                return Err(self.fail(&format!("ffmpeg decoder exited with {status}")));
            }
            return Ok(None);
        }
        if filled < buffer.len() {
            return Err(self.fail("ffmpeg decoder produced a truncated frame"));
        }
        RgbImage::from_raw(self.info.width, self.info.height, buffer)
            .map(Some)
            .ok_or_else(|| anyhow!("decoded frame does not match the probed size"))
    }
}

impl Drop for FfmpegReader {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

struct FfmpegWriter {
    dimensions: (u32, u32),
    child: Child,
    stdin: Option<ChildStdin>,
    stderr: Option<JoinHandle<String>>,
    finished: bool,
}

impl FfmpegWriter {
    fn stderr_text(&mut self) -> String {
        self.stderr.take().map(join_stderr).unwrap_or_default()
    }
}

impl VideoWriter for FfmpegWriter {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        if frame.dimensions() != self.dimensions {
            bail!(
                "frame is {}x{}, encoder expects {}x{}",
                frame.width(),
                frame.height(),
                self.dimensions.0,
                self.dimensions.1
            );
        }
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| anyhow!("ffmpeg encoder input already closed"))?;
        if let Err(err) = stdin.write_all(frame.as_raw()) {
            self.stdin = None;
            let _ = self.child.wait();
            bail!("ffmpeg encoder rejected frame ({err}): {}", self.stderr_text());
        }
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<()> {
        // Closing stdin signals end of stream.
        self.stdin = None;
        let status = self.child.wait().context("failed to wait for ffmpeg encoder")?;
        self.finished = true;
        if !status.success() {
            bail!("ffmpeg encoder exited with {status}: {}", self.stderr_text());
        }
        Ok(())
    }
}

impl Drop for FfmpegWriter {
    fn drop(&mut self) {
        if !self.finished {
            self.stdin = None;
            if let Ok(None) = self.child.try_wait() {
                warn!("Killing unfinished ffmpeg encoder");
                let _ = self.child.kill();
                let _ = self.child.wait();
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

impl ProbeOutput {
    fn into_info(self) -> Result<VideoInfo> {
        let stream = self
            .streams
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("no video stream found"))?;
        let (width, height) = match (stream.width, stream.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
            _ => bail!("video stream has no frame size"),
        };

        let frame_rate = [stream.r_frame_rate, stream.avg_frame_rate]
            .into_iter()
            .flatten()
            .find(|rate| parse_frame_rate(rate).is_some_and(|fps| fps > 0.0))
            .ok_or_else(|| anyhow!("video stream has no usable frame rate"))?;
        let fps = parse_frame_rate(&frame_rate).unwrap_or_default();

        let counted = stream.nb_frames.as_deref().and_then(|n| n.parse::<u64>().ok());
        let estimated = || {
            stream
                .duration
                .as_deref()
                .or(self.format.as_ref().and_then(|f| f.duration.as_deref()))
                .and_then(|d| d.parse::<f64>().ok())
                .map(|seconds| (seconds * fps).round() as u64)
        };
        let frame_count = counted.or_else(estimated).unwrap_or(0);
        if frame_count == 0 {
            bail!("video reports zero frames");
        }

        Ok(VideoInfo {
            width,
            height,
            frame_rate,
            frame_count,
        })
    }
}

/// Parse `"30000/1001"` or `"25"` into frames per second.
fn parse_frame_rate(rate: &str) -> Option<f64> {
    if let Some((num, den)) = rate.split_once('/') {
        let num: f64 = num.trim().parse().ok()?;
        let den: f64 = den.trim().parse().ok()?;
        return (den > 0.0).then(|| num / den);
    }
    rate.trim().parse().ok()
}
