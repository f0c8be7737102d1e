//! # ffmpeg 媒体服务模块
//!
//! 基于外部 `ffmpeg`/`ffprobe` 可执行文件实现 [`MediaService`]：
//!
//! * 探测：`ffprobe -of json`，由 `serde_json` 解析。
//! * 读帧：子进程以 `rgb24` rawvideo 形式把帧流式写到标准输出。
//! * 写帧：先落盘为原始帧文件，完成时按 [`EncoderStrategy`] 列表依次尝试无损编码器，
//!   第一个成功者生效。
//! * 音频：转换为 8 位无符号 WAV，再由 `hound` 读写。
//! * 封装：先尝试直接拷贝音频流，失败后改用 FLAC (同样无损)。

use crate::config::Config;
use crate::error::{Result, StegoError};
use crate::media::{
    AudioRequest, AudioSampleBuffer, FrameSink, FrameSource, MediaService, VideoInfo, read_wav,
    write_wav,
};
use image::RgbImage;
use log::{debug, info, warn};
use serde::Deserialize;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use tempfile::TempDir;

/// 一种无损视频编码方式：名称 + 传给 ffmpeg 的输出参数。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderStrategy {
    pub name: String,
    pub args: Vec<String>,
}

impl EncoderStrategy {
    pub fn new(name: &str, args: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// 默认的无损编码器顺序：FFV1 → libx264rgb (qp 0) → PNG。
pub fn default_encoders() -> Vec<EncoderStrategy> {
    vec![
        EncoderStrategy::new("ffv1", &["-c:v", "ffv1", "-level", "3", "-pix_fmt", "bgr0"]),
        EncoderStrategy::new(
            "x264rgb",
            &["-c:v", "libx264rgb", "-qp", "0", "-preset", "ultrafast", "-pix_fmt", "rgb24"],
        ),
        EncoderStrategy::new("png", &["-c:v", "png", "-pix_fmt", "rgb24"]),
    ]
}

/// 封装时的音频处理方式，按顺序尝试。
fn mux_strategies() -> Vec<EncoderStrategy> {
    vec![
        EncoderStrategy::new("copy", &["-c:a", "copy"]),
        EncoderStrategy::new("flac", &["-c:a", "flac"]),
    ]
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_read_frames: Option<String>,
}

/// 解析 ffprobe 的 `num/den` 帧率。
fn parse_rate(rate: &str) -> Option<f64> {
    let (num, den) = match rate.split_once('/') {
        Some((num, den)) => (num.trim().parse::<f64>().ok()?, den.trim().parse::<f64>().ok()?),
        None => (rate.trim().parse::<f64>().ok()?, 1.0),
    };
    (num > 0.0 && den > 0.0).then_some(num / den)
}

fn parse_probe(path: &Path, json: &[u8]) -> Result<VideoInfo> {
    let output: ProbeOutput = serde_json::from_slice(json)
        .map_err(|e| StegoError::unreadable(path, format!("unexpected ffprobe output: {e}")))?;

    let has_audio = output
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));
    let video = output
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| StegoError::unreadable(path, "no video stream"))?;

    let (width, height) = match (video.width, video.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(StegoError::unreadable(path, "video stream has no dimensions")),
    };
    let fps = video
        .r_frame_rate
        .as_deref()
        .and_then(parse_rate)
        .or_else(|| video.avg_frame_rate.as_deref().and_then(parse_rate))
        .ok_or_else(|| StegoError::unreadable(path, "video stream has no frame rate"))?;
    let frame_count = video
        .nb_read_frames
        .as_deref()
        .and_then(|n| n.trim().parse::<usize>().ok())
        .unwrap_or(0);

    if frame_count == 0 {
        return Err(StegoError::unreadable(path, "video has zero frames"));
    }

    Ok(VideoInfo {
        width,
        height,
        fps,
        frame_count,
        has_audio,
    })
}

fn command_line(program: &Path, args: &[OsString]) -> String {
    std::iter::once(program.as_os_str())
        .chain(args.iter().map(|a| a.as_os_str()))
        .map(|a| a.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

/// 基于 `ffmpeg`/`ffprobe` 可执行文件的媒体服务。
#[derive(Debug, Clone)]
pub struct FfmpegService {
    config: Config,
}

impl FfmpegService {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// `ffmpeg` 与 `ffprobe` 是否都能执行。
    pub fn is_available(&self) -> bool {
        [&self.config.ffmpeg, &self.config.ffprobe].iter().all(|program| {
            Command::new(program)
                .arg("-version")
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .map(|status| status.success())
                .unwrap_or(false)
        })
    }

    fn run(&self, program: &Path, args: &[OsString]) -> Result<Vec<u8>> {
        let line = command_line(program, args);
        debug!("running {line}");

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| StegoError::CodecService {
                command: line.clone(),
                detail: e.to_string(),
            })?;

        if output.status.success() {
            Ok(output.stdout)
        } else {
            Err(StegoError::CodecService {
                command: line,
                detail: format!(
                    "{}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            })
        }
    }

    fn ffmpeg_args(extra: &[&str]) -> Vec<OsString> {
        ["-hide_banner", "-loglevel", "error", "-nostdin", "-y"]
            .iter()
            .chain(extra)
            .map(OsString::from)
            .collect()
    }

    /// 依次尝试各策略，返回第一个成功的策略名；全部失败时合并所有诊断信息。
    fn run_strategies(
        &self,
        strategies: &[EncoderStrategy],
        output: &Path,
        build: impl Fn(&EncoderStrategy) -> Vec<OsString>,
    ) -> Result<String> {
        let mut failures = Vec::new();
        for strategy in strategies {
            match self.run(&self.config.ffmpeg, &build(strategy)) {
                Ok(_) => return Ok(strategy.name.clone()),
                Err(e) => {
                    warn!("strategy '{}' failed: {e}", strategy.name);
                    failures.push(format!("[{}] {e}", strategy.name));
                    if output.exists() {
                        let _ = fs::remove_file(output);
                    }
                }
            }
        }
        Err(StegoError::CodecService {
            command: format!("{} -> {}", self.config.ffmpeg.display(), output.display()),
            detail: if failures.is_empty() {
                "no strategies configured".to_string()
            } else {
                failures.join("; ")
            },
        })
    }

    fn audio_stream_present(&self, path: &Path) -> Result<bool> {
        let args: Vec<OsString> = [
            "-v",
            "error",
            "-select_streams",
            "a",
            "-show_entries",
            "stream=codec_type",
            "-of",
            "json",
        ]
        .iter()
        .map(OsString::from)
        .chain(std::iter::once(path.as_os_str().to_owned()))
        .collect();

        let stdout = self
            .run(&self.config.ffprobe, &args)
            .map_err(|e| StegoError::unreadable(path, e.to_string()))?;
        let output: ProbeOutput = serde_json::from_slice(&stdout)
            .map_err(|e| StegoError::unreadable(path, format!("unexpected ffprobe output: {e}")))?;
        Ok(!output.streams.is_empty())
    }
}

impl MediaService for FfmpegService {
    fn probe(&self, path: &Path) -> Result<VideoInfo> {
        if !path.is_file() {
            return Err(StegoError::unreadable(path, "file not found"));
        }

        let args: Vec<OsString> = [
            "-v",
            "error",
            "-count_frames",
            "-show_entries",
            "stream=codec_type,width,height,r_frame_rate,avg_frame_rate,nb_read_frames",
            "-of",
            "json",
        ]
        .iter()
        .map(OsString::from)
        .chain(std::iter::once(path.as_os_str().to_owned()))
        .collect();

        let stdout = self
            .run(&self.config.ffprobe, &args)
            .map_err(|e| StegoError::unreadable(path, e.to_string()))?;
        let info = parse_probe(path, &stdout)?;
        debug!("probed {}: {info:?}", path.display());
        Ok(info)
    }

    fn open_reader(&self, path: &Path) -> Result<Box<dyn FrameSource>> {
        let info = self.probe(path)?;

        let mut args = Self::ffmpeg_args(&["-i"]);
        args.push(path.as_os_str().to_owned());
        args.extend(
            ["-map", "0:v:0", "-f", "rawvideo", "-pix_fmt", "rgb24", "-"]
                .iter()
                .map(OsString::from),
        );

        let dir = self.config.working_dir()?;
        let source = FfmpegSource::spawn(&self.config.ffmpeg, &args, info, dir)?;
        Ok(Box::new(source))
    }

    fn open_writer(
        &self,
        path: &Path,
        fps: f64,
        width: u32,
        height: u32,
    ) -> Result<Box<dyn FrameSink>> {
        let dir = self.config.working_dir()?;
        let raw_path = dir.path().join("frames.rgb");
        let raw = BufWriter::new(File::create(&raw_path)?);

        Ok(Box::new(FfmpegSink {
            service: self.clone(),
            output: path.to_path_buf(),
            fps,
            width,
            height,
            raw,
            raw_path,
            frames: 0,
            _dir: dir,
        }))
    }

    fn read_audio(&self, path: &Path, request: &AudioRequest) -> Result<Option<AudioSampleBuffer>> {
        if !self.audio_stream_present(path)? {
            return Ok(None);
        }

        let dir = self.config.working_dir()?;
        let wav = dir.path().join("audio.wav");

        let mut args = Self::ffmpeg_args(&["-i"]);
        args.push(path.as_os_str().to_owned());
        if let Some(duration) = request.max_duration {
            args.push("-t".into());
            args.push(format!("{duration:.6}").into());
        }
        args.extend(["-map", "0:a:0", "-vn", "-acodec", "pcm_u8"].iter().map(OsString::from));
        if let Some(format) = request.format {
            args.push("-ar".into());
            args.push(format.sample_rate.to_string().into());
            args.push("-ac".into());
            args.push(format.channels.to_string().into());
        }
        args.push(wav.as_os_str().to_owned());

        self.run(&self.config.ffmpeg, &args)?;
        let buffer = read_wav(&wav)?;
        debug!(
            "read {} audio samples from {}",
            buffer.samples.len(),
            path.display()
        );
        Ok(Some(buffer))
    }

    fn write_audio(&self, buffer: &AudioSampleBuffer, path: &Path) -> Result<()> {
        write_wav(buffer, path)
    }

    fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<()> {
        let strategy = self.run_strategies(&mux_strategies(), output, |strategy| {
            let mut args = Self::ffmpeg_args(&["-i"]);
            args.push(video.as_os_str().to_owned());
            args.push("-i".into());
            args.push(audio.as_os_str().to_owned());
            args.extend(
                ["-map", "0:v:0", "-map", "1:a:0", "-c:v", "copy"]
                    .iter()
                    .map(OsString::from),
            );
            args.extend(strategy.args.iter().map(OsString::from));
            args.push(output.as_os_str().to_owned());
            args
        })?;
        info!("muxed {} with audio ({strategy})", output.display());
        Ok(())
    }
}

/// 从 ffmpeg 子进程的标准输出逐帧读取 rawvideo。
///
/// 子进程的标准错误写入私有临时目录中的文件，失败时附加到错误信息中。
struct FfmpegSource {
    info: VideoInfo,
    frame_len: usize,
    reader: BufReader<ChildStdout>,
    child: Child,
    command: String,
    stderr_path: PathBuf,
    done: bool,
    _dir: TempDir,
}

impl FfmpegSource {
    fn spawn(program: &Path, args: &[OsString], info: VideoInfo, dir: TempDir) -> Result<Self> {
        let command = command_line(program, args);
        debug!("spawning {command}");

        let stderr_path = dir.path().join("decoder.log");
        let stderr = File::create(&stderr_path)?;
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::from(stderr))
            .spawn()
            .map_err(|e| StegoError::CodecService {
                command: command.clone(),
                detail: e.to_string(),
            })?;

        let stdout = child.stdout.take().ok_or_else(|| StegoError::CodecService {
            command: command.clone(),
            detail: "decoder produced no output pipe".to_string(),
        })?;

        Ok(Self {
            frame_len: info.width as usize * info.height as usize * 3,
            info,
            reader: BufReader::new(stdout),
            child,
            command,
            stderr_path,
            done: false,
            _dir: dir,
        })
    }

    /// 子进程迄今写出的诊断信息。
    fn diagnostics(&self) -> String {
        fs::read_to_string(&self.stderr_path)
            .map(|text| text.trim().to_string())
            .unwrap_or_default()
    }

    fn failure(&self, summary: String) -> StegoError {
        let diagnostics = self.diagnostics();
        StegoError::CodecService {
            command: self.command.clone(),
            detail: if diagnostics.is_empty() {
                summary
            } else {
                format!("{summary}: {diagnostics}")
            },
        }
    }

    fn fill(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }
}

impl FrameSource for FfmpegSource {
    fn info(&self) -> &VideoInfo {
        &self.info
    }

    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        if self.done {
            return Ok(None);
        }

        let mut buf = vec![0u8; self.frame_len];
        let filled = self.fill(&mut buf)?;
        if filled == 0 {
            self.done = true;
            let status = self.child.wait()?;
            if !status.success() {
                return Err(self.failure(format!("decoder exited with {status}")));
            }
            return Ok(None);
        }
        if filled < self.frame_len {
            self.done = true;
            let _ = self.child.wait();
            return Err(self.failure(format!(
                "truncated frame: {filled} of {} bytes",
                self.frame_len
            )));
        }

        RgbImage::from_raw(self.info.width, self.info.height, buf)
            .map(Some)
            .ok_or_else(|| StegoError::CodecService {
                command: self.command.clone(),
                detail: "frame buffer size mismatch".to_string(),
            })
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        if !self.done {
            let _ = self.child.kill();
        }
        let _ = self.child.wait();
    }
}

/// 把帧写入临时原始帧文件，完成时再交给无损编码器。
struct FfmpegSink {
    service: FfmpegService,
    output: PathBuf,
    fps: f64,
    width: u32,
    height: u32,
    raw: BufWriter<File>,
    raw_path: PathBuf,
    frames: usize,
    _dir: TempDir,
}

impl FrameSink for FfmpegSink {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        if frame.dimensions() != (self.width, self.height) {
            return Err(StegoError::CodecService {
                command: format!("write {}", self.output.display()),
                detail: format!(
                    "frame is {}x{}, writer expects {}x{}",
                    frame.width(),
                    frame.height(),
                    self.width,
                    self.height
                ),
            });
        }
        self.raw.write_all(frame.as_raw())?;
        self.frames += 1;
        Ok(())
    }

    fn frames_written(&self) -> usize {
        self.frames
    }

    fn finish(mut self: Box<Self>) -> Result<()> {
        self.raw.flush()?;

        let size = format!("{}x{}", self.width, self.height);
        let rate = format!("{}", self.fps);
        let encoder = self
            .service
            .run_strategies(&self.service.config.encoders, &self.output, |strategy| {
                let mut args = FfmpegService::ffmpeg_args(&[
                    "-f",
                    "rawvideo",
                    "-pix_fmt",
                    "rgb24",
                    "-s",
                    size.as_str(),
                    "-r",
                    rate.as_str(),
                    "-i",
                ]);
                args.push(self.raw_path.as_os_str().to_owned());
                args.extend(strategy.args.iter().map(OsString::from));
                args.push(self.output.as_os_str().to_owned());
                args
            })?;

        info!(
            "wrote {} frames to {} ({encoder})",
            self.frames,
            self.output.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_rates_parse() {
        assert_eq!(parse_rate("30/1"), Some(30.0));
        assert!((parse_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert_eq!(parse_rate("25"), Some(25.0));
        assert_eq!(parse_rate("0/0"), None);
        assert_eq!(parse_rate("abc"), None);
    }

    #[test]
    fn probe_json_is_parsed() {
        let json = br#"{
            "programs": [],
            "streams": [
                { "codec_type": "video", "width": 320, "height": 240,
                  "r_frame_rate": "30/1", "avg_frame_rate": "30/1", "nb_read_frames": "30" },
                { "codec_type": "audio", "r_frame_rate": "0/0", "nb_read_frames": "44" }
            ]
        }"#;
        let info = parse_probe(Path::new("cover.mkv"), json).unwrap();
        assert_eq!(
            info,
            VideoInfo {
                width: 320,
                height: 240,
                fps: 30.0,
                frame_count: 30,
                has_audio: true,
            }
        );
    }

    #[test]
    fn zero_frames_is_unreadable() {
        let json = br#"{ "streams": [ { "codec_type": "video", "width": 8, "height": 8,
            "r_frame_rate": "30/1", "nb_read_frames": "0" } ] }"#;
        assert!(matches!(
            parse_probe(Path::new("empty.mkv"), json),
            Err(StegoError::UnreadableMedia { .. })
        ));

        let audio_only = br#"{ "streams": [ { "codec_type": "audio" } ] }"#;
        assert!(matches!(
            parse_probe(Path::new("song.mkv"), audio_only),
            Err(StegoError::UnreadableMedia { .. })
        ));
    }

    #[test]
    fn missing_executable_is_a_codec_service_error() {
        let config = Config {
            ffmpeg: PathBuf::from("/nonexistent/ffmpeg-for-tests"),
            ffprobe: PathBuf::from("/nonexistent/ffprobe-for-tests"),
            ..Default::default()
        };
        let service = FfmpegService::new(&config);
        assert!(!service.is_available());

        let result = service.run(&config.ffmpeg, &[OsString::from("-version")]);
        assert!(matches!(result, Err(StegoError::CodecService { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn decoder_failure_carries_its_diagnostics() {
        let info = VideoInfo {
            width: 2,
            height: 2,
            fps: 25.0,
            frame_count: 1,
            has_audio: false,
        };
        let args = [
            OsString::from("-c"),
            OsString::from("echo 'moov atom not found' >&2; exit 3"),
        ];
        let dir = Config::default().working_dir().unwrap();
        let mut source = FfmpegSource::spawn(Path::new("/bin/sh"), &args, info, dir).unwrap();

        let err = source.next_frame().unwrap_err();
        assert!(matches!(err, StegoError::CodecService { .. }));
        let text = err.to_string();
        assert!(text.contains("moov atom not found"), "{text}");
        assert!(source.next_frame().unwrap().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn short_decoder_output_is_a_truncated_frame() {
        let info = VideoInfo {
            width: 2,
            height: 2,
            fps: 25.0,
            frame_count: 1,
            has_audio: false,
        };
        let args = [
            OsString::from("-c"),
            OsString::from("printf abc; echo 'stream ended early' >&2"),
        ];
        let dir = Config::default().working_dir().unwrap();
        let mut source = FfmpegSource::spawn(Path::new("/bin/sh"), &args, info, dir).unwrap();

        let text = source.next_frame().unwrap_err().to_string();
        assert!(text.contains("truncated frame: 3 of 12 bytes"), "{text}");
        assert!(text.contains("stream ended early"), "{text}");
    }

    #[test]
    fn all_strategies_failing_reports_each() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            ffmpeg: PathBuf::from("/nonexistent/ffmpeg-for-tests"),
            ..Default::default()
        };
        let service = FfmpegService::new(&config);
        let output = dir.path().join("out.mkv");

        let err = service
            .run_strategies(&default_encoders(), &output, |_| vec![OsString::from("-version")])
            .unwrap_err();
        let text = err.to_string();
        assert!(text.contains("[ffv1]"));
        assert!(text.contains("[x264rgb]"));
        assert!(text.contains("[png]"));
    }
}
