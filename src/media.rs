//! # 媒体服务接口模块
//!
//! 编解码器与外部媒体编解码服务之间的边界：
//! 顺序读取原始帧的 [`FrameSource`]、顺序写入原始帧的 [`FrameSink`]，
//! 以及负责探测、音频读写与封装的 [`MediaService`]。
//!
//! 写出的容器必须对写入的像素值无损，这是 LSB/DCT 能够正确提取的前提。

use crate::error::{Result, StegoError};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use image::RgbImage;
use std::path::Path;

/// 视频的基本信息。
#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub frame_count: usize,
    pub has_audio: bool,
}

impl VideoInfo {
    /// 时长 (秒)。帧率无效时为 0。
    pub fn duration(&self) -> f64 {
        if self.fps > 0.0 {
            self.frame_count as f64 / self.fps
        } else {
            0.0
        }
    }
}

/// 音频的采样率与声道数。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

/// 无符号 8 位 PCM 样本，多声道交错存放。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSampleBuffer {
    pub format: AudioFormat,
    pub samples: Vec<u8>,
}

impl AudioSampleBuffer {
    pub fn new(format: AudioFormat, samples: Vec<u8>) -> Self {
        Self { format, samples }
    }

    /// 用 0 补齐到 `len` 个样本；已经足够长时不做任何事。
    pub fn pad_to(&mut self, len: usize) {
        if self.samples.len() < len {
            self.samples.resize(len, 0);
        }
    }
}

/// 读取音频时的可选约束。
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AudioRequest {
    /// 只读取开头这么多秒。
    pub max_duration: Option<f64>,
    /// 重采样到指定格式。
    pub format: Option<AudioFormat>,
}

/// 按原始解码顺序逐帧产出 RGB 帧。
pub trait FrameSource {
    fn info(&self) -> &VideoInfo;

    /// 下一帧；没有更多帧时返回 `None`。
    fn next_frame(&mut self) -> Result<Option<RgbImage>>;
}

/// 按顺序接收帧，并在 [`FrameSink::finish`] 时生成无损容器。
pub trait FrameSink {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()>;

    fn frames_written(&self) -> usize;

    /// 完成写入。只有成功返回后输出文件才完整可用。
    fn finish(self: Box<Self>) -> Result<()>;
}

/// 外部媒体编解码服务。
pub trait MediaService {
    fn probe(&self, path: &Path) -> Result<VideoInfo>;

    /// 打开视频进行逐帧读取。容器无法打开或没有任何帧时返回
    /// [`StegoError::UnreadableMedia`]。
    fn open_reader(&self, path: &Path) -> Result<Box<dyn FrameSource>>;

    fn open_writer(&self, path: &Path, fps: f64, width: u32, height: u32)
    -> Result<Box<dyn FrameSink>>;

    /// 读取音轨为无符号 8 位 PCM；文件没有音轨时返回 `None`。
    fn read_audio(&self, path: &Path, request: &AudioRequest) -> Result<Option<AudioSampleBuffer>>;

    fn write_audio(&self, buffer: &AudioSampleBuffer, path: &Path) -> Result<()>;

    /// 将 `video` 的视频流与 `audio` 中的第一条音频流封装到同一容器。
    ///
    /// `audio` 可以是 [`MediaService::write_audio`] 写出的 WAV，也可以是任意带音轨的
    /// 视频容器；两条流都尽量原样拷贝，不重新编码。
    fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<()>;
}

/// 从 WAV 文件读取 8 位无符号 PCM。
pub fn read_wav(path: &Path) -> Result<AudioSampleBuffer> {
    let reader =
        WavReader::open(path).map_err(|e| StegoError::unreadable(path, e.to_string()))?;
    let spec = reader.spec();

    if spec.sample_format != SampleFormat::Int || spec.bits_per_sample != 8 {
        return Err(StegoError::unreadable(
            path,
            format!(
                "only 8-bit PCM WAV is supported, got {} bits {:?}",
                spec.bits_per_sample, spec.sample_format
            ),
        ));
    }

    // hound 把 8 位无符号样本映射为有符号 (减去 128)，这里还原
    let samples = reader
        .into_samples::<i8>()
        .map(|s| s.map(|v| (v as i16 + 128) as u8))
        .collect::<std::result::Result<Vec<u8>, _>>()
        .map_err(|e| StegoError::unreadable(path, e.to_string()))?;

    Ok(AudioSampleBuffer::new(
        AudioFormat {
            sample_rate: spec.sample_rate,
            channels: spec.channels,
        },
        samples,
    ))
}

/// 将 8 位无符号 PCM 写为 WAV 文件。
pub fn write_wav(buffer: &AudioSampleBuffer, path: &Path) -> Result<()> {
    let spec = WavSpec {
        channels: buffer.format.channels,
        sample_rate: buffer.format.sample_rate,
        bits_per_sample: 8,
        sample_format: SampleFormat::Int,
    };

    let wav_error = |e: hound::Error| StegoError::CodecService {
        command: format!("write {}", path.display()),
        detail: e.to_string(),
    };

    let mut writer = WavWriter::create(path, spec).map_err(wav_error)?;
    for &sample in &buffer.samples {
        writer
            .write_sample((sample as i16 - 128) as i8)
            .map_err(wav_error)?;
    }
    writer.finalize().map_err(wav_error)
}
