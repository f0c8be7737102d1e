//! 集成测试共用的内存媒体服务与测试数据生成函数。

#![allow(dead_code)]

use image::{Rgb, RgbImage};
use rand::RngCore;
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use vid_hide::media::{
    AudioFormat, AudioRequest, AudioSampleBuffer, FrameSink, FrameSource, MediaService, VideoInfo,
};
use vid_hide::{Result, StegoError};

/// 保存在内存中的一段视频。
#[derive(Debug, Clone)]
pub struct StoredVideo {
    pub fps: f64,
    pub frames: Vec<RgbImage>,
    pub audio: Option<AudioSampleBuffer>,
}

impl StoredVideo {
    pub fn info(&self) -> VideoInfo {
        let (width, height) = self.frames.first().map_or((0, 0), |f| f.dimensions());
        VideoInfo {
            width,
            height,
            fps: self.fps,
            frame_count: self.frames.len(),
            has_audio: self.audio.is_some(),
        }
    }
}

/// 把视频保存在内存中的 [`MediaService`]，写出完成时在磁盘上留下占位文件，
/// 以便路径检查与真实服务一致。
#[derive(Debug, Clone, Default)]
pub struct MemoryMedia {
    videos: Arc<Mutex<HashMap<PathBuf, StoredVideo>>>,
    audio: Arc<Mutex<HashMap<PathBuf, AudioSampleBuffer>>>,
    writers: Arc<AtomicUsize>,
    audio_reads: Arc<AtomicUsize>,
    fail_mux: Arc<AtomicBool>,
}

impl MemoryMedia {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_video(&self, path: &Path, video: StoredVideo) {
        fs::write(path, b"memory video").expect("Failed to create placeholder file.");
        self.videos
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), video);
    }

    pub fn video(&self, path: &Path) -> Option<StoredVideo> {
        self.videos.lock().unwrap().get(path).cloned()
    }

    pub fn exists(&self, path: &Path) -> bool {
        self.videos.lock().unwrap().contains_key(path)
    }

    /// 迄今打开过的写入器数量。
    pub fn writers_opened(&self) -> usize {
        self.writers.load(Ordering::SeqCst)
    }

    /// 迄今解码音轨的次数。
    pub fn audio_reads(&self) -> usize {
        self.audio_reads.load(Ordering::SeqCst)
    }

    /// 之后的每次封装都以编解码服务错误失败。
    pub fn fail_mux(&self) {
        self.fail_mux.store(true, Ordering::SeqCst);
    }

    fn stored(&self, path: &Path) -> Result<StoredVideo> {
        self.video(path)
            .ok_or_else(|| StegoError::UnreadableMedia {
                path: path.to_path_buf(),
                detail: "no such video".to_string(),
            })
    }
}

impl MediaService for MemoryMedia {
    fn probe(&self, path: &Path) -> Result<VideoInfo> {
        let video = self.stored(path)?;
        if video.frames.is_empty() {
            return Err(StegoError::UnreadableMedia {
                path: path.to_path_buf(),
                detail: "video has zero frames".to_string(),
            });
        }
        Ok(video.info())
    }

    fn open_reader(&self, path: &Path) -> Result<Box<dyn FrameSource>> {
        let info = self.probe(path)?;
        let video = self.stored(path)?;
        Ok(Box::new(MemorySource {
            info,
            frames: video.frames.into(),
        }))
    }

    fn open_writer(
        &self,
        path: &Path,
        fps: f64,
        width: u32,
        height: u32,
    ) -> Result<Box<dyn FrameSink>> {
        self.writers.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemorySink {
            media: self.clone(),
            path: path.to_path_buf(),
            fps,
            size: (width, height),
            frames: Vec::new(),
        }))
    }

    fn read_audio(&self, path: &Path, request: &AudioRequest) -> Result<Option<AudioSampleBuffer>> {
        self.audio_reads.fetch_add(1, Ordering::SeqCst);
        let Some(mut audio) = self.stored(path)?.audio else {
            return Ok(None);
        };
        if let Some(format) = request.format {
            audio = resample(&audio, format);
        }
        if let Some(duration) = request.max_duration {
            let frames = (duration * audio.format.sample_rate as f64).round() as usize;
            audio
                .samples
                .truncate(frames * audio.format.channels as usize);
        }
        Ok(Some(audio))
    }

    fn write_audio(&self, buffer: &AudioSampleBuffer, path: &Path) -> Result<()> {
        fs::write(path, b"memory audio")?;
        self.audio
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), buffer.clone());
        Ok(())
    }

    fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<()> {
        if self.fail_mux.load(Ordering::SeqCst) {
            return Err(StegoError::CodecService {
                command: format!("mux {}", output.display()),
                detail: "muxer failure for tests".to_string(),
            });
        }

        let mut stored = self.stored(video)?;
        let wav = self.audio.lock().unwrap().get(audio).cloned();
        let buffer = match wav {
            Some(buffer) => buffer,
            None => self.stored(audio)?.audio.ok_or_else(|| StegoError::UnreadableMedia {
                path: audio.to_path_buf(),
                detail: "no audio stream".to_string(),
            })?,
        };
        stored.audio = Some(buffer);
        self.add_video(output, stored);
        Ok(())
    }
}

/// 最近邻重采样，声道不足时复制最后一个声道。
fn resample(audio: &AudioSampleBuffer, format: AudioFormat) -> AudioSampleBuffer {
    let src_channels = audio.format.channels as usize;
    let src_frames = audio.samples.len() / src_channels;
    let dst_frames =
        src_frames * format.sample_rate as usize / audio.format.sample_rate as usize;

    let mut samples = Vec::with_capacity(dst_frames * format.channels as usize);
    for i in 0..dst_frames {
        let src = i * audio.format.sample_rate as usize / format.sample_rate as usize;
        for c in 0..format.channels as usize {
            samples.push(audio.samples[src * src_channels + c.min(src_channels - 1)]);
        }
    }
    AudioSampleBuffer::new(format, samples)
}

struct MemorySource {
    info: VideoInfo,
    frames: VecDeque<RgbImage>,
}

impl FrameSource for MemorySource {
    fn info(&self) -> &VideoInfo {
        &self.info
    }

    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        Ok(self.frames.pop_front())
    }
}

struct MemorySink {
    media: MemoryMedia,
    path: PathBuf,
    fps: f64,
    size: (u32, u32),
    frames: Vec<RgbImage>,
}

impl FrameSink for MemorySink {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        assert_eq!(frame.dimensions(), self.size, "frame size must match the writer");
        self.frames.push(frame.clone());
        Ok(())
    }

    fn frames_written(&self) -> usize {
        self.frames.len()
    }

    fn finish(self: Box<Self>) -> Result<()> {
        let Self {
            media,
            path,
            fps,
            frames,
            ..
        } = *self;
        media.add_video(
            &path,
            StoredVideo {
                fps,
                frames,
                audio: None,
            },
        );
        Ok(())
    }
}

/// 由纯色帧组成的视频。
pub fn solid_video(width: u32, height: u32, frames: usize, fps: f64, color: [u8; 3]) -> StoredVideo {
    StoredVideo {
        fps,
        frames: vec![RgbImage::from_pixel(width, height, Rgb(color)); frames],
        audio: None,
    }
}

/// 由随机像素帧组成的视频。
pub fn noisy_video(width: u32, height: u32, frames: usize, fps: f64) -> StoredVideo {
    let frames = (0..frames)
        .map(|_| {
            let mut raw = vec![0u8; (width * height * 3) as usize];
            rand::rng().fill_bytes(&mut raw);
            RgbImage::from_raw(width, height, raw).expect("buffer size matches")
        })
        .collect();
    StoredVideo {
        fps,
        frames,
        audio: None,
    }
}

/// 随机的单声道 8 位音频。
pub fn noisy_audio(sample_rate: u32, samples: usize) -> AudioSampleBuffer {
    let mut data = vec![0u8; samples];
    rand::rng().fill_bytes(&mut data);
    AudioSampleBuffer::new(
        AudioFormat {
            sample_rate,
            channels: 1,
        },
        data,
    )
}
