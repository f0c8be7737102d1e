//! # 运行配置模块
//!
//! 汇总一次编码/解码操作所需的全部可调参数。命令行参数最终被转换为 [`Config`]。

use crate::constants::DEFAULT_QUANTIZATION;
use crate::error::Result;
use crate::ffmpeg::{EncoderStrategy, default_encoders};
use std::path::PathBuf;
use tempfile::TempDir;

/// 一次操作的运行配置。
#[derive(Debug, Clone)]
pub struct Config {
    /// `ffmpeg` 可执行文件。
    pub ffmpeg: PathBuf,
    /// `ffprobe` 可执行文件。
    pub ffprobe: PathBuf,
    /// DCT 系数的量化幅度。
    pub quantization: f64,
    /// 无损视频编码器，按顺序尝试。
    pub encoders: Vec<EncoderStrategy>,
    /// 临时工作目录的父目录；为 `None` 时使用系统临时目录。
    pub work_dir: Option<PathBuf>,
    /// LSB/DCT 隐写时是否保留载体的音轨。
    pub keep_cover_audio: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
            quantization: DEFAULT_QUANTIZATION,
            encoders: default_encoders(),
            work_dir: None,
            keep_cover_audio: true,
        }
    }
}

impl Config {
    /// 为单次操作创建唯一的临时工作目录，离开作用域时自动删除。
    pub fn working_dir(&self) -> Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("vid_hide-");
        let dir = match &self.work_dir {
            Some(parent) => builder.tempdir_in(parent)?,
            None => builder.tempdir()?,
        };
        Ok(dir)
    }
}
