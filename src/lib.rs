//! # vid_hide 库
//!
//! 本库包含视频隐写工具的核心逻辑：位帧格式、LSB/DCT 文本隐写、视频嵌套隐写、
//! 容量计算，以及基于 ffmpeg 的媒体服务。

// 声明库包含的所有模块。

pub mod bitframe;
pub mod capacity;
pub mod cli;
pub mod codec;
pub mod config;
pub mod constants;
pub mod dct;
pub mod error;
pub mod ffmpeg;
pub mod handler;
pub mod lsb;
pub mod media;
pub mod pipeline;
pub mod viv;

pub use error::{ErrorCategory, Result, StegoError};
