//! # 错误类型模块
//!
//! 定义库内所有隐写操作共用的错误枚举 [`StegoError`]，
//! 以及把具体错误归入四大类的 [`ErrorCategory`]。

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// 隐写编码/解码过程中可能出现的错误。
#[derive(Error, Debug)]
pub enum StegoError {
    #[error("Unable to read media '{}': {detail}", .path.display())]
    UnreadableMedia { path: PathBuf, detail: String },

    #[error("Payload is not valid UTF-8: {0}")]
    InvalidEncoding(String),

    #[error("Payload too large: {bits} bits exceeds the {max}-bit frame limit")]
    PayloadTooLarge { bits: usize, max: usize },

    #[error("Truncated bit frame: need {needed} bits, only {available} available")]
    TruncatedFrame { needed: usize, available: usize },

    #[error("Not enough space in the cover. Required: {required} bits, Available: {available} bits")]
    CapacityExceeded { required: usize, available: usize },

    #[error("Cover video is too short: {cover_frames} cover frames cannot carry {secret_frames} secret frames ({detail})")]
    InsufficientCapacity {
        cover_frames: usize,
        secret_frames: usize,
        detail: String,
    },

    #[error("No hidden data found: {0}")]
    NoHiddenData(String),

    #[error("Malformed stego stream: {0}")]
    MalformedStegoStream(String),

    #[error("Media codec service failed running `{command}`: {detail}")]
    CodecService { command: String, detail: String },

    #[error("Unknown steganography method '{0}' (expected lsb, dct or viv)")]
    UnknownMethod(String),

    #[error("Method '{method}' cannot {operation}")]
    UnsupportedMethod { method: String, operation: String },

    #[error("Quantization must be a positive finite number, got {0}")]
    InvalidQuantization(f64),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// 错误的大类，决定调用方应如何应对。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// 输入无法使用 (文件不可读、零帧视频、非法 UTF-8 等)。
    Input,
    /// 载体容量不足，需要缩短载荷或更换载体。
    Capacity,
    /// 文件可读，但其中没有可恢复的隐藏数据。
    NoHiddenData,
    /// 外部媒体编解码服务失败。
    CodecService,
}

impl StegoError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnreadableMedia { .. }
            | Self::InvalidEncoding(_)
            | Self::PayloadTooLarge { .. }
            | Self::UnknownMethod(_)
            | Self::UnsupportedMethod { .. }
            | Self::InvalidQuantization(_)
            | Self::Io(_) => ErrorCategory::Input,
            Self::CapacityExceeded { .. } | Self::InsufficientCapacity { .. } => {
                ErrorCategory::Capacity
            }
            Self::TruncatedFrame { .. }
            | Self::NoHiddenData(_)
            | Self::MalformedStegoStream(_) => ErrorCategory::NoHiddenData,
            Self::CodecService { .. } => ErrorCategory::CodecService,
        }
    }

    pub(crate) fn unreadable(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        Self::UnreadableMedia {
            path: path.into(),
            detail: detail.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StegoError>;
