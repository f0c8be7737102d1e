//! # 容量计算模块
//!
//! “能藏多少” 的唯一依据。各编解码器在嵌入前使用同一套位预算进行校验，
//! 前端也在调用编解码器之前通过这里查询容量。

use crate::constants::{BLOCK_SIZE, CHANNELS, FRAMES_PER_SECRET_FRAME, VIV_BITS_PER_CHANNEL};
use crate::error::StegoError;
use clap::ValueEnum;
use std::fmt;
use std::str::FromStr;

/// 隐写方法。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Method {
    /// 首帧每个颜色通道的最低有效位。
    Lsb,
    /// 首帧每个 8×8 亮度块的 DCT 系数符号。
    Dct,
    /// 视频嵌套：像素低 2 位 + 音频低半字节。
    Viv,
}

impl Method {
    pub fn name(self) -> &'static str {
        match self {
            Self::Lsb => "lsb",
            Self::Dct => "dct",
            Self::Viv => "viv",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Method {
    type Err = StegoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lsb" => Ok(Self::Lsb),
            "dct" => Ok(Self::Dct),
            "viv" | "video" => Ok(Self::Viv),
            _ => Err(StegoError::UnknownMethod(s.to_string())),
        }
    }
}

/// 单帧所能承载的位数。
///
/// * `lsb`: `3 × width × height`
/// * `dct`: `⌊width/8⌋ × ⌊height/8⌋`
/// * `viv`: `2 × width × height` (每对输出帧承载一帧的 4 位色深，折算为每帧 2 位)
pub fn bit_budget(width: u32, height: u32, method: Method) -> usize {
    let (w, h) = (width as usize, height as usize);
    match method {
        Method::Lsb => w * h * CHANNELS,
        Method::Dct => (w / BLOCK_SIZE) * (h / BLOCK_SIZE),
        Method::Viv => w * h * VIV_BITS_PER_CHANNEL,
    }
}

/// 计算载体视频的容量 (字节)。
///
/// `lsb` 与 `dct` 只使用首帧，因此与帧数无关；`viv` 每两帧载体承载一帧秘密视频。
/// 返回值包含 2 字节长度头在内。
pub fn capacity(width: u32, height: u32, frame_count: usize, method: Method) -> usize {
    match method {
        Method::Lsb | Method::Dct => bit_budget(width, height, method) / 8,
        Method::Viv => {
            bit_budget(width, height, method) * (frame_count / FRAMES_PER_SECRET_FRAME) / 8
        }
    }
}

/// 按方法名计算容量，方法名未知时返回 [`StegoError::UnknownMethod`]。
pub fn capacity_by_name(
    width: u32,
    height: u32,
    frame_count: usize,
    method: &str,
) -> Result<usize, StegoError> {
    let method: Method = method.parse()?;
    Ok(capacity(width, height, frame_count, method))
}

/// 载体最多能容纳的秘密视频帧数。
pub fn max_secret_frames(cover_frames: usize) -> usize {
    cover_frames / FRAMES_PER_SECRET_FRAME
}
