//! # 文本隐写编解码器
//!
//! LSB 与 DCT 两种方法都把一个位帧写入载体首帧，这里把它们统一为 [`TextCodec`]，
//! 由 [`Method`] 显式分派。

use crate::bitframe::BitFrame;
use crate::capacity::{Method, bit_budget};
use crate::config::Config;
use crate::dct::DctCodec;
use crate::error::{Result, StegoError};
use crate::lsb;
use image::RgbImage;

/// 在单帧中隐藏/恢复文本的编解码器。
pub trait TextCodec {
    fn method(&self) -> Method;

    /// 一帧能承载的位数，包含 16 位长度头。
    fn bit_budget(&self, width: u32, height: u32) -> usize {
        bit_budget(width, height, self.method())
    }

    fn embed(&self, frame: &mut RgbImage, bitframe: &BitFrame) -> Result<()>;

    fn extract(&self, frame: &RgbImage) -> Result<String>;
}

/// 最低有效位编解码器。
#[derive(Debug, Clone, Copy, Default)]
pub struct LsbCodec;

impl TextCodec for LsbCodec {
    fn method(&self) -> Method {
        Method::Lsb
    }

    fn embed(&self, frame: &mut RgbImage, bitframe: &BitFrame) -> Result<()> {
        lsb::embed(frame, bitframe)
    }

    fn extract(&self, frame: &RgbImage) -> Result<String> {
        lsb::reveal(frame)
    }
}

impl TextCodec for DctCodec {
    fn method(&self) -> Method {
        Method::Dct
    }

    fn embed(&self, frame: &mut RgbImage, bitframe: &BitFrame) -> Result<()> {
        self.hide(frame, bitframe)
    }

    fn extract(&self, frame: &RgbImage) -> Result<String> {
        self.reveal(frame)
    }
}

/// 根据方法构造文本编解码器。视频嵌套方法不能承载文本，
/// DCT 的量化幅度无效时返回 [`StegoError::InvalidQuantization`]。
pub fn text_codec(method: Method, config: &Config) -> Result<Box<dyn TextCodec>> {
    match method {
        Method::Lsb => Ok(Box::new(LsbCodec)),
        Method::Dct => Ok(Box::new(DctCodec::new(config.quantization)?)),
        Method::Viv => Err(StegoError::UnsupportedMethod {
            method: method.to_string(),
            operation: "carry a text message".to_string(),
        }),
    }
}
