//! # 视频嵌套隐写模块
//!
//! 把整段秘密视频 (画面 + 音轨) 藏进载体视频：
//!
//! * 画面：每个秘密帧生成两帧输出，各占载体通道的低 2 位，
//!   合起来保留秘密视频每个通道的高 4 位色深。
//! * 音轨：秘密样本的高半字节写入载体样本的低半字节。
//!
//! 恢复结果只保证高 4 位 (`secret & 0b1111_0000`) 与原始一致，低 4 位恒为 0。

use crate::capacity::max_secret_frames;
use crate::constants::{COVER_PIXEL_MASK, HIGH_NIBBLE, LOW_NIBBLE, PAYLOAD_PIXEL_MASK};
use crate::error::{Result, StegoError};
use crate::media::{AudioSampleBuffer, FrameSink, FrameSource};
use image::imageops::{self, FilterType};
use image::RgbImage;
use log::debug;

/// 把秘密帧缩放并补黑边，使其与载体尺寸完全一致。
///
/// 宽高比相同时直接缩放到载体尺寸；否则按受限的一边等比缩放
/// (秘密帧宽大于高时先按宽，否则先按高)，再在右侧和下方补黑。
pub fn fit_frame(secret: &RgbImage, width: u32, height: u32) -> RgbImage {
    let (sw, sh) = secret.dimensions();
    if (sw, sh) == (width, height) {
        return secret.clone();
    }
    if sw as u64 * height as u64 == sh as u64 * width as u64 {
        return imageops::resize(secret, width, height, FilterType::Triangle);
    }

    let scale_to_width = |w: u32| (w, (w as u64 * sh as u64 / sw as u64) as u32);
    let scale_to_height = |h: u32| ((h as u64 * sw as u64 / sh as u64) as u32, h);

    let (mut w, mut h) = if sw > sh {
        scale_to_width(width)
    } else {
        scale_to_height(height)
    };
    if h > height {
        (w, h) = scale_to_height(height);
    }
    if w > width {
        (w, h) = scale_to_width(width);
    }
    let (w, h) = (w.clamp(1, width), h.clamp(1, height));

    let resized = imageops::resize(secret, w, h, FilterType::Triangle);
    let mut canvas = RgbImage::new(width, height);
    imageops::replace(&mut canvas, &resized, 0, 0);
    canvas
}

/// 用同一载体帧生成承载秘密帧的两帧输出。
///
/// 第一帧的低 2 位存放秘密值的第 4–5 位，第二帧存放第 6–7 位。
/// 两帧尺寸必须相同 (先经过 [`fit_frame`])。
pub fn embed_pixels(cover: &RgbImage, secret: &RgbImage) -> (RgbImage, RgbImage) {
    debug_assert_eq!(cover.dimensions(), secret.dimensions());

    let mut first = cover.clone();
    let mut second = cover.clone();
    for ((a, b), &s) in first.iter_mut().zip(second.iter_mut()).zip(secret.iter()) {
        *a = (*a & COVER_PIXEL_MASK) | ((s >> 4) & PAYLOAD_PIXEL_MASK);
        *b = (*b & COVER_PIXEL_MASK) | (s >> 6);
    }
    (first, second)
}

/// 从一对输出帧重建秘密帧：`((f0 & 0b11) << 4) | ((f1 & 0b11) << 6)`。
pub fn extract_pixels(first: &RgbImage, second: &RgbImage) -> RgbImage {
    debug_assert_eq!(first.dimensions(), second.dimensions());

    let mut secret = RgbImage::new(first.width(), first.height());
    for ((s, &a), &b) in secret.iter_mut().zip(first.iter()).zip(second.iter()) {
        *s = ((a & PAYLOAD_PIXEL_MASK) << 4) | ((b & PAYLOAD_PIXEL_MASK) << 6);
    }
    secret
}

/// 合并音频样本：`(cover & 0xF0) | ((secret & 0xF0) >> 4)`，较短的一方补 0。
pub fn embed_audio(cover: &[u8], secret: &[u8]) -> Vec<u8> {
    let len = cover.len().max(secret.len());
    (0..len)
        .map(|i| {
            let c = cover.get(i).copied().unwrap_or(0);
            let s = secret.get(i).copied().unwrap_or(0);
            (c & HIGH_NIBBLE) | ((s & HIGH_NIBBLE) >> 4)
        })
        .collect()
}

/// 恢复秘密音频：`(stego & 0x0F) << 4`。
pub fn extract_audio(stego: &[u8]) -> Vec<u8> {
    stego.iter().map(|&s| (s & LOW_NIBBLE) << 4).collect()
}

/// 合并两条音轨。任意一方缺失时视为静音；双方都缺失时没有输出音轨。
///
/// 输出沿用载体的格式 (载体无音轨时沿用秘密音轨的格式)，调用方应事先把秘密音轨
/// 转换为相同格式。
pub fn hide_audio(
    cover: Option<AudioSampleBuffer>,
    secret: Option<AudioSampleBuffer>,
) -> Option<AudioSampleBuffer> {
    let format = cover.as_ref().or(secret.as_ref())?.format;
    let mut cover = cover.unwrap_or_else(|| AudioSampleBuffer::new(format, Vec::new()));
    let mut secret = secret.unwrap_or_else(|| AudioSampleBuffer::new(format, Vec::new()));

    let len = cover.samples.len().max(secret.samples.len());
    cover.pad_to(len);
    secret.pad_to(len);

    Some(AudioSampleBuffer::new(
        format,
        embed_audio(&cover.samples, &secret.samples),
    ))
}

pub fn reveal_audio(stego: &AudioSampleBuffer) -> AudioSampleBuffer {
    AudioSampleBuffer::new(stego.format, extract_audio(&stego.samples))
}

/// 编解码器内部的帧数前置条件：载体帧数不得少于秘密帧数。
pub fn check_geometry(cover_frames: usize, secret_frames: usize) -> Result<()> {
    if cover_frames < secret_frames {
        return Err(StegoError::InsufficientCapacity {
            cover_frames,
            secret_frames,
            detail: "cover must have at least as many frames as the secret".to_string(),
        });
    }
    Ok(())
}

/// 前端使用的更严格条件：秘密帧数不得超过载体帧数的一半。
pub fn check_frame_budget(cover_frames: usize, secret_frames: usize) -> Result<()> {
    let allowed = max_secret_frames(cover_frames);
    if secret_frames > allowed {
        return Err(StegoError::InsufficientCapacity {
            cover_frames,
            secret_frames,
            detail: format!("at most {allowed} secret frames fit, two cover frames each"),
        });
    }
    Ok(())
}

/// 把秘密视频的画面逐帧嵌入载体，按顺序写入 `sink`，返回嵌入的秘密帧数。
///
/// 第 `k` 个秘密帧与第 `k` 个载体帧生成第 `2k`、`2k+1` 个输出帧。
pub fn hide_frames(
    cover: &mut dyn FrameSource,
    secret: &mut dyn FrameSource,
    sink: &mut dyn FrameSink,
) -> Result<usize> {
    let cover_frames = cover.info().frame_count;
    let secret_frames = secret.info().frame_count;
    check_geometry(cover_frames, secret_frames)?;

    let mut hidden = 0;
    while let Some(secret_frame) = secret.next_frame()? {
        let Some(cover_frame) = cover.next_frame()? else {
            return Err(StegoError::InsufficientCapacity {
                cover_frames,
                secret_frames,
                detail: format!("cover ran out of frames after {hidden}"),
            });
        };

        let fitted = fit_frame(&secret_frame, cover_frame.width(), cover_frame.height());
        let (first, second) = embed_pixels(&cover_frame, &fitted);
        sink.write_frame(&first)?;
        sink.write_frame(&second)?;
        hidden += 1;
    }

    debug!("hid {hidden} secret frames in {} output frames", sink.frames_written());
    Ok(hidden)
}

/// 逐对读取隐写帧并重建秘密画面，返回恢复的帧数。
///
/// # Errors
///
/// 隐写帧数为奇数时返回 [`StegoError::MalformedStegoStream`]。
pub fn reveal_frames(stego: &mut dyn FrameSource, sink: &mut dyn FrameSink) -> Result<usize> {
    let declared = stego.info().frame_count;
    if declared % 2 != 0 {
        return Err(StegoError::MalformedStegoStream(format!(
            "stego video has an odd number of frames ({declared})"
        )));
    }

    let mut recovered = 0;
    while let Some(first) = stego.next_frame()? {
        let Some(second) = stego.next_frame()? else {
            return Err(StegoError::MalformedStegoStream(format!(
                "frame {} has no matching second frame",
                recovered * 2
            )));
        };
        sink.write_frame(&extract_pixels(&first, &second))?;
        recovered += 1;
    }

    debug!("recovered {recovered} secret frames");
    Ok(recovered)
}
