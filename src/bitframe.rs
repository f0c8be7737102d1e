//! # 位帧模块
//!
//! 负责文本载荷与自定界位序列 (BitFrame) 之间的互相转换：
//! 16 位大端长度头 (消息体位数) + 消息体，每个字节按高位在前展开为 8 位。
//!
//! 另提供 [`FrameParser`]，用于在逐位提取数据时增量解析帧，
//! 一旦凑齐完整的帧即可停止提取。

use crate::constants::{LENGTH_HEADER_BITS, MAX_BODY_BITS};
use crate::error::{Result, StegoError};

/// 由长度头与消息体组成的位序列。每个元素只可能是 0 或 1。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitFrame {
    bits: Vec<u8>,
}

impl BitFrame {
    /// 将文本编码为带长度头的位帧。
    ///
    /// # Errors
    ///
    /// 如果消息体超过 65535 位，返回 [`StegoError::PayloadTooLarge`]。
    pub fn encode(text: &str) -> Result<Self> {
        let bytes = text.as_bytes();
        let body_bits = bytes.len() * 8;
        if body_bits > MAX_BODY_BITS {
            return Err(StegoError::PayloadTooLarge {
                bits: body_bits,
                max: MAX_BODY_BITS,
            });
        }

        let mut bits = Vec::with_capacity(LENGTH_HEADER_BITS + body_bits);
        push_bits(&mut bits, body_bits as u64, LENGTH_HEADER_BITS);
        for &byte in bytes {
            push_bits(&mut bits, byte as u64, 8);
        }

        Ok(Self { bits })
    }

    /// 从原始位序列构造位帧，不做任何校验。
    pub fn from_bits(bits: Vec<u8>) -> Self {
        Self { bits }
    }

    pub fn bits(&self) -> &[u8] {
        &self.bits
    }

    pub fn into_bits(self) -> Vec<u8> {
        self.bits
    }

    /// 帧的总位数 (包含长度头)。
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// 解码本帧所承载的文本。
    pub fn decode(&self) -> Result<String> {
        decode(&self.bits)
    }
}

/// 从位序列中解析出文本。
///
/// 先读取前 16 位得到消息体位数 `n`，随后取 `bits[16..16 + n]` 重组字节并按 UTF-8 解码。
/// 超出 `16 + n` 的多余位会被忽略。
///
/// # Errors
///
/// * 可用位数不足 `16 + n` 时返回 [`StegoError::TruncatedFrame`]。
/// * 消息体位数不是 8 的倍数，或字节不是合法 UTF-8 时返回 [`StegoError::InvalidEncoding`]。
pub fn decode(bits: &[u8]) -> Result<String> {
    if bits.len() < LENGTH_HEADER_BITS {
        return Err(StegoError::TruncatedFrame {
            needed: LENGTH_HEADER_BITS,
            available: bits.len(),
        });
    }

    let body_len = read_header(bits);
    let needed = LENGTH_HEADER_BITS + body_len;
    if bits.len() < needed {
        return Err(StegoError::TruncatedFrame {
            needed,
            available: bits.len(),
        });
    }

    if body_len % 8 != 0 {
        return Err(StegoError::InvalidEncoding(format!(
            "body length of {body_len} bits is not a whole number of bytes"
        )));
    }

    let bytes: Vec<u8> = bits[LENGTH_HEADER_BITS..needed]
        .chunks_exact(8)
        .map(|group| group.iter().fold(0u8, |acc, &bit| (acc << 1) | (bit & 1)))
        .collect();

    String::from_utf8(bytes).map_err(|e| StegoError::InvalidEncoding(e.to_string()))
}

fn read_header(bits: &[u8]) -> usize {
    bits[..LENGTH_HEADER_BITS]
        .iter()
        .fold(0usize, |acc, &bit| (acc << 1) | (bit & 1) as usize)
}

fn push_bits(bits: &mut Vec<u8>, value: u64, width: usize) {
    bits.extend((0..width).rev().map(|shift| ((value >> shift) & 1) as u8));
}

/// [`FrameParser::push`] 之后的解析状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    /// 长度头尚未读完。
    NeedHeader,
    /// 长度头已知，还差 `remaining` 位消息体。
    NeedBody { remaining: usize },
    /// 已得到完整帧。
    Complete,
}

/// 增量帧解析器。
///
/// 每次追加一位后立即尝试解析，凑齐 `16 + n` 位时进入 [`ParseState::Complete`]。
/// 完成后继续追加的位会被丢弃。
#[derive(Debug, Default, Clone)]
pub struct FrameParser {
    bits: Vec<u8>,
    declared: Option<usize>,
}

impl FrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bit: u8) -> ParseState {
        if self.is_complete() {
            return ParseState::Complete;
        }

        self.bits.push(bit & 1);
        if self.declared.is_none() && self.bits.len() == LENGTH_HEADER_BITS {
            self.declared = Some(read_header(&self.bits));
        }
        self.state()
    }

    pub fn state(&self) -> ParseState {
        match self.declared {
            None => ParseState::NeedHeader,
            Some(body) => {
                let remaining = (LENGTH_HEADER_BITS + body).saturating_sub(self.bits.len());
                if remaining == 0 {
                    ParseState::Complete
                } else {
                    ParseState::NeedBody { remaining }
                }
            }
        }
    }

    /// 长度头声明的消息体位数 (读完长度头之前为 `None`)。
    pub fn declared_len(&self) -> Option<usize> {
        self.declared
    }

    /// 完整帧还需要的位数；长度头未读完时只计算长度头剩余部分。
    pub fn bits_needed(&self) -> usize {
        match self.state() {
            ParseState::NeedHeader => LENGTH_HEADER_BITS - self.bits.len(),
            ParseState::NeedBody { remaining } => remaining,
            ParseState::Complete => 0,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.state() == ParseState::Complete
    }

    pub fn bits_seen(&self) -> usize {
        self.bits.len()
    }

    /// 取出完整的帧；未完成时返回 `None`。
    pub fn frame(&self) -> Option<BitFrame> {
        self.is_complete().then(|| BitFrame::from_bits(self.bits.clone()))
    }
}
