//! # DCT 分块隐写模块
//!
//! 在首帧亮度平面的每个 8×8 块中，通过中频系数 (4,5) 的符号承载 1 位数据。
//! 容量远低于 LSB，但能承受轻微的像素扰动 (取整、截断等)。
//!
//! 嵌入后的亮度值会同时写回块内的三个颜色通道，
//! 这样无论解码端如何从 RGB 重建亮度，得到的都是同一个值。

use std::sync::OnceLock;

use crate::bitframe::{BitFrame, FrameParser, ParseState};
use crate::capacity::{Method, bit_budget};
use crate::constants::{BLOCK_SIZE, DEFAULT_QUANTIZATION, EMBED_COEFFICIENT};
use crate::error::{Result, StegoError};
use image::{Rgb, RgbImage};
use log::debug;

/// 8×8 块，按行优先存放。
pub type Block = [f64; 64];

/// `COSINE[u][x] = cos((2x + 1) · u · π / 16)`
static COSINE: OnceLock<[[f64; 8]; 8]> = OnceLock::new();

/// 正交归一化系数：C(0) = 1/√8，C(u>0) = 1/2。
static NORM: OnceLock<[f64; 8]> = OnceLock::new();

fn cosine_table() -> &'static [[f64; 8]; 8] {
    COSINE.get_or_init(|| {
        let mut table = [[0.0f64; 8]; 8];
        for (u, row) in table.iter_mut().enumerate() {
            for (x, value) in row.iter_mut().enumerate() {
                *value = ((2 * x + 1) as f64 * u as f64 * std::f64::consts::PI / 16.0).cos();
            }
        }
        table
    })
}

fn norm_table() -> &'static [f64; 8] {
    NORM.get_or_init(|| {
        let mut n = [0.5f64; 8];
        n[0] = 1.0 / 8.0f64.sqrt();
        n
    })
}

/// 二维正交 DCT-II。输出按 `row * 8 + col` 存放，行对应纵向频率。
pub fn dct_block(block: &Block) -> Block {
    let cos = cosine_table();
    let c = norm_table();

    // 先对每一行做变换
    let mut temp = [0.0f64; 64];
    for row in 0..8 {
        for u in 0..8 {
            let sum: f64 = (0..8).map(|x| block[row * 8 + x] * cos[u][x]).sum();
            temp[row * 8 + u] = c[u] * sum;
        }
    }

    // 再对每一列做变换
    let mut coeffs = [0.0f64; 64];
    for col in 0..8 {
        for v in 0..8 {
            let sum: f64 = (0..8).map(|y| temp[y * 8 + col] * cos[v][y]).sum();
            coeffs[v * 8 + col] = c[v] * sum;
        }
    }

    coeffs
}

/// 二维正交 DCT-III (逆变换)。
pub fn idct_block(coeffs: &Block) -> Block {
    let cos = cosine_table();
    let c = norm_table();

    let mut temp = [0.0f64; 64];
    for col in 0..8 {
        for y in 0..8 {
            let sum: f64 = (0..8).map(|v| c[v] * coeffs[v * 8 + col] * cos[v][y]).sum();
            temp[y * 8 + col] = sum;
        }
    }

    let mut pixels = [0.0f64; 64];
    for row in 0..8 {
        for x in 0..8 {
            let sum: f64 = (0..8).map(|u| c[u] * temp[row * 8 + u] * cos[u][x]).sum();
            pixels[row * 8 + x] = sum;
        }
    }

    pixels
}

/// BT.601 亮度 (14 位定点)。R = G = B 时结果与输入完全相同。
pub fn luminance(pixel: &Rgb<u8>) -> u8 {
    let [r, g, b] = pixel.0;
    ((r as u32 * 4899 + g as u32 * 9617 + b as u32 * 1868 + 8192) >> 14) as u8
}

const COEFFICIENT_INDEX: usize = EMBED_COEFFICIENT.0 * 8 + EMBED_COEFFICIENT.1;

/// DCT 分块编解码器。
#[derive(Debug, Clone, Copy)]
pub struct DctCodec {
    quantization: f64,
}

impl Default for DctCodec {
    fn default() -> Self {
        Self {
            quantization: DEFAULT_QUANTIZATION,
        }
    }
}

impl DctCodec {
    /// # Errors
    ///
    /// 量化幅度不是正的有限数时返回 [`StegoError::InvalidQuantization`]：
    /// 幅度为 0 时位 0 写不出正系数，读回会变成 1。
    pub fn new(quantization: f64) -> Result<Self> {
        if !quantization.is_finite() || quantization <= 0.0 {
            return Err(StegoError::InvalidQuantization(quantization));
        }
        Ok(Self { quantization })
    }

    /// 在 DCT 系数块中嵌入 1 位。
    ///
    /// 位 1 要求系数为负，位 0 要求为正。系数已在正确一侧且幅度不小于量化值时保持不变，
    /// 否则改写为 ∓quantization，使像素取整后符号依然可靠。
    /// 这比单纯翻转符号更严格：符号正确但幅度过小的系数同样会被改写。
    pub fn embed_bit(&self, coeffs: &mut Block, bit: u8) {
        let q = self.quantization;
        let c = &mut coeffs[COEFFICIENT_INDEX];
        if bit & 1 == 1 {
            if *c > -q {
                *c = -q;
            }
        } else if *c < q {
            *c = q;
        }
    }

    /// 纯符号判断：系数 ≤ 0 为 1，否则为 0。
    pub fn extract_bit(&self, coeffs: &Block) -> u8 {
        u8::from(coeffs[COEFFICIENT_INDEX] <= 0.0)
    }

    /// 在帧中按块嵌入位帧。块按行优先遍历，位用完后剩余块保持原样。
    ///
    /// # Errors
    ///
    /// 位数超过 `⌊width/8⌋ × ⌊height/8⌋` 时返回 [`StegoError::CapacityExceeded`]，帧不被修改。
    pub fn hide(&self, frame: &mut RgbImage, bitframe: &BitFrame) -> Result<()> {
        let available = bit_budget(frame.width(), frame.height(), Method::Dct);
        if bitframe.len() > available {
            return Err(StegoError::CapacityExceeded {
                required: bitframe.len(),
                available,
            });
        }

        for (&(bx, by), &bit) in block_origins(frame).iter().zip(bitframe.bits()) {
            let mut coeffs = dct_block(&read_block(frame, bx, by));
            self.embed_bit(&mut coeffs, bit);
            write_block(frame, bx, by, &idct_block(&coeffs));
        }

        debug!("embedded {} bits, block budget {}", bitframe.len(), available);
        Ok(())
    }

    /// 逐块提取位并增量解析，凑齐完整帧即返回其中的文本。
    ///
    /// # Errors
    ///
    /// 所有块用尽仍未得到完整帧、声明的长度超出剩余块数，或内容不是合法 UTF-8 时，
    /// 返回 [`StegoError::NoHiddenData`]。
    pub fn reveal(&self, frame: &RgbImage) -> Result<String> {
        let origins = block_origins(frame);
        let mut parser = FrameParser::new();

        for (index, &(bx, by)) in origins.iter().enumerate() {
            let bit = self.extract_bit(&dct_block(&read_block(frame, bx, by)));
            match parser.push(bit) {
                ParseState::Complete => {
                    let Some(bitframe) = parser.frame() else {
                        break;
                    };
                    return bitframe
                        .decode()
                        .map_err(|e| StegoError::NoHiddenData(e.to_string()));
                }
                ParseState::NeedBody { remaining } if remaining > origins.len() - index - 1 => {
                    return Err(StegoError::NoHiddenData(format!(
                        "header declares {} body bits but only {} blocks remain",
                        parser.declared_len().unwrap_or_default(),
                        origins.len() - index - 1
                    )));
                }
                _ => {}
            }
        }

        Err(StegoError::NoHiddenData(format!(
            "no complete frame within {} blocks",
            origins.len()
        )))
    }
}

/// 所有完整 8×8 块的左上角坐标，块行在外层、块列在内层。
fn block_origins(frame: &RgbImage) -> Vec<(u32, u32)> {
    let size = BLOCK_SIZE as u32;
    let (cols, rows) = (frame.width() / size, frame.height() / size);
    (0..rows)
        .flat_map(|r| (0..cols).map(move |c| (c * size, r * size)))
        .collect()
}

fn read_block(frame: &RgbImage, bx: u32, by: u32) -> Block {
    let mut block = [0.0f64; 64];
    for (i, value) in block.iter_mut().enumerate() {
        let (x, y) = (bx + (i % 8) as u32, by + (i / 8) as u32);
        *value = luminance(frame.get_pixel(x, y)) as f64;
    }
    block
}

fn write_block(frame: &mut RgbImage, bx: u32, by: u32, block: &Block) {
    for (i, &value) in block.iter().enumerate() {
        let (x, y) = (bx + (i % 8) as u32, by + (i / 8) as u32);
        let v = value.round().clamp(0.0, 255.0) as u8;
        frame.put_pixel(x, y, Rgb([v, v, v]));
    }
}
