use crate::bitframe::BitFrame;
use crate::capacity::{Method, bit_budget};
use crate::error::{Result, StegoError};
use image::RgbImage;

/// 将位帧写入帧像素各通道的最低有效位。
///
/// 按行优先、每个像素内通道 0,1,2 的顺序逐位写入，位用完即停止，其余通道保持不变。
/// 容量不足时不做任何修改，直接返回 [`StegoError::CapacityExceeded`]。
pub fn embed(frame: &mut RgbImage, bitframe: &BitFrame) -> Result<()> {
    let available = bit_budget(frame.width(), frame.height(), Method::Lsb);
    if bitframe.len() > available {
        return Err(StegoError::CapacityExceeded {
            required: bitframe.len(),
            available,
        });
    }

    for (channel, &bit) in frame.iter_mut().zip(bitframe.bits()) {
        *channel = (*channel & !1) | (bit & 1);
    }

    Ok(())
}

/// 按与 [`embed`] 相同的顺序读取每个通道的最低有效位。
pub fn extract(frame: &RgbImage) -> BitFrame {
    BitFrame::from_bits(frame.iter().map(|&channel| channel & 1).collect())
}

/// 从帧中提取并解码文本。
///
/// 头部声明的长度超出帧容量或内容不是合法 UTF-8 时，视为没有隐藏数据。
pub fn reveal(frame: &RgbImage) -> Result<String> {
    extract(frame).decode().map_err(|e| match e {
        StegoError::TruncatedFrame { .. } | StegoError::InvalidEncoding(_) => {
            StegoError::NoHiddenData(e.to_string())
        }
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn noisy_frame(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([
                (x * 7 + y * 13) as u8,
                (x * 31 ^ y * 3) as u8,
                (x + y * 101) as u8,
            ])
        })
    }

    #[test]
    fn embed_then_extract_round_trips() {
        let mut frame = noisy_frame(40, 30);
        let bitframe = BitFrame::encode("LSB 测试 ✓").unwrap();
        embed(&mut frame, &bitframe).unwrap();

        assert_eq!(&extract(&frame).bits()[..bitframe.len()], bitframe.bits());
        assert_eq!(reveal(&frame).unwrap(), "LSB 测试 ✓");
    }

    #[test]
    fn only_leading_channels_change() {
        let original = noisy_frame(16, 16);
        let mut frame = original.clone();
        let bitframe = BitFrame::encode("abc").unwrap();
        embed(&mut frame, &bitframe).unwrap();

        let n = bitframe.len();
        assert_eq!(&frame.as_raw()[n..], &original.as_raw()[n..]);
        for (a, b) in frame.as_raw()[..n].iter().zip(&original.as_raw()[..n]) {
            assert_eq!(a & !1, b & !1);
        }
    }

    #[test]
    fn extraction_is_idempotent() {
        let mut frame = noisy_frame(20, 20);
        embed(&mut frame, &BitFrame::encode("twice").unwrap()).unwrap();
        assert_eq!(extract(&frame), extract(&frame));
        assert_eq!(reveal(&frame).unwrap(), reveal(&frame).unwrap());
    }

    #[test]
    fn exact_fit_and_overflow() {
        // 4×4×3 = 48 位 = 16 位长度头 + 4 字节
        let mut frame = noisy_frame(4, 4);
        embed(&mut frame, &BitFrame::encode("four").unwrap()).unwrap();
        assert_eq!(reveal(&frame).unwrap(), "four");

        let before = frame.clone();
        let result = embed(&mut frame, &BitFrame::encode("fives").unwrap());
        assert!(matches!(
            result,
            Err(StegoError::CapacityExceeded {
                required: 56,
                available: 48
            })
        ));
        assert_eq!(frame, before);
    }

    #[test]
    fn clean_frame_has_no_message() {
        // 全白帧：长度头为 0xFFFF，远超容量
        let frame = RgbImage::from_pixel(8, 8, Rgb([255, 255, 255]));
        assert!(matches!(reveal(&frame), Err(StegoError::NoHiddenData(_))));
    }
}
