/// 长度头占用的位数。
/// 头部为 16 位大端无符号整数，记录消息体的位数。
pub const LENGTH_HEADER_BITS: usize = 16;

/// 单个 BitFrame 消息体允许的最大位数 (受 16 位长度头限制)。
pub const MAX_BODY_BITS: usize = u16::MAX as usize;

/// 每个像素的颜色通道数 (RGB)。
pub const CHANNELS: usize = 3;

/// DCT 分块的边长。每个 8×8 亮度块承载 1 位数据。
pub const BLOCK_SIZE: usize = 8;

/// DCT 隐写使用的中频系数位置 (行, 列)。
pub const EMBED_COEFFICIENT: (usize, usize) = (4, 5);

/// DCT 系数的默认量化幅度。
pub const DEFAULT_QUANTIZATION: f64 = 50.0;

/// 视频嵌套隐写中，每个秘密帧占用的输出帧数。
pub const FRAMES_PER_SECRET_FRAME: usize = 2;

/// 视频嵌套隐写中，每个颜色通道嵌入的秘密位数。
pub const VIV_BITS_PER_CHANNEL: usize = 2;

/// 清除载体通道低 2 位的掩码。
pub const COVER_PIXEL_MASK: u8 = 0b1111_1100;

/// 取出通道低 2 位的掩码。
pub const PAYLOAD_PIXEL_MASK: u8 = 0b0000_0011;

/// 音频样本的高半字节掩码。
pub const HIGH_NIBBLE: u8 = 0b1111_0000;

/// 音频样本的低半字节掩码。
pub const LOW_NIBBLE: u8 = 0b0000_1111;

/// 默认输出文件名后缀。
pub const DEFAULT_OUTPUT_SUFFIX: &str = "_steg";
