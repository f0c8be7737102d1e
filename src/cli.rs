//! # 命令行接口模块
//!
//! 使用 `clap` 定义了程序的命令行结构，包括全局参数、子命令和各子命令的参数。
//! 所有用户通过命令行与程序交互的入口点都在此模块中定义。

use crate::capacity::Method;
use crate::config::Config;
use crate::constants::DEFAULT_QUANTIZATION;
use clap::{ArgAction, Args, Parser};
use std::path::PathBuf;

/// 一款视频隐写命令行工具：在视频中隐藏文本 (LSB / DCT) 或整段秘密视频。
#[derive(Parser, Debug)]
#[command(
    version,
    about,
    long_about = "一款视频隐写命令行工具。\n可使用 LSB 或 DCT 方法在视频首帧中隐藏文本，也可以把整段秘密视频 (画面与音轨) 隐藏到另一段视频中。\n需要系统中可用的 ffmpeg 与 ffprobe。"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// 对所有子命令生效的参数。
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// ffmpeg 可执行文件路径。
    #[arg(long, global = true, env = "VID_HIDE_FFMPEG", default_value = "ffmpeg")]
    pub ffmpeg: PathBuf,

    /// ffprobe 可执行文件路径。
    #[arg(long, global = true, env = "VID_HIDE_FFPROBE", default_value = "ffprobe")]
    pub ffprobe: PathBuf,

    /// DCT 方法的量化幅度 (必须为正数)。
    #[arg(long, global = true, default_value_t = DEFAULT_QUANTIZATION, value_parser = parse_quantization)]
    pub quantization: f64,

    /// 临时工作目录的父目录 (默认使用系统临时目录)。
    #[arg(long, global = true)]
    pub work_dir: Option<PathBuf>,

    /// LSB/DCT 隐写时丢弃载体音轨。
    #[arg(long, global = true)]
    pub drop_audio: bool,

    /// 输出更多日志 (-v 为 info，-vv 为 debug)。
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

fn parse_quantization(value: &str) -> Result<f64, String> {
    let q: f64 = value
        .parse()
        .map_err(|e| format!("'{value}' is not a number: {e}"))?;
    if q.is_finite() && q > 0.0 {
        Ok(q)
    } else {
        Err(format!("quantization must be a positive number, got {value}"))
    }
}

impl From<&GlobalArgs> for Config {
    fn from(args: &GlobalArgs) -> Self {
        Self {
            ffmpeg: args.ffmpeg.clone(),
            ffprobe: args.ffprobe.clone(),
            quantization: args.quantization,
            work_dir: args.work_dir.clone(),
            keep_cover_audio: !args.drop_audio,
            ..Default::default()
        }
    }
}

/// 可用的子命令。
#[derive(Parser, Debug)]
pub enum Commands {
    /// 在视频首帧中隐藏一段文本。
    Hide(HideArgs),

    /// 从隐写视频首帧中恢复文本。
    Recover(RecoverArgs),

    /// 把一段秘密视频隐藏到载体视频中。
    HideVideo(HideVideoArgs),

    /// 从隐写视频中恢复秘密视频。
    RecoverVideo(RecoverVideoArgs),

    /// 查询载体视频的隐写容量。
    Capacity(CapacityArgs),

    /// 显示视频的基本信息。
    Info(InfoArgs),
}

/// 'hide' 命令所需的参数。
#[derive(Parser, Debug)]
pub struct HideArgs {
    /// 载体视频文件路径。
    #[arg(short, long)]
    pub input: PathBuf,

    /// 要隐藏的文本。
    #[arg(short, long, conflicts_with = "text", required_unless_present = "text")]
    pub message: Option<String>,

    /// 从文件读取要隐藏的文本。
    #[arg(short, long)]
    pub text: Option<PathBuf>,

    /// 隐写方法 (lsb 或 dct)。
    #[arg(long, value_enum, default_value_t = Method::Lsb)]
    pub method: Method,

    /// 输出视频路径，默认为 `<输入文件名>_steg.mkv`。
    #[arg(short, long)]
    pub dest: Option<PathBuf>,

    /// 覆盖已存在的输出文件。
    #[arg(short, long)]
    pub force: bool,
}

/// 'recover' 命令所需的参数。
#[derive(Parser, Debug)]
pub struct RecoverArgs {
    /// 隐写视频文件路径。
    #[arg(short, long)]
    pub input: PathBuf,

    /// 隐写时使用的方法。
    #[arg(long, value_enum, default_value_t = Method::Lsb)]
    pub method: Method,

    /// 把恢复的文本保存到此文件；省略时直接打印。
    #[arg(short, long)]
    pub text: Option<PathBuf>,

    /// 覆盖已存在的文本文件。
    #[arg(short, long)]
    pub force: bool,
}

/// 'hide-video' 命令所需的参数。
#[derive(Parser, Debug)]
pub struct HideVideoArgs {
    /// 载体视频文件路径。
    #[arg(short, long)]
    pub cover: PathBuf,

    /// 要隐藏的秘密视频文件路径。
    #[arg(short, long)]
    pub secret: PathBuf,

    /// 输出视频路径，默认为 `<载体文件名>_steg.mkv`。
    #[arg(short, long)]
    pub dest: Option<PathBuf>,

    /// 覆盖已存在的输出文件。
    #[arg(short, long)]
    pub force: bool,
}

/// 'recover-video' 命令所需的参数。
#[derive(Parser, Debug)]
pub struct RecoverVideoArgs {
    /// 隐写视频文件路径。
    #[arg(short, long)]
    pub input: PathBuf,

    /// 恢复出的秘密视频的保存路径。
    #[arg(short, long)]
    pub dest: PathBuf,

    /// 覆盖已存在的输出文件。
    #[arg(short, long)]
    pub force: bool,
}

/// 'capacity' 命令所需的参数。
#[derive(Parser, Debug)]
pub struct CapacityArgs {
    /// 载体视频文件路径。
    #[arg(short, long)]
    pub input: PathBuf,

    /// 只查询指定方法；省略时列出全部方法。
    #[arg(long, value_enum)]
    pub method: Option<Method>,
}

/// 'info' 命令所需的参数。
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// 视频文件路径。
    #[arg(short, long)]
    pub input: PathBuf,
}
