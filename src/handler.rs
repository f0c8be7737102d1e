//! # 命令处理逻辑模块
//!
//! 包含各子命令的高级业务逻辑。
//! 本模块负责校验输入输出路径、调用隐写流水线以及向用户报告结果。

use crate::capacity::Method;
use crate::cli::{
    CapacityArgs, HideArgs, HideVideoArgs, InfoArgs, RecoverArgs, RecoverVideoArgs,
};
use crate::config::Config;
use crate::constants::DEFAULT_OUTPUT_SUFFIX;
use crate::media::MediaService;
use crate::pipeline::{
    decode_message, decode_video, default_output_path, encode_message, encode_video,
    query_capacity, video_info,
};
use anyhow::{Context, Result};
use colored::Colorize;
use std::fs;
use std::path::Path;

/// 拒绝覆盖已存在的输出文件，除非指定了 `--force`。
fn ensure_writable(path: &Path, force: bool) -> Result<()> {
    anyhow::ensure!(
        force || !path.exists(),
        "Output file already exists: {} \nUse --force to overwrite it.",
        path.to_string_lossy().red().bold()
    );
    Ok(())
}

/// 处理 'Hide' 命令的执行逻辑。
///
/// 从参数或文本文件取得要隐藏的文本，用指定方法写入载体视频的首帧，
/// 结果保存到 `--dest` (默认为载体旁的 `<文件名>_steg.mkv`)。
///
/// # Errors
///
/// 如果发生以下任一情况，将返回错误：
/// * 无法读取文本文件，或输出文件已存在且未指定 `--force`。
/// * 载体首帧没有足够的空间隐藏文本。
/// * 媒体服务无法读取载体或写出结果。
pub fn handle_hide(args: HideArgs, media: &dyn MediaService, config: &Config) -> Result<()> {
    let text = match (&args.message, &args.text) {
        (Some(message), _) => message.clone(),
        (None, Some(path)) => fs::read_to_string(path).with_context(|| {
            format!(
                "Unable to read text file: {}",
                path.to_string_lossy().red().bold()
            )
        })?,
        (None, None) => anyhow::bail!("Nothing to hide: pass --message or --text"),
    };

    let dest = args
        .dest
        .unwrap_or_else(|| default_output_path(&args.input, DEFAULT_OUTPUT_SUFFIX));
    ensure_writable(&dest, args.force)?;

    encode_message(media, config, &args.input, &dest, &text, args.method).with_context(|| {
        format!(
            "Failed to hide the text in {} using {}.",
            args.input.to_string_lossy().red().bold(),
            args.method.to_string().red().bold()
        )
    })?;

    println!(
        "The text has been successfully hidden and saved: {}",
        dest.to_string_lossy().green().bold()
    );
    Ok(())
}

/// 处理 'Recover' 命令的执行逻辑。
///
/// 恢复出的文本保存到 `--text`，未指定时直接打印到标准输出。
pub fn handle_recover(args: RecoverArgs, media: &dyn MediaService, config: &Config) -> Result<()> {
    if let Some(path) = &args.text {
        ensure_writable(path, args.force)?;
    }

    let text = decode_message(media, config, &args.input, args.method).with_context(|| {
        format!(
            "Failed to recover text from '{}' using {}. \nThe video may not contain a hidden message or was re-encoded lossily.",
            args.input.to_string_lossy().red().bold(),
            args.method.to_string().red().bold()
        )
    })?;

    match &args.text {
        Some(path) => {
            fs::write(path, &text).with_context(|| {
                format!(
                    "Unable to write to target text file: {}",
                    path.to_string_lossy().red().bold()
                )
            })?;
            println!(
                "The text has been successfully recovered and saved: {}",
                path.to_string_lossy().green().bold()
            );
        }
        None => println!("{text}"),
    }
    Ok(())
}

/// 处理 'HideVideo' 命令的执行逻辑。
///
/// # Errors
///
/// 秘密视频帧数超过载体帧数的一半、输入无法读取或输出已存在时返回错误。
pub fn handle_hide_video(
    args: HideVideoArgs,
    media: &dyn MediaService,
    config: &Config,
) -> Result<()> {
    let dest = args
        .dest
        .unwrap_or_else(|| default_output_path(&args.cover, DEFAULT_OUTPUT_SUFFIX));
    ensure_writable(&dest, args.force)?;

    encode_video(media, config, &args.cover, &args.secret, &dest).with_context(|| {
        format!(
            "Failed to hide {} in {}.",
            args.secret.to_string_lossy().red().bold(),
            args.cover.to_string_lossy().red().bold()
        )
    })?;

    println!(
        "The secret video has been successfully hidden and saved: {}",
        dest.to_string_lossy().green().bold()
    );
    Ok(())
}

/// 处理 'RecoverVideo' 命令的执行逻辑。
pub fn handle_recover_video(
    args: RecoverVideoArgs,
    media: &dyn MediaService,
    config: &Config,
) -> Result<()> {
    ensure_writable(&args.dest, args.force)?;

    decode_video(media, config, &args.input, &args.dest).with_context(|| {
        format!(
            "Failed to recover a secret video from '{}'.",
            args.input.to_string_lossy().red().bold()
        )
    })?;

    println!(
        "The secret video has been successfully recovered and saved: {}",
        args.dest.to_string_lossy().green().bold()
    );
    Ok(())
}

/// 处理 'Capacity' 命令：列出指定方法 (或全部方法) 的容量。
pub fn handle_capacity(args: CapacityArgs, media: &dyn MediaService) -> Result<()> {
    let methods = match args.method {
        Some(method) => vec![method],
        None => vec![Method::Lsb, Method::Dct, Method::Viv],
    };

    for method in methods {
        let bytes = query_capacity(media, &args.input, method).with_context(|| {
            format!(
                "Unable to read video file: {}",
                args.input.to_string_lossy().red().bold()
            )
        })?;
        println!("{:>4}: {} bytes", method, bytes.to_string().green().bold());
    }
    Ok(())
}

/// 处理 'Info' 命令：打印视频的尺寸、帧率、帧数与音轨情况。
pub fn handle_info(args: InfoArgs, media: &dyn MediaService) -> Result<()> {
    let info = video_info(media, &args.input).with_context(|| {
        format!(
            "Unable to read video file: {}",
            args.input.to_string_lossy().red().bold()
        )
    })?;

    println!("{}", args.input.to_string_lossy().bold());
    println!("  size:     {}x{}", info.width, info.height);
    println!("  fps:      {:.3}", info.fps);
    println!("  frames:   {}", info.frame_count);
    println!("  duration: {:.3}s", info.duration());
    println!("  audio:    {}", if info.has_audio { "yes" } else { "no" });
    Ok(())
}
