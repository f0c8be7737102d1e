//! # 隐写流水线模块
//!
//! 把编解码器、容量校验与媒体服务串成完整的操作。所有容量校验都在打开写入器之前完成，
//! 因此校验失败时不会产生任何输出文件。

use crate::bitframe::BitFrame;
use crate::capacity::{Method, capacity};
use crate::codec::text_codec;
use crate::config::Config;
use crate::error::{Result, StegoError};
use crate::media::{AudioRequest, MediaService, VideoInfo};
use crate::viv;
use log::{debug, info};
use std::path::{Path, PathBuf};

/// 探测视频的尺寸、帧率、帧数与是否带音轨。
pub fn video_info(media: &dyn MediaService, path: &Path) -> Result<VideoInfo> {
    media.probe(path)
}

/// 查询载体视频在指定方法下的容量 (字节)。
pub fn query_capacity(media: &dyn MediaService, cover: &Path, method: Method) -> Result<usize> {
    let info = media.probe(cover)?;
    Ok(capacity(info.width, info.height, info.frame_count, method))
}

/// 生成默认输出路径：与输入同目录，文件名为 `<stem><suffix>.mkv`。
///
/// 输出总是 Matroska 容器，只有它能容纳全部无损编码器。
pub fn default_output_path(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    input.with_file_name(format!("{stem}{suffix}.mkv"))
}

/// 把文本隐藏到载体视频的首帧，其余帧原样写出。
///
/// # Errors
///
/// * [`StegoError::UnsupportedMethod`]: `method` 为 `viv`。
/// * [`StegoError::CapacityExceeded`]: 位帧超出首帧预算，此时不会创建输出。
pub fn encode_message(
    media: &dyn MediaService,
    config: &Config,
    cover: &Path,
    output: &Path,
    text: &str,
    method: Method,
) -> Result<()> {
    let codec = text_codec(method, config)?;
    let bitframe = BitFrame::encode(text)?;

    let info = media.probe(cover)?;
    let available = codec.bit_budget(info.width, info.height);
    if bitframe.len() > available {
        return Err(StegoError::CapacityExceeded {
            required: bitframe.len(),
            available,
        });
    }
    info!(
        "hiding {} bits with {method} in {} ({}x{}, {} frames)",
        bitframe.len(),
        cover.display(),
        info.width,
        info.height,
        info.frame_count
    );

    let keep_audio = config.keep_cover_audio && info.has_audio;
    let work = config.working_dir()?;
    let video_path = if keep_audio {
        work.path().join("video.mkv")
    } else {
        output.to_path_buf()
    };

    let mut reader = media.open_reader(cover)?;
    let mut writer = media.open_writer(&video_path, info.fps, info.width, info.height)?;

    let mut first = true;
    while let Some(mut frame) = reader.next_frame()? {
        if first {
            codec.embed(&mut frame, &bitframe)?;
            first = false;
        }
        writer.write_frame(&frame)?;
    }
    if first {
        return Err(StegoError::unreadable(cover, "video has zero frames"));
    }
    debug!("wrote {} frames", writer.frames_written());
    writer.finish()?;

    if keep_audio {
        // 直接取载体容器中的原始音频流，不经过解码
        media.mux(&video_path, cover, output)?;
    }
    Ok(())
}

/// 从隐写视频的首帧中恢复文本。
pub fn decode_message(
    media: &dyn MediaService,
    config: &Config,
    stego: &Path,
    method: Method,
) -> Result<String> {
    let codec = text_codec(method, config)?;
    let mut reader = media.open_reader(stego)?;
    let frame = reader
        .next_frame()?
        .ok_or_else(|| StegoError::unreadable(stego, "video has zero frames"))?;

    let message = codec.extract(&frame)?;
    info!("recovered {} bytes with {method}", message.len());
    Ok(message)
}

/// 把整段秘密视频 (画面与音轨) 隐藏到载体视频中。
///
/// 输出帧率为载体的两倍，帧数为秘密帧数的两倍。
///
/// # Errors
///
/// 秘密帧数超过载体帧数的一半时返回 [`StegoError::InsufficientCapacity`]，
/// 此时不会创建输出。
pub fn encode_video(
    media: &dyn MediaService,
    config: &Config,
    cover: &Path,
    secret: &Path,
    output: &Path,
) -> Result<()> {
    let cover_info = media.probe(cover)?;
    let secret_info = media.probe(secret)?;
    viv::check_frame_budget(cover_info.frame_count, secret_info.frame_count)?;
    info!(
        "hiding {} secret frames in {} cover frames",
        secret_info.frame_count, cover_info.frame_count
    );

    let with_audio = cover_info.has_audio || secret_info.has_audio;
    let work = config.working_dir()?;
    let video_path = if with_audio {
        work.path().join("video.mkv")
    } else {
        output.to_path_buf()
    };

    let mut cover_reader = media.open_reader(cover)?;
    let mut secret_reader = media.open_reader(secret)?;
    let mut writer = media.open_writer(
        &video_path,
        cover_info.fps * 2.0,
        cover_info.width,
        cover_info.height,
    )?;
    viv::hide_frames(cover_reader.as_mut(), secret_reader.as_mut(), writer.as_mut())?;
    writer.finish()?;

    if !with_audio {
        return Ok(());
    }

    let duration = Some(secret_info.duration());
    let cover_audio = if cover_info.has_audio {
        let request = AudioRequest {
            max_duration: duration,
            format: None,
        };
        media.read_audio(cover, &request)?
    } else {
        None
    };
    let secret_audio = if secret_info.has_audio {
        let request = AudioRequest {
            max_duration: duration,
            format: cover_audio.as_ref().map(|a| a.format),
        };
        media.read_audio(secret, &request)?
    } else {
        None
    };

    match viv::hide_audio(cover_audio, secret_audio) {
        Some(audio) => {
            debug!("combined {} audio samples", audio.samples.len());
            let audio_path = work.path().join("audio.wav");
            media.write_audio(&audio, &audio_path)?;
            media.mux(&video_path, &audio_path, output)?;
        }
        None => {
            std::fs::copy(&video_path, output)?;
        }
    }
    Ok(())
}

/// 从隐写视频中恢复秘密视频，帧率减半还原。
///
/// # Errors
///
/// 隐写视频帧数为奇数时返回 [`StegoError::MalformedStegoStream`]，此时不会创建输出。
pub fn decode_video(
    media: &dyn MediaService,
    config: &Config,
    stego: &Path,
    output: &Path,
) -> Result<()> {
    let info = media.probe(stego)?;
    if info.frame_count % 2 != 0 {
        return Err(StegoError::MalformedStegoStream(format!(
            "stego video has an odd number of frames ({})",
            info.frame_count
        )));
    }

    let work = config.working_dir()?;
    let video_path = if info.has_audio {
        work.path().join("video.mkv")
    } else {
        output.to_path_buf()
    };

    let mut reader = media.open_reader(stego)?;
    let mut writer = media.open_writer(&video_path, info.fps / 2.0, info.width, info.height)?;
    let recovered = viv::reveal_frames(reader.as_mut(), writer.as_mut())?;
    writer.finish()?;
    info!("recovered {recovered} secret frames from {}", stego.display());

    if !info.has_audio {
        return Ok(());
    }

    match media.read_audio(stego, &AudioRequest::default())? {
        Some(audio) => {
            let audio_path = work.path().join("audio.wav");
            media.write_audio(&viv::reveal_audio(&audio), &audio_path)?;
            media.mux(&video_path, &audio_path, output)?;
        }
        None => {
            std::fs::copy(&video_path, output)?;
        }
    }
    Ok(())
}
