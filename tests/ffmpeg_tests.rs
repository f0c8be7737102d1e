//! 使用真实 ffmpeg/ffprobe 的端到端测试。系统中没有这两个可执行文件时自动跳过。

use image::RgbImage;
use rand::RngCore;
use std::path::Path;
use tempfile::tempdir;
use vid_hide::{
    capacity::Method,
    config::Config,
    ffmpeg::FfmpegService,
    media::{AudioFormat, AudioRequest, AudioSampleBuffer, MediaService},
    pipeline::{decode_message, decode_video, encode_message, encode_video, video_info},
};

fn service() -> Option<(FfmpegService, Config)> {
    let config = Config::default();
    let service = FfmpegService::new(&config);
    if service.is_available() {
        Some((service, config))
    } else {
        eprintln!("ffmpeg/ffprobe not found, skipping");
        None
    }
}

/// 用 ffmpeg 服务写出一段随机像素视频
fn write_noisy_video(
    service: &FfmpegService,
    path: &Path,
    width: u32,
    height: u32,
    frames: usize,
) -> anyhow::Result<()> {
    let mut writer = service.open_writer(path, 25.0, width, height)?;
    for _ in 0..frames {
        let mut raw = vec![0u8; (width * height * 3) as usize];
        rand::rng().fill_bytes(&mut raw);
        writer.write_frame(&RgbImage::from_raw(width, height, raw).unwrap())?;
    }
    writer.finish()?;
    Ok(())
}

#[test]
fn test_lossless_writer_preserves_pixels() -> anyhow::Result<()> {
    let Some((service, _)) = service() else {
        return Ok(());
    };
    let dir = tempdir()?;
    let path = dir.path().join("noise.mkv");

    let mut raw = vec![0u8; 64 * 48 * 3];
    rand::rng().fill_bytes(&mut raw);
    let frame = RgbImage::from_raw(64, 48, raw).unwrap();

    let mut writer = service.open_writer(&path, 25.0, 64, 48)?;
    writer.write_frame(&frame)?;
    writer.write_frame(&frame)?;
    writer.finish()?;

    let info = video_info(&service, &path)?;
    assert_eq!((info.width, info.height, info.frame_count), (64, 48, 2));
    assert!(!info.has_audio);

    let mut reader = service.open_reader(&path)?;
    assert_eq!(reader.next_frame()?, Some(frame.clone()));
    assert_eq!(reader.next_frame()?, Some(frame));
    assert_eq!(reader.next_frame()?, None);

    Ok(())
}

#[test]
fn test_text_round_trip_through_ffmpeg() -> anyhow::Result<()> {
    let Some((service, config)) = service() else {
        return Ok(());
    };
    let dir = tempdir()?;
    let cover = dir.path().join("cover.mkv");
    write_noisy_video(&service, &cover, 128, 96, 5)?;

    for method in [Method::Lsb, Method::Dct] {
        let stego = dir.path().join(format!("stego_{method}.mkv"));
        encode_message(&service, &config, &cover, &stego, "hidden in plain sight", method)?;
        assert_eq!(video_info(&service, &stego)?.frame_count, 5);
        assert_eq!(
            decode_message(&service, &config, &stego, method)?,
            "hidden in plain sight"
        );
    }

    Ok(())
}

#[test]
fn test_video_round_trip_through_ffmpeg() -> anyhow::Result<()> {
    let Some((service, config)) = service() else {
        return Ok(());
    };
    let dir = tempdir()?;
    let cover = dir.path().join("cover.mkv");
    let secret = dir.path().join("secret.mkv");
    let stego = dir.path().join("stego.mkv");
    let recovered = dir.path().join("recovered.mkv");
    write_noisy_video(&service, &cover, 32, 32, 6)?;
    write_noisy_video(&service, &secret, 32, 32, 3)?;

    encode_video(&service, &config, &cover, &secret, &stego)?;
    let info = video_info(&service, &stego)?;
    assert_eq!(info.frame_count, 6);
    assert!((info.fps - 50.0).abs() < 0.01);

    decode_video(&service, &config, &stego, &recovered)?;
    let mut original = service.open_reader(&secret)?;
    let mut restored = service.open_reader(&recovered)?;
    while let Some(want) = original.next_frame()? {
        let got = restored.next_frame()?.expect("recovered video is shorter");
        for (g, w) in got.iter().zip(want.iter()) {
            assert_eq!(*g, w & 0xF0);
        }
    }
    assert_eq!(restored.next_frame()?, None);

    Ok(())
}

#[test]
fn test_audio_survives_wav_and_mux() -> anyhow::Result<()> {
    let Some((service, _)) = service() else {
        return Ok(());
    };
    let dir = tempdir()?;
    let video = dir.path().join("video.mkv");
    let wav = dir.path().join("audio.wav");
    let muxed = dir.path().join("muxed.mkv");
    write_noisy_video(&service, &video, 16, 16, 25)?;

    let mut samples = vec![0u8; 8000];
    rand::rng().fill_bytes(&mut samples);
    let audio = AudioSampleBuffer::new(
        AudioFormat {
            sample_rate: 8000,
            channels: 1,
        },
        samples,
    );
    service.write_audio(&audio, &wav)?;
    service.mux(&video, &wav, &muxed)?;
    assert!(video_info(&service, &muxed)?.has_audio);

    let read = service
        .read_audio(&muxed, &AudioRequest::default())?
        .expect("muxed video has audio");
    assert_eq!(read.format, audio.format);
    assert_eq!(read.samples, audio.samples);

    Ok(())
}
