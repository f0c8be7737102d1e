use clap::Parser;
use log::{LevelFilter, debug};

use vid_hide::{
    cli::{Cli, Commands},
    config::Config,
    ffmpeg::FfmpegService,
    handler::{
        handle_capacity, handle_hide, handle_hide_video, handle_info, handle_recover,
        handle_recover_video,
    },
};

/// 程序的主入口点
///
/// 负责解析命令行参数、初始化日志与运行配置，
/// 并根据子命令将执行分派到相应的处理函数
fn main() -> anyhow::Result<()> {
    // 解析命令行参数
    let cli = Cli::parse();

    // 默认只输出警告，-v / -vv 提升级别，RUST_LOG 可覆盖
    let level = match cli.global.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let config = Config::from(&cli.global);
    debug!("{config:?}");
    let media = FfmpegService::new(&config);

    // 根据子命令调用相应的处理函数
    match cli.command {
        Commands::Hide(args) => handle_hide(args, &media, &config),
        Commands::Recover(args) => handle_recover(args, &media, &config),
        Commands::HideVideo(args) => handle_hide_video(args, &media, &config),
        Commands::RecoverVideo(args) => handle_recover_video(args, &media, &config),
        Commands::Capacity(args) => handle_capacity(args, &media),
        Commands::Info(args) => handle_info(args, &media),
    }
}
