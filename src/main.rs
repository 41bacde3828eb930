//! # 风格迁移工具：命令行入口
//!
//! 本文件仅负责参数解析、日志初始化与命令编排。
//! 业务逻辑分布在 `stylize` 子模块中，详见 `lib.rs` 架构文档。

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use style_transfer::error::AppError;
use style_transfer::settings;
use style_transfer::storage;
use style_transfer::stylize::{
    ConsoleNotifier, FileSink, ModelState, RemoteInferenceEngine, StyleTransferService,
    StylizeError, StylizeOutcome,
};

/// 把风格图的笔触迁移到内容图上。
#[derive(Parser, Debug)]
#[command(name = "style-transfer")]
#[command(version, about, long_about = None)]
struct Args {
    /// 内容图路径。
    #[arg(long, value_name = "FILE")]
    content: PathBuf,

    /// 风格图路径。
    #[arg(long, value_name = "FILE")]
    style: PathBuf,

    /// 推理服务地址，覆盖设置文件中的 `endpoint`。
    #[arg(long, value_name = "URL")]
    endpoint: Option<String>,

    /// 结果输出目录，默认 `./output`。
    #[arg(long, value_name = "DIR")]
    out_dir: Option<PathBuf>,

    /// JSON 设置文件。
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// 性能档位：quality / balanced / speed。
    #[arg(long, value_name = "PROFILE")]
    profile: Option<String>,

    /// 输出调试日志。
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), AppError> {
    let mut settings = settings::load_settings(args.config.as_deref(), args.profile.as_deref())?;
    if let Some(endpoint) = args.endpoint {
        settings.remote.endpoint = endpoint;
    }

    let output_dir = storage::resolve_output_dir(args.out_dir.as_deref())?;
    let service = StyleTransferService::<RemoteInferenceEngine, _>::with_config(
        settings.stylize,
        ConsoleNotifier,
    )?;

    let remote = settings.remote;
    let model_state = service
        .spawn_load_model(move || async move { RemoteInferenceEngine::new(&remote) })
        .await
        .map_err(|e| StylizeError::Internal(format!("模型加载任务异常退出：{}", e)))?;
    if model_state != ModelState::Ready {
        return Err(StylizeError::ModelLoad("推理引擎不可用".to_string()).into());
    }

    service.ingest_content_file(&args.content)?;
    service.ingest_style_file(&args.style)?;

    let outcome = service
        .spawn_apply_style()
        .await
        .map_err(|e| StylizeError::Internal(format!("风格化任务异常退出：{}", e)))?;

    match outcome {
        StylizeOutcome::Completed { width, height } => {
            log::info!("🎉 风格化完成：{}x{}", width, height);
        }
        StylizeOutcome::Failed { code, message } => {
            return Err(AppError::Stylization { code, message });
        }
        other => {
            return Err(StylizeError::Internal(format!("风格化未执行：{:?}", other)).into());
        }
    }

    let sink = FileSink::new(&output_dir);
    service.download(&sink)?;

    let info = storage::output_dir_info(&output_dir)?;
    log::info!(
        "📂 输出目录 {}：{} 个文件，共 {}KB",
        info.path,
        info.file_count,
        info.total_size / 1024
    );

    Ok(())
}
