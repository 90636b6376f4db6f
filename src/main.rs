use clap::Parser;
use sticker_pack_uploader::{
    cli::Cli,
    config::AppConfig,
    logging,
    telegram::{BotApiClient, BotEndpoint},
    uploader::{FolderScanner, GroupPlan, GroupPlanner, RetryEngine, UploadOrchestrator},
};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// 配置或启动阶段出错时的退出码
const EXIT_STARTUP_ERROR: u8 = 2;

/// 加载配置文件，应用命令行覆盖并校验
async fn load_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let mut config = AppConfig::load_or_default(&cli.config).await?;
    cli.apply_overrides(&mut config);
    config.validate(!cli.dry_run)?;
    Ok(config)
}

/// 打印上传计划（dry-run）
fn print_plan(plans: &[GroupPlan]) {
    for plan in plans {
        info!(
            "第 {} 组: {} [{}], {} 个文件 -> {}",
            plan.index + 1,
            plan.title,
            plan.collection_name,
            plan.entries.len(),
            plan.link()
        );
        for entry in &plan.entries {
            info!(
                "  {:>3}. {:<20} {}",
                entry.position + 1,
                entry.operation.method(),
                entry.item.display_name
            );
        }
    }
}

async fn run(cli: &Cli, config: AppConfig) -> anyhow::Result<ExitCode> {
    let items = FolderScanner::with_options(config.upload.to_scan_options())
        .scan(&config.upload.source_dir)?;

    let planner = GroupPlanner::new(
        config.naming(),
        config.sticker.to_style(),
        config.upload.max_group_size,
    );

    if cli.dry_run {
        let plans = planner.plan(&items);
        if plans.is_empty() {
            info!("没有找到可上传的文件");
        }
        print_plan(&plans);
        return Ok(ExitCode::SUCCESS);
    }

    let client = BotApiClient::new(config.upload.request_timeout())?;

    // 🔥 Ctrl+C 取消当前请求或等待
    let cancel_token = CancellationToken::new();
    let signal_token = cancel_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("收到 Ctrl+C，正在停止上传...");
            signal_token.cancel();
        }
    });

    let engine = RetryEngine::new(client, config.upload.to_retry_policy())
        .with_cancel_token(cancel_token);
    let endpoint = BotEndpoint::new(&config.bot.api_base, &config.bot.token);
    let orchestrator = UploadOrchestrator::new(engine, endpoint, planner);

    match orchestrator.run(&items).await {
        Ok(summary) => {
            if summary.groups > 0 {
                info!(
                    "全部完成: {} 个贴纸集, {} 个文件, 共 {} 次请求",
                    summary.groups, summary.items, summary.attempts
                );
                for link in &summary.links {
                    info!("  {}", link);
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!("上传中止: {}", e);
            Ok(ExitCode::from(e.exit_code()))
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // 日志依赖配置，配置阶段的错误直接输出到 stderr
    let config = match load_config(&cli).await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("配置错误: {:#}", e);
            return ExitCode::from(EXIT_STARTUP_ERROR);
        }
    };

    // 🔥 必须保持 _log_guard 存活直到退出
    let _log_guard = logging::init_logging(&config.log, cli.verbose);

    info!("Sticker Uploader v{} 启动", env!("CARGO_PKG_VERSION"));

    match run(&cli, config).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(EXIT_STARTUP_ERROR)
        }
    }
}
