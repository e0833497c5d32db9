use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use tracing::{error, info};

use ai_sports_daily::config::{AppConfig, SourceConfig, DEFAULT_SETTINGS_PATH};
use ai_sports_daily::generator::Publisher;
use ai_sports_daily::pipeline::{self, RunLock, RunOutcome};
use ai_sports_daily::server::{self, AppState};
use ai_sports_daily::utils::{logger, scheduler::TaskScheduler};

#[derive(Parser)]
#[command(name = "sports-daily")]
#[command(about = "AI 与运动资讯日报生成器", long_about = None)]
struct Cli {
    /// 配置文件路径
    #[arg(short, long, default_value = DEFAULT_SETTINGS_PATH)]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 生成默认配置和订阅源文档
    Init,
    /// 执行一次完整的抓取、标注和发布
    Run {
        /// 日报日期 (YYYY-MM-DD)，默认今天
        #[arg(short, long)]
        date: Option<String>,
    },
    /// 只根据已发布的页面重建首页
    RebuildIndex,
    /// 启动定时任务
    Schedule,
    /// 启动管理接口
    Serve {
        /// 同时启动定时任务（与管理接口共用运行锁）
        #[arg(long)]
        schedule: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    logger::init_logger();
    info!("sports-daily 启动");

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => init_command(&cli.config).await?,
        Commands::Run { date } => run_command(&cli.config, date).await?,
        Commands::RebuildIndex => rebuild_index_command(&cli.config).await?,
        Commands::Schedule => schedule_command(&cli.config).await?,
        Commands::Serve { schedule } => serve_command(&cli.config, schedule).await?,
    }

    Ok(())
}

async fn init_command(config_path: &str) -> Result<()> {
    info!("初始化系统...");

    if Path::new(config_path).exists() {
        info!("配置文件已存在，跳过: {}", config_path);
    } else {
        AppConfig::default().save(config_path)?;
        info!("已生成配置文件: {}", config_path);
    }

    let app_config = AppConfig::load_from(config_path)?;
    let sources_path = &app_config.pipeline.sources_path;
    if sources_path.exists() {
        info!("订阅源文档已存在，跳过: {}", sources_path.display());
    } else {
        SourceConfig::default().save(sources_path)?;
        info!("已生成订阅源文档: {}", sources_path.display());
    }

    let publisher = Publisher::new(app_config.generator.clone());
    publisher.write_static_assets().await?;

    info!("✅ 系统初始化完成！");
    info!("下一步:");
    info!("  1. 编辑 {} 配置生成服务地址和模型", config_path);
    info!("  2. 编辑 {} 配置订阅源和关键词", sources_path.display());
    info!("  3. 运行 'sports-daily run' 生成今天的日报");
    Ok(())
}

async fn run_command(config_path: &str, date: Option<String>) -> Result<()> {
    let today = match date {
        Some(s) => NaiveDate::parse_from_str(&s, "%Y-%m-%d").with_context(|| format!("日期格式错误: {}", s))?,
        None => Local::now().date_naive(),
    };
    info!("生成日报: {}", today);

    let app_config = AppConfig::load_from(config_path)?;
    let lock = RunLock::new();
    let Some(report) = pipeline::run_guarded(&app_config, &lock, today).await? else {
        return Ok(());
    };

    match report.outcome {
        RunOutcome::Published { date, displayed, archived, headlines } => info!(
            "✅ {} 日报已发布: 展示 {} 篇, 归档 {} 篇, 头条 {} 篇",
            date, displayed, archived, headlines
        ),
        RunOutcome::NothingToPublish => info!("没有可发布的文章，未生成页面"),
    }
    Ok(())
}

async fn rebuild_index_command(config_path: &str) -> Result<()> {
    let app_config = AppConfig::load_from(config_path)?;
    let publisher = Publisher::new(app_config.generator.clone());
    publisher.write_static_assets().await?;

    let history = pipeline::rebuild_index(&publisher, Local::now().date_naive(), None).await?;
    info!("✅ 首页已重建，共 {} 期", history.len());
    Ok(())
}

async fn register_daily_run(scheduler: &TaskScheduler, app_config: Arc<AppConfig>, lock: RunLock) -> Result<()> {
    let cron = app_config.schedule.cron.clone();
    scheduler
        .add_daily_job(&cron, move || {
            let app_config = Arc::clone(&app_config);
            let lock = lock.clone();
            async move {
                let today = Local::now().date_naive();
                if let Err(e) = pipeline::run_guarded(&app_config, &lock, today).await {
                    error!("定时运行失败: {:#}", e);
                }
            }
        })
        .await
}

async fn schedule_command(config_path: &str) -> Result<()> {
    info!("启动定时任务调度器...");

    let app_config = Arc::new(AppConfig::load_from(config_path)?);
    let scheduler = TaskScheduler::new().await?;
    register_daily_run(&scheduler, app_config, RunLock::new()).await?;
    scheduler.start().await?;

    info!("调度器运行中，按 Ctrl+C 停止");
    tokio::signal::ctrl_c().await?;
    info!("收到停止信号");

    scheduler.shutdown().await?;
    Ok(())
}

async fn serve_command(config_path: &str, with_schedule: bool) -> Result<()> {
    let app_config = AppConfig::load_from(config_path)?;
    let lock = RunLock::new();

    let scheduler = if with_schedule {
        let scheduler = TaskScheduler::new().await?;
        register_daily_run(&scheduler, Arc::new(app_config.clone()), lock.clone()).await?;
        scheduler.start().await?;
        Some(scheduler)
    } else {
        None
    };

    let state = AppState::new(app_config, lock);
    tokio::select! {
        result = server::serve(state) => result?,
        _ = tokio::signal::ctrl_c() => info!("收到停止信号"),
    }

    if let Some(scheduler) = scheduler {
        scheduler.shutdown().await?;
    }
    Ok(())
}
