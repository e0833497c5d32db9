//! 管理接口：编辑订阅源文档、手动触发运行、查看运行状态。

pub mod handlers;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Local};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::info;

use crate::config::AppConfig;
use crate::pipeline::{RunLock, RunReport};

/// 最近一次由管理接口触发的运行结果
#[derive(Debug, Clone, Serialize)]
pub struct LastRun {
    pub finished_at: DateTime<Local>,
    pub success: bool,
    pub report: Option<RunReport>,
    pub error: Option<String>,
}

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<AppConfig>,
    pub run_lock: RunLock,
    pub last_run: Arc<Mutex<Option<LastRun>>>,
}

impl AppState {
    /// `run_lock` 与定时任务共用，保证同一时间只有一次运行
    pub fn new(settings: AppConfig, run_lock: RunLock) -> Self {
        Self {
            settings: Arc::new(settings),
            run_lock,
            last_run: Arc::new(Mutex::new(None)),
        }
    }

    pub fn sources_path(&self) -> &PathBuf {
        &self.settings.pipeline.sources_path
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/config", get(handlers::get_config).post(handlers::save_config))
        .route("/api/run", post(handlers::trigger_run))
        .route("/api/status", get(handlers::status))
        .with_state(state)
}

pub async fn serve(state: AppState) -> Result<()> {
    let bind = state.settings.server.bind.clone();
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("无法监听 {}", bind))?;
    info!("管理接口已启动: http://{}", bind);

    axum::serve(listener, router(state)).await?;
    Ok(())
}
