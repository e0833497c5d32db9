use axum::{extract::State, http::StatusCode, Json};
use chrono::Local;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use super::{AppState, LastRun};
use crate::config::SourceConfig;
use crate::pipeline;

type Reply = (StatusCode, Json<Value>);

fn reply(code: StatusCode, status: &str, message: impl Into<String>) -> Reply {
    (code, Json(json!({ "status": status, "message": message.into() })))
}

pub async fn get_config(State(state): State<AppState>) -> Result<Json<SourceConfig>, Reply> {
    SourceConfig::load(state.sources_path())
        .map(Json)
        .map_err(|e| reply(StatusCode::INTERNAL_SERVER_ERROR, "error", e.to_string()))
}

/// 请求体必须是合法的订阅源文档，校验通过后原子写入
pub async fn save_config(State(state): State<AppState>, body: String) -> Reply {
    let sources = match SourceConfig::from_json(&body) {
        Ok(sources) => sources,
        Err(e) => {
            warn!("拒绝保存订阅源: {}", e);
            return reply(StatusCode::BAD_REQUEST, "error", e.to_string());
        }
    };

    match sources.save(state.sources_path()) {
        Ok(()) => {
            info!(
                feeds = sources.rss_feeds.len(),
                subreddits = sources.subreddits.len(),
                keywords = sources.keywords.len(),
                "订阅源已保存"
            );
            reply(StatusCode::OK, "success", "saved")
        }
        Err(e) => {
            error!("保存订阅源失败: {}", e);
            reply(StatusCode::INTERNAL_SERVER_ERROR, "error", e.to_string())
        }
    }
}

/// 后台启动一次运行；已有运行时返回 409
pub async fn trigger_run(State(state): State<AppState>) -> Reply {
    let Some(guard) = state.run_lock.try_acquire() else {
        return reply(StatusCode::CONFLICT, "busy", "a run is already in progress");
    };

    let settings = state.settings.clone();
    let last_run = state.last_run.clone();
    tokio::spawn(async move {
        info!("管理接口触发运行");
        let today = Local::now().date_naive();
        let result = pipeline::run_with_guard(&settings, guard, today).await;

        let record = match result {
            Ok(report) => LastRun {
                finished_at: Local::now(),
                success: true,
                report: Some(report),
                error: None,
            },
            Err(e) => {
                error!("运行失败: {:#}", e);
                LastRun {
                    finished_at: Local::now(),
                    success: false,
                    report: None,
                    error: Some(format!("{:#}", e)),
                }
            }
        };
        *last_run.lock().await = Some(record);
    });

    reply(StatusCode::ACCEPTED, "started", "collection started in background")
}

pub async fn status(State(state): State<AppState>) -> Json<Value> {
    let last_run = state.last_run.lock().await.clone();
    Json(json!({
        "running": state.run_lock.is_running(),
        "last_run": last_run,
    }))
}
