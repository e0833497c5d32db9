use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::info;

pub struct TaskScheduler {
    scheduler: JobScheduler,
}

impl TaskScheduler {
    pub async fn new() -> Result<Self> {
        let scheduler = JobScheduler::new().await?;
        Ok(Self { scheduler })
    }

    /// 按 cron 表达式（六段，含秒）注册一个异步任务
    pub async fn add_daily_job<F, Fut>(&self, cron_expr: &str, job_fn: F) -> Result<()>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let job_fn = Arc::new(job_fn);
        let job = Job::new_async(cron_expr, move |_uuid, _lock| {
            let job_fn = Arc::clone(&job_fn);
            Box::pin(async move {
                info!("执行定时任务");
                job_fn().await;
            })
        })?;

        self.scheduler.add(job).await?;
        info!("已注册定时任务: {}", cron_expr);
        Ok(())
    }

    pub async fn start(&self) -> Result<()> {
        self.scheduler.start().await?;
        info!("任务调度器已启动");
        Ok(())
    }

    pub async fn shutdown(mut self) -> Result<()> {
        self.scheduler.shutdown().await?;
        info!("任务调度器已关闭");
        Ok(())
    }
}
