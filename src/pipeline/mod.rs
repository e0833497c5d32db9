pub mod filter;

use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{error, info, warn};

use crate::config::{AppConfig, SourceConfig};
use crate::crawler::{self, ArticleSource};
use crate::generator::Publisher;
use crate::storage::{Article, EnrichedArticle, HistoryEntry};
use crate::summarizer::{self, Summarizer};
use crate::utils::DailyResult;

pub use filter::filter_articles;

/// 单次运行的阶段，Done 是唯一的终止状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Idle,
    Fetching,
    Filtering,
    Enriching,
    Publishing,
    IndexRebuilding,
    Done,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RunStage::Idle => "空闲",
            RunStage::Fetching => "抓取",
            RunStage::Filtering => "过滤",
            RunStage::Enriching => "AI 标注",
            RunStage::Publishing => "发布",
            RunStage::IndexRebuilding => "重建首页",
            RunStage::Done => "完成",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunOutcome {
    Published {
        date: NaiveDate,
        displayed: usize,
        archived: usize,
        headlines: usize,
    },
    /// 没有文章通过过滤，什么都没写
    NothingToPublish,
}

/// 每个阶段的计数，便于区分"没有匹配关键词"、"生成服务不可用"和"发布失败"
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub fetched: usize,
    pub filtered: usize,
    pub processed: usize,
    pub enriched: usize,
    pub fallbacks: usize,
    pub outcome: RunOutcome,
}

impl RunReport {
    fn empty(fetched: usize, filtered: usize) -> Self {
        Self {
            fetched,
            filtered,
            processed: 0,
            enriched: 0,
            fallbacks: 0,
            outcome: RunOutcome::NothingToPublish,
        }
    }
}

/// 进程内的运行锁：同一输出目录同一时间只允许一次运行
#[derive(Debug, Clone, Default)]
pub struct RunLock(Arc<Mutex<()>>);

impl RunLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已有运行在进行时返回 None
    pub fn try_acquire(&self) -> Option<OwnedMutexGuard<()>> {
        self.0.clone().try_lock_owned().ok()
    }

    pub fn is_running(&self) -> bool {
        self.0.try_lock().is_err()
    }
}

pub struct Pipeline {
    sources: Vec<Box<dyn ArticleSource>>,
    keywords: Vec<String>,
    summarizer: Summarizer,
    publisher: Publisher,
    max_articles: usize,
    stage: RunStage,
}

impl Pipeline {
    pub fn new(
        sources: Vec<Box<dyn ArticleSource>>,
        keywords: Vec<String>,
        summarizer: Summarizer,
        publisher: Publisher,
        max_articles: usize,
    ) -> Self {
        Self {
            sources,
            keywords,
            summarizer,
            publisher,
            max_articles,
            stage: RunStage::Idle,
        }
    }

    pub fn from_config(app: &AppConfig, sources: &SourceConfig) -> Result<Self> {
        Ok(Self::new(
            crawler::build_sources(&app.crawler, sources)?,
            sources.keywords.clone(),
            Summarizer::from_config(&app.llm)?,
            Publisher::new(app.generator.clone()),
            app.pipeline.max_articles_per_run,
        ))
    }

    pub fn stage(&self) -> RunStage {
        self.stage
    }

    fn advance(&mut self, stage: RunStage) {
        info!("[{}] -> [{}]", self.stage, stage);
        self.stage = stage;
    }

    /// 抓取 → 过滤 → 截取 → 逐篇标注 → 发布当天页面 → 重建首页
    pub async fn run(&mut self, today: NaiveDate) -> Result<RunReport> {
        self.advance(RunStage::Fetching);
        let raw = self.fetch_all().await;
        info!("原始文章共 {} 篇", raw.len());

        self.advance(RunStage::Filtering);
        let fetched = raw.len();
        let filtered = filter_articles(raw, &self.keywords);
        info!("去重和关键词过滤后剩余 {} 篇", filtered.len());
        if filtered.is_empty() {
            warn!("没有文章匹配关键词，本次不生成页面");
            self.advance(RunStage::Done);
            return Ok(RunReport::empty(fetched, 0));
        }

        let filtered_count = filtered.len();
        let batch: Vec<Article> = filtered.into_iter().take(self.max_articles).collect();

        self.advance(RunStage::Enriching);
        let processed = batch.len();
        let enriched = self.enrich_all(batch).await;
        let fallbacks = enriched.iter().filter(|a| a.annotation.is_fallback()).count();
        info!("标注完成: {} 篇成功, {} 篇使用兜底", processed - fallbacks, fallbacks);

        self.advance(RunStage::Publishing);
        self.publisher.write_static_assets().await.context("写入静态资源失败")?;
        let report = self
            .publisher
            .publish_daily(today, enriched)
            .await
            .with_context(|| format!("发布 {} 日报失败", today))?;

        self.advance(RunStage::IndexRebuilding);
        rebuild_index(&self.publisher, today, Some(report.total()))
            .await
            .context("重建首页失败")?;

        self.advance(RunStage::Done);
        Ok(RunReport {
            fetched,
            filtered: filtered_count,
            processed,
            enriched: processed - fallbacks,
            fallbacks,
            outcome: RunOutcome::Published {
                date: today,
                displayed: report.display.len(),
                archived: report.overflow.len(),
                headlines: report.headlines.len(),
            },
        })
    }

    async fn fetch_all(&self) -> Vec<Article> {
        let mut articles = Vec::new();
        for source in &self.sources {
            match source.fetch().await {
                Ok(batch) => {
                    info!("{}: {} 篇", source.name(), batch.len());
                    articles.extend(batch);
                }
                Err(e) => warn!("{} 抓取失败: {:#}", source.name(), e),
            }
        }
        articles
    }

    /// 逐篇串行标注；单篇任务异常时记录日志并保留原文（兜底标注）
    async fn enrich_all(&self, articles: Vec<Article>) -> Vec<EnrichedArticle> {
        let total = articles.len();
        let mut enriched = Vec::with_capacity(total);

        for (i, article) in articles.into_iter().enumerate() {
            info!("处理 {}/{}...", i + 1, total);
            let worker = self.summarizer.clone();
            let original = article.clone();
            match tokio::spawn(async move { worker.enrich(article).await }).await {
                Ok(done) => enriched.push(done),
                Err(e) => {
                    error!("处理 {} 时出错: {}", original.title, e);
                    enriched.push(summarizer::fallback(original));
                }
            }
        }
        enriched
    }
}

/// 获取运行锁后执行一次完整流程；已有运行时跳过并返回 None
pub async fn run_guarded(app: &AppConfig, lock: &RunLock, today: NaiveDate) -> Result<Option<RunReport>> {
    let Some(guard) = lock.try_acquire() else {
        warn!("已有任务在运行，跳过本次触发");
        return Ok(None);
    };
    run_with_guard(app, guard, today).await.map(Some)
}

/// 调用方已持有运行锁；订阅源文档在每次运行开始时重新读取
pub async fn run_with_guard(app: &AppConfig, _guard: OwnedMutexGuard<()>, today: NaiveDate) -> Result<RunReport> {
    let sources = SourceConfig::load(&app.pipeline.sources_path)?;
    let mut pipeline = Pipeline::from_config(app, &sources)?;
    let report = pipeline.run(today).await?;
    info!(
        "运行结束: 抓取 {} 篇, 过滤后 {} 篇, 标注 {} 篇 (兜底 {} 篇)",
        report.fetched, report.filtered, report.processed, report.fallbacks
    );
    Ok(report)
}

/// 扫描已发布的日期目录并重新生成首页
///
/// `published_today` 是本次运行刚写入的文章数；扫描结果里缺少今天时会补上。
pub async fn rebuild_index(
    publisher: &Publisher,
    today: NaiveDate,
    published_today: Option<usize>,
) -> DailyResult<Vec<HistoryEntry>> {
    let mut history = publisher.store().scan_history().await?;
    if let Some(count) = published_today {
        if !history.iter().any(|h| h.date == today) {
            history.push(HistoryEntry { date: today, count });
            history.sort();
        }
    }
    info!("历史索引共 {} 期", history.len());

    publisher.publish_index(today, &history).await?;
    Ok(history)
}
