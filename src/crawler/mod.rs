pub mod reddit;
pub mod rss;

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;

use crate::config::{CrawlerConfig, SourceConfig};
use crate::storage::Article;

pub use reddit::RedditFetcher;
pub use rss::RssFetcher;

/// 文章生产者：返回标准化后的文章列表
#[async_trait]
pub trait ArticleSource: Send + Sync {
    fn name(&self) -> &str;
    async fn fetch(&self) -> Result<Vec<Article>>;
}

pub fn build_client(config: &CrawlerConfig) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .user_agent(config.user_agent.clone())
        .build()
        .context("创建 HTTP 客户端失败")
}

/// 根据订阅源文档创建全部抓取器
pub fn build_sources(config: &CrawlerConfig, sources: &SourceConfig) -> Result<Vec<Box<dyn ArticleSource>>> {
    let client = build_client(config)?;
    let delay = Duration::from_millis(config.request_delay_ms);

    Ok(vec![
        Box::new(RssFetcher::new(
            client.clone(),
            sources.rss_feeds.clone(),
            config.entries_per_source,
            delay,
        )),
        Box::new(RedditFetcher::new(
            client,
            sources.subreddits.clone(),
            config.entries_per_source,
            delay,
        )),
    ])
}

/// 同一来源的连续请求之间等待
async fn pace(index: usize, delay: Duration) {
    if index > 0 && !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
