use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{info, warn};

use super::{pace, ArticleSource};
use crate::config::FeedSource;
use crate::storage::{Article, SourceKind};
use crate::utils::DailyError;

#[derive(Debug, Deserialize)]
struct RssDocument {
    channel: RssChannel,
}

#[derive(Debug, Deserialize)]
struct RssChannel {
    #[serde(default)]
    title: Option<String>,
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(rename = "pubDate", default)]
    pub_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomDocument {
    #[serde(default)]
    title: Option<String>,
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    #[serde(default)]
    title: Option<String>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    published: Option<String>,
    #[serde(default)]
    updated: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href", default)]
    href: String,
    #[serde(rename = "@rel", default)]
    rel: Option<String>,
}

/// RSS 2.0 / Atom 订阅源抓取
pub struct RssFetcher {
    client: Client,
    feeds: Vec<FeedSource>,
    max_entries: usize,
    delay: Duration,
}

impl RssFetcher {
    pub fn new(client: Client, feeds: Vec<FeedSource>, max_entries: usize, delay: Duration) -> Self {
        Self {
            client,
            feeds,
            max_entries,
            delay,
        }
    }

    async fn fetch_feed(&self, feed: &FeedSource) -> Result<Vec<Article>> {
        info!("抓取 RSS: {} ...", feed.url);
        let response = self
            .client
            .get(&feed.url)
            .send()
            .await
            .with_context(|| format!("请求失败: {}", feed.url))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("{} 返回 {}", feed.url, status);
        }

        let body = response.text().await?;
        let articles = parse_feed(&body, feed, self.max_entries)?;
        if articles.is_empty() {
            warn!("  {} 中没有条目", feed.url);
        }
        Ok(articles)
    }
}

#[async_trait]
impl ArticleSource for RssFetcher {
    fn name(&self) -> &str {
        "rss"
    }

    async fn fetch(&self) -> Result<Vec<Article>> {
        let mut all = Vec::new();
        for (i, feed) in self.feeds.iter().enumerate() {
            pace(i, self.delay).await;
            match self.fetch_feed(feed).await {
                Ok(articles) => all.extend(articles),
                Err(e) => warn!("抓取 {} 失败: {:#}", feed.name, e),
            }
        }
        info!("RSS 共抓取 {} 篇", all.len());
        Ok(all)
    }
}

/// 解析 RSS 或 Atom 文档，最多保留 `max_entries` 条，没有标题的条目会被跳过
pub fn parse_feed(xml: &str, feed: &FeedSource, max_entries: usize) -> Result<Vec<Article>, DailyError> {
    let now = Utc::now();
    let make = |title: Option<String>, url: String, summary: String, date: Option<DateTime<Utc>>, source: &str| {
        let title = title.unwrap_or_default().trim().to_string();
        (!title.is_empty()).then(|| Article {
            title,
            summary,
            url,
            source: source.to_string(),
            published_at: date.unwrap_or(now),
            kind: SourceKind::Rss,
            suggested_category: Some(feed.category),
            raw: None,
        })
    };

    if is_atom(xml) {
        let doc: AtomDocument = quick_xml::de::from_str(xml).map_err(|e| DailyError::FeedError(format!("{}: {}", feed.url, e)))?;
        let source = source_name(doc.title, feed);
        Ok(doc
            .entries
            .into_iter()
            .take(max_entries)
            .filter_map(|entry| {
                let url = pick_atom_link(&entry.links);
                let summary = entry.content.or(entry.summary).unwrap_or_default();
                let date = entry.published.or(entry.updated).as_deref().and_then(parse_rfc3339);
                make(entry.title, url, summary, date, &source)
            })
            .collect())
    } else {
        let doc: RssDocument = quick_xml::de::from_str(xml).map_err(|e| DailyError::FeedError(format!("{}: {}", feed.url, e)))?;
        let source = source_name(doc.channel.title, feed);
        Ok(doc
            .channel
            .items
            .into_iter()
            .take(max_entries)
            .filter_map(|item| {
                let date = item.pub_date.as_deref().and_then(parse_rfc2822);
                make(
                    item.title,
                    item.link.unwrap_or_default().trim().to_string(),
                    item.description.unwrap_or_default(),
                    date,
                    &source,
                )
            })
            .collect())
    }
}

fn is_atom(xml: &str) -> bool {
    xml.contains("<feed") && !xml.contains("<rss")
}

fn source_name(title: Option<String>, feed: &FeedSource) -> String {
    title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| feed.name.clone())
}

fn pick_atom_link(links: &[AtomLink]) -> String {
    links
        .iter()
        .find(|l| l.rel.as_deref().map_or(true, |rel| rel == "alternate"))
        .or_else(|| links.first())
        .map(|l| l.href.clone())
        .unwrap_or_default()
}

fn parse_rfc2822(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(s.trim()).ok().map(|d| d.with_timezone(&Utc))
}

fn parse_rfc3339(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s.trim()).ok().map(|d| d.with_timezone(&Utc))
}
