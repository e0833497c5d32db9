use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use super::{pace, ArticleSource};
use crate::config::SubredditSource;
use crate::storage::{Article, SourceKind};

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: Submission,
}

#[derive(Debug, Deserialize)]
struct Submission {
    id: String,
    title: String,
    #[serde(default)]
    selftext: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    permalink: String,
    #[serde(default)]
    created_utc: f64,
    #[serde(default)]
    stickied: bool,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    num_comments: i64,
}

/// 抓取 subreddit 热门帖（公开 JSON 接口，无需凭据）
pub struct RedditFetcher {
    client: Client,
    subreddits: Vec<SubredditSource>,
    limit: usize,
    delay: Duration,
    base_url: String,
}

impl RedditFetcher {
    pub fn new(client: Client, subreddits: Vec<SubredditSource>, limit: usize, delay: Duration) -> Self {
        Self {
            client,
            subreddits,
            limit,
            delay,
            base_url: "https://www.reddit.com".to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn fetch_subreddit(&self, sub: &SubredditSource) -> Result<Vec<Article>> {
        let url = format!("{}/r/{}/hot.json?limit={}", self.base_url, sub.name, self.limit);
        info!("抓取 Reddit: r/{} ...", sub.name);

        let response = self.client.get(&url).send().await.with_context(|| format!("请求失败: {}", url))?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("r/{} 返回 {}", sub.name, status);
        }

        let listing: Listing = response.json().await.context("解析 Reddit 响应失败")?;
        Ok(listing_to_articles(listing, sub))
    }
}

#[async_trait]
impl ArticleSource for RedditFetcher {
    fn name(&self) -> &str {
        "reddit"
    }

    async fn fetch(&self) -> Result<Vec<Article>> {
        let mut all = Vec::new();
        for (i, sub) in self.subreddits.iter().enumerate() {
            pace(i, self.delay).await;
            match self.fetch_subreddit(sub).await {
                Ok(articles) => all.extend(articles),
                Err(e) => warn!("抓取 r/{} 失败: {:#}", sub.name, e),
            }
        }
        info!("Reddit 共抓取 {} 篇", all.len());
        Ok(all)
    }
}

fn listing_to_articles(listing: Listing, sub: &SubredditSource) -> Vec<Article> {
    listing
        .data
        .children
        .into_iter()
        .map(|child| child.data)
        .filter(|post| !post.stickied)
        .map(|post| {
            let url = if post.url.is_empty() {
                format!("https://www.reddit.com{}", post.permalink)
            } else {
                post.url
            };
            Article {
                title: post.title,
                summary: post.selftext,
                url,
                source: format!("r/{}", sub.name),
                published_at: DateTime::<Utc>::from_timestamp(post.created_utc as i64, 0).unwrap_or_else(Utc::now),
                kind: SourceKind::Reddit,
                suggested_category: Some(sub.category),
                raw: Some(json!({
                    "id": post.id,
                    "score": post.score,
                    "num_comments": post.num_comments,
                })),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Category;

    #[test]
    fn skips_stickied_posts_and_keeps_side_channel() {
        let body = r#"{
            "data": {"children": [
                {"data": {"id": "a1", "title": "Weekly thread", "stickied": true, "created_utc": 1700000000.0}},
                {"data": {"id": "b2", "title": "Sub-3 marathon plan", "selftext": "Training log",
                          "url": "https://www.reddit.com/r/running/comments/b2/", "created_utc": 1700000000.0,
                          "score": 120, "num_comments": 30}},
                {"data": {"id": "c3", "title": "Link only", "permalink": "/r/running/comments/c3/"}}
            ]}
        }"#;
        let listing: Listing = serde_json::from_str(body).unwrap();
        let sub = SubredditSource {
            name: "running".to_string(),
            category: Category::Training,
        };

        let articles = listing_to_articles(listing, &sub);
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].title, "Sub-3 marathon plan");
        assert_eq!(articles[0].source, "r/running");
        assert_eq!(articles[0].kind, SourceKind::Reddit);
        assert_eq!(articles[0].published_at.timestamp(), 1_700_000_000);
        assert_eq!(articles[0].raw.as_ref().unwrap()["score"], 120);
        assert_eq!(articles[1].url, "https://www.reddit.com/r/running/comments/c3/");
    }
}
