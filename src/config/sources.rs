use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::storage::Category;
use crate::utils::{DailyError, DailyResult};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FeedSource {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub category: Category,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SubredditSource {
    pub name: String,
    #[serde(default)]
    pub category: Category,
}

/// 可在管理界面中编辑的订阅源文档（sources.json）
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub rss_feeds: Vec<FeedSource>,
    #[serde(default)]
    pub subreddits: Vec<SubredditSource>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl SourceConfig {
    /// 读取订阅源文档，文件不存在时使用内置默认值
    pub fn load(path: impl AsRef<Path>) -> DailyResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!("未找到 {}，使用默认订阅源", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> DailyResult<Self> {
        serde_json::from_str(content)
            .map_err(|e| DailyError::ConfigError(format!("订阅源文档格式错误: {}", e)))
    }

    /// 重新读取文档，三个列表整体替换而不是合并
    pub fn reload(&mut self, path: impl AsRef<Path>) -> DailyResult<()> {
        *self = Self::load(path)?;
        info!(
            feeds = self.rss_feeds.len(),
            subreddits = self.subreddits.len(),
            keywords = self.keywords.len(),
            "订阅源已重新加载"
        );
        Ok(())
    }

    /// 先写临时文件再重命名
    pub fn save(&self, path: impl AsRef<Path>) -> DailyResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        let feed = |name: &str, url: &str, category| FeedSource {
            name: name.to_string(),
            url: url.to_string(),
            category,
        };
        let subreddit = |name: &str, category| SubredditSource {
            name: name.to_string(),
            category,
        };

        Self {
            rss_feeds: vec![
                feed("机器之心", "https://www.jiqizhixin.com/rss", Category::Ai),
                feed("36氪", "https://36kr.com/feed", Category::Industry),
                feed("少数派", "https://sspai.com/feed", Category::Gear),
                feed("Runner's World", "https://www.runnersworld.com/rss/all.xml", Category::Training),
            ],
            subreddits: vec![
                subreddit("ArtificialIntelligence", Category::Ai),
                subreddit("MachineLearning", Category::Ai),
                subreddit("running", Category::Training),
                subreddit("AdvancedRunning", Category::Training),
                subreddit("MarathonTraining", Category::Training),
            ],
            keywords: [
                "AI", "LLM", "大模型", "Transformer", "Agent",
                "Marathon", "Running", "Training", "Recovery", "Nutrition", "Zone 2",
                "Nike", "Adidas", "Garmin", "Coros", "Suunto",
            ]
            .iter()
            .map(|k| k.to_string())
            .collect(),
        }
    }
}
