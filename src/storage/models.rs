use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// 未经 LLM 处理的文章标记
pub const FALLBACK_TAG: &str = "Raw";

/// 文章来源类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Rss,
    Reddit,
}

/// 文章分类（封闭集合，未知值一律归入 Other）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String")]
pub enum Category {
    #[serde(rename = "AI")]
    Ai,
    Science,
    Gear,
    Training,
    Industry,
    #[default]
    Other,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Ai,
        Category::Science,
        Category::Gear,
        Category::Training,
        Category::Industry,
        Category::Other,
    ];

    pub fn normalize(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "ai" => Category::Ai,
            "science" => Category::Science,
            "gear" => Category::Gear,
            "training" => Category::Training,
            "industry" => Category::Industry,
            _ => Category::Other,
        }
    }

    /// 页面筛选按钮使用的代码
    pub fn code(&self) -> &'static str {
        match self {
            Category::Ai => "ai",
            Category::Science => "science",
            Category::Gear => "gear",
            Category::Training => "training",
            Category::Industry => "industry",
            Category::Other => "other",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Category::Ai => "AI前沿",
            Category::Science => "运动科学",
            Category::Gear => "装备评测",
            Category::Training => "训练方法",
            Category::Industry => "行业动态",
            Category::Other => "其他",
        }
    }
}

impl From<String> for Category {
    fn from(raw: String) -> Self {
        Category::normalize(&raw)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Ai => "AI",
            Category::Science => "Science",
            Category::Gear => "Gear",
            Category::Training => "Training",
            Category::Industry => "Industry",
            Category::Other => "Other",
        };
        f.write_str(name)
    }
}

/// 抓取器产出的标准化文章
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    #[serde(default)]
    pub summary: String,
    pub url: String,
    pub source: String,
    pub published_at: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: SourceKind,
    /// 订阅源配置中给出的分类
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_category: Option<Category>,
    /// 抓取器附带的原始数据，核心流程不读取
    #[serde(skip)]
    pub raw: Option<serde_json::Value>,
}

/// LLM（或兜底逻辑）附加的标注
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub title_zh: String,
    pub summary_zh: String,
    pub summary_short: String,
    #[serde(default)]
    pub comment: String,
    pub score: u8,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub category: Category,
    pub importance: u8,
}

impl Annotation {
    pub fn is_fallback(&self) -> bool {
        self.tags.len() == 1 && self.tags[0] == FALLBACK_TAG
    }
}

/// 完成标注的文章，发布器只接受这种类型
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedArticle {
    #[serde(flatten)]
    pub article: Article,
    #[serde(flatten)]
    pub annotation: Annotation,
}

impl EnrichedArticle {
    pub fn importance(&self) -> u8 {
        self.annotation.importance
    }
}

/// 历史索引条目：日期与当天文章数
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct HistoryEntry {
    pub date: NaiveDate,
    pub count: usize,
}
