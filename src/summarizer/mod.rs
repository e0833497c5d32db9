pub mod llm;
pub mod parse;

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::LlmConfig;
use crate::storage::{Annotation, Article, EnrichedArticle, FALLBACK_TAG};

pub use llm::{OllamaClient, TextGenerator};
pub use parse::{extract_json, parse_payload, ModelPayload, DEFAULT_SCORE};

const SUMMARY_ZH_FALLBACK_CHARS: usize = 200;
const SUMMARY_SHORT_CHARS: usize = 100;
const ELLIPSIS: &str = "...";

/// 文章标注服务
///
/// `enrich` 永不失败：生成失败、超时、空响应或 JSON 无法解析时都会走兜底标注。
#[derive(Clone)]
pub struct Summarizer {
    generator: Arc<dyn TextGenerator>,
    summary_char_limit: usize,
}

impl Summarizer {
    pub fn new(generator: Arc<dyn TextGenerator>, summary_char_limit: usize) -> Self {
        Self {
            generator,
            summary_char_limit,
        }
    }

    pub fn from_config(config: &LlmConfig) -> anyhow::Result<Self> {
        let client = OllamaClient::new(config.clone())?;
        Ok(Self::new(Arc::new(client), config.summary_char_limit))
    }

    pub async fn enrich(&self, article: Article) -> EnrichedArticle {
        info!("标注: {}... ({})", truncate_chars(&article.title, 30), article.source);

        let prompt = self.build_prompt(&article);
        let response = match self.generator.generate(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                warn!("生成服务不可用: {:#}", e);
                String::new()
            }
        };

        if response.trim().is_empty() {
            warn!("  生成失败或返回为空，使用兜底标注");
            return fallback(article);
        }

        match parse_payload(&response) {
            Some(payload) => apply_payload(article, payload),
            None => {
                warn!("  无法解析模型输出: {}...", truncate_chars(&response, 100));
                fallback(article)
            }
        }
    }

    fn build_prompt(&self, article: &Article) -> String {
        let content = truncate_chars(&article.summary, self.summary_char_limit);
        format!(
            r#"你是「AI运动日报」的编辑。请分析下面的文章，并用简体中文返回 JSON。

文章：
标题：{title}
内容：{content}

任务：
1. 将标题翻译成中文 (title_zh)。
2. 用 3-5 句中文详细总结文章 (summary_zh)。
3. 写一句点评或洞见 (one_sentence_comment)。
4. 按与 AI 或运动科学的相关度给出 1-10 的重要性评分 (score)。
5. 给出最多 3 个标签 (tags)。
6. 从 "AI"、"Science"、"Gear"、"Training"、"Industry"、"Other" 中选择分类 (category)。

只输出 JSON，格式如下：
{{
    "title_zh": "...",
    "summary_zh": "...",
    "one_sentence_comment": "...",
    "score": 8,
    "tags": ["标签1", "标签2"],
    "category": "AI"
}}"#,
            title = article.title,
            content = content,
        )
    }
}

fn apply_payload(article: Article, payload: ModelPayload) -> EnrichedArticle {
    let title_zh = payload.title_zh.unwrap_or_else(|| article.title.clone());
    let summary_zh = payload
        .summary_zh
        .unwrap_or_else(|| truncate_chars(&article.summary, SUMMARY_ZH_FALLBACK_CHARS));
    let summary_short = format!("{}{}", truncate_chars(&summary_zh, SUMMARY_SHORT_CHARS), ELLIPSIS);

    let annotation = Annotation {
        title_zh,
        summary_zh,
        summary_short,
        comment: payload.comment.unwrap_or_default(),
        score: payload.score,
        tags: payload.tags,
        category: payload.category,
        importance: payload.score,
    };
    EnrichedArticle { article, annotation }
}

/// 不依赖模型的确定性标注
pub fn fallback(article: Article) -> EnrichedArticle {
    let annotation = Annotation {
        title_zh: article.title.clone(),
        summary_zh: truncate_chars(&article.summary, SUMMARY_ZH_FALLBACK_CHARS),
        summary_short: truncate_chars(&article.summary, SUMMARY_SHORT_CHARS),
        comment: String::new(),
        score: DEFAULT_SCORE,
        tags: vec![FALLBACK_TAG.to_string()],
        category: article.suggested_category.unwrap_or_default(),
        importance: DEFAULT_SCORE,
    };
    EnrichedArticle { article, annotation }
}

/// 按字符而不是字节截断，避免切断多字节字符
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Category, SourceKind};
    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;

    struct CannedGenerator {
        reply: Result<String, String>,
        prompts: Mutex<Vec<String>>,
    }

    impl CannedGenerator {
        fn ok(text: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(text.to_string()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: Err("connection refused".to_string()),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl TextGenerator for CannedGenerator {
        async fn generate(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.reply.clone().map_err(|e| anyhow::anyhow!(e))
        }
    }

    fn article(summary: &str) -> Article {
        Article {
            title: "Garmin launches new watch".to_string(),
            summary: summary.to_string(),
            url: "https://example.com/garmin".to_string(),
            source: "Example".to_string(),
            published_at: Utc::now(),
            kind: SourceKind::Rss,
            suggested_category: Some(Category::Gear),
            raw: None,
        }
    }

    #[tokio::test]
    async fn fenced_response_populates_annotation() {
        let reply = "好的：\n```json\n{\"score\": 9, \"tags\": [\"AI\"], \"category\": \"AI\", \"title_zh\": \"T\", \"summary_zh\": \"S\", \"one_sentence_comment\": \"C\"}\n```";
        let summarizer = Summarizer::new(CannedGenerator::ok(reply), 3000);

        let enriched = summarizer.enrich(article("body")).await;
        let a = &enriched.annotation;
        assert_eq!(a.importance, 9);
        assert_eq!(a.score, 9);
        assert_eq!(a.category, Category::Ai);
        assert_eq!(a.title_zh, "T");
        assert_eq!(a.summary_zh, "S");
        assert_eq!(a.summary_short, "S...");
        assert_eq!(a.comment, "C");
        assert_eq!(a.tags, vec!["AI"]);
        assert!(!a.is_fallback());
    }

    #[tokio::test]
    async fn empty_response_uses_fallback() {
        let summarizer = Summarizer::new(CannedGenerator::ok("   "), 3000);

        let enriched = summarizer.enrich(article("body")).await;
        assert_eq!(enriched.annotation.importance, 5);
        assert_eq!(enriched.annotation.tags, vec![FALLBACK_TAG]);
        assert_eq!(enriched.annotation.title_zh, "Garmin launches new watch");
        assert_eq!(enriched.annotation.category, Category::Gear);
    }

    #[tokio::test]
    async fn backend_error_uses_fallback() {
        let summarizer = Summarizer::new(CannedGenerator::failing(), 3000);

        let enriched = summarizer.enrich(article("body")).await;
        assert!(enriched.annotation.is_fallback());
        assert_eq!(enriched.annotation.score, 5);
    }

    #[tokio::test]
    async fn unparseable_response_uses_fallback() {
        let summarizer = Summarizer::new(CannedGenerator::ok("I cannot help with that."), 3000);

        let enriched = summarizer.enrich(article("body")).await;
        assert!(enriched.annotation.is_fallback());
    }

    #[tokio::test]
    async fn partial_payload_gets_defaults() {
        let long_summary = "段".repeat(500);
        let summarizer = Summarizer::new(CannedGenerator::ok(r#"{"title_zh": "新表", "score": "n/a"}"#), 3000);

        let enriched = summarizer.enrich(article(&long_summary)).await;
        let a = &enriched.annotation;
        assert_eq!(a.title_zh, "新表");
        assert_eq!(a.importance, DEFAULT_SCORE);
        assert_eq!(a.summary_zh.chars().count(), 200);
        assert_eq!(a.summary_short, format!("{}...", "段".repeat(100)));
        assert_eq!(a.category, Category::Other);
        assert!(a.tags.is_empty());
    }

    #[tokio::test]
    async fn prompt_content_is_truncated() {
        let generator = CannedGenerator::ok("");
        let summarizer = Summarizer::new(generator.clone(), 50);

        summarizer.enrich(article(&"x".repeat(80))).await;
        let prompts = generator.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains(&"x".repeat(50)));
        assert!(!prompts[0].contains(&"x".repeat(51)));
    }

    #[test]
    fn fallback_keeps_prefixes_without_ellipsis() {
        let enriched = fallback(article(&"a".repeat(300)));
        assert_eq!(enriched.annotation.summary_zh.len(), 200);
        assert_eq!(enriched.annotation.summary_short.len(), 100);
        assert!(enriched.annotation.comment.is_empty());
    }
}
