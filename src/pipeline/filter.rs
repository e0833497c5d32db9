use std::collections::HashSet;

use crate::storage::Article;

/// 按 URL 去重并做关键词过滤
///
/// 保持输入顺序。标题加摘要中至少包含一个关键词（不区分大小写）的文章才会保留；
/// 同一 URL 以第一条通过关键词判断的记录为准，未通过的记录不占用该 URL。
/// 关键词列表为空时不保留任何文章，空白关键词会被忽略。
pub fn filter_articles(articles: Vec<Article>, keywords: &[String]) -> Vec<Article> {
    let keywords: Vec<String> = keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();

    let mut seen_urls = HashSet::new();
    articles
        .into_iter()
        .filter(|article| {
            !seen_urls.contains(&article.url)
                && matches_keywords(article, &keywords)
                && seen_urls.insert(article.url.clone())
        })
        .collect()
}

fn matches_keywords(article: &Article, keywords: &[String]) -> bool {
    let text = format!("{} {}", article.title, article.summary).to_lowercase();
    keywords.iter().any(|k| text.contains(k.as_str()))
}
