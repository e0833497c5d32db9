pub mod assets;
pub mod templates;

use std::path::PathBuf;

use chrono::{Duration, Local, NaiveDate};
use tracing::info;

use crate::config::GeneratorConfig;
use crate::storage::site::DAILY_PAGE;
use crate::storage::{EnrichedArticle, HistoryEntry, SiteStore};
use crate::utils::DailyResult;

use templates::{ArchiveLink, CalendarDay, DailyPage, IndexPage};

/// 一天的日报内容，生成后不再修改
#[derive(Debug, Clone)]
pub struct DailyReport {
    pub date: NaiveDate,
    pub headlines: Vec<EnrichedArticle>,
    pub display: Vec<EnrichedArticle>,
    pub overflow: Vec<EnrichedArticle>,
}

impl DailyReport {
    pub fn total(&self) -> usize {
        self.display.len() + self.overflow.len()
    }

    pub fn has_more(&self) -> bool {
        !self.overflow.is_empty()
    }
}

/// 把标注好的文章排序、分页并写成静态页面
pub struct Publisher {
    store: SiteStore,
    config: GeneratorConfig,
}

impl Publisher {
    pub fn new(config: GeneratorConfig) -> Self {
        Self {
            store: SiteStore::new(config.output_dir.clone()),
            config,
        }
    }

    pub fn store(&self) -> &SiteStore {
        &self.store
    }

    /// 按重要性降序（稳定排序）排列，超出每页上限的部分放进归档
    pub fn build_daily(&self, date: NaiveDate, mut articles: Vec<EnrichedArticle>) -> DailyReport {
        articles.sort_by(|a, b| b.importance().cmp(&a.importance()));

        let cap = self.config.max_articles_per_page;
        let overflow = if articles.len() > cap {
            articles.split_off(cap)
        } else {
            Vec::new()
        };

        let headlines = articles
            .iter()
            .filter(|a| a.importance() >= self.config.headline_threshold)
            .cloned()
            .collect();

        DailyReport {
            date,
            headlines,
            display: articles,
            overflow,
        }
    }

    /// 生成并写入当天页面；没有溢出时删除旧的 archive.json
    ///
    /// 页面和归档一起替换，任何一步失败都不改动当天目录。
    pub async fn publish_daily(&self, date: NaiveDate, articles: Vec<EnrichedArticle>) -> DailyResult<DailyReport> {
        let report = self.build_daily(date, articles);
        let archive = if report.has_more() {
            Some(serde_json::to_vec_pretty(&report.overflow)?)
        } else {
            None
        };

        let page = DailyPage {
            site_title: &self.config.site_title,
            date,
            headlines: &report.headlines,
            articles: &report.display,
            total_count: report.total(),
            hidden_count: report.overflow.len(),
            canonical_url: self.page_link(date),
            generated_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        };
        let html = templates::render_daily(&page);
        self.store.replace_day(date, html.as_bytes(), archive.as_deref()).await?;

        info!(
            "已生成 {} 日报 ({} 篇展示, {} 篇归档, {} 篇头条)",
            date,
            report.display.len(),
            report.overflow.len(),
            report.headlines.len()
        );
        Ok(report)
    }

    /// 生成首页：最近 N 天日历 + 倒序归档列表
    pub async fn publish_index(&self, today: NaiveDate, history: &[HistoryEntry]) -> DailyResult<PathBuf> {
        let page = IndexPage {
            site_title: &self.config.site_title,
            calendar: self.build_calendar(today, history),
            archives: build_archive_list(history),
        };
        let html = templates::render_index(&page);
        let path = self.store.root().join(DAILY_PAGE);
        self.store.write_atomic(&path, html.as_bytes()).await?;

        info!("已生成首页 ({} 期归档)", page.archives.len());
        Ok(path)
    }

    /// 写入样式、脚本和 .nojekyll 标记
    pub async fn write_static_assets(&self) -> DailyResult<()> {
        let static_dir = self.store.root().join("static");
        for (name, content) in assets::STATIC_FILES {
            self.store.write_atomic(&static_dir.join(name), content.as_bytes()).await?;
        }
        self.store.write_marker().await?;
        info!("已写入静态资源和 .nojekyll");
        Ok(())
    }

    fn build_calendar(&self, today: NaiveDate, history: &[HistoryEntry]) -> Vec<CalendarDay> {
        (0..self.config.calendar_days)
            .rev()
            .map(|offset| {
                let date = today - Duration::days(i64::from(offset));
                let has_report = history.iter().any(|h| h.date == date);
                CalendarDay {
                    date,
                    link: has_report.then(|| relative_link(date)),
                }
            })
            .collect()
    }

    fn page_link(&self, date: NaiveDate) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        if base.is_empty() {
            relative_link(date)
        } else {
            format!("{}/{}/index.html", base, date.format("%Y-%m-%d"))
        }
    }
}

fn relative_link(date: NaiveDate) -> String {
    format!("./{}/index.html", date.format("%Y-%m-%d"))
}

fn build_archive_list(history: &[HistoryEntry]) -> Vec<ArchiveLink> {
    let mut entries: Vec<HistoryEntry> = history.to_vec();
    entries.sort_by(|a, b| b.date.cmp(&a.date));
    entries.dedup_by_key(|e| e.date);
    entries
        .into_iter()
        .map(|entry| ArchiveLink {
            date: entry.date,
            link: relative_link(entry.date),
            count: entry.count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Annotation, Article, Category, SourceKind};
    use chrono::Utc;

    fn enriched(id: usize, importance: u8) -> EnrichedArticle {
        EnrichedArticle {
            article: Article {
                title: format!("Article {}", id),
                summary: "summary".to_string(),
                url: format!("https://example.com/{}", id),
                source: "test".to_string(),
                published_at: Utc::now(),
                kind: SourceKind::Rss,
                suggested_category: None,
                raw: None,
            },
            annotation: Annotation {
                title_zh: format!("文章 {}", id),
                summary_zh: "摘要".to_string(),
                summary_short: "摘要...".to_string(),
                comment: String::new(),
                score: importance,
                tags: Vec::new(),
                category: Category::Other,
                importance,
            },
        }
    }

    fn publisher(cap: usize) -> Publisher {
        Publisher::new(GeneratorConfig {
            output_dir: PathBuf::from("unused"),
            site_title: "测试日报".to_string(),
            base_url: String::new(),
            max_articles_per_page: cap,
            headline_threshold: 8,
            calendar_days: 30,
        })
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn sort_is_descending_and_stable_for_ties() {
        let articles = vec![enriched(0, 5), enriched(1, 9), enriched(2, 5), enriched(3, 9), enriched(4, 7)];

        let report = publisher(30).build_daily(day(1), articles);
        let order: Vec<&str> = report.display.iter().map(|a| a.article.url.as_str()).collect();
        assert_eq!(
            order,
            vec![
                "https://example.com/1",
                "https://example.com/3",
                "https://example.com/4",
                "https://example.com/0",
                "https://example.com/2",
            ]
        );
    }

    #[test]
    fn overflow_splits_at_page_cap() {
        let mut articles = vec![enriched(0, 10), enriched(1, 10), enriched(2, 9)];
        articles.extend((3..35).map(|i| enriched(i, 5)));

        let report = publisher(30).build_daily(day(1), articles);
        assert_eq!(report.display.len(), 30);
        assert_eq!(report.overflow.len(), 5);
        assert!(report.has_more());
        assert_eq!(report.total(), 35);
    }

    #[test]
    fn small_batch_has_no_overflow() {
        let articles = (0..10).map(|i| enriched(i, 6)).collect();

        let report = publisher(30).build_daily(day(1), articles);
        assert_eq!(report.display.len(), 10);
        assert!(report.overflow.is_empty());
        assert!(!report.has_more());
    }

    #[test]
    fn headlines_are_high_importance_subset_of_display() {
        let articles = vec![enriched(0, 3), enriched(1, 8), enriched(2, 10), enriched(3, 7), enriched(4, 8)];

        let report = publisher(30).build_daily(day(1), articles);
        assert_eq!(report.headlines.len(), 3);
        assert!(report.headlines.iter().all(|h| h.importance() >= 8));
        for headline in &report.headlines {
            assert!(report.display.iter().any(|d| d.article.url == headline.article.url));
        }
    }

    #[test]
    fn headlines_never_include_overflow() {
        let articles = (0..5).map(|i| enriched(i, 9)).collect();

        let report = publisher(3).build_daily(day(1), articles);
        assert_eq!(report.headlines.len(), 3);
        assert_eq!(report.overflow.len(), 2);
    }

    #[test]
    fn calendar_walks_back_from_today() {
        let history = vec![HistoryEntry { date: day(20), count: 4 }];

        let calendar = publisher(30).build_calendar(day(20), &history);
        assert_eq!(calendar.len(), 30);
        assert_eq!(calendar.last().unwrap().date, day(20));
        assert_eq!(calendar[0].date, NaiveDate::from_ymd_opt(2024, 2, 20).unwrap());
        assert_eq!(calendar.last().unwrap().link.as_deref(), Some("./2024-03-20/index.html"));
        assert!(calendar[..29].iter().all(|d| d.link.is_none()));
    }

    #[test]
    fn archive_list_is_reverse_chronological_and_unique() {
        let history = vec![
            HistoryEntry { date: day(1), count: 3 },
            HistoryEntry { date: day(3), count: 5 },
            HistoryEntry { date: day(2), count: 4 },
            HistoryEntry { date: day(3), count: 5 },
        ];

        let archives = build_archive_list(&history);
        let dates: Vec<NaiveDate> = archives.iter().map(|a| a.date).collect();
        assert_eq!(dates, vec![day(3), day(2), day(1)]);
        assert_eq!(archives[0].link, "./2024-03-03/index.html");
    }

    #[test]
    fn canonical_link_uses_base_url_when_configured() {
        let mut p = publisher(30);
        assert_eq!(p.page_link(day(5)), "./2024-03-05/index.html");
        p.config.base_url = "https://daily.example.com/".to_string();
        assert_eq!(p.page_link(day(5)), "https://daily.example.com/2024-03-05/index.html");
    }
}
