use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use scraper::{Html, Selector};
use tracing::{debug, warn};

use crate::storage::models::HistoryEntry;
use crate::utils::{DailyError, DailyResult};

pub const DAILY_PAGE: &str = "index.html";
pub const ARCHIVE_FILE: &str = "archive.json";
pub const MARKER_FILE: &str = ".nojekyll";
pub const COUNT_META: &str = "article-count";

/// 静态站点输出目录
///
/// 所有写入都先落到同目录下的临时文件再重命名，避免留下写了一半的页面。
#[derive(Debug, Clone)]
pub struct SiteStore {
    root: PathBuf,
}

impl SiteStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn day_dir(&self, date: NaiveDate) -> PathBuf {
        self.root.join(date.format("%Y-%m-%d").to_string())
    }

    pub async fn write_atomic(&self, path: &Path, bytes: &[u8]) -> DailyResult<()> {
        let tmp = self.stage(path, bytes).await?;
        self.commit(&tmp, path).await?;
        debug!(path = %path.display(), bytes = bytes.len(), "写入完成");
        Ok(())
    }

    /// 把内容写到 `<path>.tmp`，返回临时文件路径；写入失败时不留下临时文件
    pub async fn stage(&self, path: &Path, bytes: &[u8]) -> DailyResult<PathBuf> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| publish_error(parent, e))?;
        }

        let tmp = sibling(path, ".tmp");
        if let Err(e) = tokio::fs::write(&tmp, bytes).await {
            discard(&tmp).await;
            return Err(publish_error(&tmp, e));
        }
        Ok(tmp)
    }

    /// 临时文件改名为正式文件；失败时删除临时文件
    pub async fn commit(&self, tmp: &Path, path: &Path) -> DailyResult<()> {
        if let Err(e) = tokio::fs::rename(tmp, path).await {
            discard(tmp).await;
            return Err(publish_error(path, e));
        }
        Ok(())
    }

    /// 一次性替换某天的页面和归档文件
    ///
    /// 两个文件先全部写成临时文件；旧的 archive.json 先移到 `.bak`，
    /// 页面改名失败时恢复旧归档，目录保持原样。`archive` 为 None 时删除旧归档。
    pub async fn replace_day(&self, date: NaiveDate, page: &[u8], archive: Option<&[u8]>) -> DailyResult<()> {
        let day_dir = self.day_dir(date);
        let page_path = day_dir.join(DAILY_PAGE);
        let archive_path = day_dir.join(ARCHIVE_FILE);
        let backup_path = sibling(&archive_path, ".bak");

        let staged_archive = match archive {
            Some(bytes) => Some(self.stage(&archive_path, bytes).await?),
            None => None,
        };
        let staged_page = match self.stage(&page_path, page).await {
            Ok(tmp) => tmp,
            Err(e) => {
                if let Some(tmp) = &staged_archive {
                    discard(tmp).await;
                }
                return Err(e);
            }
        };

        let had_archive = match tokio::fs::rename(&archive_path, &backup_path).await {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => {
                discard(&staged_page).await;
                if let Some(tmp) = &staged_archive {
                    discard(tmp).await;
                }
                return Err(publish_error(&archive_path, e));
            }
        };

        let committed = async {
            if let Some(tmp) = &staged_archive {
                self.commit(tmp, &archive_path).await?;
            }
            self.commit(&staged_page, &page_path).await
        }
        .await;

        match committed {
            Ok(()) => {
                if had_archive {
                    discard(&backup_path).await;
                }
                debug!(date = %date, "当天页面已替换");
                Ok(())
            }
            Err(e) => {
                warn!(date = %date, error = %e, "发布失败，恢复原有文件");
                discard(&staged_page).await;
                if let Some(tmp) = &staged_archive {
                    discard(tmp).await;
                    discard(&archive_path).await;
                }
                if had_archive {
                    let _ = tokio::fs::rename(&backup_path, &archive_path).await;
                }
                Err(e)
            }
        }
    }

    pub async fn write_marker(&self) -> DailyResult<()> {
        self.write_atomic(&self.root.join(MARKER_FILE), b"").await
    }

    /// 扫描输出目录，重建历史索引
    ///
    /// 只有名称为 `YYYY-MM-DD` 的目录才会被计入，其余条目直接忽略。
    /// 结果按日期升序，每个日期最多一条。
    pub async fn scan_history(&self) -> DailyResult<Vec<HistoryEntry>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(DailyError::IoError(e)),
        };

        let mut history: BTreeMap<NaiveDate, usize> = BTreeMap::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let Some(date) = parse_day_dir(name) else {
                debug!(name, "跳过非日期目录");
                continue;
            };

            let count = self.read_article_count(&entry.path().join(DAILY_PAGE)).await;
            history.insert(date, count);
        }

        Ok(history
            .into_iter()
            .map(|(date, count)| HistoryEntry { date, count })
            .collect())
    }

    async fn read_article_count(&self, page: &Path) -> usize {
        match tokio::fs::read_to_string(page).await {
            Ok(html) => article_count_from_html(&html).unwrap_or_else(|| {
                warn!(path = %page.display(), "页面中没有文章数标记");
                0
            }),
            Err(e) => {
                warn!(path = %page.display(), error = %e, "无法读取日报页面");
                0
            }
        }
    }
}

/// 从日报页面的 `<meta name="article-count">` 中读取文章数
pub fn article_count_from_html(html: &str) -> Option<usize> {
    let selector = Selector::parse(&format!(r#"meta[name="{}"]"#, COUNT_META)).ok()?;
    let document = Html::parse_document(html);
    document
        .select(&selector)
        .next()
        .and_then(|meta| meta.value().attr("content"))
        .and_then(|content| content.trim().parse().ok())
}

/// 只接受补零的 `YYYY-MM-DD`，保证目录名和生成的链接一致
fn parse_day_dir(name: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(name, "%Y-%m-%d")
        .ok()
        .filter(|date| date.format("%Y-%m-%d").to_string() == name)
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

async fn discard(path: &Path) {
    let _ = tokio::fs::remove_file(path).await;
}

fn publish_error(path: &Path, source: std::io::Error) -> DailyError {
    DailyError::PublishError {
        path: path.display().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_count_from_meta_tag() {
        let html = r#"<html><head><meta name="article-count" content="12"></head><body></body></html>"#;
        assert_eq!(article_count_from_html(html), Some(12));
        assert_eq!(article_count_from_html("<html></html>"), None);
    }

    #[tokio::test]
    async fn scan_history_ignores_non_date_entries() {
        let dir = tempfile::tempdir().unwrap();
        let store = SiteStore::new(dir.path());

        for name in ["2024-01-01", "2024-01-02", "notes", "2024-13-40", "2024-1-5"] {
            tokio::fs::create_dir_all(dir.path().join(name)).await.unwrap();
        }
        // 日期命名的普通文件不算
        tokio::fs::write(dir.path().join("2024-01-03"), b"").await.unwrap();
        tokio::fs::write(
            dir.path().join("2024-01-02").join(DAILY_PAGE),
            r#"<html><head><meta name="article-count" content="7"></head></html>"#,
        )
        .await
        .unwrap();

        let history = store.scan_history().await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(history[0].count, 0);
        assert_eq!(history[1].count, 7);
    }

    #[tokio::test]
    async fn scan_history_of_missing_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = SiteStore::new(dir.path().join("missing"));
        assert!(store.scan_history().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn write_atomic_replaces_content_and_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = SiteStore::new(dir.path());
        let path = dir.path().join("2024-01-01").join(DAILY_PAGE);

        store.write_atomic(&path, b"first").await.unwrap();
        store.write_atomic(&path, b"second").await.unwrap();

        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "second");
        assert!(!dir.path().join("2024-01-01").join("index.html.tmp").exists());
    }

    #[tokio::test]
    async fn write_fails_when_temp_path_is_occupied() {
        let dir = tempfile::tempdir().unwrap();
        let store = SiteStore::new(dir.path());
        // 临时文件路径已被目录占用，写入必然失败
        let path = dir.path().join("page.html");
        tokio::fs::create_dir_all(dir.path().join("page.html.tmp").join("inner")).await.unwrap();

        assert!(store.write_atomic(&path, b"content").await.is_err());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn failed_rename_removes_staged_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = SiteStore::new(dir.path());
        let path = dir.path().join("index.html");
        tokio::fs::create_dir_all(path.join("inner")).await.unwrap();

        let err = store.write_atomic(&path, b"content").await.unwrap_err();
        assert!(matches!(err, DailyError::PublishError { .. }));
        assert!(!dir.path().join("index.html.tmp").exists());
    }

    #[tokio::test]
    async fn replace_day_restores_previous_archive_when_page_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = SiteStore::new(dir.path());
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let day = store.day_dir(date);

        store.replace_day(date, b"page v1", Some(b"[1]")).await.unwrap();
        assert_eq!(tokio::fs::read_to_string(day.join(ARCHIVE_FILE)).await.unwrap(), "[1]");

        tokio::fs::remove_file(day.join(DAILY_PAGE)).await.unwrap();
        tokio::fs::create_dir_all(day.join(DAILY_PAGE).join("inner")).await.unwrap();

        assert!(store.replace_day(date, b"page v2", Some(b"[2]")).await.is_err());
        assert_eq!(tokio::fs::read_to_string(day.join(ARCHIVE_FILE)).await.unwrap(), "[1]");
        assert!(store.replace_day(date, b"page v3", None).await.is_err());
        assert_eq!(tokio::fs::read_to_string(day.join(ARCHIVE_FILE)).await.unwrap(), "[1]");

        for leftover in ["index.html.tmp", "archive.json.tmp", "archive.json.bak"] {
            assert!(!day.join(leftover).exists(), "{} left behind", leftover);
        }
    }
}
