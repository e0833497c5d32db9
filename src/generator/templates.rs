//! 页面模板：把数据上下文渲染成 HTML，不做任何 IO。

use chrono::{Datelike, NaiveDate, Weekday};

use crate::storage::site::COUNT_META;
use crate::storage::{Category, EnrichedArticle};

pub struct DailyPage<'a> {
    pub site_title: &'a str,
    pub date: NaiveDate,
    pub headlines: &'a [EnrichedArticle],
    pub articles: &'a [EnrichedArticle],
    pub total_count: usize,
    pub hidden_count: usize,
    pub canonical_url: String,
    pub generated_at: String,
}

pub struct CalendarDay {
    pub date: NaiveDate,
    /// 当天没有日报时为 None
    pub link: Option<String>,
}

pub struct ArchiveLink {
    pub date: NaiveDate,
    pub link: String,
    pub count: usize,
}

pub struct IndexPage<'a> {
    pub site_title: &'a str,
    pub calendar: Vec<CalendarDay>,
    pub archives: Vec<ArchiveLink>,
}

pub fn display_date(date: NaiveDate) -> String {
    date.format("%Y年%m月%d日").to_string()
}

pub fn weekday_label(date: NaiveDate) -> &'static str {
    match date.weekday() {
        Weekday::Mon => "星期一",
        Weekday::Tue => "星期二",
        Weekday::Wed => "星期三",
        Weekday::Thu => "星期四",
        Weekday::Fri => "星期五",
        Weekday::Sat => "星期六",
        Weekday::Sun => "星期日",
    }
}

pub fn render_daily(page: &DailyPage<'_>) -> String {
    let date_label = display_date(page.date);
    let mut html = format!(
        r#"<!DOCTYPE html>
<html lang="zh-CN">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<meta name="{count_meta}" content="{total}">
<title>{site} | {date_label}</title>
<link rel="canonical" href="{canonical}">
<link rel="stylesheet" href="../static/style.css">
</head>
<body>
<div class="container">
<header>
  <h1><a href="../index.html">{site}</a></h1>
  <div class="meta">{date_label} {weekday} &nbsp;|&nbsp; 头条 {headline_count} 篇 &nbsp;|&nbsp; 共 {total} 篇</div>
  <button id="themeToggle" class="theme-toggle" aria-label="切换主题">◐</button>
</header>
"#,
        count_meta = COUNT_META,
        total = page.total_count,
        site = html_escape(page.site_title),
        date_label = date_label,
        weekday = weekday_label(page.date),
        canonical = html_escape(&page.canonical_url),
        headline_count = page.headlines.len(),
    );

    html.push_str(&render_filter_bar());

    if !page.headlines.is_empty() {
        html.push_str("<section class=\"headlines\">\n<h2>今日头条</h2>\n");
        for article in page.headlines {
            html.push_str(&render_headline(article));
        }
        html.push_str("</section>\n");
    }

    html.push_str(&format!(
        "<section class=\"list\">\n<h2>全部资讯 <span class=\"count\">({} / {})</span></h2>\n",
        page.articles.len(),
        page.total_count
    ));
    if page.articles.is_empty() {
        html.push_str(r#"<div class="empty">今日暂无资讯</div>"#);
        html.push('\n');
    }
    for article in page.articles {
        html.push_str(&render_list_item(article));
    }
    html.push_str("</section>\n");

    if page.hidden_count > 0 {
        html.push_str(&format!(
            r#"<div class="more">另有 {} 篇较低优先级的资讯已归档，<a href="./archive.json">查看归档数据</a></div>"#,
            page.hidden_count
        ));
        html.push('\n');
    }

    html.push_str(&format!(
        r#"<footer>生成时间: {generated}</footer>
</div>
<button id="backToTop" class="back-to-top" aria-label="回到顶部">↑</button>
<script src="../static/filter.js"></script>
</body>
</html>"#,
        generated = html_escape(&page.generated_at),
    ));
    html
}

pub fn render_index(page: &IndexPage<'_>) -> String {
    let mut html = format!(
        r#"<!DOCTYPE html>
<html lang="zh-CN">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>{site} | 往期归档</title>
<link rel="stylesheet" href="./static/style.css">
</head>
<body>
<div class="container">
<header>
  <h1>{site}</h1>
  <div class="meta">AI 与运动科学每日精选</div>
  <button id="themeToggle" class="theme-toggle" aria-label="切换主题">◐</button>
</header>
<section class="calendar">
<h2>最近 {days} 天</h2>
<div class="calendar-grid">
"#,
        site = html_escape(page.site_title),
        days = page.calendar.len(),
    );

    for day in &page.calendar {
        match &day.link {
            Some(link) => html.push_str(&format!(
                r#"<a class="day has-report" href="{}" title="{}">{}</a>"#,
                html_escape(link),
                display_date(day.date),
                day.date.day()
            )),
            None => html.push_str(&format!(
                r#"<span class="day" title="{}">{}</span>"#,
                display_date(day.date),
                day.date.day()
            )),
        }
        html.push('\n');
    }
    html.push_str("</div>\n</section>\n<section class=\"archives\">\n<h2>往期日报</h2>\n<ul>\n");

    if page.archives.is_empty() {
        html.push_str(r#"<li class="empty">暂无归档</li>"#);
        html.push('\n');
    }
    for archive in &page.archives {
        html.push_str(&format!(
            r#"<li><a href="{link}">{date} {weekday}</a> <span class="count">{count} 篇</span></li>"#,
            link = html_escape(&archive.link),
            date = display_date(archive.date),
            weekday = weekday_label(archive.date),
            count = archive.count,
        ));
        html.push('\n');
    }

    html.push_str(
        r#"</ul>
</section>
</div>
<button id="backToTop" class="back-to-top" aria-label="回到顶部">↑</button>
<script src="./static/filter.js"></script>
</body>
</html>"#,
    );
    html
}

fn render_filter_bar() -> String {
    let mut bar = String::from(r#"<nav class="filters"><button class="filter-btn active" data-category="all">全部</button>"#);
    for category in Category::ALL {
        bar.push_str(&format!(
            r#"<button class="filter-btn" data-category="{}">{}</button>"#,
            category.code(),
            category.label()
        ));
    }
    bar.push_str("</nav>\n");
    bar
}

fn render_headline(item: &EnrichedArticle) -> String {
    let a = &item.annotation;
    let comment = if a.comment.is_empty() {
        String::new()
    } else {
        format!(r#"<div class="comment">{}</div>"#, html_escape(&a.comment))
    };

    format!(
        r#"<article class="headline-card" data-category="{code}">
  <div class="badge">{label} · {score}</div>
  <h3><a href="{url}" target="_blank" rel="noopener">{title}</a></h3>
  <p>{summary}</p>
  {comment}
  <div class="tags">{tags}</div>
  <div class="source">{source}</div>
</article>
"#,
        code = a.category.code(),
        label = a.category.label(),
        score = a.importance,
        url = html_escape(&item.article.url),
        title = html_escape(&a.title_zh),
        summary = html_escape(&a.summary_zh),
        comment = comment,
        tags = render_tags(&a.tags),
        source = html_escape(&item.article.source),
    )
}

fn render_list_item(item: &EnrichedArticle) -> String {
    let a = &item.annotation;
    format!(
        r#"<div class="list-item" data-category="{code}">
  <span class="score">{score}</span>
  <div class="body">
    <a href="{url}" target="_blank" rel="noopener">{title}</a>
    <p>{summary}</p>
    <div class="tags">{tags}</div>
  </div>
  <span class="source">{source} · {published}</span>
</div>
"#,
        code = a.category.code(),
        score = a.importance,
        url = html_escape(&item.article.url),
        title = html_escape(&a.title_zh),
        summary = html_escape(&a.summary_short),
        tags = render_tags(&a.tags),
        source = html_escape(&item.article.source),
        published = item.article.published_at.format("%m-%d %H:%M"),
    )
}

fn render_tags(tags: &[String]) -> String {
    tags.iter()
        .map(|t| format!(r#"<span class="tag">{}</span>"#, html_escape(t)))
        .collect()
}

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
