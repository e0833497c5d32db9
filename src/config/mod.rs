pub mod sources;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::utils::DailyResult;

pub use sources::{FeedSource, SourceConfig, SubredditSource};

pub const DEFAULT_SETTINGS_PATH: &str = "config/settings.toml";
pub const ENV_PREFIX: &str = "SPORTS_DAILY";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub crawler: CrawlerConfig,
    pub pipeline: PipelineConfig,
    pub generator: GeneratorConfig,
    pub server: ServerConfig,
    pub schedule: ScheduleConfig,
}

/// 文本生成后端（Ollama /api/generate）
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    pub api_url: String,
    pub model: String,
    pub temperature: f32,
    pub num_ctx: u32,
    pub timeout_secs: u64,
    pub max_retries: u32,
    /// 送入提示词的摘要最大字符数
    pub summary_char_limit: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CrawlerConfig {
    pub user_agent: String,
    pub timeout_secs: u64,
    pub entries_per_source: usize,
    pub request_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    pub sources_path: PathBuf,
    /// 每次运行最多送去标注的文章数（按过滤后的原始顺序截取）
    pub max_articles_per_run: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneratorConfig {
    pub output_dir: PathBuf,
    pub site_title: String,
    /// 为空时使用相对链接
    pub base_url: String,
    pub max_articles_per_page: usize,
    pub headline_threshold: u8,
    pub calendar_days: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScheduleConfig {
    pub cron: String,
}

impl AppConfig {
    pub fn load() -> DailyResult<Self> {
        Self::load_from(DEFAULT_SETTINGS_PATH)
    }

    /// 依次叠加：内置默认值、TOML 文件（可缺省）、环境变量
    /// `SPORTS_DAILY__LLM__MODEL=qwen2` 这样的覆盖项。
    pub fn load_from(path: impl AsRef<Path>) -> DailyResult<Self> {
        let path = path.as_ref();
        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::from(path).format(config::FileFormat::Toml).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> DailyResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                api_url: "http://localhost:11434/api/generate".to_string(),
                model: "mistral".to_string(),
                temperature: 0.3,
                num_ctx: 4096,
                timeout_secs: 180,
                max_retries: 0,
                summary_char_limit: 3000,
            },
            crawler: CrawlerConfig {
                user_agent: "rust:ai-sports-daily:v0.1".to_string(),
                timeout_secs: 30,
                entries_per_source: 10,
                request_delay_ms: 500,
            },
            pipeline: PipelineConfig {
                sources_path: PathBuf::from("sources.json"),
                max_articles_per_run: 15,
            },
            generator: GeneratorConfig {
                output_dir: PathBuf::from("output"),
                site_title: "AI运动日报".to_string(),
                base_url: String::new(),
                max_articles_per_page: 30,
                headline_threshold: 8,
                calendar_days: 30,
            },
            server: ServerConfig {
                bind: "127.0.0.1:8081".to_string(),
            },
            schedule: ScheduleConfig {
                cron: "0 0 8 * * *".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_settings_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(dir.path().join("settings.toml")).unwrap();
        assert_eq!(config.pipeline.max_articles_per_run, 15);
        assert_eq!(config.generator.max_articles_per_page, 30);
        assert_eq!(config.llm.summary_char_limit, 3000);
    }

    #[test]
    fn settings_file_overrides_defaults_partially() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "[llm]\nmodel = \"qwen2\"\n\n[generator]\nmax_articles_per_page = 20\n").unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.llm.model, "qwen2");
        assert_eq!(config.llm.num_ctx, 4096);
        assert_eq!(config.generator.max_articles_per_page, 20);
        assert_eq!(config.generator.headline_threshold, 8);
    }

    #[test]
    fn saved_defaults_load_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config").join("settings.toml");
        AppConfig::default().save(&path).unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.schedule.cron, "0 0 8 * * *");
        assert_eq!(config.server.bind, "127.0.0.1:8081");
    }
}
