pub mod logger;
pub mod scheduler;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DailyError {
    #[error("配置错误: {0}")]
    ConfigError(String),

    #[error("配置加载失败: {0}")]
    ConfigSource(#[from] config::ConfigError),

    #[error("网络请求错误: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("订阅源解析错误: {0}")]
    FeedError(String),

    #[error("IO错误: {0}")]
    IoError(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("TOML序列化错误: {0}")]
    TomlError(#[from] toml::ser::Error),

    #[error("发布失败 {path}: {source}")]
    PublishError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("生成服务错误: {0}")]
    GenerationError(String),
}

pub type DailyResult<T> = Result<T, DailyError>;
