use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::LlmConfig;
use crate::utils::DailyError;

const MAX_BACKOFF_EXPONENT: u32 = 6;

/// 文本生成后端：输入提示词，返回一段文本
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Ollama /api/generate 请求体
#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_ctx: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

pub struct OllamaClient {
    client: reqwest::Client,
    config: LlmConfig,
}

impl OllamaClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("创建 HTTP 客户端失败")?;
        Ok(Self { client, config })
    }

    async fn do_request(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            model: &self.config.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.config.temperature,
                num_ctx: self.config.num_ctx,
            },
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .json(&request)
            .send()
            .await
            .map_err(DailyError::from)
            .with_context(|| format!("无法连接生成服务 {}", self.config.api_url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DailyError::GenerationError(format!("{}: {}", status, body)).into());
        }

        let body: GenerateResponse = response.json().await.context("解析生成服务响应失败")?;
        Ok(body.response)
    }
}

#[async_trait]
impl TextGenerator for OllamaClient {
    /// 调用生成服务，按配置重试
    async fn generate(&self, prompt: &str) -> Result<String> {
        let attempts = self.config.max_retries.saturating_add(1);
        let mut last_error = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = backoff(attempt);
                info!("生成服务重试 ({}/{})，等待 {}ms...", attempt + 1, attempts, delay.as_millis());
                tokio::time::sleep(delay).await;
            }

            match self.do_request(prompt).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    warn!("生成服务调用失败 (尝试 {}/{}): {:#}", attempt + 1, attempts, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("生成服务调用失败")))
    }
}

/// 指数退避，指数封顶，最长约 32 秒
fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(500 * 2u64.pow(attempt.min(MAX_BACKOFF_EXPONENT)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_then_caps() {
        assert_eq!(backoff(1), Duration::from_millis(1000));
        assert_eq!(backoff(2), Duration::from_millis(2000));
        assert_eq!(backoff(6), Duration::from_millis(32_000));
        assert_eq!(backoff(u32::MAX), Duration::from_millis(32_000));
    }
}
