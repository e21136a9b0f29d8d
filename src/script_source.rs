use crate::config::{LanguageConfig, ScriptConfig};
use crate::error::ApiError;
use crate::prompts::{self, PromptSpec};
use crate::retry::RetryPolicy;
use crate::types::{Language, Outcome, PhraseLevel, Segment, SegmentName};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 台本生成バックエンドの共通トレイト
#[async_trait]
pub trait ScriptBackend: Send + Sync {
    /// プロンプトを送信して生成テキストを受け取る
    async fn complete(&self, prompt: &PromptSpec) -> Result<String, ApiError>;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

/// OpenAI Chat Completions API レスポンス
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// OpenAI Chat Completions API バックエンド
pub struct OpenAiBackend {
    config: ScriptConfig,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiBackend {
    pub fn new(config: ScriptConfig, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("OpenAI API HTTPクライアント作成失敗")?;

        Ok(Self {
            config,
            api_key,
            client,
        })
    }
}

#[async_trait]
impl ScriptBackend for OpenAiBackend {
    async fn complete(&self, prompt: &PromptSpec) -> Result<String, ApiError> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            max_tokens: prompt.max_tokens,
            temperature: self.config.temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status { status, body });
        }

        let chat: ChatResponse = response.json().await?;
        let text = chat
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(ApiError::InvalidResponse("空のレスポンス".to_string()));
        }
        Ok(text)
    }
}

/// Script Source
///
/// セグメントごとにプロンプトを送り、失敗した場合は固定テキストで代替する。
/// 台本生成の失敗で番組生成全体が止まることはない。
pub struct ScriptSource {
    backend: Box<dyn ScriptBackend>,
    language: Language,
    phrases: Option<PhraseLevel>,
    retry: RetryPolicy,
}

impl ScriptSource {
    pub fn new(
        backend: Box<dyn ScriptBackend>,
        language_config: &LanguageConfig,
        retry: RetryPolicy,
    ) -> Self {
        let language = language_config.default_language;
        let phrases = match language {
            Language::English => None,
            // korean は常に最大頻度
            Language::Korean => Some(PhraseLevel::High),
            Language::Mixed => language_config
                .include_korean_phrases
                .then_some(language_config.korean_phrase_frequency),
        };

        Self {
            backend,
            language,
            phrases,
            retry,
        }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// 1セグメントの台本を生成
    pub async fn generate(&self, name: SegmentName) -> Outcome<Segment> {
        let prompt = prompts::build_prompt(name, self.language, self.phrases);
        let label = format!("台本生成 {}", name);

        match self
            .retry
            .run(&label, || self.backend.complete(&prompt))
            .await
        {
            Ok(text) => {
                log::debug!("{}: {} 文字", label, text.chars().count());
                Outcome::Success(Segment { name, text })
            }
            Err(e) => {
                log::warn!("{} に失敗。固定テキストを使用します: {}", label, e);
                Outcome::Fallback {
                    value: Segment {
                        name,
                        text: prompts::fallback_text(name, self.language).to_string(),
                    },
                    reason: e.to_string(),
                }
            }
        }
    }

    /// 指定順に全セグメントを生成
    pub async fn generate_segments(&self, names: &[SegmentName]) -> Vec<Outcome<Segment>> {
        let mut results = Vec::with_capacity(names.len());
        for &name in names {
            results.push(self.generate(name).await);
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct FixedBackend;

    #[async_trait]
    impl ScriptBackend for FixedBackend {
        async fn complete(&self, prompt: &PromptSpec) -> Result<String, ApiError> {
            Ok(format!("generated ({} tokens)", prompt.max_tokens))
        }
    }

    struct FailingBackend {
        calls: Arc<AtomicU32>,
        status: u16,
    }

    #[async_trait]
    impl ScriptBackend for FailingBackend {
        async fn complete(&self, _prompt: &PromptSpec) -> Result<String, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ApiError::Status {
                status: self.status,
                body: "quota exceeded".to_string(),
            })
        }
    }

    fn language(language: Language) -> LanguageConfig {
        LanguageConfig {
            default_language: language,
            ..LanguageConfig::default()
        }
    }

    fn no_wait_retry() -> RetryPolicy {
        RetryPolicy::new(&RetryConfig {
            max_attempts: 2,
            backoff_ms: 0,
        })
    }

    #[tokio::test]
    async fn test_success_path() {
        let source = ScriptSource::new(
            Box::new(FixedBackend),
            &language(Language::English),
            no_wait_retry(),
        );
        let outcome = source.generate(SegmentName::TopSongs).await;
        assert!(outcome.is_success());
        assert_eq!(outcome.value().unwrap().text, "generated (200 tokens)");
    }

    #[tokio::test]
    async fn test_fallback_is_deterministic() {
        let calls = Arc::new(AtomicU32::new(0));
        let source = ScriptSource::new(
            Box::new(FailingBackend {
                calls: calls.clone(),
                status: 429,
            }),
            &language(Language::Mixed),
            no_wait_retry(),
        );

        for _ in 0..3 {
            let outcome = source.generate(SegmentName::FanMail).await;
            assert!(outcome.is_fallback());
            assert_eq!(
                outcome.value().unwrap().text,
                prompts::fallback_text(SegmentName::FanMail, Language::Mixed)
            );
        }
        // 429 は一時的エラーなので1回ずつ再試行される
        assert_eq!(calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_permanent_error_falls_back_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let source = ScriptSource::new(
            Box::new(FailingBackend {
                calls: calls.clone(),
                status: 401,
            }),
            &language(Language::English),
            no_wait_retry(),
        );
        let outcome = source.generate(SegmentName::Intro).await;
        assert!(outcome.is_fallback());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unreachable_api_falls_back() {
        let config = ScriptConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_seconds: 2,
            ..ScriptConfig::default()
        };
        let backend = OpenAiBackend::new(config, "test-key".to_string()).unwrap();
        let source = ScriptSource::new(
            Box::new(backend),
            &language(Language::English),
            RetryPolicy::single_attempt(),
        );

        let outcome = source.generate(SegmentName::Intro).await;
        match outcome {
            Outcome::Fallback { value, .. } => {
                assert_eq!(value.name, SegmentName::Intro);
                assert_eq!(
                    value.text,
                    prompts::fallback_text(SegmentName::Intro, Language::English)
                );
            }
            other => panic!("fallback expected, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_generate_segments_keeps_order() {
        let source = ScriptSource::new(
            Box::new(FixedBackend),
            &language(Language::Korean),
            no_wait_retry(),
        );
        let names = [SegmentName::FanMail, SegmentName::Intro, SegmentName::TopSongs];
        let segments: Vec<SegmentName> = source
            .generate_segments(&names)
            .await
            .into_iter()
            .filter_map(|o| o.into_value())
            .map(|s| s.name)
            .collect();
        assert_eq!(segments, names);
    }
}
