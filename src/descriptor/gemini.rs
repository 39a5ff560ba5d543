//! Gemini API連携
//!
//! generateContent に指示文とインライン画像を1回だけPOSTし、
//! 先頭候補の最初のテキストパートを返す。リトライはしない。

use super::encode::EncodedImage;
use super::DescriptorService;
use crate::config::Config;
use crate::error::{ObjectifyError, Result};
use async_trait::async_trait;
use objectify_common::{build_descriptor_prompt, build_structured_prompt, ParseMode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini APIリクエスト
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

/// Gemini APIレスポンス
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct GenerateContentResponse {
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Candidate {
    content: Option<ResponseContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ResponseContent {
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PromptFeedback {
    block_reason: Option<String>,
}

/// リクエストボディを組み立てる
pub(crate) fn build_request(
    image: &EncodedImage,
    mode: ParseMode,
    temperature: f32,
) -> GenerateContentRequest {
    let (prompt, response_mime_type) = match mode {
        ParseMode::Structured => (build_structured_prompt(), Some("application/json".to_string())),
        ParseMode::Lenient | ParseMode::Strict => (build_descriptor_prompt(), None),
    };

    GenerateContentRequest {
        contents: vec![Content {
            parts: vec![
                Part::Text { text: prompt },
                Part::InlineData {
                    inline_data: InlineData {
                        mime_type: image.mime_type.clone(),
                        data: image.data.clone(),
                    },
                },
            ],
        }],
        generation_config: GenerationConfig {
            temperature,
            response_mime_type,
        },
    }
}

/// 先頭候補の最初のテキストを取り出す
pub(crate) fn extract_text(response: GenerateContentResponse) -> Result<String> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(ObjectifyError::ApiParse(format!("リクエストがブロックされました: {}", reason)));
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| ObjectifyError::ApiParse("候補がありません".into()))?;
    let finish_reason = candidate.finish_reason.clone().unwrap_or_default();

    candidate
        .content
        .and_then(|c| c.parts.into_iter().next())
        .and_then(|p| p.text)
        .ok_or_else(|| {
            ObjectifyError::ApiParse(format!("テキストがありません (finishReason: {})", finish_reason))
        })
}

/// Gemini API クライアント
#[derive(Clone)]
pub struct GeminiClient {
    http_client: reqwest::Client,
    api_key: String,
    endpoint: String,
    temperature: f32,
}

impl GeminiClient {
    pub fn new(api_key: String, base_url: &str, model: &str, timeout: Duration, temperature: f32) -> Result<Self> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            api_key,
            endpoint: format!(
                "{}/v1beta/models/{}:generateContent",
                base_url.trim_end_matches('/'),
                model
            ),
            temperature,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.get_api_key()?,
            &config.api_base_url,
            &config.model,
            Duration::from_secs(config.timeout_seconds),
            config.temperature,
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl DescriptorService for GeminiClient {
    async fn describe(&self, image: &EncodedImage, mode: ParseMode) -> Result<String> {
        let request = build_request(image, mode, self.temperature);

        tracing::debug!(
            endpoint = %self.endpoint,
            file = %image.file_name,
            payload_bytes = image.encoded_len(),
            mode = %mode,
            "Gemini APIへ送信"
        );

        let response = self
            .http_client
            .post(&self.endpoint)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ObjectifyError::ApiCall(format!(
                "Gemini API returned status {}: {}",
                status, body
            )));
        }

        let payload: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ObjectifyError::ApiParse(e.to_string()))?;
        let text = extract_text(payload)?;

        tracing::debug!(chars = text.len(), lines = text.lines().count(), "Gemini APIレスポンス受信");
        Ok(text)
    }
}
