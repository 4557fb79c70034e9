//! OpenAI-compatible chat and image generation

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;

use super::{
    generation_failure_text, monthly_plan_prompt, platform_prompt, ContentGenerator,
    GeneratedImage, GenerationRequest, ImageGenerator, PlanRequest,
};
use crate::config::GeneratorConfig;
use crate::error::GenerationError;
use crate::types::Platform;

const SYSTEM_PROMPT: &str = "You are an expert social media content writer. \
    Create high-quality, engaging content that resonates with audiences.";

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ImageResponse {
    data: Vec<ImageData>,
}

#[derive(Deserialize)]
struct ImageData {
    url: Option<String>,
}

pub struct OpenAiGenerator {
    http: Client,
    api_key: SecretString,
    base_url: String,
    model: String,
    image_model: String,
}

impl OpenAiGenerator {
    /// Build a generator reading the API key from `config.api_key_env`
    pub fn new(config: &GeneratorConfig) -> Result<Self, GenerationError> {
        let key = std::env::var(&config.api_key_env).map_err(|_| {
            GenerationError::NotConfigured(format!(
                "environment variable {} is not set",
                config.api_key_env
            ))
        })?;
        Self::with_api_key(config, SecretString::from(key))
    }

    pub fn with_api_key(config: &GeneratorConfig, api_key: SecretString) -> Result<Self, GenerationError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| GenerationError::Request(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            image_model: config.image_model.clone(),
        })
    }

    async fn send(&self, endpoint: &str, body: serde_json::Value) -> Result<reqwest::Response, GenerationError> {
        let response = self
            .http
            .post(format!("{}/{}", self.base_url, endpoint))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Request(format!(
                "{} returned {}: {}",
                endpoint,
                status,
                body.trim()
            )));
        }
        Ok(response)
    }

    /// One chat completion
    pub async fn complete(&self, prompt: &str) -> Result<String, GenerationError> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prompt }
            ],
            "temperature": 0.7,
            "max_tokens": 1000
        });

        let response: ChatResponse = self
            .send("chat/completions", body)
            .await?
            .json()
            .await
            .map_err(|e| GenerationError::Response(e.to_string()))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| GenerationError::Response("completion carried no text".to_string()))
    }
}

#[async_trait]
impl ContentGenerator for OpenAiGenerator {
    async fn generate_for_platforms(&self, request: &GenerationRequest) -> BTreeMap<Platform, String> {
        let calls = request.platforms.iter().map(|&platform| async move {
            let prompt = platform_prompt(platform, request);
            let text = match self.complete(&prompt).await {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!("Generating {} content failed: {}", platform, e);
                    generation_failure_text(platform, e)
                }
            };
            (platform, text)
        });

        join_all(calls).await.into_iter().collect()
    }

    async fn plan_month(&self, request: &PlanRequest) -> Result<String, GenerationError> {
        self.complete(&monthly_plan_prompt(request)).await
    }
}

#[async_trait]
impl ImageGenerator for OpenAiGenerator {
    async fn generate(&self, prompt: &str) -> Result<GeneratedImage, GenerationError> {
        let body = json!({
            "model": self.image_model,
            "prompt": prompt,
            "n": 1,
            "size": "1024x1024",
            "quality": "standard"
        });

        let response: ImageResponse = self
            .send("images/generations", body)
            .await?
            .json()
            .await
            .map_err(|e| GenerationError::Response(e.to_string()))?;

        let url = response
            .data
            .into_iter()
            .next()
            .and_then(|image| image.url)
            .ok_or_else(|| GenerationError::Response("image response carried no url".to_string()))?;

        Ok(GeneratedImage {
            url,
            prompt: prompt.to_string(),
        })
    }

    /// Hosted images are served as-is to every platform
    async fn make_variants(&self, url: &str) -> BTreeMap<Platform, String> {
        Platform::ALL
            .into_iter()
            .map(|platform| (platform, url.to_string()))
            .collect()
    }
}
