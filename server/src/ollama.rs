//! Generator backed by an Ollama server's `/api/generate` endpoint.

use anyhow::Result;
use async_trait::async_trait;
use rag_core::{GenerationError, GenerationPort, PromptBuilder, RetrievedDocument};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::GeneratorConfig;

pub struct OllamaGenerator {
    client: Client,
    config: GeneratorConfig,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    top_p: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaGenerator {
    pub fn new(config: GeneratorConfig) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(config.timeout_secs)).build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl GenerationPort for OllamaGenerator {
    async fn generate(&self, question: &str, context: &[RetrievedDocument]) -> Result<String, GenerationError> {
        let url = format!("{}/api/generate", self.config.base_url.trim_end_matches('/'));
        let request = GenerateRequest {
            model: &self.config.model,
            prompt: PromptBuilder::build_prompt(question, context, &self.config.prompt),
            stream: false,
            options: GenerateOptions {
                temperature: self.config.temperature,
                top_p: self.config.top_p,
                num_predict: self.config.max_tokens,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| GenerationError::Unavailable(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Failed(format!("ollama returned {status}: {body}")));
        }
        let body: GenerateResponse =
            response.json().await.map_err(|e| GenerationError::Failed(format!("invalid response: {e}")))?;

        let answer = body.response.trim();
        if answer.is_empty() {
            return Err(GenerationError::EmptyResponse);
        }
        Ok(answer.to_string())
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}
