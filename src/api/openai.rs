use super::SongGenerator;
use crate::prompts::{self, ChatMessage};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

const COMPLETION_TIMEOUT: Duration = Duration::from_secs(90);

/// Generator backed by an OpenAI-compatible chat completions endpoint.
pub struct OpenAiGenerator {
    client: Client,
    api_base: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl OpenAiGenerator {
    pub fn new(api_base: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            temperature,
        }
    }

    /// Send a conversation and return the first choice's message content.
    pub async fn complete(&self, conversation: &[ChatMessage]) -> Result<String> {
        let url = format!("{}/chat/completions", self.api_base);
        let body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": conversation,
        });
        let resp = self
            .client
            .post(&url)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(CONTENT_TYPE, "application/json")
            .timeout(COMPLETION_TIMEOUT)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("sending completion request to {}", url))?;
        let status = resp.status();
        if !status.is_success() {
            let txt = resp.text().await.unwrap_or_default();
            return Err(anyhow!("completion request failed: {} => {}", status, txt));
        }
        let j: serde_json::Value = resp.json().await.context("parsing completion response")?;
        let content = j["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| anyhow!("completion response has no message content"))?;
        debug!("Completion returned {} bytes", content.len());
        Ok(content.to_string())
    }
}

#[async_trait]
impl SongGenerator for OpenAiGenerator {
    async fn theme_playlist(&self, theme: &str, length: usize) -> Result<String> {
        self.complete(&prompts::theme_playlist(theme, length)).await
    }

    async fn playlist_name(&self, songs: &[String]) -> Result<String> {
        let text = self.complete(&prompts::playlist_name(songs, chrono::Local::now())).await?;
        prompts::parse_single_line(&text).ok_or_else(|| anyhow!("generator returned an empty playlist name"))
    }

    async fn playlist_description(&self, songs: &[String]) -> Result<String> {
        let text = self.complete(&prompts::playlist_description(songs)).await?;
        prompts::parse_single_line(&text).ok_or_else(|| anyhow!("generator returned an empty description"))
    }
}
