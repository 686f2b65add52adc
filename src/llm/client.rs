use super::prompts::{build_system_prompt, build_user_prompt};
use super::Ranker;
use crate::config::{LlmConfig, LlmProvider};
use crate::domain::{PriceCategory, RestaurantSummary};
use crate::error::{RecommenderError, Result};
use crate::metrics as m;
use async_trait::async_trait;
use metrics::counter;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error, info, instrument};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const GROK_PLACEHOLDER_KEY: &str = "dummy-key-replace-me";
const GEMINI_PLACEHOLDER_KEYS: &[&str] = &["dummy", "your-api-key-here"];
const REMOTE_TIMEOUT: Duration = Duration::from_secs(60);
// Local models are slower.
const OLLAMA_TIMEOUT: Duration = Duration::from_secs(120);
const ERROR_BODY_LIMIT: usize = 500;

static FENCED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"```(?:json)?\s*([\s\S]*?)\s*```").expect("fence pattern is valid")
});

/// Text-generation client with Gemini, Grok and Ollama backends.
pub struct LlmClient {
    config: LlmConfig,
    http: reqwest::Client,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(!config.verify_ssl)
            .build()?;
        Ok(Self { config, http })
    }

    pub fn grok_configured(&self) -> bool {
        let key = self.config.grok_api_key.trim();
        !key.is_empty() && key != GROK_PLACEHOLDER_KEY
    }

    /// Run one completion with the configured provider. The default provider
    /// falls back to Grok when Gemini fails and a Grok key is present.
    #[instrument(skip_all, fields(provider = ?self.config.provider))]
    pub async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        match self.config.provider {
            LlmProvider::Grok => self.call_grok(system_prompt, user_prompt).await,
            LlmProvider::Ollama => self.call_ollama(system_prompt, user_prompt).await,
            LlmProvider::Gemini => match self.call_gemini(system_prompt, user_prompt).await {
                Ok(text) => Ok(text),
                Err(e) if self.grok_configured() => {
                    let reason: String = e.to_string().chars().take(80).collect();
                    info!("Gemini failed, trying Grok fallback: {}", reason);
                    counter!(m::LLM_FALLBACKS, "from" => "gemini", "to" => "grok").increment(1);
                    self.call_grok(system_prompt, user_prompt).await
                }
                Err(e) => Err(e),
            },
        }
    }

    async fn call_gemini(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let api_key = self.config.gemini_api_key.trim();
        if api_key.is_empty() {
            return Err(RecommenderError::Llm(
                "GEMINI_API_KEY is not configured. Set it in .env (get a key from https://aistudio.google.com/apikey).".to_string(),
            ));
        }
        if GEMINI_PLACEHOLDER_KEYS.contains(&api_key.to_ascii_lowercase().as_str()) {
            return Err(RecommenderError::Llm(
                "GEMINI_API_KEY is still the placeholder. Replace it in .env with a real key.".to_string(),
            ));
        }

        let url = format!("{}/{}:generateContent", GEMINI_BASE_URL, self.config.gemini_model);
        let payload = json!({
            "system_instruction": {"parts": [{"text": system_prompt}]},
            "contents": [{"parts": [{"text": user_prompt}]}],
            "generationConfig": {"temperature": 0},
        });
        let request = self
            .http
            .post(url)
            .header("x-goog-api-key", api_key)
            .timeout(REMOTE_TIMEOUT)
            .json(&payload);
        let data = send_json(request, "Gemini").await?;
        gemini_text(&data)
    }

    async fn call_grok(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let api_key = self.config.grok_api_key.trim();
        if api_key.is_empty() {
            return Err(RecommenderError::Llm(
                "GROK_API_KEY is not configured. Set it in .env (get a key from https://console.x.ai).".to_string(),
            ));
        }
        if api_key == GROK_PLACEHOLDER_KEY {
            return Err(RecommenderError::Llm(
                "GROK_API_KEY is still the placeholder. Replace it in .env with a real key.".to_string(),
            ));
        }

        let url = format!("{}/chat/completions", self.config.grok_base_url);
        let payload = chat_payload(&self.config.grok_model, system_prompt, user_prompt);
        let request = self
            .http
            .post(url)
            .bearer_auth(api_key)
            .timeout(REMOTE_TIMEOUT)
            .json(&payload);
        let data = send_json(request, "Grok").await?;
        chat_completion_text(&data)
    }

    async fn call_ollama(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.config.ollama_base_url);
        let mut payload = chat_payload(&self.config.ollama_model, system_prompt, user_prompt);
        payload["stream"] = json!(false);
        let request = self.http.post(url).timeout(OLLAMA_TIMEOUT).json(&payload);
        let data = send_json(request, "Ollama").await.map_err(|e| match e {
            RecommenderError::Http(ref inner) if inner.is_connect() => RecommenderError::Llm(
                "Cannot connect to Ollama. Start it with: ollama serve (and run 'ollama pull <model>').".to_string(),
            ),
            other => other,
        })?;
        chat_completion_text(&data)
    }
}

fn chat_payload(model: &str, system_prompt: &str, user_prompt: &str) -> Value {
    json!({
        "model": model,
        "messages": [
            {"role": "system", "content": system_prompt},
            {"role": "user", "content": user_prompt},
        ],
        "temperature": 0,
    })
}

/// Send a request and decode a JSON body, turning non-2xx statuses into
/// `Llm` errors that carry a truncated copy of the response body.
async fn send_json(request: reqwest::RequestBuilder, provider: &str) -> Result<Value> {
    let response = request.send().await.map_err(|e| {
        error!("{} request failed: {}", provider, e);
        e
    })?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let body: String = body.trim().chars().take(ERROR_BODY_LIMIT).collect();
        error!("{} API error {}: {}", provider, status.as_u16(), body);
        let message = if body.is_empty() {
            format!("LLM API error: {}", status.as_u16())
        } else {
            format!("LLM API error: {}. {}", status.as_u16(), body)
        };
        return Err(RecommenderError::Llm(message));
    }
    Ok(response.json::<Value>().await?)
}

/// First candidate's first text part of a Gemini `generateContent` response.
pub fn gemini_text(data: &Value) -> Result<String> {
    let candidate = data
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|c| c.first())
        .ok_or_else(|| RecommenderError::Llm("Empty LLM response (no candidates)".to_string()))?;
    let part = candidate
        .pointer("/content/parts/0")
        .ok_or_else(|| RecommenderError::Llm("Empty LLM response (no parts)".to_string()))?;
    let text = part.get("text").and_then(Value::as_str).unwrap_or("").trim();
    if text.is_empty() {
        return Err(RecommenderError::Llm("Empty LLM response".to_string()));
    }
    Ok(text.to_string())
}

/// `choices[0].message.content` of an OpenAI-compatible chat completion.
pub fn chat_completion_text(data: &Value) -> Result<String> {
    let content = data
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .unwrap_or("");
    if content.is_empty() {
        return Err(RecommenderError::Llm("Empty LLM response".to_string()));
    }
    Ok(content.to_string())
}

/// Parse a JSON value out of model output, unwrapping a markdown code fence
/// when present.
pub fn extract_json(text: &str) -> Option<Value> {
    let text = text.trim();
    let body = FENCED_BLOCK
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .unwrap_or(text);
    serde_json::from_str(body).ok()
}

/// The `recommendations` array of a model reply.
pub fn parse_recommendations(text: &str) -> Result<Vec<Value>> {
    let parsed = extract_json(text)
        .filter(|v| !v.is_null())
        .ok_or_else(|| RecommenderError::Llm("Invalid JSON in LLM response".to_string()))?;
    match parsed.get("recommendations") {
        Some(Value::Array(items)) => Ok(items.clone()),
        _ => Err(RecommenderError::Llm(
            "LLM response missing recommendations array".to_string(),
        )),
    }
}

#[async_trait]
impl Ranker for LlmClient {
    async fn rank(
        &self,
        candidates: &[RestaurantSummary],
        city: &str,
        price_category: PriceCategory,
        limit: usize,
    ) -> Result<Vec<Value>> {
        if candidates.is_empty() {
            return Err(RecommenderError::Llm("No restaurants to rank".to_string()));
        }
        let user_prompt = build_user_prompt(candidates, city, price_category, limit);
        let text = self.complete(build_system_prompt(), &user_prompt).await?;
        debug!("LLM returned {} chars", text.len());
        parse_recommendations(&text)
    }
}
