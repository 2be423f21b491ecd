//! OpenAI-compatible chat-completions backend (local llama/ollama server or hosted API).

use std::time::Duration;

use serde_json::Value;

use super::{BackendError, ResponseBackend};
use crate::config::BackendConfig;

/// Posts system + user prompts to `{base_url}/v1/chat/completions`.
pub struct ChatCompletionsBackend {
    url: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
    agent: ureq::Agent,
    name: String,
}

impl ChatCompletionsBackend {
    /// Local endpoint, no auth.
    pub fn local(cfg: &BackendConfig) -> Self {
        Self::new(&cfg.local_url, &cfg.local_model, None, cfg, "local-http")
    }

    /// Hosted endpoint with a bearer key.
    pub fn hosted(cfg: &BackendConfig, api_key: String) -> Self {
        Self::new(&cfg.hosted_url, &cfg.hosted_model, Some(api_key), cfg, "hosted")
    }

    fn new(url: &str, model: &str, api_key: Option<String>, cfg: &BackendConfig, kind: &str) -> Self {
        let url = url.trim_end_matches('/').to_string();
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(cfg.timeout_secs.max(1)))
            .build();
        log::info!("ChatCompletionsBackend ({kind}): endpoint {url}, model {model}");
        Self {
            name: format!("{kind} ({model})"),
            url,
            model: model.to_string(),
            api_key,
            temperature: cfg.temperature,
            agent,
        }
    }

    fn request_body(&self, system_prompt: &str, user_prompt: &str) -> Value {
        serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_prompt},
            ],
            "temperature": self.temperature,
            "stream": false,
        })
    }
}

impl ResponseBackend for ChatCompletionsBackend {
    fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<String, BackendError> {
        let mut req = self
            .agent
            .post(&format!("{}/v1/chat/completions", self.url))
            .set("Content-Type", "application/json");
        if let Some(key) = &self.api_key {
            req = req.set("Authorization", &format!("Bearer {key}"));
        }

        let resp = req
            .send_json(self.request_body(system_prompt, user_prompt))
            .map_err(|e| match e {
                ureq::Error::Status(code, resp) => {
                    let body = resp.into_string().unwrap_or_default();
                    BackendError::Request(format!("HTTP {code}: {}", truncate(&body, 200)))
                }
                ureq::Error::Transport(t) => BackendError::Request(t.to_string()),
            })?;

        let body: Value = resp
            .into_json()
            .map_err(|e| BackendError::Malformed(format!("invalid JSON: {e}")))?;

        let text = extract_content(&body)?;
        log::debug!("{}: {} chars generated", self.name, text.len());
        Ok(text)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Pull `choices[0].message.content` out of a completion response.
fn extract_content(body: &Value) -> Result<String, BackendError> {
    if let Some(msg) = body["error"]["message"].as_str() {
        return Err(BackendError::Request(msg.to_string()));
    }
    body["choices"][0]["message"]["content"]
        .as_str()
        .map(|s| s.trim().to_string())
        .ok_or_else(|| BackendError::Malformed("missing choices[0].message.content".into()))
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
