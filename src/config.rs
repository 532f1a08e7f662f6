//! chat front-end configuration.
//!
//! native builds read env vars; wasm builds read the page's query string
//! (`?api_key=...&model=...`). both can be overridden from json.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::ChatError;
use crate::usage::UsageLimits;
use crate::{LLMBackend, LLMBuilder, LLMProvider};

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

#[derive(Resource, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// `google` (default), `openai`, `anthropic`, `ollama`.
    pub backend: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    pub usage_limits: UsageLimits,
    pub recommended_prompts: Vec<String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            backend: "google".to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            base_url: None,
            system_prompt: None,
            usage_limits: UsageLimits::default(),
            recommended_prompts: vec![
                "Resuma este documento em tópicos.".to_string(),
                "Quais são os prazos e obrigações mencionados?".to_string(),
                "Liste as partes envolvidas e seus papéis.".to_string(),
            ],
        }
    }
}

impl ChatConfig {
    pub fn from_json(text: &str) -> Result<Self, ChatError> {
        serde_json::from_str(text).map_err(|e| ChatError::Config(e.to_string()))
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    #[cfg(target_arch = "wasm32")]
    pub fn from_env() -> Self {
        let search = web_sys::window()
            .and_then(|w| w.location().search().ok())
            .unwrap_or_default();
        Self::from_query(&search)
    }

    /// `?api_key=...&model=...&backend=...&base_url=...`, form-decoded.
    pub fn from_query(search: &str) -> Self {
        let pairs: Vec<(String, String)> = search
            .trim_start_matches('?')
            .split('&')
            .filter_map(|kv| kv.split_once('='))
            .filter_map(|(k, v)| Some((form_decode(k)?, form_decode(v)?)))
            .collect();
        Self::from_lookup(|key| {
            let key = query_key(key)?;
            pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
        })
    }

    /// shared by both targets so key precedence stays identical.
    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| get(key).filter(|v| !v.trim().is_empty());
        let mut cfg = Self::default();
        if let Some(b) = non_empty("GENAI_BACKEND") {
            cfg.backend = b;
        }
        if let Some(m) = non_empty("GENAI_MODEL") {
            cfg.model = m;
        }
        cfg.base_url = non_empty("GENAI_BASE_URL");
        cfg.api_key = non_empty("GEMINI_API_KEY").or_else(|| non_empty("API_KEY"));
        cfg
    }

    pub fn backend(&self) -> Result<LLMBackend, ChatError> {
        match self.backend.to_ascii_lowercase().as_str() {
            "google" | "gemini" => Ok(LLMBackend::Google),
            "openai" => Ok(LLMBackend::OpenAI),
            "anthropic" => Ok(LLMBackend::Anthropic),
            "ollama" => Ok(LLMBackend::Ollama),
            other => Err(ChatError::Config(format!("unknown backend '{other}'"))),
        }
    }

    pub fn build_provider(&self) -> Result<Arc<dyn LLMProvider>, ChatError> {
        info!(
            target: "bevy_genai_chat",
            "build_provider: backend='{}', model='{}', key_present={}",
            self.backend, self.model, self.api_key.is_some()
        );
        let mut b = LLMBuilder::new().backend(self.backend()?).model(self.model.clone());
        if let Some(url) = &self.base_url {
            b = b.base_url(url.clone());
        }
        if let Some(key) = &self.api_key {
            b = b.api_key(key.clone());
        }
        if let Some(system) = &self.system_prompt {
            b = b.system(system.clone());
        }
        Ok(b.build()?.into())
    }
}

fn form_decode(raw: &str) -> Option<String> {
    match urlencoding::decode(&raw.replace('+', " ")) {
        Ok(v) => Some(v.into_owned()),
        Err(err) => {
            warn!(target: "bevy_genai_chat", "skipping undecodable query value '{}': {}", raw, err);
            None
        }
    }
}

fn query_key(env_key: &str) -> Option<&'static str> {
    match env_key {
        "GENAI_BACKEND" => Some("backend"),
        "GENAI_MODEL" => Some("model"),
        "GENAI_BASE_URL" => Some("base_url"),
        "GEMINI_API_KEY" => Some("api_key"),
        _ => None,
    }
}
