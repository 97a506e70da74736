//! Model-to-provider routing and provider credentials.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::{PegboardError, Result};

/// LLM vendor a model id routes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[strum(serialize = "OpenAI")]
    OpenAi,
    #[strum(serialize = "Claude")]
    Claude,
    #[strum(serialize = "Gemini")]
    Gemini,
}

impl Provider {
    /// Routes by model id prefix; unknown models go to OpenAI.
    pub fn from_model(model: &str) -> Self {
        if model.starts_with("claude-") {
            Self::Claude
        } else if model.starts_with("gemini-") {
            Self::Gemini
        } else {
            // Covers "gpt-" and "openai-" as well as anything unrecognised.
            Self::OpenAi
        }
    }
}

/// True for models that accept a thinking level.
pub fn supports_thinking_level(model: &str) -> bool {
    model.starts_with("gemini-3") || model.contains("gemini-exp-1206")
}

/// API keys stored in the app snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeys {
    #[serde(default)]
    pub openai: String,
    #[serde(default)]
    pub claude: String,
    #[serde(default)]
    pub gemini: String,
}

impl ApiKeys {
    pub fn get(&self, provider: Provider) -> &str {
        match provider {
            Provider::OpenAi => &self.openai,
            Provider::Claude => &self.claude,
            Provider::Gemini => &self.gemini,
        }
    }

    pub fn set(&mut self, provider: Provider, key: impl Into<String>) {
        let slot = match provider {
            Provider::OpenAi => &mut self.openai,
            Provider::Claude => &mut self.claude,
            Provider::Gemini => &mut self.gemini,
        };
        *slot = key.into();
    }

    /// Key for the provider `model` routes to.
    ///
    /// # Errors
    ///
    /// Returns [`PegboardError::MissingCredential`] when the key is empty, so
    /// callers can fail before any network attempt.
    pub fn key_for(&self, model: &str) -> Result<&str> {
        let provider = Provider::from_model(model);
        let key = self.get(provider);
        if key.trim().is_empty() {
            return Err(PegboardError::missing_credential(provider.to_string()));
        }
        Ok(key)
    }
}
