//! Static provider identity and model references.

use serde::{Deserialize, Serialize};

/// Capability bits a provider may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityBits {
    pub chat: bool,
    pub stream: bool,
    pub tools: bool,
    pub logprobs: bool,
}

impl Default for CapabilityBits {
    fn default() -> Self {
        Self {
            chat: true,
            stream: true,
            tools: false,
            logprobs: false,
        }
    }
}

/// Immutable-after-registration provider identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    pub provider_id: String,
    pub display_name: String,
    /// Opaque handle; the core never inspects the credential value itself.
    pub credential_env_var: Option<String>,
    pub base_url: Option<String>,
    pub capabilities: CapabilityBits,
}

impl ProviderDescriptor {
    pub fn new(provider_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            display_name: display_name.into(),
            credential_env_var: None,
            base_url: None,
            capabilities: CapabilityBits::default(),
        }
    }
}

/// `(provider_id, model_id)`, with a canonical `"<provider>/<model>"` string
/// form that never double-prefixes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelRef {
    pub provider_id: String,
    pub model_id: String,
}

impl ModelRef {
    pub fn new(provider_id: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            model_id: model_id.into(),
        }
    }

    /// Canonical `"<provider>/<model>"` form. If `model_id` already begins
    /// with `"<provider>/"` (case-insensitive), the provider is not
    /// re-prefixed — this is the single pure function 
    /// be reused everywhere a provider/model string is displayed.
    pub fn canonical(&self) -> String {
        let prefix = format!("{}/", self.provider_id);
        if self
            .model_id
            .to_lowercase()
            .starts_with(&prefix.to_lowercase())
        {
            self.model_id.clone()
        } else {
            format!("{prefix}{}", self.model_id)
        }
    }
}

impl std::fmt::Display for ModelRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_model_gets_prefixed() {
        let r = ModelRef::new("nvidia", "nemotron-70b");
        assert_eq!(r.canonical(), "nvidia/nemotron-70b");
    }

    #[test]
    fn already_prefixed_model_is_not_double_prefixed() {
        let r = ModelRef::new("nvidia", "nvidia/nemotron-70b");
        assert_eq!(r.canonical(), "nvidia/nemotron-70b");
        assert!(!r.canonical().contains("nvidia/nvidia/"));
    }

    #[test]
    fn prefix_match_is_case_insensitive() {
        let r = ModelRef::new("OpenAI", "openai/gpt-4o");
        assert_eq!(r.canonical(), "openai/gpt-4o");
    }

    #[test]
    fn no_double_prefix_for_any_provider_string() {
        for provider in ["a", "nvidia", "OpenAI", "together-ai"] {
            let plain = ModelRef::new(provider, "model-x");
            let already = ModelRef::new(provider, format!("{provider}/model-x"));
            let needle = format!("{}/{}/", provider.to_lowercase(), provider.to_lowercase());
            assert!(!plain.canonical().to_lowercase().contains(&needle));
            assert!(!already.canonical().to_lowercase().contains(&needle));
        }
    }
}
