//! GenerationService trait — the abstraction over the external text generator.
//!
//! The engine never talks to a network client directly. A `GenerationService`
//! takes a fully rendered [`Prompt`] and returns the raw text the model
//! produced; parsing, validation and retries happen in the orchestrator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

/// A fully rendered generation request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    /// Guardrails and output-format rules
    pub system: String,

    /// Task instructions, schema description and lecture context
    pub user: String,

    /// Image references the service may resolve alongside the text
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub image_refs: Vec<String>,
}

impl Prompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            image_refs: Vec::new(),
        }
    }

    pub fn with_image_refs(mut self, refs: Vec<String>) -> Self {
        self.image_refs = refs;
        self
    }
}

/// The external generation service.
///
/// Implementations wrap whatever model transport the host application uses.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// A human-readable name for this service (e.g., "gemini", "local").
    fn name(&self) -> &str;

    /// Send a prompt and get the raw generated text back.
    async fn invoke(&self, prompt: Prompt) -> std::result::Result<String, ServiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl GenerationService for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        async fn invoke(&self, prompt: Prompt) -> std::result::Result<String, ServiceError> {
            Ok(prompt.user)
        }
    }

    #[tokio::test]
    async fn service_is_object_safe() {
        let service: Box<dyn GenerationService> = Box::new(Echo);
        let out = service.invoke(Prompt::new("sys", "hello")).await.unwrap();
        assert_eq!(out, "hello");
        assert_eq!(service.name(), "echo");
    }

    #[test]
    fn prompt_skips_empty_image_refs() {
        let json = serde_json::to_string(&Prompt::new("s", "u")).unwrap();
        assert!(!json.contains("image_refs"));
        let with = Prompt::new("s", "u").with_image_refs(vec!["IMAGE_0001.png".into()]);
        assert!(serde_json::to_string(&with).unwrap().contains("IMAGE_0001.png"));
    }
}
