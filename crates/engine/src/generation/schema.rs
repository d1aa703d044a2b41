//! Output schemas and lenient response parsing.
//!
//! Generators wrap JSON in Markdown fences or lead with a sentence of prose
//! more often than they return clean JSON. [`extract_json`] tolerates both;
//! everything else is the schema's job.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde_json::Value;

/// An expected output shape: a prompt description plus a validator.
pub trait OutputSchema: Send + Sync {
    /// Short name used in logs and corrective prompts.
    fn name(&self) -> &str;

    /// Human-readable JSON shape, embedded in prompts.
    fn describe(&self) -> String;

    /// Check a parsed value. The error names the violation.
    fn validate(&self, value: &Value) -> Result<(), String>;
}

/// A schema backed by a serde type plus semantic checks.
pub struct TypedSchema<T> {
    name: String,
    description: String,
    check: Box<dyn Fn(&T) -> Result<(), String> + Send + Sync>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> TypedSchema<T> {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            check: Box::new(|_| Ok(())),
            _marker: PhantomData,
        }
    }

    pub fn with_check<F>(mut self, check: F) -> Self
    where
        F: Fn(&T) -> Result<(), String> + Send + Sync + 'static,
    {
        self.check = Box::new(check);
        self
    }
}

impl<T: DeserializeOwned> OutputSchema for TypedSchema<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn describe(&self) -> String {
        self.description.clone()
    }

    fn validate(&self, value: &Value) -> Result<(), String> {
        let typed: T = serde_json::from_value(value.clone()).map_err(|e| e.to_string())?;
        (self.check)(&typed)
    }
}

/// Pull the first JSON value out of a raw response.
///
/// Accepts bare JSON, fenced JSON (```json ... ```), and JSON preceded or
/// followed by prose. The error is the parser's message for the best
/// candidate, which is what a corrective prompt should name.
pub fn extract_json(raw: &str) -> Result<Value, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("response was empty".into());
    }

    let unfenced = strip_fences(trimmed);
    let first_error = match serde_json::from_str::<Value>(unfenced) {
        Ok(value) => return Ok(value),
        Err(e) => e.to_string(),
    };

    let Some(start) = unfenced.find(['{', '[']) else {
        return Err(format!("no JSON object or array found ({first_error})"));
    };
    let mut stream = serde_json::Deserializer::from_str(&unfenced[start..]).into_iter::<Value>();
    match stream.next() {
        Some(Ok(value)) => Ok(value),
        Some(Err(e)) => Err(e.to_string()),
        None => Err(first_error),
    }
}

fn strip_fences(text: &str) -> &str {
    let Some(open) = text.find("```") else {
        return text;
    };
    let after = &text[open + 3..];
    // Skip the language tag line
    let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after[body_start..];
    match body.find("```") {
        Some(close) => body[..close].trim(),
        None => body.trim(),
    }
}

/// Require a non-blank string.
pub fn non_blank(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("'{field}' must not be empty"))
    } else {
        Ok(())
    }
}

/// The citation shape every grounded schema embeds.
pub const CITATION_SHAPE: &str = r#"{"segment_id": "<id from the context, e.g. lec_abc-00003>", "start": "MM:SS", "end": "MM:SS", "slide": <slide number or null>, "claim": "<the statement this supports>"}"#;
