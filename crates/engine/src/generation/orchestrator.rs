//! Generation orchestration — bounded, observable retries around one service.
//!
//! Each attempt renders a prompt, invokes the service under a timeout and a
//! concurrency permit, and validates the response against the request's
//! schema. Malformed structure triggers a corrective re-prompt; transient
//! service failures back off and retry. Nothing from a failed attempt
//! survives into the next one except the corrective instruction.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use lectern_config::GenerationConfig;
use lectern_core::{
    ContextBundle, DomainEvent, Error, EventBus, GenerationService, Prompt, Result, ServiceError,
};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::generation::prompt::build_prompt;
use crate::generation::schema::{OutputSchema, extract_json};

/// One structured generation call.
pub struct GenerationRequest {
    /// Task label for logs and events (e.g. "answer", "quiz:matching")
    pub task: String,

    /// System guardrails
    pub guardrails: String,

    /// Task instructions (the prompt skeleton)
    pub instructions: String,

    /// Expected output shape
    pub schema: Arc<dyn OutputSchema>,

    /// Selected lecture context, if the task needs any
    pub context: Option<ContextBundle>,

    /// Attempt budget override; the configured default otherwise
    pub max_attempts: Option<u32>,
}

impl GenerationRequest {
    pub fn new(
        task: impl Into<String>,
        guardrails: impl Into<String>,
        instructions: impl Into<String>,
        schema: Arc<dyn OutputSchema>,
    ) -> Self {
        Self {
            task: task.into(),
            guardrails: guardrails.into(),
            instructions: instructions.into(),
            schema,
            context: None,
            max_attempts: None,
        }
    }

    pub fn with_context(mut self, bundle: ContextBundle) -> Self {
        self.context = Some(bundle);
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }
}

/// How one attempt ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Ok,
    SchemaViolation { violation: String },
    Unavailable { message: String },
    RateLimited { retry_after_secs: u64 },
    TimedOut { timeout_secs: u64 },
}

impl AttemptOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::SchemaViolation { .. } => "schema_violation",
            Self::Unavailable { .. } => "unavailable",
            Self::RateLimited { .. } => "rate_limited",
            Self::TimedOut { .. } => "timeout",
        }
    }

    fn from_service_error(e: &ServiceError) -> Self {
        match e {
            ServiceError::Unavailable(message) => Self::Unavailable {
                message: message.clone(),
            },
            ServiceError::RateLimited { retry_after_secs } => Self::RateLimited {
                retry_after_secs: *retry_after_secs,
            },
            ServiceError::Timeout { timeout_secs } => Self::TimedOut {
                timeout_secs: *timeout_secs,
            },
        }
    }
}

/// Diagnostics for one attempt.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptRecord {
    pub attempt: u32,
    #[serde(flatten)]
    pub outcome: AttemptOutcome,
    pub duration_ms: u64,
}

/// A schema-valid generation.
#[derive(Debug, Clone)]
pub struct GenerationResult {
    /// The raw text of the accepted response
    pub raw: String,

    /// The parsed, schema-valid value
    pub parsed: Option<Value>,

    /// Attempts used, including the successful one
    pub attempts: u32,

    /// Every attempt in order
    pub log: Vec<AttemptRecord>,
}

/// Builds the prompt for the attempt after a schema violation.
pub trait CorrectionStrategy: Send + Sync {
    fn correct(
        &self,
        original: &Prompt,
        schema: &dyn OutputSchema,
        raw: &str,
        violation: &str,
    ) -> Prompt;
}

/// Appends the violation and the expected schema to the original prompt.
#[derive(Debug, Clone, Copy, Default)]
pub struct NameTheViolation;

const ECHO_LIMIT: usize = 400;

impl CorrectionStrategy for NameTheViolation {
    fn correct(
        &self,
        original: &Prompt,
        schema: &dyn OutputSchema,
        raw: &str,
        violation: &str,
    ) -> Prompt {
        let echoed: String = raw.chars().take(ECHO_LIMIT).collect();
        let mut corrected = original.clone();
        corrected.user.push_str(&format!(
            "\n\nYour previous response did not match the '{}' schema: {violation}\n\
             Previous response (truncated):\n{echoed}\n\
             Respond again with ONLY a JSON value of this shape:\n{}\n",
            schema.name(),
            schema.describe()
        ));
        corrected
    }
}

enum Failure {
    Structure { raw: String, violation: String },
    Service(ServiceError),
}

/// Drives generation requests against one service.
pub struct Orchestrator {
    service: Arc<dyn GenerationService>,
    config: GenerationConfig,
    permits: Arc<Semaphore>,
    correction: Arc<dyn CorrectionStrategy>,
    events: Arc<EventBus>,
}

impl Orchestrator {
    pub fn new(
        service: Arc<dyn GenerationService>,
        config: GenerationConfig,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
            service,
            config,
            correction: Arc::new(NameTheViolation),
            events,
        }
    }

    pub fn with_correction(mut self, correction: Arc<dyn CorrectionStrategy>) -> Self {
        self.correction = correction;
        self
    }

    pub fn service_name(&self) -> &str {
        self.service.name()
    }

    /// Run a request to a schema-valid result or a terminal error.
    ///
    /// Terminates after at most the attempt budget. The error reflects how the
    /// final attempt failed: structure → `GenerationExhausted`, service →
    /// `Service`. Cancellation wins over everything else.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<GenerationResult> {
        let max_attempts = request
            .max_attempts
            .unwrap_or(self.config.max_attempts)
            .max(1);
        let timeout = Duration::from_secs(self.config.timeout_secs);

        let base = build_prompt(
            &request.guardrails,
            &request.instructions,
            request.schema.as_ref(),
            request.context.as_ref(),
        );
        let mut prompt = base.clone();
        let mut log: Vec<AttemptRecord> = Vec::new();
        let mut last: Option<Failure> = None;

        for attempt in 1..=max_attempts {
            let permit = tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(Error::Cancelled { attempts: attempt - 1 });
                }
                permit = self.permits.clone().acquire_owned() => {
                    permit.map_err(|_| Error::Internal("generation semaphore closed".into()))?
                }
            };

            debug!(
                task = %request.task,
                service = %self.service.name(),
                attempt,
                max_attempts,
                "Invoking generation service"
            );

            let started = Instant::now();
            let call = tokio::time::timeout(timeout, self.service.invoke(prompt.clone()));
            let response = tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(Error::Cancelled { attempts: attempt });
                }
                response = call => response,
            };
            drop(permit);
            let duration_ms = started.elapsed().as_millis() as u64;

            let service_result = response.unwrap_or(Err(ServiceError::Timeout {
                timeout_secs: self.config.timeout_secs,
            }));

            let outcome = match service_result {
                Ok(raw) => match parse_and_validate(&raw, request.schema.as_ref()) {
                    Ok(value) => {
                        self.record(&request.task, &mut log, attempt, AttemptOutcome::Ok, duration_ms);
                        info!(task = %request.task, attempts = attempt, "Generation succeeded");
                        return Ok(GenerationResult {
                            raw,
                            parsed: Some(value),
                            attempts: attempt,
                            log,
                        });
                    }
                    Err(violation) => {
                        warn!(
                            task = %request.task,
                            attempt,
                            violation = %violation,
                            "Response violated schema"
                        );
                        prompt = self
                            .correction
                            .correct(&base, request.schema.as_ref(), &raw, &violation);
                        let outcome = AttemptOutcome::SchemaViolation {
                            violation: violation.clone(),
                        };
                        last = Some(Failure::Structure { raw, violation });
                        outcome
                    }
                },
                Err(e) => {
                    warn!(task = %request.task, attempt, error = %e, "Generation service failed");
                    let outcome = AttemptOutcome::from_service_error(&e);
                    last = Some(Failure::Service(e));
                    outcome
                }
            };
            self.record(&request.task, &mut log, attempt, outcome, duration_ms);

            if attempt < max_attempts {
                if let Some(Failure::Service(e)) = &last {
                    let delay = self.backoff(attempt, e);
                    debug!(task = %request.task, delay_ms = delay.as_millis() as u64, "Backing off");
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            return Err(Error::Cancelled { attempts: attempt });
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        warn!(task = %request.task, attempts = max_attempts, "Generation exhausted");
        Err(match last {
            Some(Failure::Structure { raw, violation }) => Error::GenerationExhausted {
                attempts: max_attempts,
                last_raw: Some(raw),
                violation,
            },
            Some(Failure::Service(source)) => Error::Service {
                source,
                attempts: max_attempts,
            },
            None => Error::Internal("generation loop ended without an attempt".into()),
        })
    }

    /// Linear backoff, stretched to a rate limit's retry-after, capped.
    fn backoff(&self, attempt: u32, error: &ServiceError) -> Duration {
        let linear = Duration::from_millis(self.config.backoff_ms.saturating_mul(attempt as u64));
        let wanted = match error {
            ServiceError::RateLimited { retry_after_secs } => {
                linear.max(Duration::from_secs(*retry_after_secs))
            }
            _ => linear,
        };
        wanted.min(Duration::from_secs(self.config.max_backoff_secs))
    }

    fn record(
        &self,
        task: &str,
        log: &mut Vec<AttemptRecord>,
        attempt: u32,
        outcome: AttemptOutcome,
        duration_ms: u64,
    ) {
        self.events.publish(DomainEvent::GenerationAttempted {
            task: task.to_string(),
            attempt,
            outcome: outcome.as_str().to_string(),
            duration_ms,
            timestamp: Utc::now(),
        });
        log.push(AttemptRecord {
            attempt,
            outcome,
            duration_ms,
        });
    }
}

fn parse_and_validate(raw: &str, schema: &dyn OutputSchema) -> std::result::Result<Value, String> {
    let value = extract_json(raw)?;
    schema.validate(&value)?;
    Ok(value)
}
