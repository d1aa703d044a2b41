//! Shared test helpers for engine unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use lectern_core::{GenerationService, Prompt, ServiceError};

/// One scripted service reply.
#[derive(Clone)]
pub struct Step {
    delay: Option<Duration>,
    reply: Result<String, ServiceError>,
}

impl Step {
    pub fn text(text: &str) -> Self {
        Self {
            delay: None,
            reply: Ok(text.to_string()),
        }
    }

    pub fn fail(error: ServiceError) -> Self {
        Self {
            delay: None,
            reply: Err(error),
        }
    }

    pub fn delayed(delay: Duration, text: &str) -> Self {
        Self {
            delay: Some(delay),
            reply: Ok(text.to_string()),
        }
    }
}

type Responder = Box<dyn Fn(&Prompt) -> Result<String, ServiceError> + Send + Sync>;

enum Script {
    Queue(Mutex<VecDeque<Step>>),
    Repeat(Step),
    Respond(Responder),
}

/// A generation service that replays scripted replies and records prompts.
pub struct ScriptedService {
    script: Script,
    prompts: Mutex<Vec<Prompt>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl ScriptedService {
    /// Replies in order; panics when the script runs out.
    pub fn new(steps: Vec<Step>) -> Self {
        Self::with_script(Script::Queue(Mutex::new(steps.into())))
    }

    /// The same reply forever.
    pub fn repeating(step: Step) -> Self {
        Self::with_script(Script::Repeat(step))
    }

    /// Replies computed from the prompt, for concurrent callers.
    pub fn responding<F>(respond: F) -> Self
    where
        F: Fn(&Prompt) -> Result<String, ServiceError> + Send + Sync + 'static,
    {
        Self::with_script(Script::Respond(Box::new(respond)))
    }

    fn with_script(script: Script) -> Self {
        Self {
            script,
            prompts: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock().unwrap().clone()
    }

    /// The most invocations that were ever running at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    async fn reply(&self, prompt: &Prompt) -> Result<String, ServiceError> {
        let step = match &self.script {
            Script::Queue(queue) => queue
                .lock()
                .unwrap()
                .pop_front()
                .expect("ScriptedService: no more scripted replies"),
            Script::Repeat(step) => step.clone(),
            Script::Respond(respond) => return respond(prompt),
        };
        if let Some(delay) = step.delay {
            tokio::time::sleep(delay).await;
        }
        step.reply
    }
}

#[async_trait]
impl GenerationService for ScriptedService {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn invoke(&self, prompt: Prompt) -> Result<String, ServiceError> {
        self.prompts.lock().unwrap().push(prompt.clone());
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);
        let reply = self.reply(&prompt).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        reply
    }
}
