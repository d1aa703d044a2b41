use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use lectern_core::{GenerationService, Prompt, RawAssets, RawSlide, RawTranscriptLine, ServiceError};

/// Replays canned responses in order and records every prompt.
pub struct CannedService {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<Prompt>>,
}

impl CannedService {
    pub fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl GenerationService for CannedService {
    fn name(&self) -> &str {
        "canned"
    }

    async fn invoke(&self, prompt: Prompt) -> Result<String, ServiceError> {
        self.prompts.lock().unwrap().push(prompt);
        let mut replies = self.replies.lock().unwrap();
        // The last reply repeats once the script runs out
        match replies.len() {
            0 => panic!("CannedService: no replies scripted"),
            1 => Ok(replies[0].clone()),
            _ => Ok(replies.pop_front().unwrap()),
        }
    }
}

/// 00:00-00:30 photosynthesis, with an overview slide at 00:05.
pub fn photosynthesis_lecture() -> RawAssets {
    RawAssets {
        source: "bio101/week3/photosynthesis.mp4".into(),
        transcript: vec![
            RawTranscriptLine::new(0.0, 30.0, "photosynthesis converts light to chemical energy"),
            RawTranscriptLine::new(30.0, 62.0, "chlorophyll in the thylakoid absorbs red and blue light"),
            RawTranscriptLine::new(62.0, 95.0, "the calvin cycle fixes carbon dioxide into sugar"),
        ],
        slides: vec![
            RawSlide {
                change_time: 5.0,
                text: "Photosynthesis Overview\nlight + water + CO2 -> glucose + O2".into(),
                image_refs: vec!["IMAGE_0001.png".into()],
            },
            RawSlide::new(60.0, "Calvin Cycle"),
        ],
        frames: vec![],
    }
}
