use async_trait::async_trait;

use crate::models::message::TranscriptLine;

#[derive(Debug)]
pub enum ReplyError {
    Unavailable(String),
}

impl std::fmt::Display for ReplyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReplyError::Unavailable(msg) => write!(f, "Responder unavailable: {}", msg),
        }
    }
}

impl std::error::Error for ReplyError {}

/// External synthetic-partner responder. Receives the full ordered
/// conversation transcript normalized to its own perspective and returns a
/// single utterance.
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    async fn generate_reply(&self, transcript: &[TranscriptLine]) -> Result<String, ReplyError>;
}

const CANNED_REPLIES: &[&str] = &[
    "Hey! How's it going?",
    "Hi there. What's on your mind?",
    "Hello! Nice to meet you.",
    "What are you up to?",
    "Tell me something interesting.",
    "lol",
    "That's cool.",
    "Really? Tell me more.",
];

/// Scripted responder picking a random canned utterance. Stands in for the
/// LLM-backed responder, which is an external service behind the same trait.
pub struct CannedReplyGenerator;

impl CannedReplyGenerator {
    pub fn new() -> Self {
        CannedReplyGenerator
    }
}

impl Default for CannedReplyGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReplyGenerator for CannedReplyGenerator {
    async fn generate_reply(&self, _transcript: &[TranscriptLine]) -> Result<String, ReplyError> {
        use rand::seq::SliceRandom;
        let reply = CANNED_REPLIES
            .choose(&mut rand::thread_rng())
            .expect("canned reply list is never empty");
        Ok(reply.to_string())
    }
}
