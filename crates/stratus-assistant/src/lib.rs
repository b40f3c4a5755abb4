pub mod alerts;
pub mod client;
pub mod engine;
pub mod fallback;
pub mod location;
pub mod prompt;
pub mod tips;

pub use client::{ChatClient, ChatError, ChatMessage, ChatOptions, Completion};
pub use engine::{ChatEngine, EngineReply};
