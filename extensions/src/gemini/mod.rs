mod chat;
mod error;
mod shared;

pub use chat::{GeminiChatClient, GEMINI_MULTIMODAL_MODEL, GEMINI_TEXT_MODEL};
pub use error::GeminiError;
pub use shared::GeminiConfig;
