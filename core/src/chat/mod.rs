pub mod chat;
pub mod error;
pub mod history;
pub mod session;

pub use chat::{ChatApi, ChatResponse, ChatStream, ContentPart, FinishReason, Message, Modality, UsageInfo};
pub use error::ApiError;
pub use history::{Conversation, Role, TruncationPolicy, Turn};
pub use session::ChatSession;
