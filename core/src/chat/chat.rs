use async_trait::async_trait;
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

use super::ApiError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentPart {
    Text(String),
    /// Inline binary content, already base64-encoded by the caller.
    ///
    /// The presentation layer is responsible for stripping any data-URL
    /// prefix before handing the payload to the core.
    InlineData {
        mime_type: String,
        data: String,
    },
}

impl ContentPart {
    pub fn into_text(self) -> Option<String> {
        match self {
            ContentPart::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentPart::Text(text) => Some(text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    System(Vec<ContentPart>),
    User(Vec<ContentPart>),
    Model(Vec<ContentPart>),
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Message::System(vec![ContentPart::Text(text.into())])
    }

    pub fn user(text: impl Into<String>) -> Self {
        Message::User(vec![ContentPart::Text(text.into())])
    }

    pub fn model(text: impl Into<String>) -> Self {
        Message::Model(vec![ContentPart::Text(text.into())])
    }

    pub fn parts(&self) -> &[ContentPart] {
        match self {
            Message::System(parts) | Message::User(parts) | Message::Model(parts) => parts,
        }
    }
}

/// Whether a request carries only text or also inline binary content.
///
/// Determines which model variant serves the request. The variant is derived
/// from the message parts and is not caller-overridable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modality {
    TextOnly,
    Multimodal,
}

impl Modality {
    /// Derives the modality of a request from its messages. Total over any
    /// message list: one inline part anywhere makes the request multimodal.
    pub fn of(messages: &[Message]) -> Self {
        let has_inline = messages
            .iter()
            .flat_map(|m| m.parts())
            .any(|p| matches!(p, ContentPart::InlineData { .. }));
        if has_inline {
            Modality::Multimodal
        } else {
            Modality::TextOnly
        }
    }
}

// ============== Response Structures ==============

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UsageInfo {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    Other(String),
    Unspecified,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: Vec<ContentPart>,
    pub usage: Option<UsageInfo>,
    pub finish_reason: Option<FinishReason>,
    pub model_id: Option<String>,
}

impl ChatResponse {
    /// Concatenates all text parts of the response.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|p| p.as_text())
            .collect::<Vec<_>>()
            .join("")
    }
}

// ============== The Trait ==============

pub type ChatStream = Pin<Box<dyn Stream<Item = Result<String, ApiError>> + Send>>;

/// Boundary to the remote generative-language service.
///
/// Two logical operations: a single-shot generate returning one complete
/// response, and a streaming generate yielding text fragments in the exact
/// order the service emits them.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Generates one complete response for the given messages.
    async fn generate(&self, messages: &[Message]) -> Result<ChatResponse, ApiError>;

    /// Generates a response as a stream of text fragments.
    ///
    /// Fragments are delivered in arrival order with no reordering. Any
    /// transport failure mid-stream surfaces as a single terminal `Err`
    /// item; fragments already yielded are not retracted.
    async fn generate_stream(&self, messages: &[Message]) -> Result<ChatStream, ApiError>;
}
