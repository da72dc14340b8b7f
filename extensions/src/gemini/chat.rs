use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument, trace, warn};
use secrecy::ExposeSecret;

use sellerguard_core::chat::{
    ApiError, ChatApi, ChatResponse, ChatStream, ContentPart, FinishReason, Message, Modality,
    UsageInfo,
};

use super::error::{map_response_error, GeminiError};
use super::shared::{GeminiConfig, SharedGeminiClient};

// ============== Gemini Specific Request/Response Structs ==============
// These structs mirror the Gemini API structure.

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerateRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>, // System prompt
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
struct GeminiContent {
    role: String, // "user" or "model"
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(untagged)] // Allows parts to be text OR inline data.
enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiBlob,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
struct GeminiBlob {
    mime_type: String,
    data: String, // Base64 encoded
}

impl From<ContentPart> for GeminiPart {
    fn from(part: ContentPart) -> Self {
        match part {
            ContentPart::Text(text) => GeminiPart::Text { text },
            ContentPart::InlineData { mime_type, data } => {
                // Payload is already base64; it goes on the wire as-is.
                GeminiPart::InlineData {
                    inline_data: GeminiBlob { mime_type, data },
                }
            }
        }
    }
}

// --- Response Structs ---

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerateResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    #[serde(default)]
    usage_metadata: Option<GeminiUsageMetadata>,
}

impl GeminiGenerateResponse {
    /// Converts a Gemini response to the core ChatResponse.
    fn into_chat_response(self, request_model_id: &str) -> ChatResponse {
        let first_candidate = self.candidates.and_then(|c| c.into_iter().next());
        let usage = self.usage_metadata.map(Into::into);

        if let Some(cand) = first_candidate {
            let finish_reason = cand.finish_reason.map(Into::into)
                .unwrap_or(FinishReason::Other("Unknown finish reason".to_string()));

            let mut content_parts = Vec::new();
            if let Some(content) = cand.content {
                // Expecting role "model" for the reply
                if content.role == "model" {
                    for part in content.parts {
                        match part {
                            GeminiPart::Text { text } => {
                                content_parts.push(ContentPart::Text(text));
                            }
                            GeminiPart::InlineData { inline_data } => {
                                content_parts.push(ContentPart::InlineData {
                                    mime_type: inline_data.mime_type,
                                    data: inline_data.data,
                                });
                            }
                        }
                    }
                } else {
                    warn!(role = %content.role, "Unexpected role in Gemini candidate content.");
                }
            } else {
                debug!("Gemini candidate received with no 'content' field.");
            }

            if content_parts.is_empty() {
                debug!("Received response with no content parts (Finish Reason: {:?}).", finish_reason);
                // This might be normal (e.g., safety filter, stop sequence).
            }

            ChatResponse {
                content: content_parts,
                usage,
                finish_reason: Some(finish_reason),
                model_id: Some(request_model_id.to_string()),
            }
        } else {
            // No candidate received at all. Unexpected for a successful call.
            warn!("Gemini response contained no candidates.");
            ChatResponse {
                content: vec![],
                usage, // Usage might still be present even with no candidates
                finish_reason: Some(FinishReason::Other("No candidate received".to_string())),
                model_id: Some(request_model_id.to_string()),
            }
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>, // Contains the response message
    finish_reason: Option<GeminiFinishReason>,
}

#[derive(Deserialize, Serialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum GeminiFinishReason {
    Stop,
    MaxTokens,
    Safety,
    Recitation,
    Blocklist,
    ProhibitedContent,
    Spii,
    Other,
    Unspecified,
}

impl From<GeminiFinishReason> for FinishReason {
    fn from(reason: GeminiFinishReason) -> Self {
        match reason {
            GeminiFinishReason::Stop => FinishReason::Stop,
            GeminiFinishReason::MaxTokens => FinishReason::Length,
            GeminiFinishReason::Safety => FinishReason::ContentFilter,
            GeminiFinishReason::Recitation => FinishReason::Other("Recitation".to_string()),
            GeminiFinishReason::Blocklist => FinishReason::Other("Blocklist".to_string()),
            GeminiFinishReason::ProhibitedContent => FinishReason::ContentFilter,
            GeminiFinishReason::Spii => FinishReason::ContentFilter,
            GeminiFinishReason::Other => FinishReason::Other("Unknown".to_string()),
            GeminiFinishReason::Unspecified => FinishReason::Unspecified,
        }
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    #[serde(default)]
    prompt_token_count: Option<u32>,
    #[serde(default)]
    candidates_token_count: Option<u32>,
    #[serde(default)]
    total_token_count: Option<u32>,
}

impl From<GeminiUsageMetadata> for UsageInfo {
    fn from(usage: GeminiUsageMetadata) -> Self {
        UsageInfo {
            prompt_tokens: usage.prompt_token_count,
            completion_tokens: usage.candidates_token_count,
            total_tokens: usage.total_token_count,
        }
    }
}

// ============== Gemini Client Implementation ==============

/// Faster text-reasoning variant for text-only requests.
pub const GEMINI_TEXT_MODEL: &str = "gemini-3-flash-preview";
/// Multimodal-capable variant used whenever inline binary content is present.
pub const GEMINI_MULTIMODAL_MODEL: &str = "gemini-2.5-flash-image";

/// Maps request modality to the model variant. Total and not overridable by
/// the caller: the variant follows from the request parts alone.
fn model_for(modality: Modality) -> &'static str {
    match modality {
        Modality::TextOnly => GEMINI_TEXT_MODEL,
        Modality::Multimodal => GEMINI_MULTIMODAL_MODEL,
    }
}

#[derive(Debug, Clone)]
pub struct GeminiChatClient {
    shared_client: Arc<SharedGeminiClient>,
}

impl GeminiChatClient {
    /// Creates a new Gemini chat client with default settings.
    ///
    /// # Arguments
    /// * `api_key`: Your Google AI API key.
    pub fn new(api_key: impl Into<String>) -> Result<Self, GeminiError> {
        Self::new_with_options(GeminiConfig::new(api_key)?, None)
    }

    /// Creates a client with the credential taken from `GEMINI_API_KEY`.
    ///
    /// Fails before any network attempt if the variable is absent or empty.
    pub fn from_env() -> Result<Self, GeminiError> {
        Self::new_with_options(GeminiConfig::from_env()?, None)
    }

    /// Creates a new Gemini chat client with custom options.
    ///
    /// # Arguments
    /// * `config`: Pre-built client configuration.
    /// * `client_override`: Optional custom `reqwest::Client` to use.
    #[instrument(name = "gemini_chat_client_new", skip(config, client_override))]
    pub fn new_with_options(
        config: GeminiConfig,
        client_override: Option<Client>,
    ) -> Result<Self, GeminiError> {
        let shared_client = SharedGeminiClient::new(config, client_override)?;
        debug!("GeminiChatClient created.");
        Ok(Self { shared_client: Arc::new(shared_client) })
    }

    /// Converts core messages to Gemini's Content format.
    /// Separates the system prompt.
    fn convert_messages(
        messages: &[Message],
    ) -> Result<(Option<GeminiContent>, Vec<GeminiContent>), GeminiError> {
        let mut system_instruction: Option<GeminiContent> = None;
        let mut gemini_contents: Vec<GeminiContent> = Vec::with_capacity(messages.len());

        for message in messages {
            match message {
                Message::System(parts) => {
                    if system_instruction.is_some() {
                        // Found a second system message
                        return Err(GeminiError::InvalidInput(
                            "Multiple system messages are not supported by Gemini; use a single system instruction.".to_string()
                        ));
                    }
                    // We only handle text system prompts
                    let combined_text = parts.iter()
                        .filter_map(|part| part.as_text())
                        .collect::<Vec<_>>()
                        .join("\n");

                    system_instruction = Some(GeminiContent {
                        // Role is ignored by the API for system_instruction,
                        // but the struct needs one.
                        role: "user".to_string(),
                        parts: vec![GeminiPart::Text { text: combined_text }],
                    });
                }
                Message::User(parts) => {
                    gemini_contents.push(GeminiContent {
                        role: "user".to_string(),
                        parts: parts.iter().cloned().map(Into::into).collect(),
                    });
                }
                Message::Model(parts) => {
                    gemini_contents.push(GeminiContent {
                        role: "model".to_string(),
                        parts: parts.iter().cloned().map(Into::into).collect(),
                    });
                }
            }
        }
        Ok((system_instruction, gemini_contents))
    }

    fn build_request_body(messages: &[Message]) -> Result<(String, &'static str), GeminiError> {
        let model_id = model_for(Modality::of(messages));
        let (system_instruction, gemini_contents) = Self::convert_messages(messages)?;

        let request_body = GeminiGenerateRequest {
            contents: gemini_contents,
            system_instruction,
        };

        let request_json = serde_json::to_string(&request_body)
            .map_err(|e| {
                error!(error = %e, "Failed to serialize Gemini generate request body");
                GeminiError::RequestSerialization(e)
            })?;
        trace!(body = %request_json, "Constructed Gemini request body JSON");

        Ok((request_json, model_id))
    }
}

/// Splits complete lines out of the SSE byte buffer.
///
/// Transport chunks can cut a multi-byte character in half, so bytes are
/// decoded only once their line is complete; the remainder after the last
/// newline stays buffered for the next chunk.
fn drain_lines(buffer: &mut Vec<u8>) -> Vec<String> {
    let mut lines = Vec::new();
    while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
        let line: Vec<u8> = buffer.drain(..=pos).collect();
        lines.push(String::from_utf8_lossy(&line).trim().to_string());
    }
    lines
}

/// Extracts the text fragments carried by one streamed response chunk.
///
/// A chunk has the same shape as a full generate response; only the text
/// parts of the first candidate matter here. Empty fragments are dropped.
fn fragments_from_chunk(data: &str) -> Vec<String> {
    let Ok(chunk) = serde_json::from_str::<GeminiGenerateResponse>(data) else {
        trace!(data = %data, "Skipping unparseable stream chunk");
        return Vec::new();
    };
    let mut fragments = Vec::new();
    if let Some(candidate) = chunk.candidates.and_then(|c| c.into_iter().next()) {
        if let Some(content) = candidate.content {
            for part in content.parts {
                if let GeminiPart::Text { text } = part {
                    if !text.is_empty() {
                        fragments.push(text);
                    }
                }
            }
        }
    }
    fragments
}

#[async_trait]
impl ChatApi for GeminiChatClient {
    #[instrument(skip(self, messages), fields(model = model_for(Modality::of(messages))))]
    async fn generate(&self, messages: &[Message]) -> Result<ChatResponse, ApiError> {
        // Inner async block returning Result<..., GeminiError>
        async {
            let (request_json, model_id) = Self::build_request_body(messages)?;
            let path_segment = format!("models/{}:generateContent", model_id);
            let url = self.shared_client.build_url(&path_segment)?;
            debug!(%url, %model_id, "Sending generate request to Gemini");

            let response = self.shared_client.http_client()
                .post(url)
                .header("x-goog-api-key", self.shared_client.config().api_key.expose_secret())
                .header("Content-Type", "application/json")
                .body(request_json)
                .send()
                .await
                .map_err(GeminiError::Network)?;

            if !response.status().is_success() {
                let status = response.status();
                error!(%status, "Gemini generate API returned error status");
                return Err(map_response_error(response).await);
            }

            let raw_body = response.text()
                .await
                .map_err(|e| {
                    error!(error = %e, "Failed to read successful response body for generate");
                    GeminiError::Network(e)
                })?;
            trace!(body = %raw_body, "Received Gemini generate response body");

            let gemini_response: GeminiGenerateResponse = serde_json::from_str(&raw_body)
                .map_err(|e| {
                    error!(parse_error = %e, raw_body = %raw_body, "Failed to parse Gemini generate response JSON");
                    GeminiError::ResponseParsing {
                        context: "Parsing generate response".to_string(),
                        source: e,
                    }
                })?;

            debug!("Successfully parsed Gemini generate response");
            Ok(gemini_response.into_chat_response(model_id))
        }
        .await
        .map_err(|e: GeminiError| e.into()) // Convert GeminiError into ApiError at the boundary
    }

    #[instrument(skip(self, messages), fields(model = model_for(Modality::of(messages))))]
    async fn generate_stream(&self, messages: &[Message]) -> Result<ChatStream, ApiError> {
        let (request_json, model_id) = Self::build_request_body(messages)
            .map_err(ApiError::from)?;
        let path_segment = format!("models/{}:streamGenerateContent", model_id);
        let mut url = self.shared_client.build_url(&path_segment)
            .map_err(ApiError::from)?;
        url.set_query(Some("alt=sse"));
        debug!(%url, %model_id, "Opening Gemini stream");

        let response = self.shared_client.http_client()
            .post(url)
            .header("x-goog-api-key", self.shared_client.config().api_key.expose_secret())
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .body(request_json)
            .send()
            .await
            .map_err(|e| ApiError::from(GeminiError::Network(e)))?;

        if !response.status().is_success() {
            let status = response.status();
            error!(%status, "Gemini stream API returned error status");
            return Err(map_response_error(response).await.into());
        }

        // The SSE body arrives as arbitrary byte chunks; buffer into lines
        // and parse each "data: " payload as one response chunk. Fragments
        // are yielded in arrival order, one callback-worth at a time.
        let mut bytes = response.bytes_stream();
        let stream = async_stream::stream! {
            let mut buffer: Vec<u8> = Vec::new();
            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        warn!(error = %e, "Gemini stream transport failure");
                        yield Err(ApiError::from(GeminiError::Streaming(e.to_string())));
                        return;
                    }
                };
                buffer.extend_from_slice(&chunk);

                for line in drain_lines(&mut buffer) {
                    let Some(data) = line.strip_prefix("data: ") else {
                        continue;
                    };
                    for fragment in fragments_from_chunk(data) {
                        yield Ok(fragment);
                    }
                }
            }
            trace!("Gemini stream exhausted");
        };

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn convert_messages_basic() {
        let messages = vec![
            Message::system("Be helpful."),
            Message::user("Hello"),
            Message::model("Hi! How can I help?"),
        ];
        let (system_instr, contents) = GeminiChatClient::convert_messages(&messages).unwrap();

        let system_instr = system_instr.unwrap();
        assert_eq!(system_instr.parts.len(), 1);
        assert!(matches!(&system_instr.parts[0], GeminiPart::Text { text } if text == "Be helpful."));

        assert_eq!(contents.len(), 2);
        assert_eq!(contents[0].role, "user");
        assert!(matches!(&contents[0].parts[0], GeminiPart::Text { text } if text == "Hello"));
        assert_eq!(contents[1].role, "model");
        assert!(matches!(&contents[1].parts[0], GeminiPart::Text { text } if text == "Hi! How can I help?"));
    }

    #[test]
    fn convert_messages_rejects_second_system_message() {
        let messages = vec![Message::system("a"), Message::system("b")];
        let err = GeminiChatClient::convert_messages(&messages).unwrap_err();
        assert!(matches!(err, GeminiError::InvalidInput(_)));
    }

    #[test]
    fn model_selection_is_total_over_modality() {
        assert_eq!(model_for(Modality::TextOnly), GEMINI_TEXT_MODEL);
        assert_eq!(model_for(Modality::Multimodal), GEMINI_MULTIMODAL_MODEL);
    }

    #[test]
    fn attachment_presence_drives_model_selection() {
        let text_only = vec![Message::user("hello")];
        let (_, model) = GeminiChatClient::build_request_body(&text_only).unwrap();
        assert_eq!(model, GEMINI_TEXT_MODEL);

        let multimodal = vec![Message::User(vec![
            ContentPart::InlineData {
                mime_type: "application/pdf".to_string(),
                data: "aGVsbG8=".to_string(),
            },
            ContentPart::Text("check this".to_string()),
        ])];
        let (_, model) = GeminiChatClient::build_request_body(&multimodal).unwrap();
        assert_eq!(model, GEMINI_MULTIMODAL_MODEL);
    }

    #[test]
    fn request_json_uses_gemini_wire_names() {
        let messages = vec![
            Message::system("sys"),
            Message::User(vec![
                ContentPart::InlineData {
                    mime_type: "image/png".to_string(),
                    data: "aGVsbG8=".to_string(),
                },
                ContentPart::Text("analyze".to_string()),
            ]),
        ];
        let (json, _) = GeminiChatClient::build_request_body(&messages).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert!(value["systemInstruction"].is_object());
        let parts = value["contents"][0]["parts"].as_array().unwrap();
        // Inline part first, text part last.
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/png");
        assert_eq!(parts[0]["inlineData"]["data"], "aGVsbG8=");
        assert_eq!(parts[1]["text"], "analyze");
    }

    #[test]
    fn fragments_are_pulled_from_stream_chunks() {
        let data = r#"{"candidates":[{"content":{"parts":[{"text":"Hello"},{"text":" world"}],"role":"model"}}]}"#;
        assert_eq!(fragments_from_chunk(data), vec!["Hello", " world"]);
    }

    #[test]
    fn multibyte_text_split_across_transport_chunks_is_decoded_intact() {
        let payload =
            r#"data: {"candidates":[{"content":{"parts":[{"text":"您好，卖家"}],"role":"model"}}]}"#;
        let mut wire = payload.as_bytes().to_vec();
        wire.push(b'\n');
        // Cut inside the three-byte encoding of 您.
        let split = payload.find('您').unwrap() + 1;

        let mut buffer = Vec::new();
        buffer.extend_from_slice(&wire[..split]);
        assert!(drain_lines(&mut buffer).is_empty());

        buffer.extend_from_slice(&wire[split..]);
        let lines = drain_lines(&mut buffer);
        assert_eq!(lines.len(), 1);
        let data = lines[0].strip_prefix("data: ").unwrap();
        assert_eq!(fragments_from_chunk(data), vec!["您好，卖家"]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn incomplete_trailing_line_stays_buffered() {
        let mut buffer = b"data: {\"candidates\":[]}\ndata: {\"cand".to_vec();
        let lines = drain_lines(&mut buffer);
        assert_eq!(lines, vec!["data: {\"candidates\":[]}"]);
        assert_eq!(buffer, b"data: {\"cand");
    }

    #[test]
    fn empty_and_unparseable_chunks_yield_nothing() {
        assert!(fragments_from_chunk("not json").is_empty());
        assert!(fragments_from_chunk(r#"{"candidates":[]}"#).is_empty());
        let empty_text = r#"{"candidates":[{"content":{"parts":[{"text":""}],"role":"model"}}]}"#;
        assert!(fragments_from_chunk(empty_text).is_empty());
    }

    #[test]
    fn single_candidate_response_maps_to_chat_response() {
        let raw = r#"{
            "candidates": [{
                "content": {"parts": [{"text": "您好"}], "role": "model"},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 7, "candidatesTokenCount": 2, "totalTokenCount": 9}
        }"#;
        let parsed: GeminiGenerateResponse = serde_json::from_str(raw).unwrap();
        let response = parsed.into_chat_response(GEMINI_TEXT_MODEL);

        assert_eq!(response.text(), "您好");
        assert_eq!(response.finish_reason, Some(FinishReason::Stop));
        assert_eq!(response.model_id, Some(GEMINI_TEXT_MODEL.to_string()));
        let usage = response.usage.unwrap();
        assert_eq!(usage.total_tokens, Some(9));
    }

    #[test]
    fn missing_candidates_yield_an_empty_response() {
        let parsed: GeminiGenerateResponse = serde_json::from_str("{}").unwrap();
        let response = parsed.into_chat_response(GEMINI_TEXT_MODEL);
        assert!(response.content.is_empty());
    }
}
