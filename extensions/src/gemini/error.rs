use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use sellerguard_core::chat::ApiError;

// ============== Gemini API Error Structures ==============

/// Represents the common error structure returned by the Gemini API.
#[derive(Deserialize, Debug, Clone)]
pub struct GeminiErrorResponse {
    pub error: GeminiErrorDetail,
}

/// Details of a Gemini API error.
#[derive(Deserialize, Debug, Clone)]
pub struct GeminiErrorDetail {
    /// HTTP status code associated with the error (might differ from response status).
    pub code: u16,
    /// Developer-facing error message.
    pub message: String,
    /// Status string (e.g., "INVALID_ARGUMENT", "UNAUTHENTICATED").
    pub status: String,
}

// ============== Internal Gemini Client Error Enum ==============

/// Internal error type consolidating all possible failures within the Gemini
/// client. Converted into the public `ApiError` at the trait implementation
/// boundary.
#[derive(Error, Debug)]
pub enum GeminiError {
    /// Error during network communication (sending request, reading response).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Error serializing the request body to JSON.
    #[error("Failed to serialize request body: {0}")]
    RequestSerialization(#[source] serde_json::Error),

    /// Error parsing a *successful* response body from the API.
    #[error("Failed to parse successful response body ({context}): {source}")]
    ResponseParsing {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// Error reported by the Gemini API (received non-success status code).
    #[error("Gemini API error: status={status}, message='{body_text}'")]
    ApiError {
        /// HTTP status code received from the API.
        status: StatusCode,
        /// Parsed error details from the response body, if available.
        detail: Option<GeminiErrorDetail>,
        /// Raw response body text.
        body_text: String,
    },

    /// Invalid configuration provided to the client.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Invalid input provided to an API method, caught before sending.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The API returned an unexpected response format or data inconsistency.
    #[error("Unexpected response format or data: {0}")]
    UnexpectedResponse(String),

    /// Error specific to streaming operations (broken fragment protocol,
    /// mid-stream transport failure).
    #[error("Streaming error: {0}")]
    Streaming(String),
}

// ============== Shared Error Mapping Logic ==============

/// Processes a `reqwest::Response` known to carry an error status and
/// converts it into a `GeminiError::ApiError`.
///
/// Attempts to read the response body and parse it as a
/// `GeminiErrorResponse`. If reading or parsing fails, it still returns a
/// `GeminiError::ApiError` with the raw body text and no parsed detail.
pub(crate) async fn map_response_error(response: reqwest::Response) -> GeminiError {
    let status = response.status();
    debug_assert!(!status.is_success(), "map_response_error called with success status");

    let body_text_result = response.text().await;

    match body_text_result {
        Ok(body_text) => {
            match serde_json::from_str::<GeminiErrorResponse>(&body_text) {
                Ok(parsed_error) => {
                    GeminiError::ApiError {
                        status,
                        detail: Some(parsed_error.error),
                        body_text,
                    }
                }
                Err(parse_err) => {
                    warn!(
                        status = %status,
                        error = %parse_err,
                        body = %body_text,
                        "Failed to parse Gemini error response JSON, returning raw body."
                    );
                    GeminiError::ApiError {
                        status,
                        detail: None,
                        body_text,
                    }
                }
            }
        }
        Err(e) => {
            // Failed even to read the error body text
            warn!(
                status = %status,
                error = %e,
                "Failed to read Gemini error response body text."
            );
            GeminiError::Network(e)
        }
    }
}

// ============== From<GeminiError> for ApiError ==============

impl From<GeminiError> for ApiError {
    fn from(err: GeminiError) -> Self {
        match err {
            GeminiError::Network(source) => ApiError::Network(Box::new(source)),
            GeminiError::RequestSerialization(source) => {
                ApiError::InvalidRequest(format!("Failed to serialize request: {}", source))
            }
            GeminiError::ResponseParsing { context: _, source } => {
                ApiError::Parsing(Box::new(source))
            }
            GeminiError::ApiError { status, detail, body_text } => {
                let message = detail
                    .map(|d| format!("{} (Status: {}, Code: {})", d.message, d.status, d.code))
                    .unwrap_or(body_text);

                match status {
                    StatusCode::BAD_REQUEST => ApiError::InvalidRequest(message),
                    StatusCode::UNAUTHORIZED => ApiError::Authentication(message),
                    StatusCode::FORBIDDEN => ApiError::Authentication(message),
                    StatusCode::NOT_FOUND => ApiError::ModelNotFound(message),
                    StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimited,
                    _ => ApiError::Api {
                        status: status.as_u16(),
                        message,
                    },
                }
            }
            GeminiError::InvalidConfiguration(msg) => ApiError::Configuration(msg),
            GeminiError::InvalidInput(msg) => ApiError::InvalidRequest(msg),
            GeminiError::UnexpectedResponse(msg) => ApiError::Provider(msg.into()),
            GeminiError::Streaming(msg) => ApiError::Streaming(msg.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_errors_stay_configuration_errors() {
        let err: ApiError = GeminiError::InvalidConfiguration("API key cannot be empty".into()).into();
        assert!(matches!(err, ApiError::Configuration(_)));
    }

    #[test]
    fn auth_statuses_map_to_authentication() {
        for status in [StatusCode::UNAUTHORIZED, StatusCode::FORBIDDEN] {
            let err: ApiError = GeminiError::ApiError {
                status,
                detail: None,
                body_text: "denied".to_string(),
            }
            .into();
            assert!(matches!(err, ApiError::Authentication(_)));
        }
    }

    #[test]
    fn too_many_requests_maps_to_rate_limited() {
        let err: ApiError = GeminiError::ApiError {
            status: StatusCode::TOO_MANY_REQUESTS,
            detail: None,
            body_text: String::new(),
        }
        .into();
        assert!(matches!(err, ApiError::RateLimited));
    }

    #[test]
    fn parsed_detail_is_folded_into_the_message() {
        let err: ApiError = GeminiError::ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: Some(GeminiErrorDetail {
                code: 500,
                message: "backend unavailable".to_string(),
                status: "UNAVAILABLE".to_string(),
            }),
            body_text: "{}".to_string(),
        }
        .into();
        match err {
            ApiError::Api { status, message } => {
                assert_eq!(status, 500);
                assert!(message.contains("backend unavailable"));
                assert!(message.contains("UNAVAILABLE"));
            }
            other => panic!("expected Api error, got {:?}", other),
        }
    }
}
