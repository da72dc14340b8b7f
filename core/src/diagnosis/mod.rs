mod reconcile;

pub use reconcile::{reconcile, strip_code_fence};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::chat::{ChatApi, ContentPart, Message, Modality};

/// Instruction prompt for the compliance check. Enumerates the four risk
/// categories and the required three-key JSON output contract.
pub const DIAGNOSIS_PROMPT: &str = "\
作为一名亚马逊合规专员，请对提交的内容（文本、文档或图片）进行全面的合规性诊断。

请重点检查以下风险：
1. 敏感词违规：如 \"Cure\"(治疗), \"Anti-bacterial\"(抗菌), \"Best Seller\"(最畅销), \"Free Shipping\"(包邮), \"FDA Approved\" 等绝对化用语。
2. 受限商品政策：检查是否包含攻击性武器、毒品相关或成人用品等受限内容。
3. 误导性声明：夸大功效、虚假医疗声明等。
4. 主图/标签规范：如果是图片，检查是否符合亚马逊主图白底、占比等要求（如适用）。

请返回一个严格的 JSON 对象（不要使用 Markdown 代码块，仅返回原始 JSON 字符串），结构如下：
{
  \"hasViolation\": boolean,
  \"message\": \"简短的中文总结 (例如: '发现 3 处高风险违规' 或 '内容合规')\",
  \"details\": [
    \"具体问题 1 (例如: 包含禁止词汇 'Cure')\",
    \"具体问题 2\"
  ]
}

如果输入是纯文本，请分析文本内容。如果输入是文档或图片，请分析其中的可见文字和视觉元素。";

/// An uploaded file, base64-encoded with its MIME type. Transient: scoped to
/// one diagnosis call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Base64-encoded file content, data-URL prefix already stripped.
    pub data: String,
    pub mime_type: String,
}

/// Input to one compliance check. At least one of `text` / `attachment`
/// should be present; that precondition belongs to the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagnosisRequest {
    pub text: Option<String>,
    pub attachment: Option<Attachment>,
}

impl DiagnosisRequest {
    pub fn text(text: impl Into<String>) -> Self {
        DiagnosisRequest { text: Some(text.into()), attachment: None }
    }

    pub fn attachment(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        DiagnosisRequest {
            text: None,
            attachment: Some(Attachment { data: data.into(), mime_type: mime_type.into() }),
        }
    }

    pub fn modality(&self) -> Modality {
        if self.attachment.is_some() {
            Modality::Multimodal
        } else {
            Modality::TextOnly
        }
    }
}

/// Outcome of one compliance check. Always renderable: parse and transport
/// failures are substituted with [`DiagnosisResult::fallback`], never raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosisResult {
    pub has_violation: bool,
    pub message: String,
    pub details: Vec<String>,
}

impl DiagnosisResult {
    /// The fixed safe result substituted whenever the remote output cannot
    /// be trusted.
    pub fn fallback() -> Self {
        DiagnosisResult {
            has_violation: false,
            message: "分析服务暂时不可用，请稍后重试。".to_string(),
            details: vec!["请检查网络连接或API密钥配置".to_string()],
        }
    }
}

/// Builds the ordered part list for a diagnosis request.
///
/// The attachment part comes first and the combined instruction/content text
/// part last. Reordering risks the model misreading which content is the
/// subject of analysis. User text and the analysis instruction are joined
/// into one labelled text part so the model can tell data from instructions.
pub fn build_parts(request: &DiagnosisRequest) -> Vec<ContentPart> {
    let mut parts = Vec::with_capacity(2);

    if let Some(attachment) = &request.attachment {
        parts.push(ContentPart::InlineData {
            mime_type: attachment.mime_type.clone(),
            data: attachment.data.clone(),
        });
    }

    let text = match request.text.as_deref().filter(|t| !t.is_empty()) {
        Some(user_text) => {
            format!("[用户输入文本]:\n{}\n\n[分析指令]:\n{}", user_text, DIAGNOSIS_PROMPT)
        }
        None => DIAGNOSIS_PROMPT.to_string(),
    };
    parts.push(ContentPart::Text(text));

    parts
}

/// Single-shot analyze-and-classify engine over a [`ChatApi`] client.
pub struct DiagnosisEngine<C> {
    client: C,
}

impl<C: ChatApi> DiagnosisEngine<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// Runs one compliance check. Infallible at the surface: any failure on
    /// the way (transport, empty response, schema violation) collapses into
    /// the fixed fallback result.
    #[instrument(skip(self, request), fields(modality = ?request.modality()))]
    pub async fn analyze(&self, request: &DiagnosisRequest) -> DiagnosisResult {
        let messages = vec![Message::User(build_parts(request))];

        let raw = match self.client.generate(&messages).await {
            Ok(response) => response.text(),
            Err(e) => {
                warn!(error = %e, "Diagnosis call failed; returning fallback result");
                return DiagnosisResult::fallback();
            }
        };

        match reconcile(&raw) {
            Some(result) => {
                debug!(has_violation = result.has_violation, "Diagnosis response reconciled");
                result
            }
            None => {
                warn!(raw = %raw, "Diagnosis response violated the output contract; returning fallback result");
                DiagnosisResult::fallback()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attachment_request(text: Option<&str>) -> DiagnosisRequest {
        DiagnosisRequest {
            text: text.map(str::to_string),
            attachment: Some(Attachment {
                data: "aGVsbG8=".to_string(),
                mime_type: "application/pdf".to_string(),
            }),
        }
    }

    #[test]
    fn modality_follows_attachment_presence() {
        assert_eq!(DiagnosisRequest::text("hi").modality(), Modality::TextOnly);
        assert_eq!(attachment_request(None).modality(), Modality::Multimodal);
        assert_eq!(attachment_request(Some("hi")).modality(), Modality::Multimodal);
        assert_eq!(DiagnosisRequest::default().modality(), Modality::TextOnly);
    }

    #[test]
    fn parts_put_attachment_first_and_text_last() {
        let parts = build_parts(&attachment_request(Some("Best Seller!")));
        assert_eq!(parts.len(), 2);
        assert!(matches!(&parts[0], ContentPart::InlineData { mime_type, .. } if mime_type == "application/pdf"));
        assert!(matches!(&parts[1], ContentPart::Text(_)));
    }

    #[test]
    fn user_text_and_instruction_share_one_labelled_part() {
        let parts = build_parts(&DiagnosisRequest::text("Cure your pain!"));
        assert_eq!(parts.len(), 1);
        let text = parts[0].as_text().unwrap();
        assert!(text.starts_with("[用户输入文本]:\nCure your pain!"));
        assert!(text.contains("[分析指令]:"));
        assert!(text.ends_with("请分析其中的可见文字和视觉元素。"));
    }

    #[test]
    fn instruction_only_when_no_user_text() {
        let parts = build_parts(&attachment_request(None));
        let text = parts[1].as_text().unwrap();
        assert_eq!(text, DIAGNOSIS_PROMPT);
        assert!(!text.contains("[用户输入文本]"));
    }

    #[test]
    fn empty_user_text_is_treated_as_absent() {
        let parts = build_parts(&attachment_request(Some("")));
        assert_eq!(parts[1].as_text().unwrap(), DIAGNOSIS_PROMPT);
    }

    #[test]
    fn built_parts_modality_agrees_with_request_modality() {
        for request in [
            DiagnosisRequest::text("hi"),
            attachment_request(None),
            attachment_request(Some("hi")),
            DiagnosisRequest::default(),
        ] {
            let messages = vec![Message::User(build_parts(&request))];
            assert_eq!(Modality::of(&messages), request.modality());
        }
    }
}
