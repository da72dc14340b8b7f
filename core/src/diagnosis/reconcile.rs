use serde_json::Value;

use super::DiagnosisResult;

/// Removes Markdown code-fence markers the model may have wrapped around its
/// JSON payload despite being told not to. Idempotent: stripping an already
/// clean string changes nothing.
pub fn strip_code_fence(raw: &str) -> String {
    raw.replace("```json", "").replace("```", "").trim().to_string()
}

/// Parses a raw model response against the diagnosis output contract.
///
/// Requires `hasViolation` to be present and boolean; `message` defaults to
/// a synthesized summary and `details` to empty when absent. Returns `None`
/// for anything that cannot be trusted, leaving fallback substitution to the
/// caller.
pub fn reconcile(raw: &str) -> Option<DiagnosisResult> {
    let cleaned = strip_code_fence(raw);
    if cleaned.is_empty() {
        return None;
    }

    let value: Value = serde_json::from_str(&cleaned).ok()?;
    let has_violation = value.get("hasViolation")?.as_bool()?;

    let message = value
        .get("message")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| {
            if has_violation { "发现违规风险" } else { "检测通过" }.to_string()
        });

    let details = value
        .get("details")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Some(DiagnosisResult { has_violation, message, details })
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{"hasViolation": true, "message": "发现 2 处高风险违规", "details": ["包含禁止词汇 'Best Seller'", "包含禁止词汇 'Cure'"]}"#;

    #[test]
    fn valid_json_maps_field_for_field() {
        let result = reconcile(VALID).unwrap();
        assert!(result.has_violation);
        assert_eq!(result.message, "发现 2 处高风险违规");
        assert_eq!(
            result.details,
            vec!["包含禁止词汇 'Best Seller'", "包含禁止词汇 'Cure'"]
        );
    }

    #[test]
    fn fenced_json_parses_identically_to_unfenced() {
        let fenced = format!("```json\n{}\n```", VALID);
        assert_eq!(reconcile(&fenced), reconcile(VALID));
    }

    #[test]
    fn fence_stripping_is_idempotent() {
        let fenced = format!("```json\n{}\n```", VALID);
        let once = strip_code_fence(&fenced);
        let twice = strip_code_fence(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn bare_fence_without_language_tag_is_stripped() {
        let fenced = format!("```\n{}\n```", VALID);
        assert_eq!(reconcile(&fenced), reconcile(VALID));
    }

    #[test]
    fn missing_message_synthesizes_summary() {
        let result = reconcile(r#"{"hasViolation": true, "details": ["x"]}"#).unwrap();
        assert_eq!(result.message, "发现违规风险");
        let result = reconcile(r#"{"hasViolation": false}"#).unwrap();
        assert_eq!(result.message, "检测通过");
    }

    #[test]
    fn missing_details_defaults_to_empty() {
        let result = reconcile(r#"{"hasViolation": false, "message": "内容合规"}"#).unwrap();
        assert!(result.details.is_empty());
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert_eq!(reconcile("not json at all"), None);
        assert_eq!(reconcile(r#"{"hasViolation": "#), None);
    }

    #[test]
    fn empty_response_is_rejected() {
        assert_eq!(reconcile(""), None);
        assert_eq!(reconcile("```json\n```"), None);
    }

    #[test]
    fn missing_or_mistyped_verdict_is_rejected() {
        assert_eq!(reconcile(r#"{"message": "hi"}"#), None);
        assert_eq!(reconcile(r#"{"hasViolation": "yes"}"#), None);
    }

    #[test]
    fn fallback_is_the_fixed_safe_result() {
        let fallback = DiagnosisResult::fallback();
        assert!(!fallback.has_violation);
        assert_eq!(fallback.message, "分析服务暂时不可用，请稍后重试。");
        assert_eq!(fallback.details, vec!["请检查网络连接或API密钥配置"]);
    }
}
