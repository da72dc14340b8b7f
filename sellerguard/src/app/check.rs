use std::path::Path;

use anyhow::{bail, Context, Result};
use base64::Engine;

use sellerguard_core::diagnosis::{Attachment, DiagnosisEngine, DiagnosisRequest};
use sellerguard_extensions::gemini::GeminiChatClient;

use crate::cli::CheckArgs;

/// Runs one compliance diagnosis and prints the verdict.
pub async fn run(args: CheckArgs) -> Result<()> {
    if args.text.is_none() && args.file.is_none() {
        bail!("Nothing to check: provide --text, --file, or both.");
    }

    let attachment = match &args.file {
        Some(path) => Some(load_attachment(path)?),
        None => None,
    };
    let request = DiagnosisRequest {
        text: args.text.clone(),
        attachment,
    };

    let client = GeminiChatClient::from_env().context("Failed to configure Gemini client")?;
    let engine = DiagnosisEngine::new(client);
    let result = engine.analyze(&request).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        let verdict = if result.has_violation { "风险" } else { "合规" };
        println!("[{}] {}", verdict, result.message);
        for detail in &result.details {
            println!("  - {}", detail);
        }
    }

    Ok(())
}

fn load_attachment(path: &Path) -> Result<Attachment> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read file {}", path.display()))?;
    let mime_type = mime_for(path)?;
    Ok(Attachment {
        data: base64::engine::general_purpose::STANDARD.encode(bytes),
        mime_type: mime_type.to_string(),
    })
}

/// Accepted upload types, matched by file extension.
fn mime_for(path: &Path) -> Result<&'static str> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    Ok(match extension.as_str() {
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "json" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        other => bail!(
            "Unsupported file type '{}': expected PDF, TXT, CSV, JSON, PNG, JPG, or WEBP.",
            other
        ),
    })
}
