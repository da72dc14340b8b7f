use std::io::Write;

use anyhow::{Context, Result};
use dialoguer::{theme::ColorfulTheme, Input};
use tracing::warn;

use sellerguard_core::chat::{ChatSession, TruncationPolicy};
use sellerguard_extensions::gemini::GeminiChatClient;

use crate::cli::ChatArgs;

/// Interactive advisor loop. Streams each reply fragment to stdout as it
/// arrives; type "exit" to quit.
pub async fn run(args: ChatArgs) -> Result<()> {
    let client = GeminiChatClient::from_env().context("Failed to configure Gemini client")?;

    let mut session = match args.history_turns {
        Some(n) => ChatSession::new(client).with_truncation(TruncationPolicy::LastTurns(n)),
        None => ChatSession::new(client),
    };

    let mut input = match args.prompt {
        Some(prompt) => prompt,
        None => prompt().await?,
    };

    while input != "exit" {
        if !input.trim().is_empty() {
            let result = session
                .send(&input, |fragment| {
                    print!("{}", fragment);
                    let _ = std::io::stdout().flush();
                })
                .await;
            println!();
            if let Err(e) = result {
                warn!(error = %e, "Advisor turn failed");
                // The session already recorded an error turn; show its text.
                if let Some(turn) = session.conversation().turns().last() {
                    eprintln!("{}", turn.text);
                }
            }
        }
        input = prompt().await?;
    }

    Ok(())
}

async fn prompt() -> Result<String> {
    let result = tokio::task::spawn_blocking(|| {
        Input::<String>::with_theme(&ColorfulTheme::default())
            .with_prompt("Ask about a policy ('exit' to quit)")
            .allow_empty(true)
            .interact_text()
            .context("Failed to read input")
    })
    .await;

    let input = result.context("Blocking task failed (panic)")??;
    Ok(input)
}
