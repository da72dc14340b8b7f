use anyhow::Result;

use sellerguard_core::intel::{BANNED_TERMS, BULLETINS};

use crate::cli::IntelArgs;

/// Prints the policy bulletin feed and the banned-term watchlist.
pub fn run(args: IntelArgs) -> Result<()> {
    if args.json {
        println!("{}", serde_json::to_string_pretty(&BULLETINS)?);
        return Ok(());
    }

    for bulletin in &BULLETINS {
        println!("[{}] {}", bulletin.date, bulletin.title);
        println!("  {}", bulletin.summary);
        println!("  {}", bulletin.link);
        println!();
    }

    println!("敏感词监控列表:");
    for term in BANNED_TERMS {
        println!("  - {}", term);
    }

    Ok(())
}
