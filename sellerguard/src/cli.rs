use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// SellerGuard: compliance advisor for Amazon sellers.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (use multiple times for more).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start an interactive advisor chat session.
    Chat(ChatArgs),
    /// Run a compliance diagnosis on listing text or an uploaded file.
    Check(CheckArgs),
    /// Show the current policy bulletins and banned-term watchlist.
    Intel(IntelArgs),
}

// --- Argument Structs for each Subcommand ---

#[derive(Args, Debug)]
pub struct ChatArgs {
    /// Initial question to start the session with.
    #[arg(long, short)]
    pub prompt: Option<String>,

    /// Number of most recent turns to resend as context.
    #[arg(long)]
    pub history_turns: Option<usize>,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Listing text to diagnose.
    #[arg(long, short)]
    pub text: Option<String>,

    /// Path to a document or image to diagnose (PDF, TXT, CSV, JSON, PNG, JPG, WEBP).
    #[arg(long, short)]
    pub file: Option<PathBuf>,

    /// Print the diagnosis as JSON instead of formatted text.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct IntelArgs {
    /// Print the bulletins as JSON instead of formatted text.
    #[arg(long)]
    pub json: bool,
}
