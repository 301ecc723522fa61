use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Voice and text translation against an OpenAI-compatible API
#[derive(Parser, Debug)]
#[command(name = "dms", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Sign in with email and password and fetch the API key
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },

    /// Sign out and forget the cached API key
    Logout,

    /// Show sign-in state, credential and preferences
    Status,

    /// Run one conversation turn per audio file, alternating target languages
    Turn {
        /// Language picked for the conversation
        #[arg(long, short)]
        language: String,

        /// Pre-recorded clips, played in order
        #[arg(required = true, value_name = "AUDIO")]
        audio: Vec<PathBuf>,
    },

    /// Translate a piece of text
    Translate {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        /// Text to translate; may be empty
        #[arg(default_value = "")]
        text: String,
    },

    /// Read or change preferences
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum SettingsAction {
    /// Pick the voice used for spoken replies (Male or Female)
    Voice { selection: String },

    /// Language the conversation alternates back to
    DefaultLanguage { language: String },

    /// Print current preferences
    Show,
}
