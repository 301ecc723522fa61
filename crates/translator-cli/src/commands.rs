use anyhow::{bail, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use translator_adapters::{AppContext, FileRecorder};
use translator_core::preferences::{DEFAULT_LANGUAGE_CHOICES, PIPELINE_LANGUAGES, TRANSLATION_LANGUAGES};
use translator_core::{RecordingSession, TurnOutcome, TurnReport, VoiceSelection};

use crate::cli::{Command, SettingsAction};
use crate::observer::ConsoleObserver;

/// Runs one parsed command and returns the text to print.
pub async fn execute(ctx: &AppContext, command: Command) -> Result<String> {
    match command {
        Command::Login { email, password } => login(ctx, &email, &password).await,
        Command::Logout => logout(ctx).await,
        Command::Status => Ok(status(ctx)),
        Command::Turn { language, audio } => {
            let reports = run_turns(ctx, &language, audio).await?;
            Ok(reports.iter().map(format_outcome).collect::<Vec<_>>().join("\n"))
        }
        Command::Translate { from, to, text } => translate(ctx, &from, &to, &text).await,
        Command::Settings { action } => settings(ctx, action),
    }
}

pub async fn login(ctx: &AppContext, email: &str, password: &str) -> Result<String> {
    let identity = ctx.session.login(email, password).await?;
    let mut out = format!("Signed in as {}", identity.email.as_deref().unwrap_or(&identity.uid));
    match ctx.cached_credential() {
        Some(credential) => {
            out.push_str(&format!("\nAPI key: {}", credential.masked()));
        }
        None => out.push_str("\nNo API key found for this account yet"),
    }
    Ok(out)
}

pub async fn logout(ctx: &AppContext) -> Result<String> {
    ctx.session.logout().await?;
    Ok("Signed out".to_string())
}

pub fn status(ctx: &AppContext) -> String {
    let prefs = ctx.preferences();
    let user = match ctx.session.current_user() {
        Some(identity) => identity.email.unwrap_or(identity.uid),
        None if ctx.session.is_logged_in() => "signed in (session expired)".to_string(),
        None => "not signed in".to_string(),
    };
    let credential = ctx
        .cached_credential()
        .map(|c| c.masked())
        .unwrap_or_else(|| "none".to_string());

    format!(
        "User:             {}\nAPI key:          {}\nVoice:            {}\nDefault language: {}\nSettings file:    {}",
        user,
        credential,
        prefs.voice_selection().as_str(),
        prefs.default_language(),
        ctx.config.settings_path.display(),
    )
}

/// Plays each clip through the record button, one turn per clip.
pub async fn run_turns(ctx: &AppContext, language: &str, audio: Vec<PathBuf>) -> Result<Vec<TurnReport>> {
    check_language(language, PIPELINE_LANGUAGES)?;
    let orchestrator = Arc::new(ctx.orchestrator(ConsoleObserver, language));
    info!(language, default = %ctx.preferences().default_language(), clips = audio.len(), "conversation started");

    let mut reports = Vec::with_capacity(audio.len());
    for path in audio {
        println!("{} -> {}", path.display(), orchestrator.current_target_language());
        let mut session = RecordingSession::new(Box::new(FileRecorder::new(&path)), orchestrator.clone());
        session.toggle_recording().await?;
        match session.toggle_recording().await? {
            Some(report) => reports.push(report),
            None => warn!(path = %path.display(), "clip was empty, skipped"),
        }
    }
    Ok(reports)
}

pub async fn translate(ctx: &AppContext, from: &str, to: &str, text: &str) -> Result<String> {
    check_language(from, TRANSLATION_LANGUAGES)?;
    check_language(to, TRANSLATION_LANGUAGES)?;
    Ok(ctx.translation_service().translate_or_fallback(from, to, text).await)
}

pub fn settings(ctx: &AppContext, action: SettingsAction) -> Result<String> {
    let prefs = ctx.preferences();
    match action {
        SettingsAction::Voice { selection } => {
            let selection: VoiceSelection = selection.parse()?;
            prefs.set_voice_selection(selection)?;
            Ok(format!("Voice set to {} ({})", selection.as_str(), selection.voice().as_str()))
        }
        SettingsAction::DefaultLanguage { language } => {
            check_language(&language, DEFAULT_LANGUAGE_CHOICES)?;
            prefs.set_default_language(&language)?;
            Ok(format!("Default language set to {}", language))
        }
        SettingsAction::Show => Ok(format!(
            "Voice:            {} ({})\nDefault language: {}",
            prefs.voice_selection().as_str(),
            prefs.voice().as_str(),
            prefs.default_language()
        )),
    }
}

/// One summary line per turn. Transcript and reply were already printed by
/// the observer while the turn ran.
pub fn format_outcome(report: &TurnReport) -> String {
    match &report.outcome {
        TurnOutcome::Completed(_) => format!("[{}] completed", report.target_language),
        TurnOutcome::Failed(failure) => format!(
            "[{}] failed at {}: {}",
            report.target_language, failure.stage, failure.error
        ),
        TurnOutcome::Rejected => format!(
            "[{}] skipped, another turn was still running",
            report.target_language
        ),
    }
}

fn check_language(language: &str, allowed: &[&str]) -> Result<()> {
    if allowed.contains(&language) {
        return Ok(());
    }
    bail!("unsupported language '{}', expected one of: {}", language, allowed.join(", "))
}
