/*
 * Golf Caddie CLI - Rust Edition
 * Copyright (c) 2024 Golf Caddie Contributors
 *
 * This work is licensed under the Creative Commons Attribution-NonCommercial 4.0 International License.
 * To view a copy of this license, visit http://creativecommons.org/licenses/by-nc/4.0/
 *
 * You are free to share and adapt this work for non-commercial purposes with attribution.
 * Commercial use is prohibited without explicit written permission.
 *
 * For commercial licensing inquiries, please contact the project maintainers.
 */

use anyhow::Result;
use colored::*;
use crossterm::{
    execute,
    style::{ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType},
};
use std::io::stdout;

use crate::types::{InteractionOutcome, InteractionRecord, RecordingSession, SystemStatus};

pub struct TerminalUI;

impl TerminalUI {
    pub fn new() -> Self {
        Self
    }

    pub async fn print_welcome(&self, verbose_trace: bool) -> Result<()> {
        execute!(
            stdout(),
            Clear(ClearType::All),
            SetForegroundColor(crossterm::style::Color::Cyan)
        )?;

        println!("{}", "⛳ Golf Caddie CLI - Rust Edition".cyan().bold());
        println!("{}", "🎙️  Voice and text commands for your rounds".green());
        println!("{}", "=".repeat(50).bright_black());
        println!();
        println!("{}", "Type a command and press Enter, e.g.:".white());
        println!("{}", "   start a round at lakeside".bright_black());
        println!("{}", "   I got a 5 on hole 3".bright_black());
        println!("{}", "   note that the greens are fast today".bright_black());
        println!();
        println!("{}", "💬 :note <text>   save a note".green());
        println!("{}", "❓ :ask <text>    ask the caddie a question".green());
        println!("{}", "🎙️  :record        start recording, :stop to finish".red());
        println!("{}", "📚 :history       recent interactions".magenta());
        if verbose_trace {
            println!("{}", "🔍 :trace / :next / :prev / :skip  step through the last interaction".yellow());
        }
        println!("{}", "🚪 :quit or Ctrl+C to exit".bright_black());
        println!("{}", "=".repeat(50).bright_black());
        println!();
        println!("{}", "🎯 Ready when you are!".green().bold());
        println!();

        execute!(stdout(), ResetColor)?;
        Ok(())
    }

    pub async fn print_status(&self, message: &str) -> Result<()> {
        println!("{}", message.yellow());
        Ok(())
    }

    pub async fn print_warning(&self, message: &str) -> Result<()> {
        println!("{}", message.yellow());
        Ok(())
    }

    pub async fn print_ready(&self) -> Result<()> {
        println!();
        println!("{}", "🟢 Ready for the next command...".green());
        println!();
        Ok(())
    }

    pub async fn print_shutdown(&self) -> Result<()> {
        println!();
        println!("{}", "🛑 Stopping Golf Caddie...".red());
        println!("{}", "Play well out there! ⛳".cyan().bold());
        Ok(())
    }

    pub async fn print_outcome(&self, outcome: &InteractionOutcome) -> Result<()> {
        if let Some(command) = &outcome.command {
            println!(
                "{} {}",
                "🏷️  Command:".blue(),
                command.command_type.to_string().white()
            );
        }
        println!("{} {}", "🤖 Caddie:".cyan(), outcome.response.white());
        Ok(())
    }

    pub async fn print_navigation(&self, path: &str) -> Result<()> {
        println!("{} {}", "➡️  Opening".magenta(), path.white());
        Ok(())
    }

    pub async fn print_recording(&self, session: &RecordingSession) -> Result<()> {
        let hint = if session.live_transcript_hint.is_empty() {
            String::new()
        } else {
            format!("  \"{}\"", session.live_transcript_hint)
        };
        println!(
            "{} {}s{}",
            "🔴 Recording...".red(),
            session.elapsed_seconds,
            hint.bright_black()
        );
        Ok(())
    }

    pub async fn print_history(&self, records: &[InteractionRecord]) -> Result<()> {
        if records.is_empty() {
            println!("{}", "📚 No interactions yet.".bright_black());
            return Ok(());
        }

        println!("{}", "📚 Recent interactions:".magenta().bold());
        println!("{}", "-".repeat(50).bright_black());
        for record in records {
            println!(
                "{} {} {}",
                record.timestamp.format("%H:%M:%S").to_string().bright_black(),
                format!("[{}]", record.kind).blue(),
                record.utterance.white()
            );
            println!("   {}", record.response.bright_black());
        }
        Ok(())
    }

    pub async fn print_trace_entry(&self, index: usize, total: usize, entry: Option<&str>) -> Result<()> {
        match entry {
            Some(entry) => println!(
                "{} {}",
                format!("🔍 [{}/{}]", index + 1, total).yellow(),
                entry.white()
            ),
            None => println!("{}", format!("🔍 [end of {} entries]", total).yellow()),
        }
        Ok(())
    }

    pub async fn print_system_status(&self, status: &SystemStatus) -> Result<()> {
        println!("{}", "🔍 Golf Caddie System Status".cyan().bold());
        println!("{}", "=".repeat(32).bright_black());
        println!();
        println!("Configuration:      {}", ready_mark(status.config_ready));
        println!("FFmpeg (recorder):  {}", ready_mark(status.audio_ready));
        println!("OpenAI API key:     {}", ready_mark(status.openai_ready));
        if status.whisper_backends.is_empty() {
            println!("Local captioning:   ❌ none found (live hints disabled)");
        } else {
            println!("Local captioning:   ✅ {} backend(s)", status.whisper_backends.len());
            for backend in &status.whisper_backends {
                println!("  • {}", backend);
            }
        }
        println!();
        if status.is_all_systems_ready() {
            println!("{}", "🎯 Ready to use: golf-caddie".green());
        } else {
            println!("{}", "🚀 Set OPENAI_API_KEY and install ffmpeg to get started".yellow());
        }
        Ok(())
    }
}

fn ready_mark(ready: bool) -> &'static str {
    if ready {
        "✅"
    } else {
        "❌"
    }
}
