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

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use regex::Regex;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;

use golf_caddie::audio::AudioCaptureController;
use golf_caddie::classifier::CommandClassifier;
use golf_caddie::config::Config;
use golf_caddie::degradation::DegradationController;
use golf_caddie::domain::LocalDomainStore;
use golf_caddie::executor::CommandExecutor;
use golf_caddie::interaction_log::{InteractionLog, JsonlInteractionLog};
use golf_caddie::orchestrator::InteractionOrchestrator;
use golf_caddie::prefs::{PreferenceStore, PreferenceUpdate};
use golf_caddie::system;
use golf_caddie::transcription::{LocalTranscriber, TranscriptionBridge};
use golf_caddie::types::{ContextHints, CredentialSource, FollowUpAction, InteractionKind};
use golf_caddie::ui::TerminalUI;

/// Golf Caddie CLI - voice and text commands for golf competition management
#[derive(Parser)]
#[command(name = "golf-caddie")]
#[command(version = "0.1.0")]
#[command(about = "Voice-driven caddie assistant for rounds, scores and notes")]
#[command(long_about = "
Golf Caddie CLI - Rust Edition

Talk (or type) to your scorecard:
• start a round at lakeside
• I got a 5 on hole 3
• note that the greens are fast today
• what's my handicap?

Interactive commands:
• :record / :stop - capture a voice command
• :note <text>    - save a note
• :ask <text>     - ask a question
• :history        - recent interactions
• :trace          - step through the last interaction (verbose mode)
• :quit           - exit
")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the interactive caddie assistant (default)
    Run,

    /// Show system status and configuration
    Status,

    /// Read or update a user's assistant preferences
    Prefs {
        /// User the preference applies to (defaults to CADDIE_USER)
        #[arg(long)]
        user: Option<String>,

        /// Turn the assistant on
        #[arg(long)]
        enable: bool,

        /// Turn the assistant off
        #[arg(long, conflicts_with = "enable")]
        disable: bool,

        /// Whose service credential pays for interactions
        #[arg(long, value_enum)]
        source: Option<SourceArg>,

        /// Store a personal service credential
        #[arg(long)]
        credential: Option<String>,

        /// Remove the stored personal credential
        #[arg(long)]
        clear_credential: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SourceArg {
    App,
    User,
}

impl From<SourceArg> for CredentialSource {
    fn from(value: SourceArg) -> Self {
        match value {
            SourceArg::App => CredentialSource::App,
            SourceArg::User => CredentialSource::User,
        }
    }
}

#[derive(Debug, Clone)]
pub enum AppEvent {
    Line(String),
    Shutdown,
}

pub struct CaddieAssistant {
    config: Config,
    orchestrator: Arc<InteractionOrchestrator>,
    audio: Arc<RwLock<AudioCaptureController>>,
    log: Arc<JsonlInteractionLog>,
    terminal_ui: Arc<TerminalUI>,
    hints: Arc<RwLock<ContextHints>>,
    event_tx: mpsc::UnboundedSender<AppEvent>,
    cancellation_token: CancellationToken,
}

impl CaddieAssistant {
    pub async fn new() -> Result<(
        Self,
        mpsc::UnboundedReceiver<AppEvent>,
        mpsc::UnboundedReceiver<FollowUpAction>,
    )> {
        let config = Config::load().await?;

        let prefs = Arc::new(PreferenceStore::new(&config.data_dir)?);
        let degradation = DegradationController::new(prefs, config.openai.api_key.clone());
        let bridge = TranscriptionBridge::new(&config);
        let classifier = CommandClassifier::new(&config);
        let domain = Arc::new(LocalDomainStore::new());
        let executor = CommandExecutor::new(domain);
        let log = Arc::new(JsonlInteractionLog::new(&config.data_dir)?);

        let captioner = LocalTranscriber::detect().await.map(Arc::new);
        let mut audio = AudioCaptureController::new(&config, captioner);
        audio.set_on_error(Box::new(|e| {
            eprintln!("{}", format!("⚠️  {}", e).yellow());
        }));

        let (orchestrator, followup_rx) = InteractionOrchestrator::new(
            &config,
            bridge,
            classifier,
            degradation,
            executor,
            log.clone(),
        );

        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let assistant = Self {
            config,
            orchestrator: Arc::new(orchestrator),
            audio: Arc::new(RwLock::new(audio)),
            log,
            terminal_ui: Arc::new(TerminalUI::new()),
            hints: Arc::new(RwLock::new(ContextHints::default())),
            event_tx,
            cancellation_token: CancellationToken::new(),
        };

        Ok((assistant, event_rx, followup_rx))
    }

    pub async fn run(
        &self,
        event_rx: mpsc::UnboundedReceiver<AppEvent>,
        followup_rx: mpsc::UnboundedReceiver<FollowUpAction>,
    ) -> Result<()> {
        self.terminal_ui.print_welcome(self.config.verbose_trace).await?;

        if self.config.user_id.is_none() {
            self.terminal_ui
                .print_warning("⚠️  CADDIE_USER is not set - commands will be rejected until it is")
                .await?;
        }

        // Ctrl+C turns into a shutdown event; force-exit if that stalls
        let event_tx = self.event_tx.clone();
        ctrlc::set_handler(move || {
            println!("\n🛑 Ctrl+C pressed - shutting down...");
            let _ = event_tx.send(AppEvent::Shutdown);
            std::thread::spawn(|| {
                std::thread::sleep(std::time::Duration::from_secs(2));
                std::process::exit(0);
            });
        })?;

        self.start_stdin_reader();
        self.start_followup_listener(followup_rx);
        self.start_recording_ticker();

        self.event_loop(event_rx).await
    }

    fn start_stdin_reader(&self) {
        let event_tx = self.event_tx.clone();
        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(line) => {
                        if event_tx.send(AppEvent::Line(line)).is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
            let _ = event_tx.send(AppEvent::Shutdown);
        });
    }

    /// Deferred navigation requests surface here once their delay elapses.
    /// A navigation into a round's scoring view becomes the round context
    /// for subsequent utterances.
    fn start_followup_listener(&self, mut followup_rx: mpsc::UnboundedReceiver<FollowUpAction>) {
        let terminal_ui = self.terminal_ui.clone();
        let hints = self.hints.clone();
        let cancellation_token = self.cancellation_token.clone();
        let round_path = Regex::new(r"^/rounds/([^/]+)/score$").expect("static regex");

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancellation_token.cancelled() => break,
                    action = followup_rx.recv() => {
                        let Some(action) = action else { break };
                        if let FollowUpAction::Navigate { path } = action {
                            let _ = terminal_ui.print_navigation(&path).await;
                            if let Some(caps) = round_path.captures(&path) {
                                hints.write().await.round_id = Some(caps[1].to_string());
                            }
                        }
                    }
                }
            }
        });
    }

    fn start_recording_ticker(&self) {
        let audio = self.audio.clone();
        let terminal_ui = self.terminal_ui.clone();
        let cancellation_token = self.cancellation_token.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancellation_token.cancelled() => break,
                    _ = sleep(Duration::from_secs(5)) => {
                        let session = audio.read().await.session();
                        if let Some(session) = session {
                            let _ = terminal_ui.print_recording(&session).await;
                        }
                    }
                }
            }
        });
    }

    async fn event_loop(&self, mut event_rx: mpsc::UnboundedReceiver<AppEvent>) -> Result<()> {
        tracing::info!("starting event loop");

        loop {
            let event = tokio::select! {
                _ = self.cancellation_token.cancelled() => break,
                event = event_rx.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            match event {
                AppEvent::Line(line) => {
                    if let Err(e) = self.handle_line(line.trim()).await {
                        tracing::error!(error = %e, "error handling input");
                        let _ = self
                            .terminal_ui
                            .print_warning(&format!("⚠️  Error: {}", e))
                            .await;
                        let _ = self.terminal_ui.print_ready().await;
                    }
                }
                AppEvent::Shutdown => {
                    self.terminal_ui.print_shutdown().await?;
                    self.cancellation_token.cancel();
                    // Dropping the controller releases the device if a
                    // session is still open
                    let mut audio = self.audio.write().await;
                    let _ = audio.stop_capture().await;
                    break;
                }
            }
        }

        tracing::info!("event loop finished");
        Ok(())
    }

    async fn handle_line(&self, line: &str) -> Result<()> {
        if line.is_empty() {
            return Ok(());
        }

        match line.split_once(' ').map_or((line, ""), |(head, rest)| (head, rest.trim())) {
            (":quit", _) | (":exit", _) => {
                let _ = self.event_tx.send(AppEvent::Shutdown);
                Ok(())
            }
            (":record", _) => self.handle_record().await,
            (":stop", _) => self.handle_stop().await,
            (":history", _) => self.handle_history().await,
            (":trace", _) => self.handle_trace(TraceNav::Show).await,
            (":next", _) => self.handle_trace(TraceNav::Next).await,
            (":prev", _) => self.handle_trace(TraceNav::Previous).await,
            (":skip", _) => self.handle_trace(TraceNav::SkipAll).await,
            (":note", rest) if !rest.is_empty() => {
                self.process_text(rest, InteractionKind::Note).await
            }
            (":ask", rest) if !rest.is_empty() => {
                self.process_text(rest, InteractionKind::Question).await
            }
            _ => self.process_text(line, InteractionKind::TextCommand).await,
        }
    }

    async fn process_text(&self, text: &str, kind: InteractionKind) -> Result<()> {
        let hints = self.hints.read().await.clone();
        let outcome = self.orchestrator.process_text(text, kind, hints).await;
        self.terminal_ui.print_outcome(&outcome).await?;
        self.terminal_ui.print_ready().await?;
        Ok(())
    }

    async fn handle_record(&self) -> Result<()> {
        let mut audio = self.audio.write().await;
        match audio.start_capture().await {
            Ok(()) => {
                self.terminal_ui
                    .print_status("🎙️  Recording - type :stop when you're done")
                    .await?;
            }
            Err(e) => {
                // Recoverable; the session is back in idle and may retry
                self.terminal_ui
                    .print_warning(&format!("⚠️  Could not start recording: {}", e))
                    .await?;
            }
        }
        Ok(())
    }

    async fn handle_stop(&self) -> Result<()> {
        let clip = {
            let mut audio = self.audio.write().await;
            audio.stop_capture().await?
        };

        match clip {
            Some(clip) => {
                self.terminal_ui
                    .print_status("📝 Processing your voice command...")
                    .await?;
                let hints = self.hints.read().await.clone();
                let outcome = self.orchestrator.process_audio(clip, hints).await;
                self.terminal_ui.print_outcome(&outcome).await?;
                self.terminal_ui.print_ready().await?;
            }
            None => {
                self.terminal_ui
                    .print_warning("⚠️  Not recording - use :record first")
                    .await?;
            }
        }
        Ok(())
    }

    async fn handle_history(&self) -> Result<()> {
        let Some(user_id) = &self.config.user_id else {
            self.terminal_ui
                .print_warning("⚠️  Set CADDIE_USER to view history")
                .await?;
            return Ok(());
        };

        match self.log.recent(user_id, 10).await {
            Ok(records) => self.terminal_ui.print_history(&records).await?,
            Err(e) => {
                self.terminal_ui
                    .print_warning(&format!("⚠️  Could not read history: {}", e))
                    .await?;
            }
        }
        Ok(())
    }

    async fn handle_trace(&self, nav: TraceNav) -> Result<()> {
        if !self.config.verbose_trace {
            self.terminal_ui
                .print_warning("⚠️  Trace stepping needs CADDIE_VERBOSE_TRACE=true")
                .await?;
            return Ok(());
        }

        let trace = self.orchestrator.trace();
        let mut queue = trace.lock();
        match nav {
            TraceNav::Show => {}
            TraceNav::Next => {
                queue.next();
            }
            TraceNav::Previous => {
                queue.previous();
            }
            TraceNav::SkipAll => queue.skip_all(),
        }
        let index = queue.current_index();
        let total = queue.total();
        let entry = queue.current_entry().map(str::to_string);
        drop(queue);

        self.terminal_ui
            .print_trace_entry(index, total, entry.as_deref())
            .await?;
        Ok(())
    }
}

enum TraceNav {
    Show,
    Next,
    Previous,
    SkipAll,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Status) => show_system_status().await,
        Some(Commands::Prefs {
            user,
            enable,
            disable,
            source,
            credential,
            clear_credential,
        }) => handle_prefs(user, enable, disable, source, credential, clear_credential).await,
        Some(Commands::Run) | None => run_main_application().await,
    }
}

async fn run_main_application() -> Result<()> {
    setup_logging().await?;

    let (assistant, event_rx, followup_rx) = CaddieAssistant::new().await?;
    let result = assistant.run(event_rx, followup_rx).await;

    assistant.cancellation_token.cancel();
    sleep(Duration::from_millis(300)).await;

    result
}

async fn show_system_status() -> Result<()> {
    dotenv::dotenv().ok();
    let status = system::collect_status().await;
    TerminalUI::new().print_system_status(&status).await
}

async fn handle_prefs(
    user: Option<String>,
    enable: bool,
    disable: bool,
    source: Option<SourceArg>,
    credential: Option<String>,
    clear_credential: bool,
) -> Result<()> {
    dotenv::dotenv().ok();

    let user_id = user
        .or_else(|| std::env::var("CADDIE_USER").ok())
        .filter(|v| !v.trim().is_empty())
        .context("No user given - pass --user or set CADDIE_USER")?;

    let store = PreferenceStore::new(&default_data_dir())?;

    let has_changes = enable || disable || source.is_some() || credential.is_some() || clear_credential;
    let prefs = if has_changes {
        let update = PreferenceUpdate {
            enabled: if enable {
                Some(true)
            } else if disable {
                Some(false)
            } else {
                None
            },
            source: source.map(Into::into),
            user_credential: credential,
            clear_credential,
        };
        store.update(&user_id, update)?
    } else {
        store.read(&user_id)?
    };

    println!("Preferences for {}:", user_id.cyan());
    println!("  enabled:    {}", prefs.enabled);
    println!("  source:     {}", prefs.source);
    println!(
        "  credential: {}",
        if prefs.user_credential.is_some() {
            "stored"
        } else {
            "none"
        }
    );
    Ok(())
}

fn default_data_dir() -> PathBuf {
    std::env::var("CADDIE_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("/tmp"))
                .join(".golf-caddie")
        })
}

async fn setup_logging() -> Result<()> {
    use tracing_appender::rolling::{RollingFileAppender, Rotation};
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let log_dir = default_data_dir().join("logs");
    std::fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, "golf-caddie.log");

    // File gets everything, stderr only user-facing errors
    let subscriber = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_filter(
                    EnvFilter::from_default_env()
                        .add_directive("golf_caddie=debug".parse()?),
                ),
        )
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true)
                .with_target(false)
                .compact()
                .with_filter(
                    EnvFilter::from_default_env().add_directive("error".parse()?),
                ),
        );

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    tracing::info!("logging initialized");
    println!("📝 Debug logs: {}", log_dir.join("golf-caddie.log").display());
    println!();

    Ok(())
}
