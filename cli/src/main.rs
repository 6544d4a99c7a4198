use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use dialoguer::Password;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use scout_core::config::{self, Config};
use scout_core::error::ScoutError;
use scout_core::session::ChatSession;
use termimad::MadSkin;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod onboard;
mod render;

use render::TurnPrinter;

#[derive(Parser)]
#[command(name = "scout", version)]
#[command(about = "scout - chat with a model that can look things up", long_about = None)]
struct Cli {
    /// Debug logging for scout crates (RUST_LOG still wins when set)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Save an API key and model to ~/.scout/config.toml
    Onboard,
    /// Start a chat session (default)
    Chat {
        /// Ask a single question, print the answer and exit
        #[arg(short, long)]
        message: Option<String>,

        /// Model to use instead of the configured one
        #[arg(long)]
        model: Option<String>,

        /// Wait for complete answers instead of streaming tokens
        #[arg(long)]
        no_stream: bool,

        /// Never ask for an API key interactively
        #[arg(long)]
        no_prompt: bool,
    },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        "scout_core=debug,scout_cli=debug"
    } else {
        "warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let loaded = Config::load_or_default();

    let command = cli.command.unwrap_or_else(|| default_command(loaded.as_ref().ok()));

    match command {
        Commands::Onboard => {
            let onboard_config = onboard::run_onboard(onboard_base(loaded)).map_err(|e| {
                eprintln!("❌ Onboarding failed: {}", e);
                anyhow::anyhow!("Onboarding failed: {}", e)
            })?;
            let path = config::save_config(&onboard_config)?;
            onboard::print_saved(&path);
        }
        Commands::Chat {
            message,
            model,
            no_stream,
            no_prompt,
        } => {
            let mut config = loaded?;
            if let Some(model) = model {
                config.model = model;
            }
            if no_stream {
                config.stream.enabled = false;
            }

            let credential = resolve_credential(&config, !no_prompt)?;
            let Some(mut session) = connect_session(&config, credential)? else {
                std::process::exit(1);
            };

            let skin = MadSkin::default();
            match message {
                Some(msg) => {
                    if !ask_once(&mut session, &skin, &msg).await {
                        std::process::exit(1);
                    }
                }
                None => chat_loop(&mut session, &skin).await?,
            }

            let conversation = session.end();
            tracing::debug!(messages = conversation.len(), "conversation discarded");
        }
    }

    Ok(())
}

/// Onboarding when nothing is configured yet (or the config is unreadable),
/// chat otherwise.
fn default_command(config: Option<&Config>) -> Commands {
    match config {
        Some(config) if config::config_exists() || config.resolve_api_key().is_some() => {
            Commands::Chat {
                message: None,
                model: None,
                no_stream: false,
                no_prompt: false,
            }
        }
        _ => Commands::Onboard,
    }
}

/// Onboarding rewrites the config, so a broken file must not block it.
fn onboard_base(loaded: Result<Config>) -> Config {
    loaded.unwrap_or_else(|e| {
        eprintln!(
            "{} Ignoring unreadable config: {:#}",
            style("!").yellow().bold(),
            e
        );
        Config::default()
    })
}

/// `None` after warning about a missing key; other failures propagate.
fn connect_session(config: &Config, credential: Option<String>) -> Result<Option<ChatSession>> {
    match ChatSession::connect(config, credential) {
        Ok(session) => Ok(Some(session)),
        Err(e) if matches!(ScoutError::find(&e), Some(ScoutError::MissingCredential)) => {
            eprintln!("{} {}", style("!").yellow().bold(), e);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Environment and config file first; otherwise a masked prompt when a
/// terminal is attached and prompting is allowed.
fn resolve_credential(config: &Config, allow_prompt: bool) -> Result<Option<String>> {
    if let Some(key) = config.resolve_api_key() {
        return Ok(Some(key));
    }
    if !allow_prompt || !console::user_attended() {
        return Ok(None);
    }

    let key: String = Password::new()
        .with_prompt("Groq API key")
        .allow_empty_password(true)
        .interact()
        .context("Failed to read API key")?;

    Ok(Some(key))
}

/// Whether the turn produced an answer; failures are printed here.
async fn ask_once(session: &mut ChatSession, skin: &MadSkin, message: &str) -> bool {
    let mut printer = TurnPrinter::default();
    let result = session.send(message, &mut printer).await;
    printer.finish();

    match result {
        Ok(answer) => {
            if !printer.streamed() {
                render::print_answer(skin, &answer);
            }
            true
        }
        Err(e) => {
            render::print_error(&e);
            false
        }
    }
}

async fn chat_loop(session: &mut ChatSession, skin: &MadSkin) -> Result<()> {
    let mut editor = DefaultEditor::new()
        .map_err(|e| anyhow::anyhow!("Failed to initialize line editor: {}", e))?;
    let prompt = "you › ";

    println!(
        "🔎 Scout {}",
        style(format!("({})", session.agent().provider().model())).dim()
    );
    println!(
        "{}",
        style("Type your message (/history to review, /exit or Ctrl+D to quit)").dim()
    );
    println!();
    render::print_conversation(skin, session.conversation());

    loop {
        let line = match editor.readline(prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(anyhow::anyhow!("Failed to read input: {}", e)),
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(input);

        match input {
            "/exit" | "/quit" => break,
            "/history" => {
                println!();
                render::print_conversation(skin, session.conversation());
                continue;
            }
            _ => {}
        }

        let mut printer = TurnPrinter::default();
        let result = session.send(input, &mut printer).await;
        printer.finish();

        match result {
            Ok(answer) => {
                if !printer.streamed() {
                    render::print_answer(skin, &answer);
                }
            }
            Err(e) => render::print_error(&e),
        }
        println!();
    }

    println!("\n👋 Goodbye!");
    Ok(())
}
