//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the appropriate commands.

pub mod history;
pub mod model_list;
pub mod say;

use std::error::Error;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::cli::history::run_history;
use crate::cli::model_list::list_models;
use crate::cli::say::run_say;
use crate::core::config::Config;
use crate::core::providers::ProviderRegistry;
use crate::core::session::{SessionState, SessionStore};
use crate::utils::logging::init_tracing;

const CLEAR_PROMPT: &str = "Are you sure you want to clear the chat history?";

#[derive(Parser)]
#[command(name = "multichat")]
#[command(about = "Chat with OpenAI, Anthropic and Google models")]
#[command(
    long_about = "Multichat sends a conversation, with optional file attachments, to whichever \
provider owns the selected model and keeps the transcript between runs.\n\n\
Models:\n\
  gpt-*, chatgpt-4o-latest   OpenAI (full history is sent)\n\
  claude-*                   Anthropic (only the newest message is sent)\n\
  gemini-*                   Google (only the newest message is sent)\n\n\
Environment Variables:\n\
  MULTICHAT_LOG     tracing filter directive (e.g. multichat=debug)"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Log debug output to stderr
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send a message and print the reply
    Say {
        /// Model to select before sending (remembered for later runs)
        #[arg(short = 'm', long, value_name = "MODEL")]
        model: Option<String>,
        /// Attach a file (repeatable)
        #[arg(short = 'a', long = "attach", value_name = "FILE")]
        attach: Vec<PathBuf>,
        /// Read a pasted image of the given mime type from stdin
        #[arg(long, value_name = "MIME")]
        paste: Option<String>,
        /// Message text
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        prompt: Vec<String>,
    },
    /// Print the transcript, or copy one entry to the clipboard
    History {
        /// Entry number to copy
        #[arg(long, value_name = "N")]
        copy: Option<usize>,
        /// With --copy, copy this text attachment of the entry instead
        #[arg(long, value_name = "M", requires = "copy")]
        attachment: Option<usize>,
        /// Write the attachments of entry N into --to
        #[arg(long, value_name = "N", requires = "to")]
        export: Option<usize>,
        #[arg(long, value_name = "DIR")]
        to: Option<PathBuf>,
    },
    /// Delete the transcript
    Clear {
        /// Skip the confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// Store the API key (read from stdin when omitted)
    SetKey { key: Option<String> },
    /// Select the model used for new messages
    SetModel {
        model: String,
        /// Also save it as `default_model` in config.toml
        #[arg(long)]
        default: bool,
    },
    /// List providers and their models
    Models,
}

pub fn main() -> Result<(), Box<dyn Error>> {
    tokio::runtime::Runtime::new()?.block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut config = Config::load()?;

    match args.command {
        Commands::Say {
            model,
            attach,
            paste,
            prompt,
        } => run_say(&config, prompt, model, attach, paste).await,
        Commands::History {
            copy,
            attachment,
            export,
            to,
        } => {
            let session = open_session(&config, &ProviderRegistry::from_config(&config))?;
            run_history(&session, copy, attachment, export.zip(to))
        }
        Commands::Clear { yes } => {
            let mut session = open_session(&config, &ProviderRegistry::from_config(&config))?;
            let cleared = session.clear(|| yes || confirm(CLEAR_PROMPT))?;
            if cleared {
                println!("✅ Chat history cleared");
            } else {
                println!("Chat history kept");
            }
            Ok(())
        }
        Commands::SetKey { key } => {
            let mut session = open_session(&config, &ProviderRegistry::from_config(&config))?;
            let key = match key {
                Some(key) => key,
                None => prompt_line("API key: ")?,
            };
            session.set_secret_key(key)?;
            if session.has_secret_key() {
                println!("✅ API key saved");
            } else {
                println!("✅ API key removed");
            }
            Ok(())
        }
        Commands::SetModel { model, default } => {
            let registry = ProviderRegistry::from_config(&config);
            let mut session = open_session(&config, &registry)?;
            session.set_selected_model(&model, &registry)?;
            println!("✅ Selected model: {model}");
            if default {
                config.default_model = Some(model);
                config.save()?;
                println!("✅ Saved as default model");
            }
            Ok(())
        }
        Commands::Models => {
            let registry = ProviderRegistry::from_config(&config);
            let session = open_session(&config, &registry)?;
            list_models(&registry, session.selected_model());
            Ok(())
        }
    }
}

/// Open the persisted session and load whatever it holds.
pub(crate) fn open_session(
    config: &Config,
    registry: &ProviderRegistry,
) -> Result<SessionState, Box<dyn Error>> {
    let store = SessionStore::open(config)?;
    let mut session = SessionState::init(store, config.default_model());
    session.restore(registry)?;
    Ok(session)
}

fn prompt_line(prompt: &str) -> io::Result<String> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn confirm(question: &str) -> bool {
    prompt_line(&format!("{question} [y/N] "))
        .map(|answer| is_affirmative(&answer))
        .unwrap_or(false)
}

fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
