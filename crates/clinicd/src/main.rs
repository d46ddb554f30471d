//! clinicd - hospital service desk assistant
//!
//! `ask` answers one question, `chat` runs a conversation on stdin,
//! `init-config` writes a default config file.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use clinic_shared::{ConversationHistory, Message, TurnReply, VERSION};
use clinicd::{
    Capabilities, Config, KnowledgeBase, OllamaClient, Orchestrator, TurnCancel,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "clinicd")]
#[command(about = "Hospital service desk assistant", long_about = None)]
#[command(version = VERSION)]
struct Cli {
    /// Config file (default: $CLINIC_CONFIG, /etc/clinic/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a single question
    Ask {
        question: String,

        /// Override the configured retry bound
        #[arg(long)]
        max_retries: Option<u32>,

        /// Print the full turn result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Interactive conversation on stdin (empty line or "exit" quits)
    Chat,

    /// Write the default configuration to PATH
    InitConfig { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so answers on stdout stay clean
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::InitConfig { path } => {
            Config::save_default(&path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote default config to {}", path.display());
            Ok(())
        }
        Commands::Ask {
            question,
            max_retries,
            json,
        } => {
            let config = Config::load(cli.config.as_deref())?;
            let orchestrator = build_orchestrator(&config);
            let max_retries = max_retries.unwrap_or(config.orchestrator.max_retries);
            ask(&orchestrator, &question, max_retries, json).await
        }
        Commands::Chat => {
            let config = Config::load(cli.config.as_deref())?;
            let orchestrator = build_orchestrator(&config);
            chat(&orchestrator).await
        }
    }
}

/// Wire Ollama and the knowledge base into an orchestrator
fn build_orchestrator(config: &Config) -> Orchestrator {
    info!(
        "clinicd v{} (ollama: {}, models: {})",
        VERSION,
        config.llm.ollama_url,
        config.llm.required_models().join(", ")
    );

    // Transport backstop only; the orchestrator enforces the real deadline
    let http_timeout = Duration::from_secs(config.orchestrator.call_timeout_secs.max(1) + 5);
    let client = Arc::new(
        OllamaClient::new(&config.llm.ollama_url, http_timeout)
            .with_models(&config.llm.router_model, &config.llm.grader_model)
            .with_keep_alive(&config.llm.keep_alive),
    );

    let knowledge = load_knowledge(&config.knowledge.path, config.knowledge.top_k);
    let answer_writer = Arc::new(client.generator(
        &config.llm.generator_model,
        config.llm.generator_temperature,
    ));
    let fallback_writer = Arc::new(client.generator(
        &config.llm.fallback_model,
        config.llm.fallback_temperature,
    ));

    let capabilities = Capabilities::new(client, Arc::new(knowledge), answer_writer, fallback_writer);
    Orchestrator::new(capabilities, config.orchestrator_config())
}

/// A missing knowledge base is not fatal: every evidence lookup then
/// finds nothing and the turn takes the fallback lane.
fn load_knowledge(path: &Path, top_k: usize) -> KnowledgeBase {
    match KnowledgeBase::load(path, top_k) {
        Ok(kb) => kb,
        Err(e) => {
            warn!("Knowledge base unavailable, evidence lookups will be empty: {:#}", e);
            KnowledgeBase::from_documents(Vec::new(), top_k)
        }
    }
}

async fn ask(orchestrator: &Orchestrator, question: &str, max_retries: u32, json: bool) -> Result<()> {
    let cancel = TurnCancel::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let history = ConversationHistory::new();
    match orchestrator
        .handle_turn_with_cancel(question, &history, max_retries, cancel)
        .await
    {
        Ok(result) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("{}", result.answer);
            }
            Ok(())
        }
        Err(e) => {
            let reply = TurnReply::technical_difficulty(e.code());
            if json {
                println!("{}", serde_json::to_string_pretty(&reply)?);
            } else {
                println!("{}", reply.answer);
            }
            Err(e.into())
        }
    }
}

async fn chat(orchestrator: &Orchestrator) -> Result<()> {
    let mut history = ConversationHistory::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question.is_empty() || question == "exit" || question == "quit" {
            break;
        }

        let reply = orchestrator.respond(question, &history).await;
        println!("{}\n", reply.answer);

        history.push(Message::user(question));
        history.push(Message::assistant(reply.answer));
    }

    Ok(())
}
