use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use domain::{EmbeddingModel, ModelProvider, Role, SearchSettings, SearchTuning, DEFAULT_LOCAL_MODEL};
use llm_client::HttpLanguageModel;
use retrieval::{HttpSearchBackend, SearchEndpoint};
use session::{ConversationSession, OrchestratorConfig, RecommendationOrchestrator, TurnOutcome, TurnReport};

/// cine-bot - conversational movie recommendations
#[derive(Parser)]
#[command(name = "cine-bot")]
#[command(about = "Ask for movies in plain language and get three picks back", long_about = None)]
struct Cli {
    /// Address of the recommendation backend
    #[arg(long, env = "CINEBOT_BACKEND_URL", default_value = "http://localhost:5000", global = true)]
    backend_url: String,

    /// Which language model deployment to use
    #[arg(long, value_enum, default_value_t = Provider::Hosted, global = true)]
    provider: Provider,

    /// Model name for the local provider
    #[arg(long, default_value = DEFAULT_LOCAL_MODEL, global = true)]
    local_model: String,

    /// Number of search results to request (5-10)
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u32).range(5..=10), global = true)]
    limit: u32,

    /// Vector-search candidates fetched before filtering (100-200)
    #[arg(long, default_value_t = 200, value_parser = clap::value_parser!(u32).range(100..=200), global = true)]
    batch_size: u32,

    /// Weight of the positive query (0.0-1.0)
    #[arg(long, default_value_t = 1.0, global = true)]
    alpha: f64,

    /// Weight of the negative query (0.0-1.0)
    #[arg(long, default_value_t = 1.0, global = true)]
    beta: f64,

    /// Embedding model: a code 1-6 or a model name
    #[arg(long, default_value = "1", global = true)]
    embedding_model: EmbeddingModel,

    /// Use the deprecated parameter-tuple search endpoint
    #[arg(long, global = true)]
    legacy_search: bool,

    /// Deadline for each stage of a turn, in seconds
    #[arg(long, default_value_t = 60, global = true)]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Provider {
    Hosted,
    Local,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat
    Chat,

    /// Ask a single question and print the answer
    Ask {
        /// The request, e.g. "a cozy mystery from the 80s"
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut session = build_session(&cli)?;

    match cli.command {
        Commands::Chat => handle_chat(&mut session).await?,
        Commands::Ask { message } => handle_ask(&mut session, &message.join(" ")).await?,
    }

    Ok(())
}

/// Wire the HTTP clients and settings into a fresh session
fn build_session(cli: &Cli) -> Result<ConversationSession> {
    let search = SearchSettings {
        limit: cli.limit,
        tuning: SearchTuning {
            search_batch_size: cli.batch_size,
            alpha: cli.alpha,
            beta: cli.beta,
            embedding_model: cli.embedding_model,
        },
    };
    search.validate().context("Invalid search settings")?;

    let provider = match cli.provider {
        Provider::Hosted => ModelProvider::Hosted,
        Provider::Local => ModelProvider::local(cli.local_model.clone()),
    };
    let endpoint = if cli.legacy_search {
        SearchEndpoint::Legacy
    } else {
        SearchEndpoint::Canonical
    };

    let timeout = Duration::from_secs(cli.timeout_secs);
    let model = HttpLanguageModel::with_timeout(cli.backend_url.clone(), provider, timeout)
        .context("Failed to create language model client")?;
    let backend = HttpSearchBackend::with_timeout(cli.backend_url.clone(), timeout)
        .context("Failed to create search client")?
        .with_endpoint(endpoint);

    let config = OrchestratorConfig::default()
        .with_search(search)
        .with_stage_timeout(timeout);
    info!("Backend {} ({:?} search)", cli.backend_url, endpoint);

    let orchestrator = RecommendationOrchestrator::new(Arc::new(model), Arc::new(backend), config);
    Ok(ConversationSession::new(orchestrator))
}

/// Handle the 'ask' command
async fn handle_ask(session: &mut ConversationSession, message: &str) -> Result<()> {
    let report = session.handle_message(message).await;
    print_report(&report);
    if report.is_failure() {
        anyhow::bail!("Turn failed");
    }
    Ok(())
}

/// Handle the 'chat' command
async fn handle_chat(session: &mut ConversationSession) -> Result<()> {
    print_greeting(session);
    println!("{}", "Type /help for commands.".dimmed());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", ">".green().bold());
        std::io::stdout().flush().context("Failed to flush stdout")?;

        let Some(line) = lines.next_line().await.context("Failed to read input")? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line.split_once(' ').map_or((line, ""), |(cmd, rest)| (cmd, rest.trim())) {
            ("/quit" | "/exit", _) => break,
            ("/help", _) => print_help(),
            ("/new", _) => {
                session.new_session();
                print_greeting(session);
            }
            ("/list", _) => print_sessions(session),
            ("/history", _) => print_history(session),
            ("/switch", arg) => match arg.parse::<usize>() {
                Ok(number) if number > 0 => match session.switch_to(number - 1) {
                    Ok(()) => print_history(session),
                    Err(e) => println!("{}", e.to_string().red()),
                },
                _ => println!("{}", "Usage: /switch <number>".yellow()),
            },
            (cmd, _) if cmd.starts_with('/') => {
                println!("{}", format!("Unknown command {}", cmd).yellow());
            }
            _ => {
                println!("{}", "Thinking...".dimmed());
                let report = session.handle_message(line).await;
                print_report(&report);
            }
        }
    }

    Ok(())
}

fn print_greeting(session: &ConversationSession) {
    if let Some(greeting) = session.active().last() {
        println!("{} {}", "cine-bot:".cyan().bold(), greeting.content);
    }
}

fn print_help() {
    println!("{}", "Commands:".bold().blue());
    println!("  /new           start a new conversation");
    println!("  /list          list saved conversations");
    println!("  /switch <n>    switch to conversation n");
    println!("  /history       show the current conversation");
    println!("  /quit          exit");
}

fn print_sessions(session: &ConversationSession) {
    println!("{}", "Saved conversations:".bold().blue());
    for summary in session.summaries() {
        let marker = if summary.active { "*".green().to_string() } else { " ".to_string() };
        println!(
            "{} {}. {} ({} messages)",
            marker,
            summary.index + 1,
            summary.title,
            summary.message_count
        );
    }
}

fn print_history(session: &ConversationSession) {
    for message in session.active().messages() {
        match message.role {
            Role::User => println!("{} {}", "you:".green().bold(), message.content),
            Role::Assistant => println!("{} {}", "cine-bot:".cyan().bold(), message.content),
            Role::System => {}
        }
    }
}

fn print_report(report: &TurnReport) {
    let label = if report.is_failure() {
        "cine-bot:".red().bold()
    } else {
        "cine-bot:".cyan().bold()
    };
    println!("{} {}", label, report.reply);

    let detail = match &report.outcome {
        TurnOutcome::Recommended {
            candidates,
            fallback_used: true,
        } => format!("{} candidates, local ranking", candidates.len()),
        TurnOutcome::Recommended { candidates, .. } => format!("{} candidates", candidates.len()),
        TurnOutcome::NotRecommendation => "no search".to_string(),
        TurnOutcome::Failed => "failed".to_string(),
    };
    println!("{}", format!("({}, {:.2?})", detail, report.elapsed).dimmed());
}
