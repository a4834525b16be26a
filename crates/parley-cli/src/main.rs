//! parley - conversational front end for a task bot

mod config;
mod store;
mod tools;
mod utils;

use clap::Parser;
use parley_agent::{
    MessageWindow, Orchestrator, OrchestratorConfig, ProviderGateway, ToolGateway, TriggerPhrase,
    TurnEvent, tool::to_api_tool,
};
use parley_ai::{Model, providers::OpenAIProvider};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// parley - conversational front end for a task bot
#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Session id to use (default: a new random id)
    #[arg(short, long)]
    session: Option<String>,

    /// Run a single turn and print the reply as JSON
    #[arg(short = 'c', long)]
    command: Option<String>,

    /// Model to use (default: gpt-4o)
    #[arg(short, long)]
    model: Option<String>,

    /// Answer tool calls with the built-in echo bot instead of bot_url
    #[arg(long)]
    echo_bot: bool,

    /// List stored sessions
    #[arg(long)]
    sessions: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "parley=debug" } else { "parley=warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    // Initialize config and exit
    if args.init_config {
        match config::Config::init() {
            Ok(path) => {
                println!("Config file created at: {}", path.display());
                println!("\nExample config:\n{}", config::example_config());
            }
            Err(e) => {
                eprintln!("Error creating config: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    let cfg = config::Config::load();

    let sessions_dir = cfg
        .sessions_dir
        .as_deref()
        .map(config::expand_home)
        .unwrap_or_else(store::FileStore::default_dir);
    let store = Arc::new(store::FileStore::new(sessions_dir));

    // List sessions and exit
    if args.sessions {
        return list_sessions(&store);
    }

    let Some(api_key) = cfg.openai_api_key() else {
        eprintln!("Error: No API key found for OpenAI");
        eprintln!();
        eprintln!(
            "Set your API key with: export {}=your-key",
            OpenAIProvider::API_KEY_ENV
        );
        eprintln!("Or add it to config file: parley --init-config");
        std::process::exit(1);
    };

    let tool: Arc<dyn ToolGateway> = match (&cfg.bot_url, args.echo_bot) {
        (Some(url), false) => Arc::new(tools::HttpBotTool::new(url.clone(), cfg.bot_timeout())),
        (None, false) => {
            tracing::warn!("No bot_url configured, answering tool calls with the echo bot");
            Arc::new(tools::EchoTool::new())
        }
        (_, true) => Arc::new(tools::EchoTool::new()),
    };

    let model_id = args
        .model
        .or(cfg.model.clone())
        .unwrap_or_else(|| Model::default().id);
    let mut model = Model::new(model_id);
    if let Some(ref base_url) = cfg.base_url {
        model = model.with_base_url(base_url.clone());
    }

    let gateway =
        ProviderGateway::new(OpenAIProvider::new(api_key), model).with_tool(to_api_tool(tool.as_ref()));
    let model_id = gateway.model().id.clone();

    let mut orchestrator_config = OrchestratorConfig::default();
    if let Some(prompt) = cfg.system_prompt()? {
        orchestrator_config = orchestrator_config.with_system_prompt(prompt);
    }
    if let Some(ref phrase) = cfg.trigger_phrase {
        orchestrator_config = orchestrator_config.with_trigger(TriggerPhrase::new(phrase.clone()));
    }
    if let Some(recent) = cfg.recent_messages {
        orchestrator_config = orchestrator_config.with_window(MessageWindow::new(recent));
    }

    let orchestrator = Orchestrator::new(orchestrator_config, Arc::new(gateway), tool, store);

    let session_id = args
        .session
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    // Non-interactive mode
    if let Some(command) = args.command {
        return run_command(&orchestrator, &command, &session_id).await;
    }

    run_interactive(&orchestrator, &model_id, session_id).await
}

async fn run_command(
    orchestrator: &Orchestrator,
    command: &str,
    session_id: &str,
) -> anyhow::Result<()> {
    let reply = orchestrator.respond(command, session_id).await?;
    println!("{}", serde_json::to_string_pretty(&reply.to_json())?);
    Ok(())
}

async fn run_interactive(
    orchestrator: &Orchestrator,
    model_id: &str,
    mut session_id: String,
) -> anyhow::Result<()> {
    use std::io::{self, Write};

    let mut receiver = orchestrator.subscribe();
    let events = tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(TurnEvent::ToolInvocationStart { tool_name, .. }) => {
                    eprintln!("[Calling {}...]", tool_name);
                }
                Ok(TurnEvent::TurnStart { resumed: false, .. }) => {
                    eprintln!("[New conversation]");
                }
                Ok(_) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    if std::io::IsTerminal::is_terminal(&std::io::stderr()) {
        eprintln!("parley ({}) session: {}", model_id, session_id);
        eprintln!("Type /new for a fresh session, /exit to quit.");
        eprintln!();
    }

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            // EOF
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        match input {
            "/exit" | "/quit" => break,
            "/session" => {
                println!("Session: {}", session_id);
                continue;
            }
            "/new" => {
                session_id = uuid::Uuid::new_v4().to_string();
                println!("Started session {}", session_id);
                continue;
            }
            _ => {}
        }

        match orchestrator.respond(input, &session_id).await {
            Ok(reply) => println!("{}", reply.display_text()),
            Err(e) => eprintln!("Error: {}", e),
        }
        println!();
    }

    events.abort();
    Ok(())
}

fn list_sessions(store: &store::FileStore) -> anyhow::Result<()> {
    match store.list() {
        Ok(sessions) => {
            if sessions.is_empty() {
                println!("No saved sessions found.");
                println!("Sessions are stored in: {}", store.dir().display());
            } else {
                println!("Saved sessions:\n");
                println!("{:<38} {:<20} Msgs", "ID", "Updated");
                println!("{}", "-".repeat(66));
                for s in sessions {
                    let count = s
                        .message_count
                        .map(|n| n.to_string())
                        .unwrap_or_else(|| "?".to_string());
                    println!(
                        "{:<38} {:<20} {}",
                        utils::truncate_chars(&s.session_id, 35),
                        s.updated_at_display(),
                        count
                    );
                }
                println!("\nResume with: parley --session <session-id>");
            }
        }
        Err(e) => {
            eprintln!("Error listing sessions: {}", e);
        }
    }
    Ok(())
}
