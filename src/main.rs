// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Confab main entry point - CLI and REPL.

use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::history::FileHistory;
use rustyline::Editor;
use tracing::Level;

use confab::config::{self, Config, ConfigStore};
use confab::engine::ConversationEngine;
use confab::mcp::McpRegistry;
use confab::telemetry::{init_telemetry, TelemetryConfig};
use confab::tools::{
    default_registry, CursorInfo, EditorOps, SelectionInfo, ToolRegistry,
};
use confab::types::{EventSink, TurnEvent};
use confab::{ToolError, VERSION};

/// Confab - tool-augmented conversations for OpenAI-compatible endpoints.
#[derive(Parser)]
#[command(name = "confab")]
#[command(author, version, about = "Tool-augmented chat for OpenAI-compatible endpoints", long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, env = "CONFAB_CONFIG")]
    config: Option<PathBuf>,

    /// Model to use
    #[arg(short, long, env = "CONFAB_MODEL")]
    model: Option<String>,

    /// Base URL for the API
    #[arg(long, env = "CONFAB_BASE_URL")]
    base_url: Option<String>,

    /// API key (falls back to the config file)
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Disable streaming output
    #[arg(long)]
    no_stream: bool,

    /// Disable all tool use
    #[arg(long)]
    no_tools: bool,

    /// Auto-approve all mutating tool operations
    #[arg(short = 'y', long)]
    yes: bool,

    /// Show verbose output
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Run a single prompt and exit
    #[arg(short = 'P', long)]
    prompt: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Subcommands for confab.
#[derive(Subcommand)]
enum Commands {
    /// Show the resolved configuration
    Config,

    /// Write a starter configuration file
    Init,

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let telemetry = if cli.verbose {
        TelemetryConfig::development()
    } else {
        TelemetryConfig::default().with_level(Level::WARN)
    };
    let _guard = init_telemetry(&telemetry)?;

    if let Some(command) = cli.command {
        return handle_command(command, cli.config).await;
    }

    let workspace_root = std::env::current_dir()?;
    let store = Arc::new(load_store(cli.config.as_deref(), &workspace_root)?);
    apply_overrides(&store, &cli);

    let editor: Arc<dyn EditorOps> = Arc::new(TerminalEditor {
        root: workspace_root.clone(),
        auto_confirm: cli.yes,
    });
    let builtins = Arc::new(default_registry(editor));
    let providers = Arc::new(McpRegistry::new(&workspace_root, store.servers()));

    let api = Arc::new(confab::api::ChatClient::new());
    let mut engine = ConversationEngine::new(api, builtins.clone(), providers.clone(), store.clone());

    let result = match cli.prompt {
        Some(prompt) => run_prompt(&mut engine, &store, &prompt).await,
        None => run_repl(&mut engine, &store, &builtins, &providers).await,
    };

    providers.dispose_all().await;
    result
}

fn load_store(
    explicit: Option<&std::path::Path>,
    workspace_root: &std::path::Path,
) -> Result<ConfigStore, confab::ConfigError> {
    match explicit {
        Some(path) => ConfigStore::load(path),
        None => match config::find_config_path(workspace_root) {
            Some(path) => ConfigStore::load(path),
            None => Ok(ConfigStore::from_config(Config::default())),
        },
    }
}

fn apply_overrides(store: &ConfigStore, cli: &Cli) {
    let mut config = Config {
        generation: store.generation(),
        mcp_servers: store.servers(),
    };
    if let Some(model) = &cli.model {
        config.generation.model = model.clone();
    }
    if let Some(base_url) = &cli.base_url {
        config.generation.api_base_url = base_url.clone();
    }
    if let Some(api_key) = &cli.api_key {
        config.generation.api_key = api_key.clone();
    }
    if cli.no_stream {
        config.generation.enable_stream = false;
    }
    if cli.no_tools {
        config.generation.enable_tools = false;
    }
    store.replace(config);
}

async fn handle_command(command: Commands, config_path: Option<PathBuf>) -> anyhow::Result<()> {
    match command {
        Commands::Config => {
            let workspace_root = std::env::current_dir()?;
            let store = load_store(config_path.as_deref(), &workspace_root)?;
            let mut redacted = store.generation();
            if !redacted.api_key.is_empty() {
                redacted.api_key = "<set>".to_string();
            }
            println!("{}", serde_json::to_string_pretty(&redacted)?);
        }
        Commands::Init => {
            let path = std::env::current_dir()?.join(config::CONFIG_FILE);
            if path.exists() {
                anyhow::bail!("{} already exists", path.display());
            }
            let starter = serde_json::to_string_pretty(&Config::default())?;
            std::fs::write(&path, starter)?;
            println!("Created config file: {}", path.display());
        }
        Commands::Version => {
            println!("confab {}", VERSION);
        }
    }
    Ok(())
}

/// One-shot mode: run a single turn and print the reply.
async fn run_prompt(
    engine: &mut ConversationEngine,
    store: &Arc<ConfigStore>,
    prompt: &str,
) -> anyhow::Result<()> {
    let streaming = store.generation().enable_stream;
    let reply = send_with_ctrl_c(engine, prompt).await;
    match reply {
        Ok(text) => {
            if !streaming {
                println!("{text}");
            }
            Ok(())
        }
        Err(err) => anyhow::bail!("{err}"),
    }
}

async fn run_repl(
    engine: &mut ConversationEngine,
    store: &Arc<ConfigStore>,
    builtins: &Arc<ToolRegistry>,
    providers: &Arc<McpRegistry>,
) -> anyhow::Result<()> {
    println!("{}", "confab".bright_cyan().bold());
    println!(
        "Type {} for commands, {} to quit\n",
        "/help".dimmed(),
        "/quit".dimmed()
    );

    let mut editor: Editor<(), FileHistory> = Editor::new()?;
    let history_file = history_path();
    if let Some(path) = &history_file {
        let _ = editor.load_history(path);
    }

    loop {
        match editor.readline("confab> ") {
            Ok(line) => {
                let line = line.trim().to_string();
                if line.is_empty() {
                    continue;
                }
                editor.add_history_entry(&line)?;

                if let Some(command) = line.strip_prefix('/') {
                    if handle_repl_command(command, engine, store, builtins, providers).await? {
                        break;
                    }
                } else {
                    let streaming = store.generation().enable_stream;
                    match send_with_ctrl_c(engine, &line).await {
                        Ok(reply) => {
                            if !streaming {
                                println!("{reply}");
                            }
                        }
                        Err(err) => eprintln!("{}", err.to_string().red()),
                    }
                    println!();
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("Use {} to quit", "/quit".dimmed());
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("{}", format!("readline error: {err}").red());
                break;
            }
        }
    }

    if let Some(path) = &history_file {
        let _ = editor.save_history(path);
    }
    Ok(())
}

/// Run one turn, cancelling it if Ctrl-C arrives while it is in flight.
async fn send_with_ctrl_c(
    engine: &mut ConversationEngine,
    text: &str,
) -> Result<String, confab::EngineError> {
    let handle = engine.cancel_handle();
    let send = engine.send(text, terminal_sink());
    tokio::pin!(send);
    loop {
        tokio::select! {
            result = &mut send => return result,
            _ = tokio::signal::ctrl_c() => handle.cancel(),
        }
    }
}

/// Sink that renders turn events to the terminal.
fn terminal_sink() -> EventSink {
    let streamed = std::sync::atomic::AtomicBool::new(false);
    Arc::new(move |event| match event {
        TurnEvent::StreamStart => {}
        TurnEvent::Chunk(delta) => {
            streamed.store(true, std::sync::atomic::Ordering::Relaxed);
            print!("{delta}");
            let _ = std::io::stdout().flush();
        }
        TurnEvent::ToolsRunning(names) => {
            println!("\n{}", format!("[running: {}]", names.join(", ")).dimmed());
        }
        TurnEvent::StreamEnd => {
            // Close the streamed line; buffered turns printed nothing yet.
            if streamed.swap(false, std::sync::atomic::Ordering::Relaxed) {
                println!();
            }
        }
        // Errors are reported by the caller.
        TurnEvent::Error(_) => {}
    })
}

/// Returns true when the REPL should exit.
async fn handle_repl_command(
    command: &str,
    engine: &mut ConversationEngine,
    store: &Arc<ConfigStore>,
    builtins: &Arc<ToolRegistry>,
    providers: &Arc<McpRegistry>,
) -> anyhow::Result<bool> {
    let mut parts = command.split_whitespace();
    let head = parts.next().unwrap_or_default();
    let args: Vec<&str> = parts.collect();

    match head {
        "quit" | "exit" => return Ok(true),
        "help" => show_help(),
        "clear" => {
            engine.clear_transcript();
            println!("Conversation cleared");
        }
        "reload" => match store.reload() {
            Ok(()) => {
                providers.set_configs(store.servers());
                println!("Configuration reloaded");
            }
            Err(err) => eprintln!("{}", err.to_string().red()),
        },
        "servers" => {
            let configured = providers.configured_names();
            if configured.is_empty() {
                println!("No MCP servers configured");
            }
            for name in configured {
                let state = if providers.is_connected(&name).await {
                    "connected".green()
                } else {
                    "disconnected".dimmed()
                };
                let selected = if engine.selected_providers().contains(&name) {
                    " [selected]".cyan()
                } else {
                    "".normal()
                };
                println!("  {name} ({state}){selected}");
            }
        }
        "connect" => match args.first() {
            Some(name) => match providers.connect(name).await {
                Ok(()) => println!("Connected to {name}"),
                Err(err) => eprintln!("{}", err.to_string().red()),
            },
            None => eprintln!("Usage: /connect <server>"),
        },
        "disconnect" => match args.first() {
            Some(name) => {
                providers.disconnect(name).await;
                println!("Disconnected {name}");
            }
            None => eprintln!("Usage: /disconnect <server>"),
        },
        "select" => {
            let names: Vec<String> = args.iter().map(|s| s.to_string()).collect();
            for name in &names {
                if !providers.is_configured(name) {
                    eprintln!("{}", format!("Unknown server: {name}").red());
                    return Ok(false);
                }
            }
            engine.select_providers(names);
            println!(
                "Selected servers: {}",
                if engine.selected_providers().is_empty() {
                    "(none)".to_string()
                } else {
                    engine.selected_providers().join(", ")
                }
            );
        }
        "tools" => {
            let config = store.generation();
            println!("{}", "Built-in tools:".bold());
            for name in builtins.tool_names() {
                if config.tool_enabled(&name) {
                    println!("  {name}");
                } else {
                    println!("  {} (disabled)", name.dimmed());
                }
            }
            for server in engine.selected_providers() {
                match providers.list_tools(server).await {
                    Ok(tools) => {
                        println!("{}", format!("{server} tools:").bold());
                        for tool in tools {
                            println!("  {}", tool.qualified_name(server));
                        }
                    }
                    Err(err) => eprintln!("{}", format!("{server}: {err}").red()),
                }
            }
        }
        #[cfg(feature = "telemetry")]
        "metrics" => {
            print!("{}", confab::telemetry::GLOBAL_METRICS.snapshot().format_report());
        }
        _ => eprintln!("Unknown command: /{head} (try /help)"),
    }
    Ok(false)
}

fn show_help() {
    println!("\n{}", "Commands:".bold());
    println!("  /servers             List configured MCP servers");
    println!("  /connect <name>      Connect to a server");
    println!("  /disconnect <name>   Disconnect a server");
    println!("  /select [names...]   Choose which servers offer tools");
    println!("  /tools               List available tools");
    println!("  /clear               Clear the conversation");
    println!("  /reload              Reload the configuration file");
    #[cfg(feature = "telemetry")]
    println!("  /metrics             Show collected metrics");
    println!("  /quit                Exit\n");
}

fn history_path() -> Option<PathBuf> {
    let dir = dirs::config_dir()?.join("confab");
    std::fs::create_dir_all(&dir).ok()?;
    Some(dir.join("history"))
}

/// Editor capability for the terminal: no live editor state, confirmation
/// prompts on stdin.
struct TerminalEditor {
    root: PathBuf,
    auto_confirm: bool,
}

impl EditorOps for TerminalEditor {
    fn workspace_root(&self) -> Option<PathBuf> {
        Some(self.root.clone())
    }

    fn active_file(&self) -> Option<PathBuf> {
        None
    }

    fn open_files(&self) -> Vec<PathBuf> {
        Vec::new()
    }

    fn selection(&self) -> Option<SelectionInfo> {
        None
    }

    fn current_line(&self) -> Option<String> {
        None
    }

    fn cursor(&self) -> Option<CursorInfo> {
        None
    }

    fn open_file(&self, path: &std::path::Path) -> Result<(), ToolError> {
        println!("{}", format!("[open: {}]", path.display()).dimmed());
        Ok(())
    }

    fn confirm(&self, prompt: &str) -> bool {
        if self.auto_confirm {
            return true;
        }
        print!("{} [y/N] ", prompt.yellow());
        let _ = std::io::stdout().flush();
        let mut answer = String::new();
        if std::io::stdin().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim(), "y" | "Y" | "yes")
    }
}
