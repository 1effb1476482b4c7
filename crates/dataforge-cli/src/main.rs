//! dataforge - stream an AI answer from a DataForge conversation

mod config;
mod render;

use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use dataforge_chat::{ChatStreamStore, FileCredentialStore, RecordingCache};
use dataforge_stream::{CredentialStore, HttpTransport, ProviderOptions, StaticToken};
use tracing_subscriber::EnvFilter;

use crate::render::Renderer;

/// dataforge - ask the DataForge AI assistant from the terminal
#[derive(Parser, Debug)]
#[command(name = "dataforge")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Message to send
    message: Option<String>,

    /// Conversation to post the message in
    #[arg(short, long)]
    conversation: Option<i64>,

    /// AI provider to request
    #[arg(short, long)]
    provider: Option<String>,

    /// Request a reasoning trace
    #[arg(short, long)]
    deep_thinking: bool,

    /// Print the reasoning trace to stderr as it streams
    #[arg(long)]
    show_reasoning: bool,

    /// API base URL (overrides config)
    #[arg(long)]
    base_url: Option<String>,

    /// Bearer token to use instead of the stored one
    #[arg(long)]
    token: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,

    /// Store an access token for later runs
    #[arg(long)]
    login: Option<String>,

    /// Forget the stored access token
    #[arg(long)]
    logout: bool,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("dataforge=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
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
        let path = config::Config::init().context("creating config file")?;
        println!("Config file created at: {}", path.display());
        println!("\nExample config:\n{}", config::example_config());
        return Ok(());
    }

    let stored = FileCredentialStore::new();

    if let Some(token) = args.login {
        stored.save(&token).context("saving access token")?;
        println!("Access token saved to {}", stored.path().display());
        return Ok(());
    }

    if args.logout {
        stored.remove().context("removing access token")?;
        println!("Logged out");
        return Ok(());
    }

    let cfg = config::Config::load();

    let Some(message) = args.message else {
        anyhow::bail!("no message given (see --help)");
    };
    let Some(conversation_id) = args.conversation else {
        anyhow::bail!("--conversation <ID> is required");
    };

    let base_url = args
        .base_url
        .unwrap_or_else(|| cfg.base_url().to_string());

    let credentials: Arc<dyn CredentialStore> = match args.token {
        Some(token) => Arc::new(StaticToken::new(token)),
        None => Arc::new(stored),
    };
    if credentials.bearer_token().is_none() {
        eprintln!("Error: No access token found");
        eprintln!();
        eprintln!("Options:");
        eprintln!("  1. dataforge --login <TOKEN>");
        eprintln!("  2. export DATAFORGE_TOKEN=<TOKEN>");
        eprintln!("  3. pass --token <TOKEN>");
        std::process::exit(1);
    }

    let transport =
        HttpTransport::with_connect_timeout(base_url, credentials, cfg.connect_timeout())?;
    let store = ChatStreamStore::new(Arc::new(transport), Arc::new(RecordingCache::new()));

    let options = ProviderOptions {
        ai_provider: args.provider.or(cfg.ai_provider.clone()),
        use_deep_thinking: if args.deep_thinking {
            Some(true)
        } else {
            cfg.use_deep_thinking
        },
    };

    let reasoning_sink = args.show_reasoning.then(std::io::stderr);
    let renderer = Renderer::new(std::io::stdout(), reasoning_sink);
    let printer = tokio::spawn(renderer.drain(store.subscribe_updates()));

    {
        let run = store.start(conversation_id, message, options);
        tokio::pin!(run);
        tokio::select! {
            _ = &mut run => {}
            _ = tokio::signal::ctrl_c() => {
                store.stop();
                run.await;
            }
        }
    }

    let final_state = store.snapshot();
    drop(store);
    printer.await??;

    if let Some(error) = final_state.error {
        eprintln!("Error: {}", error);
        std::process::exit(1);
    }

    Ok(())
}
