use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use ragabond::config::Config;
use ragabond::mcp_server::RagMcpServer;
use ragabond::types::{AskRequest, CreateIndexRequest};
use ragabond::RagClient;
use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "ragabond")]
#[command(about = "Build named indexes from local documents and ask questions about them")]
#[command(version = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_COMMIT_HASH"),
    ", built ",
    env!("BUILD_TIMESTAMP"),
    ")"
))]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the indexes
    #[arg(long, global = true)]
    index_root: Option<PathBuf>,

    /// Embedding provider: fastembed, ollama or hash
    #[arg(long, global = true)]
    embedding_provider: Option<String>,

    /// Embedding model name
    #[arg(long, global = true)]
    embedding_model: Option<String>,

    /// Ollama model used to answer questions
    #[arg(long, global = true)]
    llm_model: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start MCP server on stdio
    Serve,
    /// Build a new index from files or directories
    Create {
        /// Name of the new index
        name: String,
        /// PDF, TXT, CSV or JSON files (directories are expanded)
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// List existing indexes
    List,
    /// Show the files and settings an index was built with
    Info {
        /// Index name
        name: String,
    },
    /// Delete an index
    Delete {
        /// Index name
        name: String,
    },
    /// Ask a question about an index
    Ask {
        /// Index name
        index: String,
        /// The question
        question: String,
        /// Number of chunks to retrieve
        #[arg(long)]
        top_k: Option<usize>,
        /// Print the cited chunks after the answer
        #[arg(long)]
        show_sources: bool,
    },
}

impl GlobalArgs {
    fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => Config::load_or_default()?,
        };
        config.apply_env_overrides();

        if let Some(root) = &self.index_root {
            config.index.root = root.clone();
        }
        if let Some(provider) = &self.embedding_provider {
            config.embedding.provider = provider.clone();
        }
        if let Some(model) = &self.embedding_model {
            config.embedding.model_name = Some(model.clone());
        }
        if let Some(model) = &self.llm_model {
            config.generation.model = model.clone();
        }

        config.validate()?;
        Ok(config)
    }
}

fn progress_bar() -> ProgressBar {
    if !std::io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }
    let style = ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} chunks {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    ProgressBar::new(0).with_style(style)
}

async fn create(client: &RagClient, name: String, paths: Vec<String>) -> Result<()> {
    let (handle, mut progress) = client.spawn_create(CreateIndexRequest {
        name,
        file_paths: paths,
    });

    let bar = progress_bar();
    while let Some(state) = progress.recv().await {
        bar.set_length(state.total as u64);
        bar.set_position(state.processed as u64);
        bar.set_message(format!(
            "{:.2}s remaining",
            state.estimated_remaining.as_secs_f64()
        ));
    }
    bar.finish_and_clear();

    let response = handle.await.context("Index build task failed")??;

    println!(
        "Created index '{}': {} files, {} chunks in {} ms",
        response.name, response.files_indexed, response.chunks_created, response.duration_ms
    );
    for error in &response.errors {
        eprintln!("warning: {}", error);
    }
    Ok(())
}

async fn ask(
    client: &RagClient,
    index: String,
    query: String,
    top_k: Option<usize>,
    show_sources: bool,
) -> Result<()> {
    let streamed = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let flag = streamed.clone();

    let response = client
        .ask_streaming(
            AskRequest {
                index,
                query,
                top_k,
            },
            Some(Box::new(move |token: &str| {
                flag.store(true, std::sync::atomic::Ordering::Relaxed);
                print!("{}", token);
                let _ = std::io::stdout().flush();
            })),
        )
        .await?;

    if streamed.load(std::sync::atomic::Ordering::Relaxed) {
        println!();
    } else {
        // Errors and local tasks never stream
        println!("{}", response.answer);
    }

    if show_sources {
        for source in &response.sources {
            println!("\n[{}] (score {:.3})\n{}", source.source, source.score, source.excerpt);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so the MCP stdio transport stays clean
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.global.load_config()?;
    let client = RagClient::with_config(config).await?;

    match cli.command {
        Commands::Serve => {
            RagMcpServer::with_client(Arc::new(client))?
                .run_stdio()
                .await?;
        }
        Commands::Create { name, paths } => {
            create(&client, name, paths).await?;
        }
        Commands::List => {
            let response = client.list_indexes()?;
            if response.indexes.is_empty() {
                println!("No indexes in {}", response.root);
            }
            for name in response.indexes {
                println!("{}", name);
            }
        }
        Commands::Info { name } => {
            let info = client.index_info(&name)?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Commands::Delete { name } => {
            client.delete_index(&name).await?;
            println!("Deleted index '{}'", name);
        }
        Commands::Ask {
            index,
            question,
            top_k,
            show_sources,
        } => {
            ask(&client, index, question, top_k, show_sources).await?;
        }
    }

    Ok(())
}
