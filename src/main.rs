// file: src/main.rs
// description: commandline application entry point with command handling
// reference: application bootstrap and orchestration

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use researchmate::llm::api::{ApiFailure, ApiResult, CompletionRequest};
use researchmate::utils::logging::{format_error, format_info, format_success, format_warning};
use researchmate::{
    CompletionApi, Config, Embedder, HashEmbedder, HttpCompletionApi, HttpEmbedder,
    IngestMetadata, MemoryVectorStore, Orchestrator, QaExchange,
};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "researchmate")]
#[command(version = "0.1.0")]
#[command(about = "RAG question answering over research papers", long_about = None)]
struct Cli {
    #[arg(
        short,
        long,
        value_name = "FILE",
        env = "RESEARCHMATE_CONFIG",
        default_value = "config/default.toml"
    )]
    config: PathBuf,

    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    color: bool,

    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a single plain-text paper
    Ingest {
        /// Path to a .txt or .md file
        file: PathBuf,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        project: Option<String>,
    },

    /// Ingest every .txt and .md file under a directory
    IngestDir {
        dir: PathBuf,

        #[arg(long)]
        project: Option<String>,

        #[arg(long, value_name = "NUM", default_value_t = 4)]
        parallel: usize,
    },

    /// Ingest a paper (idempotent) and produce a structured summary
    Summarize {
        /// Path to a .txt or .md file
        file: PathBuf,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        project: Option<String>,
    },

    /// Ask one question against the ingested corpus
    Ask {
        question: String,

        #[arg(long)]
        project: Option<String>,
    },

    /// Interactive question loop that keeps conversation history
    Chat {
        #[arg(long)]
        project: Option<String>,
    },

    Stats,

    Reset {
        #[arg(long)]
        confirm: bool,
    },
}

/// Embedding backend picked at startup: the remote endpoint when an API key
/// is configured, the deterministic local embedder otherwise.
enum CliEmbedder {
    Remote(HttpEmbedder),
    Local(HashEmbedder),
}

impl Embedder for CliEmbedder {
    fn dimension(&self) -> usize {
        match self {
            CliEmbedder::Remote(e) => e.dimension(),
            CliEmbedder::Local(e) => e.dimension(),
        }
    }

    fn version(&self) -> &str {
        match self {
            CliEmbedder::Remote(e) => e.version(),
            CliEmbedder::Local(e) => e.version(),
        }
    }

    async fn embed(&self, text: &str) -> researchmate::Result<Vec<f32>> {
        match self {
            CliEmbedder::Remote(e) => e.embed(text).await,
            CliEmbedder::Local(e) => e.embed(text).await,
        }
    }

    async fn embed_batch(&self, texts: &[String]) -> researchmate::Result<Vec<Vec<f32>>> {
        match self {
            CliEmbedder::Remote(e) => e.embed_batch(texts).await,
            CliEmbedder::Local(e) => e.embed_batch(texts).await,
        }
    }
}

/// Completion backend. Commands that never generate still construct the
/// orchestrator, so a missing LLM key only fails once a question is asked.
enum CliApi {
    Http(HttpCompletionApi),
    Unconfigured,
}

impl CompletionApi for CliApi {
    async fn complete(&self, request: &CompletionRequest) -> ApiResult {
        match self {
            CliApi::Http(api) => api.complete(request).await,
            CliApi::Unconfigured => Err(ApiFailure::Fatal {
                status: 401,
                message: "llm api_key is not set (RESEARCHMATE__LLM__API_KEY)".to_string(),
            }),
        }
    }
}

type CliOrchestrator = Orchestrator<CliEmbedder, CliApi>;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    researchmate::utils::logging::init_logger(cli.color, cli.verbose);

    let config = if cli.config.exists() {
        Config::load(Some(cli.config.as_path())).context("Failed to load configuration")?
    } else {
        warn!(
            "Config file {} not found, using default configuration",
            cli.config.display()
        );
        Config::load(None).unwrap_or_else(|e| {
            warn!("Falling back to built-in defaults: {}", e);
            Config::default_config()
        })
    };

    let orchestrator = build_orchestrator(&config).context("Failed to build pipeline")?;
    orchestrator
        .initialize(config.store.snapshot_path.as_deref())
        .await
        .context("Failed to initialize pipeline")?;

    match cli.command {
        Commands::Ingest {
            file,
            title,
            project,
        } => {
            cmd_ingest(&orchestrator, &config, file, title, project).await?;
        }
        Commands::IngestDir {
            dir,
            project,
            parallel,
        } => {
            cmd_ingest_dir(orchestrator.clone(), &config, dir, project, parallel).await?;
        }
        Commands::Summarize {
            file,
            title,
            project,
        } => {
            cmd_summarize(&orchestrator, &config, file, title, project).await?;
        }
        Commands::Ask { question, project } => {
            cmd_ask(&orchestrator, &question, project.as_deref()).await?;
        }
        Commands::Chat { project } => {
            cmd_chat(&orchestrator, project.as_deref()).await?;
        }
        Commands::Stats => {
            cmd_stats(&orchestrator).await;
        }
        Commands::Reset { confirm } => {
            cmd_reset(&orchestrator, &config, confirm).await?;
        }
    }

    Ok(())
}

fn build_orchestrator(config: &Config) -> Result<Arc<CliOrchestrator>> {
    let embedder = if config.embedding.api_key.is_some() {
        info!("Using remote embedding endpoint {}", config.embedding.endpoint);
        CliEmbedder::Remote(HttpEmbedder::new(&config.embedding)?)
    } else {
        info!("No embedding api_key configured, using local hashed embeddings");
        CliEmbedder::Local(HashEmbedder::new(config.embedding.dimension))
    };

    let api = match HttpCompletionApi::new(&config.llm) {
        Ok(api) => CliApi::Http(api),
        Err(_) => {
            warn!("No LLM api_key configured, questions will be rejected");
            CliApi::Unconfigured
        }
    };

    let embedder = Arc::new(embedder);
    let store = Arc::new(MemoryVectorStore::new(
        embedder.dimension(),
        embedder.version(),
    ));

    Ok(Arc::new(Orchestrator::new(config, embedder, store, api)?))
}

async fn persist(orchestrator: &CliOrchestrator, config: &Config) -> Result<()> {
    if let Some(path) = &config.store.snapshot_path {
        orchestrator
            .save_snapshot(path)
            .await
            .context("Failed to save store snapshot")?;
    }
    Ok(())
}

async fn cmd_ingest(
    orchestrator: &CliOrchestrator,
    config: &Config,
    file: PathBuf,
    title: Option<String>,
    project: Option<String>,
) -> Result<()> {
    let text = std::fs::read_to_string(&file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let receipt = orchestrator
        .ingest(
            &text,
            IngestMetadata {
                title,
                source_uri: Some(file.display().to_string()),
                project_id: project,
            },
        )
        .await?;

    persist(orchestrator, config).await?;

    println!(
        "{}",
        format_success(&format!(
            "Ingested \"{}\" ({} chunks{})",
            receipt.title,
            receipt.chunk_count,
            if receipt.replaced { ", replaced prior copy" } else { "" },
        ))
    );
    Ok(())
}

async fn cmd_ingest_dir(
    orchestrator: Arc<CliOrchestrator>,
    config: &Config,
    dir: PathBuf,
    project: Option<String>,
    parallel: usize,
) -> Result<()> {
    let files: Vec<PathBuf> = WalkDir::new(&dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            matches!(
                path.extension().and_then(|ext| ext.to_str()),
                Some("txt") | Some("md")
            )
        })
        .collect();

    if files.is_empty() {
        println!("{}", format_warning("No .txt or .md files found"));
        return Ok(());
    }

    info!("Found {} files under {}", files.len(), dir.display());
    let started = Instant::now();

    let bar = ProgressBar::new(files.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}")
            .expect("static template is valid"),
    );

    let results: Vec<(PathBuf, researchmate::Result<_>)> = stream::iter(files.into_iter().map(|path| {
        let orchestrator = Arc::clone(&orchestrator);
        let project = project.clone();
        let bar = bar.clone();

        async move {
            let result = match tokio::fs::read_to_string(&path).await {
                Ok(text) => {
                    orchestrator
                        .ingest(
                            &text,
                            IngestMetadata {
                                title: None,
                                source_uri: Some(path.display().to_string()),
                                project_id: project,
                            },
                        )
                        .await
                }
                Err(err) => Err(err.into()),
            };
            bar.inc(1);
            (path, result)
        }
    }))
    .buffer_unordered(parallel.max(1))
    .collect()
    .await;

    bar.finish_and_clear();

    let mut succeeded = 0usize;
    let mut failed = 0usize;
    for (path, result) in results {
        match result {
            Ok(_) => succeeded += 1,
            Err(err) => {
                failed += 1;
                println!(
                    "{}",
                    format_error(&format!("{}: {}", path.display(), err))
                );
            }
        }
    }

    persist(orchestrator.as_ref(), config).await?;

    println!(
        "{}",
        format_success(&format!(
            "Ingested {} files in {:.2}s ({} failed)",
            succeeded,
            started.elapsed().as_secs_f64(),
            failed
        ))
    );
    Ok(())
}

async fn cmd_summarize(
    orchestrator: &CliOrchestrator,
    config: &Config,
    file: PathBuf,
    title: Option<String>,
    project: Option<String>,
) -> Result<()> {
    let text = std::fs::read_to_string(&file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let receipt = orchestrator
        .ingest(
            &text,
            IngestMetadata {
                title,
                source_uri: Some(file.display().to_string()),
                project_id: project,
            },
        )
        .await?;
    persist(orchestrator, config).await?;

    let summary = orchestrator.summarize(receipt.document_id).await?;

    println!("{}", format_success(&format!("Summary of \"{}\"", summary.title)));
    let sections = [
        ("Main summary", &summary.summary),
        ("Key contributions", &summary.contributions),
        ("Methodology", &summary.methodology),
        ("Key findings", &summary.findings),
        ("Limitations", &summary.limitations),
    ];
    for (heading, body) in sections {
        if body.is_empty() {
            continue;
        }
        println!("\n{}:", heading);
        for line in body.lines() {
            println!("  {}", line);
        }
    }
    Ok(())
}

fn print_answer(response: &researchmate::AskResponse) {
    if response.answer.no_context {
        println!(
            "{}",
            format_warning("No matching sources found, answering from general knowledge")
        );
    }

    println!("\n{}\n", response.answer.text.trim());

    if !response.citations.is_empty() {
        println!("Sources:");
        for citation in &response.citations {
            match &citation.source_uri {
                Some(uri) => println!("  - {} ({})", citation.title, uri),
                None => println!("  - {}", citation.title),
            }
        }
    }
}

async fn cmd_ask(
    orchestrator: &CliOrchestrator,
    question: &str,
    project: Option<&str>,
) -> Result<()> {
    let response = orchestrator.ask(question, project, &[]).await?;
    print_answer(&response);
    Ok(())
}

async fn cmd_chat(orchestrator: &CliOrchestrator, project: Option<&str>) -> Result<()> {
    println!(
        "{}",
        format_info("Interactive session, type \"exit\" to leave")
    );

    let stdin = std::io::stdin();
    let mut history: Vec<QaExchange> = Vec::new();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question.eq_ignore_ascii_case("exit") || question.eq_ignore_ascii_case("quit") {
            break;
        }

        match orchestrator.ask(question, project, &history).await {
            Ok(response) => {
                print_answer(&response);
                history.push(QaExchange::new(question, response.answer.text.clone()));
            }
            Err(err) => {
                println!("{}", format_error(&err.to_string()));
            }
        }
    }

    Ok(())
}

async fn cmd_stats(orchestrator: &CliOrchestrator) {
    let stats = orchestrator.stats().await;
    println!("Documents:         {}", stats.documents);
    println!("Chunks:            {}", stats.chunks);
    println!("Dimension:         {}", stats.dimension);
    println!("Embedding version: {}", stats.embedding_version);
}

async fn cmd_reset(
    orchestrator: &CliOrchestrator,
    config: &Config,
    confirm: bool,
) -> Result<()> {
    if !confirm {
        println!(
            "{}",
            format_warning("Pass --confirm to delete every ingested document")
        );
        return Ok(());
    }

    orchestrator.clear().await;
    persist(orchestrator, config).await?;
    println!("{}", format_success("Store cleared"));
    Ok(())
}
