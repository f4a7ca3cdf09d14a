use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use krag_client::{
    ClientConfig, DocumentQuery, KnowledgeBaseApi, KragClient, KragError, QueryRequest,
    QueryTarget, TextQuery,
};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

/// Command line client for a KRAG knowledge-base service
#[derive(Parser)]
#[command(name = "krag", author, version, about)]
struct Cli {
    /// Service base url, overrides config and KRAG_API_BASE_URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Request timeout in milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// YAML config file with `base_url` / `timeout_ms`
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct Scope {
    #[arg(long)]
    tenant: String,
    #[arg(long)]
    kb: String,
}

#[derive(Subcommand)]
enum Command {
    /// Check that the service is up
    Hello,
    /// Ingest raw text; reads stdin when --text is absent
    IngestText {
        #[command(flatten)]
        scope: Scope,
        #[arg(long)]
        filename: String,
        #[arg(long)]
        text: Option<String>,
    },
    /// Upload a text file as multipart form data
    IngestFile {
        #[command(flatten)]
        scope: Scope,
        path: PathBuf,
    },
    /// Vector search by text, or fetch one document by id
    Query {
        #[command(flatten)]
        scope: Scope,
        #[arg(long, conflicts_with = "doc_id", required_unless_present = "doc_id")]
        query: Option<String>,
        #[arg(long, conflicts_with = "doc_id")]
        top_k: Option<u32>,
        #[arg(long, conflicts_with = "doc_id")]
        min_score: Option<f32>,
        #[arg(long)]
        doc_id: Option<String>,
        /// Return the whole document text (with --doc-id)
        #[arg(long, requires = "doc_id")]
        full: bool,
    },
    /// List documents of a knowledge base
    Docs {
        #[command(flatten)]
        scope: Scope,
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        size: Option<u32>,
    },
    /// Show the chunks of one document
    Chunks {
        #[command(flatten)]
        scope: Scope,
        #[arg(long)]
        doc_id: String,
        #[arg(long)]
        include_vectors: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv_loaded = dotenv::dotenv().is_ok();
    init_tracing();
    if !dotenv_loaded {
        debug!("no .env file loaded");
    }

    let cli = Cli::parse();
    let cfg = load_config(&cli, |key| std::env::var(key).ok())?;
    info!(base_url = %cfg.base_url, timeout_ms = ?cfg.timeout_ms(), "krag client ready");
    let client = KragClient::new(cfg)?;

    match run(&client, cli.command).await {
        Ok(out) => {
            println!("{}", serde_json::to_string_pretty(&out)?);
            Ok(())
        }
        Err(e) => {
            if let Some(kerr) = e.downcast_ref::<KragError>() {
                eprintln!("{}", kerr.user_message());
            }
            Err(e)
        }
    }
}

fn init_tracing() {
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = Registry::default().with(filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber).ok();
}

fn load_config<F>(cli: &Cli, lookup: F) -> anyhow::Result<ClientConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut cfg = match &cli.config {
        Some(path) => ClientConfig::from_file(path)
            .with_context(|| format!("load config {}", path.display()))?,
        None => ClientConfig::from_lookup(lookup)?,
    };
    if let Some(url) = &cli.base_url {
        cfg = ClientConfig {
            timeout: cfg.timeout,
            ..ClientConfig::new(url.as_str())
        };
    }
    if let Some(ms) = cli.timeout_ms {
        cfg = cfg.with_timeout(Duration::from_millis(ms));
    }
    Ok(cfg)
}

async fn run(api: &dyn KnowledgeBaseApi, command: Command) -> anyhow::Result<serde_json::Value> {
    let out = match command {
        Command::Hello => serde_json::to_value(api.hello().await?)?,
        Command::IngestText {
            scope,
            filename,
            text,
        } => {
            let text = match text {
                Some(t) => t,
                None => {
                    let mut buf = String::new();
                    tokio::io::stdin()
                        .read_to_string(&mut buf)
                        .await
                        .context("read text from stdin")?;
                    buf
                }
            };
            let res = api
                .ingest_text(&scope.tenant, &scope.kb, &filename, &text)
                .await?;
            if res.doc_id.is_none() {
                warn!("backend did not return a docId");
            }
            serde_json::to_value(res)?
        }
        Command::IngestFile { scope, path } => {
            let file = krag_client::read_upload_file(&path).await?;
            serde_json::to_value(api.ingest_file(&scope.tenant, &scope.kb, file).await?)?
        }
        Command::Query {
            scope,
            query,
            top_k,
            min_score,
            doc_id,
            full,
        } => {
            let target: QueryTarget = match (doc_id, query) {
                (Some(doc_id), _) => DocumentQuery {
                    doc_id,
                    full: full.then_some(true),
                }
                .into(),
                (None, Some(query)) => {
                    let mut q = TextQuery::new(query);
                    q.top_k = top_k;
                    q.min_score = min_score;
                    q.into()
                }
                (None, None) => anyhow::bail!("either --query or --doc-id is required"),
            };
            let req = QueryRequest::new(scope.tenant, scope.kb, target);
            serde_json::to_value(api.query_vector(&req).await?)?
        }
        Command::Docs { scope, page, size } => {
            serde_json::to_value(api.list_docs(&scope.tenant, &scope.kb, page, size).await?)?
        }
        Command::Chunks {
            scope,
            doc_id,
            include_vectors,
        } => serde_json::to_value(
            api.get_doc_chunks(&scope.tenant, &scope.kb, &doc_id, include_vectors)
                .await?,
        )?,
    };
    Ok(out)
}
