use anyhow::Result;
use chrono::NaiveDate;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use paperclip::config::{find_config_file, load_config, Config, LogFormat};
use paperclip::content::{ContentFetcher, PaperContent};
use paperclip::mcp::McpServer;
use paperclip::models::{PaperResult, Provider, SearchOutcome, SearchQuery};
use paperclip::router::{ProviderInfo, QueryRouter};
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Paperclip - Search and read academic preprints from arXiv, OpenAlex and OSF
#[derive(Parser, Debug)]
#[command(name = "paperclip")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Search and read academic preprints from arXiv, OpenAlex and OSF", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (-v for debug, -vv for trace)
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Output format
    #[arg(long, short, value_enum, global = true, default_value_t = OutputFormat::Auto)]
    output: OutputFormat,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Output format for results
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Automatic based on terminal (table if TTY, JSON otherwise)
    Auto,
    /// Table format (human-readable)
    Table,
    /// JSON format (machine-readable)
    Json,
    /// Plain text format
    Plain,
}

impl OutputFormat {
    fn resolve(self) -> Self {
        match self {
            OutputFormat::Auto if std::io::stdout().is_terminal() => OutputFormat::Table,
            OutputFormat::Auto => OutputFormat::Json,
            other => other,
        }
    }
}

fn parse_provider(s: &str) -> Result<Provider, String> {
    s.parse()
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the MCP server (stdio by default)
    Serve {
        /// Serve over streamable HTTP instead of stdio
        #[arg(long)]
        http: bool,

        /// Host to bind to in HTTP mode (default from config)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to in HTTP mode (default from config)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Search for preprints
    #[command(alias = "s")]
    Search {
        /// Search keywords
        keywords: String,

        /// Provider to search; repeat for several (default: all)
        #[arg(long = "provider", short, value_parser = parse_provider)]
        providers: Vec<Provider>,

        /// Maximum number of results per provider
        #[arg(long, short)]
        limit: Option<usize>,

        /// Number of results to skip per provider
        #[arg(long, default_value_t = 0)]
        offset: usize,

        /// Subject or category filter
        #[arg(long)]
        subjects: Option<String>,

        /// Only papers published on or after this date (YYYY-MM-DD)
        #[arg(long)]
        since: Option<NaiveDate>,

        /// OSF preprint server id (e.g. psyarxiv)
        #[arg(long)]
        osf_provider: Option<String>,

        /// Drop cross-provider duplicates
        #[arg(long)]
        dedup: bool,
    },

    /// Show metadata for one paper
    #[command(alias = "g")]
    Get {
        /// Paper identifier; the provider is detected when not given
        paper_id: String,

        #[arg(long, short, value_parser = parse_provider)]
        provider: Option<Provider>,
    },

    /// Download a paper's PDF and print its text
    #[command(alias = "r")]
    Read {
        /// Paper identifier
        paper_id: String,

        #[arg(long, short, value_parser = parse_provider)]
        provider: Option<Provider>,
    },

    /// List providers and OSF preprint servers
    #[command(alias = "ls")]
    Providers,

    /// Print the effective configuration as TOML
    Config,

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

fn init_tracing(cli: &Cli, config: &Config) {
    let level = match cli.verbose {
        0 => config.logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let level = if cli.quiet { "error" } else { level };

    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| format!("paperclip={}", level)),
    );

    // stdout is reserved for MCP traffic and command output
    let registry = tracing_subscriber::registry().with(filter);
    match config.logging.format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().or_else(find_config_file);
    let config = load_config(config_path.as_deref())?;

    init_tracing(&cli, &config);
    if let Some(path) = &config_path {
        tracing::info!("Using config file: {}", path.display());
    }

    let format = cli.output.resolve();

    match cli.command {
        None => serve(&config, false, None, None).await?,

        Some(Commands::Serve { http, host, port }) => serve(&config, http, host, port).await?,

        Some(Commands::Search {
            keywords,
            providers,
            limit,
            offset,
            subjects,
            since,
            osf_provider,
            dedup,
        }) => {
            let mut query = SearchQuery::new(keywords)
                .limit(limit.unwrap_or(config.search.default_limit))
                .offset(offset)
                .dedup(dedup);
            query.providers = providers.into_iter().collect();
            query.subjects = subjects;
            query.published_since = since;
            query.osf_provider = osf_provider;

            let router = QueryRouter::from_config(&config)?;
            let outcome = router.search(&query).await?;

            if !cli.quiet {
                for failure in &outcome.failures {
                    eprintln!("Warning: {}", failure);
                }
                if outcome.dropped_records > 0 {
                    eprintln!("Skipped {} malformed records", outcome.dropped_records);
                }
            }
            output_outcome(&outcome, format)?;
        }

        Some(Commands::Get { paper_id, provider }) => {
            let router = QueryRouter::from_config(&config)?;
            let paper = router.fetch(&paper_id, provider).await?;
            output_paper(&paper, format)?;
        }

        Some(Commands::Read { paper_id, provider }) => {
            let router = QueryRouter::from_config(&config)?;
            let fetcher = ContentFetcher::from_config(&config)?;
            let content = fetcher.fetch_paper(&router, &paper_id, provider).await?;
            output_content(&content, format)?;
        }

        Some(Commands::Providers) => {
            let router = QueryRouter::from_config(&config)?;
            let providers = router.list_providers().await;
            output_providers(&providers, format)?;
        }

        Some(Commands::Config) => {
            print!("{}", config.to_toml()?);
        }

        Some(Commands::Completions { shell }) => {
            clap_complete::generate(shell, &mut Cli::command(), "paperclip", &mut std::io::stdout());
        }
    }

    Ok(())
}

async fn serve(config: &Config, http: bool, host: Option<String>, port: Option<u16>) -> Result<()> {
    let server = McpServer::from_config(config)?;

    if http {
        let mut listen = config.server.clone();
        if let Some(host) = host {
            listen.host = host;
        }
        if let Some(port) = port {
            listen.port = port;
        }
        let (bound_addr, handle) = server.run_http(&listen.addr()).await?;
        tracing::info!("MCP server listening on {}", bound_addr);

        handle
            .await
            .map_err(|e| anyhow::anyhow!("Server task failed: {}", e))?;
    } else {
        server.run().await?;
    }

    Ok(())
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let cut: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}

fn new_table(header: Vec<&str>) -> comfy_table::Table {
    let mut table = comfy_table::Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(header);
    table
}

fn output_outcome(outcome: &SearchOutcome, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let mut value = serde_json::to_value(outcome)?;
            value["total_count"] = outcome.total_count().into();
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Plain => {
            for paper in &outcome.papers {
                println!(
                    "{} - {} ({})",
                    paper.title(),
                    paper.authors().join(", "),
                    paper.source_provider()
                );
                println!("  ID:  {}", paper.identifier());
                println!("  URL: {}", paper.url());
                if let Some(doi) = paper.doi() {
                    println!("  DOI: {}", doi);
                }
                if let Some(pdf_url) = paper.pdf_url() {
                    println!("  PDF: {}", pdf_url);
                }
                println!();
            }
        }
        _ => {
            use comfy_table::{Attribute, Cell};
            let mut table = new_table(vec!["Title", "Authors", "Provider", "Published", "ID"]);

            for paper in &outcome.papers {
                table.add_row(vec![
                    Cell::new(truncate(paper.title(), 50)).add_attribute(Attribute::Bold),
                    Cell::new(truncate(&paper.authors().join(", "), 30)),
                    Cell::new(paper.source_provider().id()),
                    Cell::new(
                        paper
                            .published()
                            .map(|d| d.to_string())
                            .unwrap_or_default(),
                    ),
                    Cell::new(paper.identifier()),
                ]);
            }
            println!("{table}");
            println!("{} results", outcome.total_count());
        }
    }
    Ok(())
}

fn output_paper(paper: &PaperResult, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(paper)?),
        OutputFormat::Plain => {
            println!("{}", paper.title());
            println!("{}", paper.authors().join(", "));
            println!("{}", paper.url());
            if let Some(abstract_text) = paper.abstract_text() {
                println!();
                println!("{}", abstract_text);
            }
        }
        _ => {
            let mut table = new_table(vec!["Field", "Value"]);
            table.add_row(vec!["Title", paper.title()]);
            table.add_row(vec!["Authors".to_string(), paper.authors().join(", ")]);
            table.add_row(vec!["Provider", paper.source_provider().name()]);
            table.add_row(vec!["ID", paper.identifier()]);
            if let Some(date) = paper.published() {
                table.add_row(vec!["Published".to_string(), date.to_string()]);
            }
            table.add_row(vec!["URL", paper.url()]);
            if let Some(doi) = paper.doi() {
                table.add_row(vec!["DOI", doi]);
            }
            if let Some(pdf_url) = paper.pdf_url() {
                table.add_row(vec!["PDF", pdf_url]);
            }
            if !paper.subjects().is_empty() {
                table.add_row(vec!["Subjects".to_string(), paper.subjects().join("; ")]);
            }
            if let Some(abstract_text) = paper.abstract_text() {
                table.add_row(vec!["Abstract", abstract_text]);
            }
            println!("{table}");
        }
    }
    Ok(())
}

fn output_content(content: &PaperContent, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(content)?),
        _ => {
            if let Some(paper) = &content.metadata {
                eprintln!("{} ({} bytes)", paper.title(), content.file_size);
            }
            println!("{}", content.content);
        }
    }
    Ok(())
}

fn output_providers(providers: &[ProviderInfo], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(providers)?),
        OutputFormat::Plain => {
            for provider in providers {
                println!("{} - {}", provider.id, provider.name);
            }
        }
        _ => {
            let mut table = new_table(vec!["ID", "Kind", "Name", "Capabilities"]);
            for provider in providers {
                let kind = serde_json::to_value(provider.kind)?;
                table.add_row(vec![
                    provider.id.clone(),
                    kind.as_str().unwrap_or_default().to_string(),
                    truncate(&provider.name, 40),
                    provider.capabilities.join(", "),
                ]);
            }
            println!("{table}");
        }
    }
    Ok(())
}
