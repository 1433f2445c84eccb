//! Search gateway CLI - MCP server and one-shot search.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::json;

use search_gateway::{
    logging, serve, tool, Gateway, McpHandler, SearchRequest, SearchResult, Settings,
};

/// Google Custom Search as an MCP tool
#[derive(Parser)]
#[command(name = "search-gateway")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Read configuration from this dotenv file instead of ./.env
    #[arg(long, global = true, value_name = "PATH")]
    env_file: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve MCP over stdin/stdout (default)
    Stdio,

    /// Serve MCP over streamable HTTP at /mcp
    Http(BindArgs),

    /// Serve MCP over server-sent events at /sse
    Sse(BindArgs),

    /// Run a single search and print the results
    Search(SearchArgs),

    /// Print the tool list with its input schema
    Schema,
}

#[derive(Args)]
struct BindArgs {
    /// Bind host (defaults to HOST or 127.0.0.1)
    #[arg(long)]
    host: Option<String>,

    /// Bind port (defaults to PORT or 8000)
    #[arg(short, long)]
    port: Option<u16>,
}

#[derive(Args)]
struct SearchArgs {
    /// Search query
    query: String,

    /// Number of results (1-10)
    #[arg(short, long, default_value = "5")]
    num: i64,

    /// 1-based index of the first result
    #[arg(short, long, default_value = "1")]
    start: i64,

    /// Restrict results to this site
    #[arg(long)]
    site: Option<String>,

    /// Use the site-restricted endpoint
    #[arg(long)]
    site_restrict: bool,

    /// Safe search level (off or active)
    #[arg(long)]
    safe: Option<String>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output
    Json,
    /// Compact single-line output
    Compact,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Stdio);

    if let Commands::Schema = command {
        let tools = json!({ "tools": [tool::search_tool()] });
        println!("{}", serde_json::to_string_pretty(&tools)?);
        return Ok(());
    }

    let settings = Settings::load(cli.env_file.as_deref())?;
    let _log_guard = logging::init(&settings.log, cli.verbose)?;
    tracing::debug!(settings = ?settings, "configuration loaded");

    let gateway = Arc::new(Gateway::new(settings)?);
    let handler = McpHandler::new(gateway.clone());

    let outcome = match command {
        Commands::Stdio => serve::stdio::serve(handler).await,
        Commands::Http(args) => {
            let (host, port) = bind(&gateway, args);
            serve::http::serve(handler, &host, port).await
        }
        Commands::Sse(args) => {
            let (host, port) = bind(&gateway, args);
            serve::sse::serve(handler, &host, port).await
        }
        Commands::Search(args) => run_search(&gateway, args).await,
        Commands::Schema => Ok(()),
    };

    gateway.shutdown().await;
    outcome
}

fn bind(gateway: &Gateway, args: BindArgs) -> (String, u16) {
    let settings = gateway.settings();
    (
        args.host.unwrap_or_else(|| settings.host.clone()),
        args.port.unwrap_or(settings.port),
    )
}

async fn run_search(gateway: &Gateway, args: SearchArgs) -> Result<()> {
    let mut request = SearchRequest::new(&args.query)
        .with_num(args.num)
        .with_start(args.start)
        .with_site_restrict(args.site_restrict);
    if let Some(site) = &args.site {
        request = request.with_site_search(site);
    }
    if let Some(safe) = &args.safe {
        request = request.with_safe(safe);
    }

    let result = gateway.search(request).await?;

    match args.format {
        OutputFormat::Text => print_text(&args.query, &result),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Compact => {
            for item in result.items() {
                println!(
                    "{}\t{}",
                    item.title.as_deref().unwrap_or(""),
                    item.url.as_deref().unwrap_or("")
                );
            }
        }
    }

    Ok(())
}

fn print_text(query: &str, result: &SearchResult) {
    println!(
        "\nSearch results for \"{}\" ({} results in {}ms, trace {}):\n",
        query,
        result.count(),
        result.latency_ms,
        result.trace_id
    );

    for item in result.items() {
        println!("{}. {}", item.rank, item.title.as_deref().unwrap_or("(untitled)"));
        if let Some(url) = &item.url {
            println!("   URL: {}", url);
        }
        if let Some(snippet) = item.snippet.as_deref().filter(|s| !s.is_empty()) {
            let snippet: String = if snippet.chars().count() > 150 {
                format!("{}...", snippet.chars().take(150).collect::<String>())
            } else {
                snippet.to_string()
            };
            println!("   {}", snippet);
        }
        println!();
    }

    if let Some(next) = result.next_page_start_index {
        println!("Next page: --start {}", next);
    }
}
