//! Querylens CLI
//!
//! Command-line client for a running Querylens server:
//! - Count distinct queries in a bucket
//! - List the most popular queries in a bucket
//! - Interactive query loop
//! - Generate a config file

use clap::{Parser, Subcommand};
use querylens::api::dto::{CountResponse, PopularResponse};
use querylens::indexer::{TimeRange, TopQuery};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "querylens-cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Query a Querylens server for search statistics")]
#[command(long_about = "Querylens answers how many distinct searches happened in a year, month, day, hour or minute,\nand which searches were the most popular.\n\nDate ranges: 2015, 2015-08, 2015-08-01, \"2015-08-01 00\", \"2015-08-01 00:04\"")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// API server URL
    #[arg(long, default_value = "http://localhost:5000", global = true)]
    pub api_url: String,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Count distinct queries in a date range
    Count {
        /// Date range, e.g. 2015-08-01
        range: String,
    },

    /// Most popular queries in a date range
    Popular {
        /// Date range, e.g. "2015-08-01 00"
        range: String,
        /// Number of queries to list
        #[arg(short, long, default_value = "10")]
        size: usize,
    },

    /// Interactive loop: L = distinct count, T = top queries
    Repl,

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Thin HTTP client for the query endpoints
struct QueryClient {
    http: reqwest::Client,
    api_url: String,
}

impl QueryClient {
    fn new(api_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    async fn count(&self, range: &str) -> CliResult<usize> {
        let url = format!(
            "{}/1/queries/count/{}",
            self.api_url,
            urlencoding::encode(range)
        );
        let body: CountResponse = self.get(&url).await?;
        Ok(body.count)
    }

    async fn popular(&self, range: &str, size: usize) -> CliResult<Vec<TopQuery>> {
        let url = format!(
            "{}/1/queries/popular/{}?size={}",
            self.api_url,
            urlencoding::encode(range),
            size
        );
        let body: PopularResponse = self.get(&url).await?;
        Ok(body.queries)
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, url: &str) -> CliResult<T> {
        let response = self.http.get(url).send().await.map_err(|e| {
            format!("Cannot connect to Querylens API at {}: {}", self.api_url, e)
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(format!("Request failed ({}): {}", status, text).into());
        }

        Ok(response.json().await?)
    }
}

#[tokio::main]
async fn main() -> CliResult<()> {
    let cli = Cli::parse();
    let client = QueryClient::new(&cli.api_url);

    match cli.command {
        Commands::Count { range } => {
            check_range(&range)?;
            let count = client.count(&range).await?;

            match cli.format.as_str() {
                "json" => println!("{}", serde_json::json!({ "count": count })),
                _ => println!("{} distinct queries in {}", count, range),
            }
        }

        Commands::Popular { range, size } => {
            check_range(&range)?;
            let queries = client.popular(&range, size).await?;

            match cli.format.as_str() {
                "json" => println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({ "queries": queries }))?
                ),
                _ => print_table(&queries),
            }
        }

        Commands::Repl => repl(&client).await?,

        Commands::Config { output } => {
            let config = querylens::config::generate_default_config();

            match output {
                Some(path) => {
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&path, &config)?;
                    println!("Config written to {:?}", path);
                }
                None => {
                    print!("{}", config);
                }
            }
        }
    }

    Ok(())
}

/// Reject malformed ranges before going to the server
fn check_range(range: &str) -> CliResult<()> {
    TimeRange::parse(range)?;
    Ok(())
}

/// Prompts on stdout and awaits answer lines from a channel
struct Prompter {
    lines: mpsc::Receiver<std::io::Result<String>>,
}

impl Prompter {
    fn new(lines: mpsc::Receiver<std::io::Result<String>>) -> Self {
        Self { lines }
    }

    /// Read stdin on its own thread so the runtime never blocks on it
    ///
    /// The thread is detached rather than a `spawn_blocking` task: the
    /// runtime would wait for it on shutdown while it sits in a read.
    fn stdin() -> Self {
        let (tx, rx) = mpsc::channel(1);
        std::thread::spawn(move || {
            for line in std::io::stdin().lock().lines() {
                if tx.blocking_send(line).is_err() {
                    break;
                }
            }
        });
        Self::new(rx)
    }

    /// `None` once input is exhausted
    async fn ask(&mut self, label: &str) -> CliResult<Option<String>> {
        print!("{}: ", label);
        std::io::stdout().flush()?;

        match self.lines.recv().await {
            Some(line) => Ok(Some(line?.trim().to_string())),
            None => Ok(None),
        }
    }
}

/// Line-oriented query loop on stdin
///
/// ```text
/// Query type (L|T): L
/// Date range: 2015-08-01
/// 573697
/// Query type (L|T): T
/// Size: 3
/// Date range: 2015
/// ...
/// ```
async fn repl(client: &QueryClient) -> CliResult<()> {
    let mut prompter = Prompter::stdin();

    loop {
        let Some(kind) = prompter.ask("Query type (L|T)").await? else {
            return Ok(());
        };

        match kind.as_str() {
            "L" | "l" => {
                let Some(range) = prompter.ask("Date range").await? else {
                    return Ok(());
                };
                match check_range(&range) {
                    Ok(()) => match client.count(&range).await {
                        Ok(count) => println!("{}", count),
                        Err(e) => eprintln!("{}", e),
                    },
                    Err(e) => eprintln!("{}", e),
                }
            }
            "T" | "t" => {
                let Some(size) = prompter.ask("Size").await? else {
                    return Ok(());
                };
                let Ok(size) = size.parse::<usize>() else {
                    eprintln!("Size must be a non-negative integer: {:?}", size);
                    continue;
                };
                let Some(range) = prompter.ask("Date range").await? else {
                    return Ok(());
                };
                match check_range(&range) {
                    Ok(()) => match client.popular(&range, size).await {
                        Ok(queries) => print_table(&queries),
                        Err(e) => eprintln!("{}", e),
                    },
                    Err(e) => eprintln!("{}", e),
                }
            }
            "q" | "quit" | "exit" => return Ok(()),
            "" => {}
            other => eprintln!("Unknown query type {:?}, expected L or T", other),
        }
    }
}

fn print_table(queries: &[TopQuery]) {
    if queries.is_empty() {
        println!("No queries in this range");
        return;
    }

    println!("{:>10}  {}", "Count", "Query");
    println!("{}", "-".repeat(40));
    for q in queries {
        println!("{:>10}  {}", q.count, q.query);
    }
}
