use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use futures_util::{stream, StreamExt};
use serde_json::{json, Value};

use ingest_gate::config::load_config;

#[derive(Parser)]
#[command(name = "gate-cli")]
#[command(about = "Operator CLI for the ingestion gate", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate a config file, then print the effective config
    CheckConfig {
        path: PathBuf,
    },
    /// Show the remaining rate limit budget for this client
    Quota {
        #[arg(short, long, default_value = "http://localhost:8080/api/ingest")]
        url: String,
    },
    /// Fire a burst of ingest requests and print a status histogram
    Burst {
        #[arg(short, long, default_value = "http://localhost:8080/api/ingest")]
        url: String,

        #[arg(short = 'n', long, default_value_t = 120)]
        count: usize,

        #[arg(short, long, default_value_t = 16)]
        concurrency: usize,

        /// Payload type to send (campaign or kpi)
        #[arg(short = 't', long = "type", default_value = "kpi")]
        kind: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::CheckConfig { path } => {
            let config = load_config(&path)?;
            println!("{}", toml::to_string_pretty(&config)?);
        }
        Commands::Quota { url } => {
            let client = reqwest::Client::new();
            let res = client.get(format!("{}/quota", url)).send().await?;
            print_response(res).await?;
        }
        Commands::Burst {
            url,
            count,
            concurrency,
            kind,
        } => {
            let histogram = burst(&url, count, concurrency.max(1), &kind).await;
            for (status, n) in &histogram {
                println!("{status}: {n}");
            }
        }
    }

    Ok(())
}

fn sample_payload(kind: &str) -> Value {
    match kind {
        "campaign" => json!({
            "type": "campaign",
            "campaign_id": "cli-burst",
            "name": "gate-cli burst",
            "sent_at": "2024-01-01T00:00:00Z",
        }),
        other => json!({
            "type": other,
            "campaign_id": "cli-burst",
            "sent": 1000,
            "delivered": 990,
            "opens": 420,
            "clicks": 37,
        }),
    }
}

/// Status code (or "error") → number of responses.
async fn burst(url: &str, count: usize, concurrency: usize, kind: &str) -> BTreeMap<String, usize> {
    let client = reqwest::Client::new();
    let payload = sample_payload(kind);

    stream::iter(0..count)
        .map(|_| {
            let request = client.post(url).json(&payload);
            async move {
                match request.send().await {
                    Ok(res) => res.status().as_u16().to_string(),
                    Err(e) => {
                        eprintln!("request failed: {e}");
                        "error".to_string()
                    }
                }
            }
        })
        .buffer_unordered(concurrency)
        .fold(BTreeMap::new(), |mut acc, status| async move {
            *acc.entry(status).or_insert(0) += 1;
            acc
        })
        .await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: gate returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
