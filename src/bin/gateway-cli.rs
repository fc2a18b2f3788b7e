use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Management CLI for the spam detection gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:3001")]
    url: String,

    /// Bearer token forwarded to the gateway.
    #[arg(short, long, env = "GATEWAY_TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Gateway and backend health
    Health,
    /// Circuit breaker state and failure count
    CircuitStatus,
    /// Force the circuit breaker closed
    CircuitReset,
    /// Detection statistics
    Stats,
    /// Log in through the gateway and print the token response
    Login { username: String, password: String },
    /// Classify a piece of email text
    Detect { text: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let mut headers = HeaderMap::new();
    if let Some(token) = &cli.token {
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token))?,
        );
    }

    let res = match cli.command {
        Commands::Health => client.get(format!("{}/health", base)).send().await?,
        Commands::CircuitStatus => {
            client.get(format!("{}/api/circuit/status", base)).send().await?
        }
        Commands::CircuitReset => {
            client.post(format!("{}/api/circuit/reset", base))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Stats => {
            client.get(format!("{}/api/stats", base))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Login { username, password } => {
            client.post(format!("{}/api/auth/login", base))
                .json(&json!({ "username": username, "password": password }))
                .send()
                .await?
        }
        Commands::Detect { text } => {
            client.post(format!("{}/api/detect", base))
                .headers(headers)
                .json(&json!({ "text": text }))
                .send()
                .await?
        }
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    let pretty = serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|json| serde_json::to_string_pretty(&json).ok())
        .unwrap_or(text);

    if status.is_success() {
        println!("{}", pretty);
    } else {
        eprintln!("Error: gateway returned status {}", status);
        eprintln!("{}", pretty);
    }
    Ok(())
}
