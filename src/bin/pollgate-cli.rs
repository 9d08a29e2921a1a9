use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, ORIGIN};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "pollgate-cli")]
#[command(about = "Admin CLI for the pollgate API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Session token of the calling principal.
    #[arg(short, long, env = "POLLGATE_TOKEN")]
    token: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check server liveness
    Health,
    /// List public poll summaries
    Polls,
    /// List every poll with results (admin)
    AdminPolls,
    /// Show recent audit records (admin)
    Audit {
        #[arg(short, long, default_value_t = 50)]
        limit: usize,
    },
    /// Grant a role to a principal (admin)
    Grant { principal: String, role: String },
    /// Revoke a role from a principal (admin)
    Revoke { principal: String, role: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.token))?,
    );
    // State-changing requests must carry an Origin matching the server host.
    headers.insert(ORIGIN, HeaderValue::from_str(cli.url.trim_end_matches('/'))?);

    let base = cli.url.trim_end_matches('/');
    let res = match cli.command {
        Commands::Health => client.get(format!("{}/health", base)).send().await?,
        Commands::Polls => {
            client
                .get(format!("{}/polls", base))
                .headers(headers)
                .send()
                .await?
        }
        Commands::AdminPolls => {
            client
                .get(format!("{}/admin/polls", base))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Audit { limit } => {
            client
                .get(format!("{}/admin/audit?limit={}", base, limit))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Grant { principal, role } => {
            client
                .post(format!("{}/admin/roles", base))
                .headers(headers)
                .json(&json!({ "principal_id": principal, "role": role }))
                .send()
                .await?
        }
        Commands::Revoke { principal, role } => {
            client
                .delete(format!("{}/admin/roles/{}/{}", base, principal, role))
                .headers(headers)
                .send()
                .await?
        }
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let body: Value = match res.json().await {
        Ok(body) => body,
        Err(e) => {
            eprintln!("Error: unreadable response ({}): {}", status, e);
            return Ok(());
        }
    };

    if !status.is_success() {
        eprintln!("Error: API returned status {}", status);
        if let Some(message) = body.get("error").and_then(Value::as_str) {
            eprintln!("Message: {}", message);
        }
        return Ok(());
    }

    let data = body.get("data").cloned().unwrap_or(Value::Null);
    println!("{}", serde_json::to_string_pretty(&data)?);
    Ok(())
}
