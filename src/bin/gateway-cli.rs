use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Management CLI for the bus gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe the liveness endpoint
    Status,
    /// Post form parameters to a bus address
    Send {
        /// Bus address, e.g. userLogin
        address: String,
        /// Parameters as key=value
        params: Vec<String>,
    },
    /// Fetch a static resource
    Fetch {
        /// Path below the static mount, e.g. index.html
        path: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let base = cli.url.trim_end_matches('/');
    let client = reqwest::Client::new();

    let res = match cli.command {
        Commands::Status => client.get(format!("{base}/status")).send().await?,
        Commands::Send { address, params } => {
            let form = parse_params(&params)?;
            client
                .post(format!("{base}/bus/{address}"))
                .form(&form)
                .send()
                .await?
        }
        Commands::Fetch { path } => {
            client
                .get(format!("{base}/static/{}", path.trim_start_matches('/')))
                .send()
                .await?
        }
    };

    print_response(res).await
}

fn parse_params(params: &[String]) -> Result<Vec<(String, String)>, String> {
    params
        .iter()
        .map(|param| {
            param
                .split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .ok_or_else(|| format!("expected key=value, got '{param}'"))
        })
        .collect()
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let is_json = res
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with("application/json"))
        .unwrap_or(false);
    let text = res.text().await?;

    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
        if !text.is_empty() {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    println!("{}", status);
    if is_json {
        let json: Value = serde_json::from_str(&text)?;
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else if !text.is_empty() {
        println!("{}", text);
    }
    Ok(())
}
