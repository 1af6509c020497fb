use std::collections::BTreeMap;

use clap::{Parser, Subcommand};
use reqwest::header::CACHE_CONTROL;
use serde_json::Value;

use fulfillment_router::auth::parse_max_age;
use fulfillment_router::config::schema::DEFAULT_KEYS_URL;
use fulfillment_router::routing::{ACTIONS_INTENT_HEALTH_CHECK, SIGNATURE_HEADER};
use fulfillment_router::FulfillmentRequest;

#[derive(Parser)]
#[command(name = "webhook-cli")]
#[command(about = "Exercise a fulfillment webhook and its key endpoint", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a fulfillment request to the webhook
    Fulfill {
        #[arg(short, long, default_value = "http://localhost:8080/")]
        url: String,

        /// Intent name
        intent: String,

        /// Handler name
        #[arg(long, default_value = "")]
        handler: String,

        #[arg(long, default_value = "en-US")]
        locale: String,

        /// Signed token sent in the signature header
        #[arg(long)]
        token: Option<String>,
    },
    /// Send the platform health check
    Health {
        #[arg(short, long, default_value = "http://localhost:8080/")]
        url: String,
    },
    /// Show the key ids and lifetime served by a key endpoint
    Keys {
        #[arg(short, long, default_value = DEFAULT_KEYS_URL)]
        url: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Fulfill {
            url,
            intent,
            handler,
            locale,
            token,
        } => {
            let mut req = client
                .post(&url)
                .json(&FulfillmentRequest::new(intent, handler, locale));
            if let Some(token) = token {
                req = req.header(SIGNATURE_HEADER, token);
            }
            print_response(req.send().await?).await?;
        }
        Commands::Health { url } => {
            let res = client
                .post(&url)
                .json(&FulfillmentRequest::new(ACTIONS_INTENT_HEALTH_CHECK, "", ""))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Keys { url } => {
            let res = client.get(&url).send().await?;
            let status = res.status();
            if !status.is_success() {
                eprintln!("Error: key endpoint returned status {}", status);
                return Ok(());
            }

            let cache_control = res
                .headers()
                .get(CACHE_CONTROL)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned);
            let keys: BTreeMap<String, String> = res.json().await?;

            for kid in keys.keys() {
                println!("{}", kid);
            }
            match cache_control.as_deref().and_then(parse_max_age) {
                Some(secs) => println!("max-age: {}s", secs),
                None => println!(
                    "max-age: none (cache-control: {})",
                    cache_control.as_deref().unwrap_or("-")
                ),
            }
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    if !status.is_success() {
        eprintln!("Error: webhook returned status {}", status);
        if !text.is_empty() {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = serde_json::from_str(&text)?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
