//! Call command implementation.

use anyhow::{Context, Result, anyhow};
use clap::{Args, ValueEnum};

use scrapelight_http::{ClientConfig, RequestDescriptor};

use crate::output;
use crate::storage;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

#[derive(Args, Debug)]
pub struct CallArgs {
    /// HTTP method
    #[arg(value_enum)]
    pub method: HttpMethod,

    /// Endpoint path, e.g. /saved-items
    pub path: String,

    /// Query parameter as key=value (repeatable)
    #[arg(long = "query", short = 'q')]
    pub query: Vec<String>,

    /// JSON request body
    #[arg(long)]
    pub body: Option<String>,

    /// Send without taking part in credential refresh
    #[arg(long)]
    pub public: bool,
}

pub async fn run(args: CallArgs, config: ClientConfig) -> Result<()> {
    let request = build_request(&args)?;
    let session = storage::open(config)?;

    let response = session
        .execute(&request)
        .await
        .with_context(|| format!("{} failed", args.path))?;

    match response.json::<serde_json::Value>() {
        Ok(value) => output::json_pretty(&value),
        Err(_) => {
            println!("{}", String::from_utf8_lossy(response.body()));
            Ok(())
        }
    }
}

fn build_request(args: &CallArgs) -> Result<RequestDescriptor> {
    let mut request = match args.method {
        HttpMethod::Get => RequestDescriptor::get(&args.path),
        HttpMethod::Post => RequestDescriptor::post(&args.path),
        HttpMethod::Put => RequestDescriptor::put(&args.path),
        HttpMethod::Delete => RequestDescriptor::delete(&args.path),
    };

    for pair in &args.query {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("Invalid query parameter '{}', expected key=value", pair))?;
        request = request.with_query(key, value);
    }

    if let Some(body) = &args.body {
        let value: serde_json::Value = serde_json::from_str(body).context("Body is not valid JSON")?;
        request = request.with_json(&value)?;
    }

    if args.public {
        request = request.public();
    }

    Ok(request)
}
