use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Method;
use serde_json::json;
use url::Url;

#[derive(Parser)]
#[command(name = "presence-cli")]
#[command(about = "Management CLI for the presence monitor", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long)]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Query the status of an entity
    Status { name: String },
    /// Subscribe a group to an entity
    Subscribe { group: String, name: String },
    /// Unsubscribe a group from an entity
    Unsubscribe { group: String, name: String },
    /// List a group's subscriptions
    Subscriptions { group: String },
    /// Re-query every entity a group watches, bypassing the cache
    Sync { group: String },
    /// Show monitor statistics
    Stats,
    /// Reset statistics, cache and health history
    ResetStats,
    /// Show health details of an entity
    Health { name: String },
    /// Forget cached status, health and history of one entity
    ResetMember { name: String },
    /// Flush pending status queries now
    Flush,
    /// Show whether the roster check is running
    Monitoring,
    /// Resume the roster check
    Enable,
    /// Pause the roster check
    Disable,
}

struct ApiRequest {
    method: Method,
    segments: Vec<String>,
    body: Option<serde_json::Value>,
}

impl ApiRequest {
    fn new(method: Method, segments: &[&str]) -> Self {
        Self {
            method,
            segments: segments.iter().map(|s| s.to_string()).collect(),
            body: None,
        }
    }

    fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

impl Commands {
    fn request(&self) -> ApiRequest {
        match self {
            Commands::Status { name } => {
                ApiRequest::new(Method::GET, &["api", "status", name.as_str()])
            }
            Commands::Subscribe { group, name } => ApiRequest::new(
                Method::PUT,
                &["api", "subscriptions", group.as_str(), name.as_str()],
            ),
            Commands::Unsubscribe { group, name } => ApiRequest::new(
                Method::DELETE,
                &["api", "subscriptions", group.as_str(), name.as_str()],
            ),
            Commands::Subscriptions { group } => {
                ApiRequest::new(Method::GET, &["api", "subscriptions", group.as_str()])
            }
            Commands::Sync { group } => {
                ApiRequest::new(Method::POST, &["api", "sync", group.as_str()])
            }
            Commands::Stats => ApiRequest::new(Method::GET, &["api", "stats"]),
            Commands::ResetStats => ApiRequest::new(Method::POST, &["api", "stats", "reset"]),
            Commands::Health { name } => {
                ApiRequest::new(Method::GET, &["api", "health", name.as_str()])
            }
            Commands::ResetMember { name } => {
                ApiRequest::new(Method::DELETE, &["api", "health", name.as_str()])
            }
            Commands::Flush => ApiRequest::new(Method::POST, &["api", "flush"]),
            Commands::Monitoring => ApiRequest::new(Method::GET, &["api", "monitoring"]),
            Commands::Enable => ApiRequest::new(Method::PUT, &["api", "monitoring"])
                .with_body(json!({ "enabled": true })),
            Commands::Disable => ApiRequest::new(Method::PUT, &["api", "monitoring"])
                .with_body(json!({ "enabled": false })),
        }
    }
}

/// Append `segments` to `base`, percent-encoding each one.
fn endpoint(base: &str, segments: &[String]) -> Result<Url, Box<dyn std::error::Error>> {
    let mut url = Url::parse(base)?;
    url.path_segments_mut()
        .map_err(|_| format!("{} cannot be used as a base URL", base))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let request = cli.command.request();
    let mut builder = client
        .request(request.method, endpoint(&cli.url, &request.segments)?)
        .headers(headers);
    if let Some(body) = &request.body {
        builder = builder.json(body);
    }
    let res = builder.send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let is_json = res
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));
    let body = res.text().await?;

    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if !body.is_empty() {
            eprintln!("Response: {}", body);
        }
        std::process::exit(1);
    }

    if is_json {
        let json: serde_json::Value = serde_json::from_str(&body)?;
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else if !body.is_empty() {
        println!("{}", body);
    }
    Ok(())
}
