use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Method, RequestBuilder};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Admin console CLI for the recognition gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:1205")]
    url: String,

    /// Bearer token from `gateway-cli login`.
    #[arg(short, long)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and print a bearer token
    Login { username: String, password: String },
    /// Print an Argon2 hash for an account's `password_hash`
    HashPassword { password: String },
    /// Gateway status
    Status,
    /// Guard statistics, locked addresses and settings
    Security,
    /// Add (or with --remove, delete) an allow-list entry
    Allow {
        ip: String,
        #[arg(long)]
        remove: bool,
    },
    /// Add (or with --remove, delete) a deny-list entry
    Deny {
        ip: String,
        #[arg(long)]
        remove: bool,
    },
    /// Clear failures and any lock for an address
    Unlock { ip: String },
    /// Recent usage records
    History {
        #[arg(long)]
        kind: Option<String>,
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        caller_key: Option<String>,
        /// success or failure
        #[arg(long)]
        outcome: Option<String>,
        #[arg(long)]
        range_secs: Option<u64>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Aggregated usage, optionally over the last N seconds
    Stats {
        #[arg(long)]
        range_secs: Option<u64>,
    },
    /// Erase the usage history
    ClearHistory,
}

struct Console {
    client: reqwest::Client,
    url: String,
    headers: HeaderMap,
}

impl Console {
    fn new(url: String, token: Option<&str>) -> Result<Self, Box<dyn std::error::Error>> {
        let mut headers = HeaderMap::new();
        if let Some(token) = token {
            headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}"))?);
        }
        Ok(Self {
            client: reqwest::Client::new(),
            url,
            headers,
        })
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.client
            .get(format!("{}{}", self.url, path))
            .headers(self.headers.clone())
    }

    /// State-changing request; fetches a fresh one-time CSRF token first.
    async fn mutate(&self, method: Method, path: &str) -> Result<RequestBuilder, Box<dyn std::error::Error>> {
        let csrf: Value = self.get("/admin/csrf").send().await?.error_for_status()?.json().await?;
        let mut request = self
            .client
            .request(method, format!("{}{}", self.url, path))
            .headers(self.headers.clone());
        if let Some(token) = csrf["csrf_token"].as_str() {
            request = request.header("X-CSRF-Token", token);
        }
        Ok(request)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let console = Console::new(cli.url, cli.token.as_deref())?;

    let res = match cli.command {
        Commands::Login { username, password } => {
            console
                .client
                .post(format!("{}/admin/login", console.url))
                .json(&json!({ "username": username, "password": password }))
                .send()
                .await?
        }
        Commands::HashPassword { password } => {
            println!("{}", recognition_gateway::directory::hash_password(&password)?);
            return Ok(());
        }
        Commands::Status => console.get("/admin/status").send().await?,
        Commands::Security => console.get("/admin/security/stats").send().await?,
        Commands::Allow { ip, remove } => {
            let method = if remove { Method::DELETE } else { Method::POST };
            console
                .mutate(method, "/admin/security/allow-list")
                .await?
                .json(&json!({ "ip": ip }))
                .send()
                .await?
        }
        Commands::Deny { ip, remove } => {
            let method = if remove { Method::DELETE } else { Method::POST };
            console
                .mutate(method, "/admin/security/deny-list")
                .await?
                .json(&json!({ "ip": ip }))
                .send()
                .await?
        }
        Commands::Unlock { ip } => {
            console
                .mutate(Method::POST, "/admin/security/unlock")
                .await?
                .json(&json!({ "ip": ip }))
                .send()
                .await?
        }
        Commands::History {
            kind,
            host,
            caller_key,
            outcome,
            range_secs,
            limit,
        } => {
            let mut query: Vec<(&str, String)> = vec![("limit", limit.to_string())];
            let optional = [
                ("kind", kind),
                ("host", host),
                ("caller_key", caller_key),
                ("outcome", outcome),
                ("range_secs", range_secs.map(|r| r.to_string())),
            ];
            query.extend(optional.into_iter().filter_map(|(k, v)| v.map(|v| (k, v))));
            console.get("/admin/history/records").query(&query).send().await?
        }
        Commands::Stats { range_secs } => {
            let mut request = console.get("/admin/history/stats");
            if let Some(range) = range_secs {
                request = request.query(&[("range_secs", range)]);
            }
            request.send().await?
        }
        Commands::ClearHistory => {
            console
                .mutate(Method::POST, "/admin/history/clear")
                .await?
                .send()
                .await?
        }
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
