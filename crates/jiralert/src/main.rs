use anyhow::Context;
use clap::{Parser, Subcommand};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use jiralert::{
    alertmanager::Data,
    cache::{create_store, LookupCache, StoreConfig, DEFAULT_BUCKET},
    config::{ApiConfig, SnapshotHandle},
    jira::JiraClient,
    metrics::register_metrics,
    notify::Receiver,
    server::{Server, LOG_FILE_NAME},
};

#[derive(Parser, Debug)]
#[command(name = "jiralert", version, about = "Alertmanager webhook receiver that files Jira issues")]
struct Cli {
    /// Address to serve the webhook endpoint on
    #[arg(long, env = "LISTEN_ADDRESS", default_value = "0.0.0.0:9097")]
    listen_address: String,

    /// Receiver configuration file
    #[arg(long, env = "JIRALERT_CONFIG", default_value = "config/jiralert.yml")]
    config: PathBuf,

    /// Jira base URL
    #[arg(long, env = "JIRA_URL")]
    jira_url: String,

    #[arg(long, env = "JIRA_USER", default_value = "")]
    jira_user: String,

    #[arg(long, env = "JIRA_PASSWORD", default_value = "", hide_env_values = true)]
    jira_password: String,

    /// Timeout for a single Jira request
    #[arg(long, env = "JIRA_TIMEOUT_SECS", default_value_t = 30)]
    jira_timeout_secs: u64,

    /// Directory holding the lookup cache database and the log file
    #[arg(long, env = "DATA_DIR", default_value = ".")]
    data_dir: PathBuf,

    /// PROD, DEV or any tracing filter directive
    #[arg(long, env = "LOG_LEVEL", default_value = "PROD")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the webhook endpoint (default)
    Serve,
    /// Reconcile one webhook payload read from a file and exit
    Notify {
        #[arg(long)]
        file: PathBuf,
    },
}

fn filter_directive(log_level: &str) -> &str {
    match log_level {
        "PROD" => "error",
        "DEV" => "info",
        other => other,
    }
}

/// `port` replaces the port of the configured listen address when set.
fn listen_address(configured: &str, port: Option<&str>) -> String {
    match port {
        Some(port) if !port.is_empty() => {
            let host = configured
                .rsplit_once(':')
                .map(|(host, _)| host)
                .unwrap_or(configured);
            format!("{}:{}", host, port)
        }
        _ => configured.to_string(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter_directive(&cli.log_level)))
        .context("invalid log level")?;
    let log_path = cli.data_dir.join(LOG_FILE_NAME);
    let log_file = OpenOptions::new().create(true).append(true).open(&log_path);
    let registry = tracing_subscriber::registry().with(filter).with(fmt::layer());
    let log_file = match log_file {
        Ok(file) => {
            registry
                .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .init();
            Some(log_path)
        }
        Err(e) => {
            registry.init();
            warn!("Cannot open log file {}, logging to stdout only: {}", log_path.display(), e);
            None
        }
    };

    info!("Starting jiralert {}", env!("CARGO_PKG_VERSION"));

    register_metrics()?;

    let snapshot = Arc::new(
        SnapshotHandle::open(cli.config.clone())
            .with_context(|| format!("error loading configuration {}", cli.config.display()))?,
    );

    let store = create_store(&StoreConfig::in_dir(&cli.data_dir))
        .await
        .context("error opening lookup cache")?;
    let cache = LookupCache::open(store, DEFAULT_BUCKET).await?;

    let api = ApiConfig {
        url: cli.jira_url.clone(),
        user: cli.jira_user.clone(),
        password: cli.jira_password.clone(),
        timeout: Duration::from_secs(cli.jira_timeout_secs),
    };
    let client = JiraClient::new(&api).context("error creating Jira client")?;

    match cli.command {
        Some(Command::Notify { file }) => {
            let input = std::fs::read_to_string(&file)
                .with_context(|| format!("error reading {}", file.display()))?;
            let mut data: Data = serde_json::from_str(&input)?;
            let dropped = data.retain_firing();
            if dropped > 0 {
                warn!("Ignoring {} resolved alert(s)", dropped);
            }

            let current = snapshot.current().await;
            let conf = current
                .config
                .receiver_by_name(&data.receiver)
                .ok_or_else(|| jiralert::Error::ReceiverNotFound(data.receiver.clone()))?;
            let outcomes = Receiver::new(conf, &current.templates, &client, &cache)
                .notify(&data)
                .await?;
            info!("Reconciled {} alert(s)", outcomes.len());
            outcomes.into_result()?;
        }
        Some(Command::Serve) | None => {
            let port = std::env::var("PORT").ok();
            let addr = listen_address(&cli.listen_address, port.as_deref());
            let mut server = Server::new(snapshot, Arc::new(client), cache);
            if let Some(path) = log_file {
                server = server.with_log_file(path);
            }
            info!("Starting server on {}", addr);
            server.start(&addr).await?;
        }
    }

    Ok(())
}
