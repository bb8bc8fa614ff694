//! s3lite - command line client for S3-compatible storage

mod commands;

use clap::Parser;
use commands::Command;
use s3lite_client::{Config, Credentials, Endpoint, StorageClient};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "s3lite")]
#[command(about = "Command line client for S3-compatible object storage")]
#[command(version)]
struct Args {
    /// Storage endpoint, `host:port` or a full URL
    #[arg(short, long, default_value = "127.0.0.1:9000", env = "S3LITE_ENDPOINT")]
    endpoint: String,

    /// Use HTTPS when the endpoint has no scheme
    #[arg(long, env = "S3LITE_SECURE")]
    secure: bool,

    /// Access key
    #[arg(long, default_value = "minioadmin", env = "S3LITE_ACCESS_KEY")]
    access_key: String,

    /// Secret key
    #[arg(long, default_value = "minioadmin", env = "S3LITE_SECRET_KEY", hide_env_values = true)]
    secret_key: String,

    /// Signing region
    #[arg(long, default_value = s3lite_client::DEFAULT_REGION, env = "S3LITE_REGION")]
    region: String,

    /// Enable debug logging
    #[arg(short, long, env = "S3LITE_DEBUG")]
    debug: bool,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Parse arguments
    let args = Args::parse();

    // Setup logging
    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "s3lite={0},s3lite_client={0},s3lite_testkit={0}",
                    log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Command::ServeLocal(serve) = &args.command {
        return commands::serve_local(serve, &args.access_key, &args.secret_key, &args.region)
            .await;
    }

    // Build the client
    let endpoint = if args.secure && !args.endpoint.contains("://") {
        format!("https://{}", args.endpoint)
    } else {
        args.endpoint.clone()
    };
    let config = Config::new(
        Endpoint::parse(&endpoint)?,
        Credentials::new(args.access_key, args.secret_key),
    )
    .with_region(args.region);
    let client = StorageClient::new(config)?;
    tracing::debug!(endpoint = %endpoint, "Client ready");

    commands::run(&client, args.command, args.json).await
}
