//! Presigned URL example
//!
//! Shares an object through a presigned GET URL and fetches it with a
//! plain HTTP client that holds no credentials.
//!
//! Run with: cargo run --example presigned_url

use s3lite_client::StorageClient;
use s3lite_testkit::GatewayConfig;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    println!("🚀 s3lite - Presigned URL Example\n");

    let server = s3lite_testkit::spawn(GatewayConfig::ephemeral()).await?;
    let client =
        StorageClient::with_endpoint(&server.endpoint(), server.access_key(), server.secret_key())?;

    client.make_bucket("shared").await?;
    client
        .put_object_bytes("shared", "report.txt", "quarterly numbers", Some("text/plain"))
        .await?;

    let url = client.presigned_get_url("shared", "report.txt", Duration::from_secs(3600))?;
    println!("🔗 {}", url);
    println!("   expires at {}", url.expires_at);

    let response = reqwest::get(url.url.as_str()).await?;
    println!("\n📥 GET -> {}", response.status());
    println!("   {}", response.text().await?);

    println!("\n✨ Done!");
    Ok(())
}
