//! Basic usage example for the s3lite client
//!
//! This example demonstrates:
//! - Creating a bucket
//! - Uploading objects
//! - Listing objects
//! - Downloading objects
//! - Deleting objects
//!
//! It starts the in-memory gateway on a free port, so no external
//! storage is needed.
//!
//! Run with: cargo run --example basic_usage

use futures::TryStreamExt;
use s3lite_client::{ListEntry, StorageClient};
use s3lite_testkit::GatewayConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    println!("🚀 s3lite - Basic Usage Example\n");

    let server = s3lite_testkit::spawn(GatewayConfig::ephemeral()).await?;
    let client =
        StorageClient::with_endpoint(&server.endpoint(), server.access_key(), server.secret_key())?;
    println!("Gateway running at {}\n", server.base_url());

    // ==================== Bucket Operations ====================

    println!("📦 Creating bucket 'my-test-bucket'...");
    if client.make_bucket("my-test-bucket").await? {
        println!("   ✅ Bucket created");
    }
    // Creating it again is not an error
    if !client.make_bucket("my-test-bucket").await? {
        println!("   ✅ Second create reported the bucket already exists");
    }

    println!("\n📋 Listing all buckets...");
    for bucket in client.list_buckets().await? {
        println!("   - {} (created: {})", bucket.name, bucket.creation_date);
    }

    // ==================== Object Operations ====================

    println!("\n📤 Uploading 'hello.txt'...");
    let object = client
        .put_object_bytes(
            "my-test-bucket",
            "hello.txt",
            "Hello, World!",
            Some("text/plain"),
        )
        .await?;
    println!("   ✅ Uploaded {} bytes with ETag: {}", object.size, object.etag);

    for i in 1..=5 {
        client
            .put_object_bytes(
                "my-test-bucket",
                &format!("data/file{}.txt", i),
                format!("Content of file {}", i),
                None,
            )
            .await?;
    }
    println!("   ✅ Uploaded 5 additional files under data/");

    println!("\n📋 Top-level listing...");
    let entries: Vec<ListEntry> = client
        .list_objects("my-test-bucket", "", false)
        .try_collect()
        .await?;
    for entry in &entries {
        match entry {
            ListEntry::Object(o) => println!("   📄 {} ({} bytes)", o.key, o.size),
            ListEntry::CommonPrefix(p) => println!("   📁 {}", p),
        }
    }

    println!("\n🔍 Stat 'hello.txt'...");
    let info = client.stat_object("my-test-bucket", "hello.txt").await?;
    println!(
        "   size={} etag={} type={}",
        info.size,
        info.etag,
        info.content_type.as_deref().unwrap_or("-")
    );

    println!("\n📥 Downloading 'hello.txt'...");
    let data = client
        .get_object("my-test-bucket", "hello.txt")
        .await?
        .bytes()
        .await?;
    println!("   Content: {}", String::from_utf8_lossy(&data));

    // ==================== Cleanup ====================

    println!("\n🗑️  Cleaning up...");
    let keys: Vec<String> = client
        .list_objects("my-test-bucket", "", true)
        .map_ok(|entry| entry.name().to_string())
        .try_collect()
        .await?;
    for key in &keys {
        client.remove_object("my-test-bucket", key).await?;
    }
    client.remove_bucket("my-test-bucket").await?;
    println!("   ✅ Removed {} objects and the bucket", keys.len());

    println!("\n✨ Done!");
    Ok(())
}
