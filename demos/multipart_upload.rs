//! Multipart upload example
//!
//! Uploads a 12 MiB object in 5 MiB parts with progress reporting, then
//! walks through the same upload step by step with [`MultipartUpload`].
//!
//! Run with: cargo run --example multipart_upload

use bytes::Bytes;
use s3lite_client::{
    Config, Credentials, Endpoint, MultipartUpload, ProgressCallback, StorageClient,
    MIN_PART_SIZE,
};
use s3lite_testkit::GatewayConfig;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    println!("🚀 s3lite - Multipart Upload Example\n");

    let server = s3lite_testkit::spawn(GatewayConfig::ephemeral()).await?;
    let config = Config::new(
        Endpoint::parse(&server.endpoint())?,
        Credentials::new(server.access_key(), server.secret_key()),
    )
    .with_multipart_threshold(MIN_PART_SIZE)
    .with_part_size(MIN_PART_SIZE)
    .with_multipart_concurrency(2);
    let client = StorageClient::new(config)?;

    client.make_bucket("uploads").await?;

    // ==================== Automatic ====================

    let size = 12 * 1024 * 1024;
    let data: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();

    let progress: ProgressCallback = Arc::new(|p| {
        println!(
            "   part {}/{} done, {:.1}%",
            p.current_part,
            p.total_parts,
            p.percentage()
        );
    });

    println!("📤 Uploading {} bytes...", size);
    let object = client
        .put_object_with_progress(
            "uploads",
            "large.bin",
            data.as_slice(),
            size as u64,
            Some("application/octet-stream"),
            Some(progress),
        )
        .await?;
    println!("   ✅ ETag: {}", object.etag);

    let info = client.stat_object("uploads", "large.bin").await?;
    println!("   Stored size: {}", info.size);

    // ==================== Manual ====================

    println!("\n🔧 Manual multipart upload...");
    let mut upload = MultipartUpload::start(&client, "uploads", "manual.bin", None).await?;
    println!("   Upload ID: {}", upload.upload_id());

    let part_size = MIN_PART_SIZE as usize;
    let first = upload
        .upload_part(1, Bytes::copy_from_slice(&data[..part_size]))
        .await?;
    println!("   Part 1: etag {}", first.etag);
    let second = upload
        .upload_part(2, Bytes::copy_from_slice(&data[part_size..part_size + 1024]))
        .await?;
    println!("   Part 2: etag {}", second.etag);

    let etag = upload.complete().await?;
    println!("   ✅ Completed with ETag: {}", etag);

    println!("\n✨ Done!");
    Ok(())
}
