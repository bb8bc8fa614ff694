//! Subcommands

use anyhow::Context;
use clap::{Args, Subcommand};
use futures::TryStreamExt;
use s3lite_client::{ByteRange, ListEntry, Method, ProgressCallback, StorageClient};
use s3lite_testkit::GatewayConfig;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check whether a bucket exists
    BucketExists { bucket: String },

    /// Create a bucket
    MakeBucket { bucket: String },

    /// List all buckets
    ListBuckets,

    /// Remove an empty bucket
    RemoveBucket { bucket: String },

    /// List objects in a bucket
    ListObjects {
        bucket: String,

        /// Only keys starting with this prefix
        #[arg(short, long, default_value = "")]
        prefix: String,

        /// Descend into pseudo-directories instead of collapsing them
        #[arg(short, long)]
        recursive: bool,
    },

    /// Upload a file
    Put {
        bucket: String,
        key: String,
        file: PathBuf,

        /// Content type; guessed from the file name when omitted
        #[arg(long)]
        content_type: Option<String>,
    },

    /// Download an object into a directory, or to stdout with `-o -`
    Get {
        bucket: String,
        key: String,

        /// Target directory
        #[arg(short, long, default_value = ".")]
        output: String,

        /// Byte range `start-end` (inclusive) or `start-`, stdout only
        #[arg(long)]
        range: Option<String>,
    },

    /// Show object metadata
    Stat { bucket: String, key: String },

    /// Remove an object
    RemoveObject { bucket: String, key: String },

    /// Print a presigned URL
    Presign {
        bucket: String,
        key: String,

        /// Validity in seconds (1 to 604800)
        #[arg(short, long, default_value = "3600")]
        expiry: u64,

        /// HTTP method the URL is signed for
        #[arg(short, long, default_value = "GET")]
        method: String,
    },

    /// Run the in-memory gateway locally
    ServeLocal(ServeArgs),
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Host to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "9000")]
    port: u16,

    /// Accept unsigned requests
    #[arg(long)]
    no_auth: bool,
}

/// Run a client command
pub async fn run(client: &StorageClient, command: Command, json: bool) -> anyhow::Result<()> {
    match command {
        Command::BucketExists { bucket } => {
            let exists = client.bucket_exists(&bucket).await?;
            emit(json, &exists, || {
                println!("{}", if exists { "exists" } else { "not found" })
            })?;
        }
        Command::MakeBucket { bucket } => {
            let created = client.make_bucket(&bucket).await?;
            emit(json, &created, || {
                if created {
                    println!("Bucket '{}' created", bucket);
                } else {
                    println!("Bucket '{}' already exists", bucket);
                }
            })?;
        }
        Command::ListBuckets => {
            let buckets = client.list_buckets().await?;
            emit(json, &buckets, || {
                for b in &buckets {
                    println!("{}  {}", b.creation_date.format("%Y-%m-%d %H:%M:%S"), b.name);
                }
            })?;
        }
        Command::RemoveBucket { bucket } => {
            let removed = client.remove_bucket(&bucket).await?;
            emit(json, &removed, || {
                if removed {
                    println!("Bucket '{}' removed", bucket);
                } else {
                    println!("Bucket '{}' does not exist", bucket);
                }
            })?;
        }
        Command::ListObjects {
            bucket,
            prefix,
            recursive,
        } => {
            let entries: Vec<ListEntry> = client
                .list_objects(&bucket, &prefix, recursive)
                .try_collect()
                .await?;
            emit(json, &entries, || {
                for entry in &entries {
                    match entry {
                        ListEntry::Object(o) => println!("{:>12}  {}", o.size, o.key),
                        ListEntry::CommonPrefix(p) => println!("{:>12}  {}", "PRE", p),
                    }
                }
            })?;
        }
        Command::Put {
            bucket,
            key,
            file,
            content_type,
        } => {
            let size = tokio::fs::metadata(&file)
                .await
                .with_context(|| format!("reading {}", file.display()))?
                .len();
            let content_type = content_type.unwrap_or_else(|| {
                mime_guess::from_path(&file)
                    .first_or_octet_stream()
                    .to_string()
            });
            let source = tokio::fs::File::open(&file)
                .await
                .with_context(|| format!("opening {}", file.display()))?;

            let progress: ProgressCallback = Arc::new(|p| {
                tracing::info!(
                    part = p.current_part,
                    parts = p.total_parts,
                    "Uploaded {:.1}%",
                    p.percentage()
                );
            });
            let object = client
                .put_object_with_progress(
                    &bucket,
                    &key,
                    source,
                    size,
                    Some(&content_type),
                    Some(progress),
                )
                .await?;

            emit(json, &object, || {
                println!("Uploaded {} bytes, etag {}", object.size, object.etag)
            })?;
        }
        Command::Get {
            bucket,
            key,
            output,
            range,
        } => {
            if output == "-" {
                let stream = match range.as_deref() {
                    Some(range) => {
                        client
                            .get_object_range(&bucket, &key, parse_range(range)?)
                            .await?
                    }
                    None => client.get_object(&bucket, &key).await?,
                };
                let mut stdout = tokio::io::stdout();
                stream.write_to(&mut stdout).await?;
            } else {
                if range.is_some() {
                    anyhow::bail!("--range is only supported with -o -");
                }
                let path = client.download_file(&bucket, &key, &output).await?;
                emit(json, &path, || println!("Saved to {}", path.display()))?;
            }
        }
        Command::Stat { bucket, key } => {
            let info = client.stat_object(&bucket, &key).await?;
            emit(json, &info, || {
                println!("Key:           {}", info.key);
                println!("Size:          {}", info.size);
                println!("ETag:          {}", info.etag);
                if let Some(ts) = info.last_modified {
                    println!("Last-Modified: {}", ts.to_rfc2822());
                }
                if let Some(ct) = &info.content_type {
                    println!("Content-Type:  {}", ct);
                }
            })?;
        }
        Command::RemoveObject { bucket, key } => {
            client.remove_object(&bucket, &key).await?;
            emit(json, &true, || println!("Removed {}/{}", bucket, key))?;
        }
        Command::Presign {
            bucket,
            key,
            expiry,
            method,
        } => {
            let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
                .context("invalid HTTP method")?;
            let url =
                client.presigned_url(method, &bucket, &key, Duration::from_secs(expiry))?;
            emit(json, &url, || println!("{}", url))?;
        }
        Command::ServeLocal(_) => {
            anyhow::bail!("serve-local does not use a client");
        }
    }

    Ok(())
}

/// Run the in-memory gateway until Ctrl-C
pub async fn serve_local(
    args: &ServeArgs,
    access_key: &str,
    secret_key: &str,
    region: &str,
) -> anyhow::Result<()> {
    let config = GatewayConfig {
        host: args.host.clone(),
        port: args.port,
        region: region.to_string(),
        auth_enabled: !args.no_auth,
        ..GatewayConfig::default()
    }
    .with_credentials(access_key, secret_key);

    if args.no_auth {
        tracing::warn!("Signature verification is DISABLED");
    }

    s3lite_testkit::run_server_with_shutdown(config, async {
        tokio::signal::ctrl_c().await.ok();
    })
    .await
}

fn emit<T: Serialize>(json: bool, value: &T, human: impl FnOnce()) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        human();
    }
    Ok(())
}

fn parse_range(s: &str) -> anyhow::Result<ByteRange> {
    let (start, end) = s
        .split_once('-')
        .with_context(|| format!("invalid range '{}', expected start-end", s))?;
    let start: u64 = start.parse().context("invalid range start")?;
    if end.is_empty() {
        return Ok(ByteRange::starting_at(start));
    }
    let end: u64 = end.parse().context("invalid range end")?;
    Ok(ByteRange::new(start, end)?)
}
