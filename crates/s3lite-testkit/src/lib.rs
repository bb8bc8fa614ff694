//! # s3lite testkit
//!
//! An in-memory S3-compatible gateway for tests, demos and local
//! experiments.
//!
//! It speaks the subset of the S3 REST API the client uses and is strict
//! where real providers are:
//! - **SigV4**: every request must carry a valid header signature or
//!   presigned query; expired, skewed and mis-signed requests are rejected
//! - **Integrity**: `x-amz-content-sha256` and `Content-MD5` are checked
//!   against the received body
//! - **Multipart**: part order, ETags and minimum part sizes are enforced
//!   on completion
//!
//! ```rust,ignore
//! let server = s3lite_testkit::spawn(s3lite_testkit::GatewayConfig::ephemeral()).await?;
//! let client = StorageClient::with_endpoint(&server.endpoint(), server.access_key(), server.secret_key())?;
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use config::GatewayConfig;
pub use error::{ApiError, S3ErrorCode};
pub use server::{run_server, run_server_with_shutdown, spawn, TestServer};
pub use state::AppState;
