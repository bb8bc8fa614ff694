//! Raw HTTP tests against the gateway, without the client's signer

use s3lite_testkit::GatewayConfig;

/// Test unsigned requests are refused
#[tokio::test]
async fn test_unsigned_request_is_denied() {
    let server = s3lite_testkit::spawn(GatewayConfig::ephemeral())
        .await
        .unwrap();

    let response = reqwest::get(format!("{}/", server.base_url()))
        .await
        .unwrap();
    assert_eq!(response.status(), 403);
    assert_eq!(
        response
            .headers()
            .get("x-amz-error-code")
            .and_then(|v| v.to_str().ok()),
        Some("AccessDenied")
    );
    let body = response.text().await.unwrap();
    assert!(body.contains("<Code>AccessDenied</Code>"));
}

/// Test a tampered presigned signature is rejected
#[tokio::test]
async fn test_malformed_presigned_query_is_denied() {
    let server = s3lite_testkit::spawn(GatewayConfig::ephemeral())
        .await
        .unwrap();

    let url = format!(
        "{}/bucket/key?X-Amz-Algorithm=AWS4-HMAC-SHA256&X-Amz-Signature=deadbeef",
        server.base_url()
    );
    let response = reqwest::get(url).await.unwrap();
    assert_eq!(response.status(), 403);
}

/// Test the gateway serves plain requests when auth is off
#[tokio::test]
async fn test_auth_disabled_accepts_plain_requests() {
    let config = GatewayConfig {
        auth_enabled: false,
        ..GatewayConfig::ephemeral()
    };
    let server = s3lite_testkit::spawn(config).await.unwrap();
    let http = reqwest::Client::new();

    let created = http
        .put(format!("{}/plain", server.base_url()))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status(), 200);

    let put = http
        .put(format!("{}/plain/dir/file.txt", server.base_url()))
        .body("hello")
        .send()
        .await
        .unwrap();
    assert_eq!(put.status(), 200);
    assert_eq!(
        put.headers().get("etag").and_then(|v| v.to_str().ok()),
        Some("\"5d41402abc4b2a76b9719d911017c592\"")
    );

    let listing = http
        .get(format!("{}/plain?list-type=2&delimiter=/", server.base_url()))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(listing.contains("<Prefix>dir/</Prefix>"));

    let missing = http
        .get(format!("{}/plain/nope", server.base_url()))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 404);
    assert!(missing.text().await.unwrap().contains("NoSuchKey"));

    assert_eq!(server.state().object_keys("plain"), vec!["dir/file.txt".to_string()]);
}

/// Test completing an upload with parts out of order is refused
#[tokio::test]
async fn test_complete_rejects_unordered_parts() {
    let config = GatewayConfig {
        auth_enabled: false,
        ..GatewayConfig::ephemeral()
    };
    let server = s3lite_testkit::spawn(config).await.unwrap();
    let http = reqwest::Client::new();
    let base = server.base_url();

    http.put(format!("{}/mpu", base)).send().await.unwrap();
    let init = http
        .post(format!("{}/mpu/obj?uploads", base))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    let upload_id = init
        .split("<UploadId>")
        .nth(1)
        .and_then(|s| s.split("</UploadId>").next())
        .unwrap()
        .to_string();

    let body = "<CompleteMultipartUpload>\
        <Part><PartNumber>2</PartNumber><ETag>\"a\"</ETag></Part>\
        <Part><PartNumber>1</PartNumber><ETag>\"b\"</ETag></Part>\
        </CompleteMultipartUpload>";
    let response = http
        .post(format!("{}/mpu/obj?uploadId={}", base, upload_id))
        .body(body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    assert!(response.text().await.unwrap().contains("InvalidPartOrder"));
    assert_eq!(server.state().pending_uploads(), 1);
}
