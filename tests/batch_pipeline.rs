//! Batch exchanges through the real HTTP transport against a mock server.

use storlake::{
    BatchOptions, Error, Method, RetryOptions, SasCredential, StorageClient, StorageCredential,
    SubRequest,
};
use url::Url;

const BOUNDARY: &str = "batchresponse_1b0b8d1e-5f8f-4c8b-9d0e-0f3a1c2d3e4f";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn multipart_body(statuses: &[u16]) -> String {
    let mut body = String::new();
    for (i, status) in statuses.iter().enumerate() {
        body.push_str(&format!(
            "--{BOUNDARY}\r\n\
             Content-Type: application/http\r\n\
             Content-ID: {i}\r\n\
             \r\n\
             HTTP/1.1 {status} X\r\n\
             \r\n\
             \r\n"
        ));
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));
    body
}

fn client_for(server: &mockito::ServerGuard) -> StorageClient {
    StorageClient::builder(server.url())
        .credential(StorageCredential::Sas(SasCredential::new("sv=2025&sig=abc")))
        .retry(RetryOptions::none())
        .build()
        .unwrap()
}

fn sub_requests(server: &mockito::ServerGuard, n: usize) -> Vec<SubRequest> {
    (0..n)
        .map(|i| {
            SubRequest::new(
                Method::DELETE,
                Url::parse(&format!("{}/container0/blob{i}", server.url())).unwrap(),
            )
        })
        .collect()
}

#[tokio::test]
async fn accepted_batch_round_trips_through_the_wire() {
    init_tracing();
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/container0")
        .match_query(mockito::Matcher::AllOf(vec![
            mockito::Matcher::UrlEncoded("comp".into(), "batch".into()),
            mockito::Matcher::UrlEncoded("restype".into(), "container".into()),
        ]))
        .match_header("x-ms-version", "2025-01-05")
        .with_status(202)
        .with_header(
            "content-type",
            &format!("multipart/mixed; boundary={}", BOUNDARY),
        )
        .with_body(multipart_body(&[202, 202]))
        .create_async()
        .await;

    let client = client_for(&server);
    let parts = client
        .submit_batch(
            sub_requests(&server, 2),
            BatchOptions {
                path: "container0".into(),
                restype: Some("container".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(parts.len(), 2);
    assert!(parts.iter().all(|p| p.is_success()));
}

#[tokio::test]
async fn top_level_failure_is_decoded_from_the_error_body() {
    init_tracing();
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/container0")
        .match_query(mockito::Matcher::Any)
        .with_status(400)
        .with_header("x-ms-error-code", "InvalidQueryParameterValue")
        .with_body(r#"{"error":{"code":"InvalidQueryParameterValue","message":"Value for one of the query parameters is invalid."}}"#)
        .create_async()
        .await;

    let client = client_for(&server);
    let err = client
        .submit_batch(
            sub_requests(&server, 1),
            BatchOptions {
                path: "container0".into(),
                restype: Some("container".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

    mock.assert_async().await;
    match err {
        Error::Service(service) => {
            assert_eq!(service.status, 400);
            assert_eq!(
                service.error_code.as_deref(),
                Some("InvalidQueryParameterValue")
            );
            assert!(service.message.contains("query parameters"));
        }
        other => panic!("expected service error, got {other}"),
    }
}
