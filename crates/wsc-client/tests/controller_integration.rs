//! Controller client retry and header tests

mod common;

use std::time::Duration;

use serde_json::json;

use wsc_client::CallOptions;
use wsc_core::error::TransportError;
use wsc_core::traits::{Headers, Method};

use common::{controller, empty_response, retry_after_response, MockTransport};

const PATH: &str = "/api/v1/thing/";

#[tokio::test(start_paused = true)]
async fn test_server_error_is_retried_until_success() {
    let transport = MockTransport::new();
    transport
        .on_json(Method::Get, PATH, 502, json!({"error": "bad gateway"}))
        .on_json(Method::Get, PATH, 200, json!({"ok": true}));
    let client = controller(&transport);

    let value = client
        .call(Method::Get, PATH, None, CallOptions::idempotent())
        .await
        .unwrap();

    assert_eq!(value, json!({"ok": true}));
    let calls = transport.calls_to(Method::Get, PATH);
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].at - calls[0].at, Duration::from_millis(100));
}

#[tokio::test(start_paused = true)]
async fn test_retries_are_bounded() {
    let transport = MockTransport::new();
    transport.on(
        Method::Get,
        PATH,
        Err(TransportError::Connection("connection refused".into())),
    );
    let client = controller(&transport);

    let err = client
        .call(Method::Get, PATH, None, CallOptions::idempotent())
        .await
        .unwrap_err();

    assert!(matches!(err, TransportError::Connection(_)));
    assert_eq!(transport.call_count(Method::Get, PATH), 3);
}

#[tokio::test(start_paused = true)]
async fn test_client_error_is_not_retried() {
    let transport = MockTransport::new();
    transport.on_json(Method::Get, PATH, 404, json!({"detail": "not found"}));
    let client = controller(&transport);

    let err = client
        .call(Method::Get, PATH, None, CallOptions::idempotent())
        .await
        .unwrap_err();

    match err {
        TransportError::Rejected { status, message } => {
            assert_eq!(status, 404);
            assert_eq!(message, "not found");
        }
        other => panic!("expected rejection, got {other:?}"),
    }
    assert_eq!(transport.call_count(Method::Get, PATH), 1);
}

#[tokio::test(start_paused = true)]
async fn test_retry_after_is_honoured() {
    let transport = MockTransport::new();
    transport
        .on(Method::Get, PATH, Ok(retry_after_response(429, 3)))
        .on_json(Method::Get, PATH, 200, json!([]));
    let client = controller(&transport);

    client
        .call(Method::Get, PATH, None, CallOptions::idempotent())
        .await
        .unwrap();

    let calls = transport.calls_to(Method::Get, PATH);
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].at - calls[0].at, Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn test_too_many_requests_without_retry_after_is_rejected() {
    let transport = MockTransport::new();
    transport.on(Method::Get, PATH, Ok(empty_response(429)));
    let client = controller(&transport);

    let err = client
        .call(Method::Get, PATH, None, CallOptions::idempotent())
        .await
        .unwrap_err();

    assert!(matches!(err, TransportError::Rejected { status: 429, .. }));
    assert_eq!(transport.call_count(Method::Get, PATH), 1);
}

#[tokio::test(start_paused = true)]
async fn test_non_idempotent_call_is_sent_once() {
    let transport = MockTransport::new();
    transport.on(Method::Post, PATH, Err(TransportError::Timeout(Duration::from_secs(10))));
    let client = controller(&transport);

    let err = client
        .call(Method::Post, PATH, Some(&json!({"a": 1})), CallOptions::non_idempotent())
        .await
        .unwrap_err();

    assert!(matches!(err, TransportError::Timeout(_)));
    assert_eq!(transport.call_count(Method::Post, PATH), 1);
}

#[tokio::test(start_paused = true)]
async fn test_caller_headers_win() {
    let transport = MockTransport::new();
    transport.on(Method::Post, PATH, Ok(empty_response(204)));
    let client = controller(&transport).with_headers(Headers::from([
        ("X-Tenant".to_string(), "factory".to_string()),
        ("X-Trace".to_string(), "base".to_string()),
    ]));

    let value = client
        .call(
            Method::Post,
            PATH,
            Some(&json!({})),
            CallOptions::non_idempotent()
                .with_header("x-trace", "override")
                .with_header("content-type", "application/vnd.test+json"),
        )
        .await
        .unwrap();
    assert!(value.is_null());

    let call = &transport.calls_to(Method::Post, PATH)[0];
    let header = |name: &str| {
        call.headers
            .iter()
            .filter(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.clone())
            .collect::<Vec<_>>()
    };
    assert_eq!(header("x-tenant"), vec!["factory".to_string()]);
    assert_eq!(header("x-trace"), vec!["override".to_string()]);
    assert_eq!(header("content-type"), vec!["application/vnd.test+json".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_graph_errors_fail_the_call() {
    let transport = MockTransport::new();
    transport.on_json(
        Method::Post,
        "/api/v2/graphql",
        200,
        json!({"data": {"GetBody": null}, "errors": [{"message": "no such body"}]}),
    );
    let client = controller(&transport);

    let err = client
        .call_graph("query { GetBody }", &json!({}), CallOptions::idempotent())
        .await
        .unwrap_err();

    match err {
        TransportError::Graph(message) => assert_eq!(message, "no such body"),
        other => panic!("expected graph error, got {other:?}"),
    }
}
