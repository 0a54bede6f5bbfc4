//! Scene task dispatcher integration tests
//!
//! Drives submit, await and cancel against a scripted transport with the
//! tokio clock paused, so poll timing is exact.

mod common;

use std::time::Duration;

use serde_json::json;
use tokio_util::sync::CancellationToken;

use wsc_client::AwaitOptions;
use wsc_core::error::{DispatchError, TransportError};
use wsc_core::traits::Method;
use wsc_core::types::{TaskKind, TaskStatus};

use common::{dispatcher, empty_response, MockTransport};

const SUBMIT: &str = "/scenetask";
const TASK: &str = "/scenetask/t1";
const CANCEL: &str = "/scenetask/t1/cancel";

fn options(timeout: Duration) -> AwaitOptions {
    AwaitOptions::new(timeout).with_poll(common::test_poll())
}

#[tokio::test(start_paused = true)]
async fn test_submit_and_await_to_success() {
    let transport = MockTransport::new();
    transport
        .on_json(Method::Post, SUBMIT, 200, json!({"id": "t1", "status": "pending"}))
        .on_json(Method::Get, TASK, 200, json!({"id": "t1", "status": "pending"}))
        .on_json(Method::Get, TASK, 200, json!({"id": "t1", "status": "running"}))
        .on_json(
            Method::Get,
            TASK,
            200,
            json!({"id": "t1", "status": "succeeded", "result": {"trajectory": [1, 2, 3]}}),
        );
    let dispatcher = dispatcher(&transport);

    let mut task = dispatcher
        .submit(TaskKind::Plan, json!({"goal": "home"}))
        .await
        .unwrap();
    assert_eq!(task.task_id().as_str(), "t1");
    assert_eq!(task.status(), TaskStatus::Pending);

    let status = dispatcher
        .await_completion(&mut task, &options(Duration::from_secs(10)))
        .await
        .unwrap();

    assert_eq!(status, TaskStatus::Succeeded);
    assert_eq!(task.result(), Some(&json!({"trajectory": [1, 2, 3]})));

    let submit = transport.calls_to(Method::Post, SUBMIT);
    assert_eq!(submit.len(), 1);
    assert_eq!(
        submit[0].body,
        Some(json!({"taskType": "plan", "taskParameters": {"goal": "home"}}))
    );

    let polls = transport.calls_to(Method::Get, TASK);
    assert_eq!(polls.len(), 3);
    let first = polls[0].at - submit[0].at;
    let second = polls[1].at - polls[0].at;
    let third = polls[2].at - polls[1].at;
    assert_eq!(first, Duration::from_millis(100));
    assert_eq!(second, Duration::from_millis(200));
    assert_eq!(third, Duration::from_millis(400));
}

#[tokio::test(start_paused = true)]
async fn test_zero_timeout_does_not_poll() {
    let transport = MockTransport::new();
    transport.on_json(Method::Post, SUBMIT, 200, json!({"id": "t1"}));
    let dispatcher = dispatcher(&transport);

    let mut task = dispatcher.submit(TaskKind::Plan, json!({})).await.unwrap();
    let err = dispatcher
        .await_completion(&mut task, &options(Duration::ZERO))
        .await
        .unwrap_err();

    match err {
        DispatchError::Timeout {
            last_status, waited, ..
        } => {
            assert_eq!(last_status, TaskStatus::Pending);
            assert_eq!(waited, Duration::ZERO);
        }
        other => panic!("expected timeout, got {other:?}"),
    }
    assert_eq!(transport.call_count(Method::Get, TASK), 0);
}

#[tokio::test(start_paused = true)]
async fn test_terminal_task_is_not_polled_or_cancelled() {
    let transport = MockTransport::new();
    transport.on_json(
        Method::Post,
        SUBMIT,
        200,
        json!({"id": "t1", "status": "succeeded", "result": 42}),
    );
    let dispatcher = dispatcher(&transport);

    let mut task = dispatcher.submit(TaskKind::Plan, json!({})).await.unwrap();
    assert!(task.is_terminal());

    let status = dispatcher
        .await_completion(&mut task, &options(Duration::from_secs(5)))
        .await
        .unwrap();
    assert_eq!(status, TaskStatus::Succeeded);
    assert_eq!(dispatcher.poll(&mut task).await.unwrap(), TaskStatus::Succeeded);

    let err = dispatcher.cancel(&mut task).await.unwrap_err();
    assert!(matches!(
        err,
        DispatchError::InvalidState {
            status: TaskStatus::Succeeded,
            operation: "cancel",
            ..
        }
    ));
    assert_eq!(transport.call_count(Method::Get, TASK), 0);
    assert_eq!(transport.call_count(Method::Post, CANCEL), 0);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_keeps_last_status() {
    let transport = MockTransport::new();
    transport
        .on_json(Method::Post, SUBMIT, 200, json!({"id": "t1", "status": "pending"}))
        .on_json(Method::Get, TASK, 200, json!({"id": "t1", "status": "running"}));
    let dispatcher = dispatcher(&transport);

    let mut task = dispatcher.submit(TaskKind::Plan, json!({})).await.unwrap();
    let err = dispatcher
        .await_completion(&mut task, &options(Duration::from_secs(1)))
        .await
        .unwrap_err();

    match err {
        DispatchError::Timeout {
            task_id,
            last_status,
            waited,
        } => {
            assert_eq!(task_id.as_str(), "t1");
            assert_eq!(last_status, TaskStatus::Running);
            assert!(waited <= Duration::from_secs(1));
        }
        other => panic!("expected timeout, got {other:?}"),
    }
    assert_eq!(task.status(), TaskStatus::Running);

    // Polls at 100, 300, 700ms; the next one would land after the deadline
    assert_eq!(transport.call_count(Method::Get, TASK), 3);

    // The task can be awaited again
    transport.on_json(Method::Get, TASK, 200, json!({"id": "t1", "status": "failed", "error": "collision"}));
    let status = dispatcher
        .await_completion(&mut task, &options(Duration::from_secs(1)))
        .await
        .unwrap();
    assert_eq!(status, TaskStatus::Failed);
    assert_eq!(task.error(), Some("collision"));
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_token_aborts_wait() {
    let transport = MockTransport::new();
    transport
        .on_json(Method::Post, SUBMIT, 200, json!({"id": "t1", "status": "running"}))
        .on_json(Method::Get, TASK, 200, json!({"id": "t1", "status": "running"}));
    let dispatcher = dispatcher(&transport);
    let mut task = dispatcher.submit(TaskKind::Binpicking, json!({})).await.unwrap();

    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(250)).await;
        canceller.cancel();
    });

    let err = dispatcher
        .await_completion(&mut task, &options(Duration::from_secs(10)).with_cancel(token))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DispatchError::Aborted {
            last_status: TaskStatus::Running,
            ..
        }
    ));
    // Aborting the wait leaves the remote task alone
    assert_eq!(transport.call_count(Method::Post, CANCEL), 0);
    assert_eq!(transport.call_count(Method::Get, TASK), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_confirmed_by_acknowledgement() {
    let transport = MockTransport::new();
    transport
        .on_json(Method::Post, SUBMIT, 200, json!({"id": "t1", "status": "running"}))
        .on_json(Method::Post, CANCEL, 200, json!({"id": "t1", "status": "cancelled"}));
    let dispatcher = dispatcher(&transport);
    let mut task = dispatcher.submit(TaskKind::Plan, json!({})).await.unwrap();

    let status = dispatcher.cancel(&mut task).await.unwrap();

    assert_eq!(status, TaskStatus::Cancelled);
    assert_eq!(task.status(), TaskStatus::Cancelled);
    assert_eq!(transport.call_count(Method::Get, TASK), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_confirmed_by_poll() {
    let transport = MockTransport::new();
    transport
        .on_json(Method::Post, SUBMIT, 200, json!({"id": "t1"}))
        .on(Method::Post, CANCEL, Ok(empty_response(202)))
        .on_json(Method::Get, TASK, 200, json!({"id": "t1", "status": "canceled"}));
    let dispatcher = dispatcher(&transport);
    let mut task = dispatcher.submit(TaskKind::Plan, json!({})).await.unwrap();

    assert_eq!(dispatcher.cancel(&mut task).await.unwrap(), TaskStatus::Cancelled);
    assert_eq!(transport.call_count(Method::Get, TASK), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_unconfirmed() {
    let transport = MockTransport::new();
    transport
        .on_json(Method::Post, SUBMIT, 200, json!({"id": "t1", "status": "running"}))
        .on(Method::Post, CANCEL, Ok(empty_response(202)))
        .on_json(Method::Get, TASK, 200, json!({"id": "t1", "status": "running"}));
    let dispatcher = dispatcher(&transport);
    let mut task = dispatcher.submit(TaskKind::Plan, json!({})).await.unwrap();

    let err = dispatcher.cancel(&mut task).await.unwrap_err();

    assert!(matches!(
        err,
        DispatchError::CancelUnconfirmed {
            status: TaskStatus::Running,
            ..
        }
    ));
    assert_eq!(task.status(), TaskStatus::Running);
}

#[tokio::test(start_paused = true)]
async fn test_submit_is_not_retried() {
    let transport = MockTransport::new();
    transport.on_json(Method::Post, SUBMIT, 503, json!({"error": "busy"}));
    let dispatcher = dispatcher(&transport);

    let err = dispatcher.submit(TaskKind::Plan, json!({})).await.unwrap_err();

    match err {
        DispatchError::Submission {
            kind,
            source: Some(TransportError::Server { status, message }),
            ..
        } => {
            assert_eq!(kind, TaskKind::Plan);
            assert_eq!(status, 503);
            assert_eq!(message, "busy");
        }
        other => panic!("expected submission failure, got {other:?}"),
    }
    assert_eq!(transport.call_count(Method::Post, SUBMIT), 1);
}

#[tokio::test(start_paused = true)]
async fn test_submit_without_task_id_fails() {
    let transport = MockTransport::new();
    transport.on_json(Method::Post, SUBMIT, 200, json!({"status": "pending"}));
    let dispatcher = dispatcher(&transport);

    let err = dispatcher.submit(TaskKind::Plan, json!({})).await.unwrap_err();
    assert!(matches!(err, DispatchError::Submission { source: None, .. }));
}

#[tokio::test(start_paused = true)]
async fn test_poll_failure_reports_last_status() {
    let transport = MockTransport::new();
    transport
        .on_json(Method::Post, SUBMIT, 200, json!({"id": "t1", "status": "running"}))
        .on_json(Method::Get, TASK, 500, json!({"error": "database down"}));
    let dispatcher = dispatcher(&transport);
    let mut task = dispatcher.submit(TaskKind::Plan, json!({})).await.unwrap();

    let err = dispatcher
        .await_completion(&mut task, &options(Duration::from_secs(10)))
        .await
        .unwrap_err();

    match err {
        DispatchError::Transport {
            last_status, source, ..
        } => {
            assert_eq!(last_status, TaskStatus::Running);
            assert!(matches!(source, TransportError::Server { status: 500, .. }));
        }
        other => panic!("expected transport failure, got {other:?}"),
    }
    // Initial attempt plus two retries
    assert_eq!(transport.call_count(Method::Get, TASK), 3);
}

#[tokio::test(start_paused = true)]
async fn test_response_for_other_task_is_rejected() {
    let transport = MockTransport::new();
    transport
        .on_json(Method::Post, SUBMIT, 200, json!({"id": "t1"}))
        .on_json(Method::Get, TASK, 200, json!({"id": "t2", "status": "succeeded"}));
    let dispatcher = dispatcher(&transport);
    let mut task = dispatcher.submit(TaskKind::Plan, json!({})).await.unwrap();

    let err = dispatcher.poll(&mut task).await.unwrap_err();
    assert!(matches!(err, DispatchError::MalformedResponse { .. }));
    assert_eq!(task.status(), TaskStatus::Pending);
}

#[tokio::test(start_paused = true)]
async fn test_unbounded_timeout_waits_for_completion() {
    let transport = MockTransport::new();
    transport
        .on_json(Method::Post, SUBMIT, 200, json!({"id": "t1", "status": "running"}))
        .on_json(Method::Get, TASK, 200, json!({"id": "t1", "status": "running"}))
        .on_json(Method::Get, TASK, 200, json!({"id": "t1", "status": "succeeded"}));
    let dispatcher = dispatcher(&transport);
    let mut task = dispatcher.submit(TaskKind::Plan, json!({})).await.unwrap();

    let status = dispatcher
        .await_completion(&mut task, &AwaitOptions::new(Duration::MAX))
        .await
        .unwrap();

    assert_eq!(status, TaskStatus::Succeeded);
    assert_eq!(transport.call_count(Method::Get, TASK), 2);
}

#[tokio::test(start_paused = true)]
async fn test_non_finite_poll_multiplier_still_polls() {
    let transport = MockTransport::new();
    transport
        .on_json(Method::Post, SUBMIT, 200, json!({"id": "t1", "status": "running"}))
        .on_json(Method::Get, TASK, 200, json!({"id": "t1", "status": "running"}))
        .on_json(Method::Get, TASK, 200, json!({"id": "t1", "status": "succeeded"}));
    let dispatcher = dispatcher(&transport);
    let mut task = dispatcher.submit(TaskKind::Plan, json!({})).await.unwrap();

    let mut poll = common::test_poll();
    poll.multiplier = f64::INFINITY;
    let options = AwaitOptions::new(Duration::from_secs(5)).with_poll(poll);

    let status = dispatcher.await_completion(&mut task, &options).await.unwrap();

    assert_eq!(status, TaskStatus::Succeeded);
    let polls = transport.calls_to(Method::Get, TASK);
    // 100ms, then straight to the 400ms max interval
    assert_eq!(polls[1].at - polls[0].at, Duration::from_millis(400));
}

#[tokio::test(start_paused = true)]
async fn test_task_id_is_one_path_segment() {
    let transport = MockTransport::new();
    transport
        .on_json(Method::Post, SUBMIT, 200, json!({"id": "job/7?x#y", "status": "running"}))
        .on_json(
            Method::Get,
            "/scenetask/job%2F7%3Fx%23y",
            200,
            json!({"id": "job/7?x#y", "status": "succeeded"}),
        );
    let dispatcher = dispatcher(&transport);
    let mut task = dispatcher.submit(TaskKind::Plan, json!({})).await.unwrap();

    assert_eq!(dispatcher.poll(&mut task).await.unwrap(), TaskStatus::Succeeded);
}
