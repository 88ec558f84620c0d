#![cfg(feature = "test-utils")]
//! Gate + orchestrator behavior with recording fakes.
//!
//! Tests:
//! - Buffered fetch failure falls back to the anchor strategy
//! - Missing file never calls storage
//! - "Download again" signs a fresh link and completes again
//! - Closing before zero suppresses delivery
use shelf_core::countdown::COUNTDOWN_SECONDS;
use shelf_core::delivery::{DeliveryError, DeliveryOrchestrator, DeliveryOutcome};
use shelf_core::gate::{DownloadGate, GateError, GateEvent, GatePhase};
use shelf_core::product::Product;
use shelf_core::test_support::{RecordingIssuer, RecordingSink, SinkCall, StaticFetcher};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Initialize tracing for tests
fn tracing_init() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_line_number(true)
        .with_target(false)
        .with_file(true)
        .try_init();
}

struct Harness {
    issuer: Arc<RecordingIssuer>,
    fetcher: Arc<StaticFetcher>,
    sink: Arc<RecordingSink>,
    gate: DownloadGate,
    events: mpsc::UnboundedReceiver<GateEvent>,
}

fn harness(issuer: RecordingIssuer, fetcher: StaticFetcher, sink: RecordingSink) -> Harness {
    let issuer = Arc::new(issuer);
    let fetcher = Arc::new(fetcher);
    let sink = Arc::new(sink);
    let orchestrator =
        DeliveryOrchestrator::with_default_cascade(issuer.clone(), fetcher.clone(), sink.clone());
    let (gate, events) = DownloadGate::new(Arc::new(orchestrator));
    Harness {
        issuer,
        fetcher,
        sink,
        gate,
        events,
    }
}

fn cool_app() -> Product {
    Product::new("p1", "My Cool App!", 0.0).with_file_ref("uploads/abc123.zip")
}

/// Wait for the outcome event, collecting everything seen on the way.
async fn until_outcome(events: &mut mpsc::UnboundedReceiver<GateEvent>) -> Vec<GateEvent> {
    let mut seen = Vec::new();
    while let Some(event) = events.recv().await {
        let done = matches!(
            event,
            GateEvent::DeliverySucceeded { .. } | GateEvent::DeliveryFailed { .. }
        );
        seen.push(event);
        if done {
            break;
        }
    }
    seen
}

#[tokio::test(start_paused = true)]
async fn test_fetch_failure_falls_back_to_anchor() {
    tracing_init();
    let mut h = harness(
        RecordingIssuer::new(),
        StaticFetcher::status(502),
        RecordingSink::new(),
    );

    h.gate.present(cool_app());
    let events = until_outcome(&mut h.events).await;

    assert_eq!(
        events.last(),
        Some(&GateEvent::DeliverySucceeded {
            filename: "My_Cool_App.zip".into()
        })
    );
    assert_eq!(h.fetcher.calls(), vec![h.issuer.url_for(1)]);
    assert_eq!(
        h.sink.calls(),
        vec![SinkCall::Anchor {
            url: h.issuer.url_for(1),
            filename: "My_Cool_App.zip".into(),
        }]
    );
    assert!(h.gate.delivery_complete());
}

#[tokio::test(start_paused = true)]
async fn test_missing_file_reports_without_storage_call() {
    tracing_init();
    let mut h = harness(
        RecordingIssuer::new(),
        StaticFetcher::ok(Vec::new(), None),
        RecordingSink::new(),
    );

    h.gate.present(Product::new("p2", "Coming Soon", 5.0));
    let events = until_outcome(&mut h.events).await;

    assert_eq!(
        events.last(),
        Some(&GateEvent::DeliveryFailed {
            reason: "No file available for this product".into()
        })
    );
    assert_eq!(h.issuer.calls().len(), 0);
    assert!(h.sink.calls().is_empty());
    assert_eq!(h.gate.phase(), GatePhase::Failed);
    assert!(!h.gate.delivery_complete());
}

#[tokio::test(start_paused = true)]
async fn test_download_again_signs_fresh_link() {
    tracing_init();
    let mut h = harness(
        RecordingIssuer::new(),
        StaticFetcher::ok(b"zip".to_vec(), Some("application/zip")),
        RecordingSink::new(),
    );

    h.gate.present(cool_app());
    until_outcome(&mut h.events).await;
    assert!(h.gate.delivery_complete());
    assert_eq!(h.issuer.calls().len(), 1);

    let outcome = h.gate.retry_download().await.unwrap();
    assert_eq!(
        outcome,
        DeliveryOutcome::Success {
            filename: "My_Cool_App.zip".into()
        }
    );
    assert_eq!(h.issuer.calls().len(), 2);
    assert_eq!(
        h.fetcher.calls(),
        vec![h.issuer.url_for(1), h.issuer.url_for(2)]
    );
    assert!(h.gate.delivery_complete());
    assert_eq!(h.gate.phase(), GatePhase::Delivered);

    let events = until_outcome(&mut h.events).await;
    assert_eq!(
        events,
        vec![
            GateEvent::DeliveryStarted,
            GateEvent::DeliverySucceeded {
                filename: "My_Cool_App.zip".into()
            }
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_close_before_zero_suppresses_delivery() {
    tracing_init();
    let mut h = harness(
        RecordingIssuer::new(),
        StaticFetcher::ok(Vec::new(), None),
        RecordingSink::new(),
    );

    h.gate.present(cool_app());
    tokio::time::sleep(Duration::from_secs(COUNTDOWN_SECONDS as u64 - 1) + Duration::from_millis(500)).await;
    assert_eq!(h.gate.remaining(), 1);
    h.gate.close();

    tokio::time::sleep(Duration::from_secs(300)).await;

    let mut events = Vec::new();
    while let Ok(event) = h.events.try_recv() {
        events.push(event);
    }
    assert!(!events.contains(&GateEvent::DeliveryStarted));
    assert!(!events.contains(&GateEvent::Tick { remaining: 0 }));
    assert_eq!(h.issuer.calls().len(), 0);
    assert_eq!(h.gate.retry_download().await, Err(GateError::Closed));
}

#[tokio::test(start_paused = true)]
async fn test_storage_failure_is_retryable() {
    tracing_init();
    let mut h = harness(
        RecordingIssuer::failing("The resource was not found"),
        StaticFetcher::ok(Vec::new(), None),
        RecordingSink::new(),
    );

    h.gate.present(cool_app());
    let events = until_outcome(&mut h.events).await;
    assert_eq!(
        events.last(),
        Some(&GateEvent::DeliveryFailed {
            reason: "Storage error: The resource was not found".into()
        })
    );
    assert!(h.fetcher.calls().is_empty());

    let outcome = h.gate.retry_download().await.unwrap();
    assert_eq!(
        outcome,
        DeliveryOutcome::Failure(DeliveryError::LinkIssuance(
            "The resource was not found".into()
        ))
    );
    assert_eq!(h.issuer.calls().len(), 2);
    assert!(!h.gate.delivery_complete());
}

#[tokio::test(start_paused = true)]
async fn test_every_strategy_failing_reports_contact_support() {
    tracing_init();
    let mut h = harness(
        RecordingIssuer::new(),
        StaticFetcher::failing("connection reset"),
        RecordingSink::new().fail_anchor().fail_window(),
    );

    h.gate.present(cool_app());
    let events = until_outcome(&mut h.events).await;
    assert_eq!(
        events.last(),
        Some(&GateEvent::DeliveryFailed {
            reason: "Download failed. Please contact support.".into()
        })
    );
    assert_eq!(h.gate.phase(), GatePhase::Failed);
    assert!(!h.gate.delivery_complete());
}

#[tokio::test(start_paused = true)]
async fn test_save_failure_falls_back_and_skips_release() {
    tracing_init();
    let mut h = harness(
        RecordingIssuer::new(),
        StaticFetcher::ok(b"abc".to_vec(), None),
        RecordingSink::new().fail_save(),
    );

    h.gate.present(cool_app());
    until_outcome(&mut h.events).await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    let calls = h.sink.calls();
    assert_eq!(calls.len(), 2);
    assert!(matches!(calls[0], SinkCall::SaveBlob { .. }));
    assert!(matches!(calls[1], SinkCall::Anchor { .. }));
}
