//! End-to-end identification scenarios against the embedded catalog.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use machinemate::adapters::load_embedded_catalog;
use machinemate::domain::fallback::fallback_index;
use machinemate::{
    IdentificationCandidate, IdentificationConfig, IdentificationOutcome, IdentificationResolver,
    MachineCatalog, OutcomeKind, OutcomeSource, PhotoRef,
};

fn catalog() -> Arc<MachineCatalog> {
    Arc::new(load_embedded_catalog().unwrap())
}

fn online_config(base_url: &str) -> IdentificationConfig {
    IdentificationConfig {
        api_base_url: Some(base_url.to_string()),
        confidence_threshold: 0.7,
        request_timeout_secs: 1,
    }
}

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn serve_json(body: Value) -> String {
    serve(Router::new().route("/identify", post(move || async move { Json(body) }))).await
}

fn photo_file(dir: &tempfile::TempDir) -> PhotoRef {
    let path = dir.path().join("IMG_0001.jpg");
    std::fs::write(&path, b"\xff\xd8\xff\xe0jpeg").unwrap();
    PhotoRef::new(path.to_string_lossy().to_string()).unwrap()
}

fn expected_fallback_id(catalog: &MachineCatalog, photo: &PhotoRef) -> String {
    let index = fallback_index(photo.as_str(), catalog.size());
    catalog.entry_at(index).unwrap().id.clone()
}

#[tokio::test]
async fn offline_resolution_is_stable_across_resolvers() {
    let photo = PhotoRef::new("photo-abc").unwrap();

    let mut seen = Vec::new();
    for _ in 0..3 {
        let resolver =
            IdentificationResolver::from_config(catalog(), &IdentificationConfig::default())
                .unwrap();
        seen.push(resolver.resolve(&photo).await);
    }

    assert!(seen.windows(2).all(|w| w[0] == w[1]));
    match &seen[0] {
        IdentificationOutcome::Fallback {
            machine_id,
            confidence,
            source,
            ..
        } => {
            assert_eq!(machine_id, "lat-pulldown");
            assert_eq!(*confidence, None);
            assert_eq!(*source, OutcomeSource::Fallback);
        }
        other => panic!("expected fallback, got {:?}", other),
    }
}

#[tokio::test]
async fn confident_candidate_list_resolves_to_catalog() {
    let base = serve_json(json!({
        "candidates": [
            {"machineLabel": "leg-press", "confidence": 0.82},
            {"machineLabel": "chest-press", "confidence": 0.40}
        ]
    }))
    .await;
    let dir = tempfile::tempdir().unwrap();

    let resolver = IdentificationResolver::from_config(catalog(), &online_config(&base)).unwrap();
    let outcome = resolver.resolve(&photo_file(&dir)).await;

    assert_eq!(
        outcome,
        IdentificationOutcome::Catalog {
            machine_id: "leg-press".to_string(),
            confidence: 0.82,
            candidates: vec![
                IdentificationCandidate::new("leg-press", 0.82),
                IdentificationCandidate::new("chest-press", 0.40),
            ],
            source: OutcomeSource::BackendApi,
            trace_id: None,
            mocked: false,
        }
    );
}

#[tokio::test]
async fn single_prediction_label_is_reconciled() {
    let base = serve_json(json!({
        "machine": "Seated Leg Press",
        "confidence": 0.88,
        "trace_id": "trace-7",
        "mocked": false
    }))
    .await;
    let dir = tempfile::tempdir().unwrap();

    let resolver = IdentificationResolver::from_config(catalog(), &online_config(&base)).unwrap();
    let outcome = resolver.resolve(&photo_file(&dir)).await;

    assert_eq!(outcome.kind(), OutcomeKind::Catalog);
    assert_eq!(outcome.machine_id(), Some("leg-press"));
    assert_eq!(outcome.trace_id(), Some("trace-7"));
}

#[tokio::test]
async fn low_confidence_asks_the_user() {
    let base = serve_json(json!({"machine": "Treadmill", "confidence": 0.42})).await;
    let dir = tempfile::tempdir().unwrap();

    let resolver = IdentificationResolver::from_config(catalog(), &online_config(&base)).unwrap();
    let outcome = resolver.resolve(&photo_file(&dir)).await;

    assert_eq!(outcome.kind(), OutcomeKind::Manual);
    assert!(outcome.needs_disambiguation());
    assert_eq!(outcome.candidate_ids(), vec!["treadmill"]);
}

#[tokio::test]
async fn equal_confidences_keep_backend_order() {
    let base = serve_json(json!({
        "candidates": [
            {"label": "seated-row", "confidence": 0.5},
            {"label": "lat-pulldown", "confidence": 0.5},
            {"label": "treadmill", "confidence": 0.6}
        ]
    }))
    .await;
    let dir = tempfile::tempdir().unwrap();

    let resolver = IdentificationResolver::from_config(catalog(), &online_config(&base)).unwrap();
    let outcome = resolver.resolve(&photo_file(&dir)).await;

    assert_eq!(outcome.candidate_ids(), vec!["treadmill", "seated-row", "lat-pulldown"]);
}

#[tokio::test]
async fn not_gym_routes_to_disambiguation() {
    let base = serve_json(json!({"kind": "not_gym"})).await;
    let dir = tempfile::tempdir().unwrap();

    let resolver = IdentificationResolver::from_config(catalog(), &online_config(&base)).unwrap();
    let outcome = resolver.resolve(&photo_file(&dir)).await;

    assert_eq!(outcome.kind(), OutcomeKind::NotGym);
    assert!(outcome.needs_disambiguation());
    assert!(outcome.candidate_ids().is_empty());
}

#[tokio::test]
async fn backend_failures_fall_back_deterministically() {
    let server_error = serve(Router::new().route(
        "/identify",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
    ))
    .await;
    let malformed = serve_json(json!({"status": "ok"})).await;
    // Nothing listens on port 9 of the loopback interface.
    let unreachable = "http://127.0.0.1:9".to_string();

    let catalog = catalog();
    let dir = tempfile::tempdir().unwrap();
    let photo = photo_file(&dir);
    let expected = expected_fallback_id(&catalog, &photo);

    for base in [server_error, malformed, unreachable] {
        let resolver =
            IdentificationResolver::from_config(Arc::clone(&catalog), &online_config(&base))
                .unwrap();
        let outcome = resolver.resolve(&photo).await;
        assert_eq!(outcome.kind(), OutcomeKind::Fallback, "backend {}", base);
        assert_eq!(outcome.machine_id(), Some(expected.as_str()));
    }
}

#[tokio::test]
async fn slow_backend_times_out_to_fallback() {
    let base = serve(Router::new().route(
        "/identify",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(json!({"machine": "Treadmill", "confidence": 0.99}))
        }),
    ))
    .await;
    let dir = tempfile::tempdir().unwrap();

    let resolver = IdentificationResolver::from_config(catalog(), &online_config(&base)).unwrap();
    let started = Instant::now();
    let outcome = resolver.resolve(&photo_file(&dir)).await;

    assert_eq!(outcome.kind(), OutcomeKind::Fallback);
    assert_eq!(outcome.confidence(), None);
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[tokio::test]
async fn cancelled_attempt_produces_nothing() {
    let base = serve(Router::new().route(
        "/identify",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(json!({"machine": "Treadmill", "confidence": 0.99}))
        }),
    ))
    .await;
    let dir = tempfile::tempdir().unwrap();

    let resolver = IdentificationResolver::from_config(catalog(), &online_config(&base)).unwrap();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    assert_eq!(resolver.resolve_cancellable(&photo_file(&dir), &cancel).await, None);
}

#[test]
fn fallback_index_stays_in_range() {
    for n in 1..=32usize {
        let size = std::num::NonZeroUsize::new(n).unwrap();
        for i in 0..100 {
            assert!(fallback_index(&format!("photo-{}", i), size) < n);
        }
    }
}
