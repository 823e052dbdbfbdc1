//! End-to-end behavior of DynamicBatcher and BatchProcessor over one broker

mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::time::Instant;

use dynamic_batcher::handler::from_fn;
use dynamic_batcher::stream::{StreamClient, BODY_FIELD};
use dynamic_batcher::{BatchOutcome, BatcherError, CorrelationStore, WaitPhase};

use common::{engine_config, increment, recording, spawn_engine, Harness};

#[tokio::test(start_paused = true)]
async fn test_single_item_round_trip() {
    let harness = Harness::new();
    let engine = spawn_engine(harness.processor(engine_config(1)).await, increment());
    let batcher = harness.batcher(Duration::from_secs(10)).await;

    let result: Option<Value> = batcher.asend(&json!({"v": 1})).await;
    assert_eq!(result, Some(json!({"v": 2})));

    // The result was read once and removed
    assert!(harness.client.live_keys().is_empty());
    assert_eq!(harness.client.stream_len("request"), 0);
    engine.abort();
}

#[tokio::test(start_paused = true)]
async fn test_failing_batch_function_leaves_every_caller_empty_handed() {
    let harness = Harness::new();
    let failing = Arc::new(from_fn("failing", |_| {
        Err(anyhow::anyhow!("batch rejected"))
    }));
    let engine = spawn_engine(harness.processor(engine_config(3)).await, failing);
    let batcher = harness.batcher(Duration::from_secs(2)).await;

    let callers: Vec<_> = (0..3)
        .map(|v| {
            let batcher = batcher.clone();
            tokio::spawn(async move { batcher.asend::<_, Value>(&json!({"v": v})).await })
        })
        .collect();
    for caller in callers {
        assert_eq!(caller.await.unwrap(), None);
    }

    assert!(harness.client.live_keys().is_empty());
    engine.abort();
}

#[tokio::test(start_paused = true)]
async fn test_results_route_back_to_their_submitters() {
    let harness = Harness::new();
    let (handler, seen) = recording();
    let engine = spawn_engine(harness.processor(engine_config(8)).await, handler);
    let batcher = harness.batcher(Duration::from_secs(10)).await;

    let callers: Vec<_> = (1..=6)
        .map(|v| {
            let batcher = batcher.clone();
            tokio::spawn(async move {
                let result: Option<Value> = batcher.asend(&json!({"v": v})).await;
                (v, result)
            })
        })
        .collect();
    for caller in callers {
        let (v, result) = caller.await.unwrap();
        assert_eq!(result, Some(json!({"v": v * 10})));
    }

    let total: usize = seen.lock().iter().map(Vec::len).sum();
    assert_eq!(total, 6);
    engine.abort();
}

#[tokio::test(start_paused = true)]
async fn test_batch_receives_items_in_position_order() {
    let harness = Harness::new();
    let processor = harness.processor(engine_config(8)).await;
    let batcher = harness.batcher(Duration::from_secs(5)).await;

    let mut ids = Vec::new();
    for v in [3, 1, 2] {
        let body = json!({"v": v}).to_string();
        let id = harness
            .client
            .append("request", &[(BODY_FIELD, body.as_str())])
            .await
            .unwrap();
        ids.push((id, v));
    }

    let (handler, seen) = recording();
    let report = processor.run_once(&handler).await.unwrap();
    assert_eq!(report.outcome, BatchOutcome::Completed);
    assert_eq!(
        seen.lock().clone(),
        vec![vec![json!({"v": 3}), json!({"v": 1}), json!({"v": 2})]]
    );

    for (id, v) in ids {
        let response = batcher.wait_for_finish(&id).await.unwrap();
        assert_eq!(response.body, json!({"v": v * 10}));
    }
}

#[tokio::test(start_paused = true)]
async fn test_batches_never_exceed_batch_size() {
    let harness = Harness::new();
    let (handler, seen) = recording();
    let engine = spawn_engine(harness.processor(engine_config(3)).await, handler);
    let batcher = harness.batcher(Duration::from_secs(30)).await;

    let callers: Vec<_> = (0..10)
        .map(|v| {
            let batcher = batcher.clone();
            tokio::spawn(async move { batcher.asend::<_, Value>(&json!({"v": v})).await })
        })
        .collect();
    for caller in callers {
        assert!(caller.await.unwrap().is_some());
    }

    let batches = seen.lock().clone();
    assert!(batches.iter().all(|batch| !batch.is_empty() && batch.len() <= 3));
    assert_eq!(batches.iter().map(Vec::len).sum::<usize>(), 10);
    engine.abort();
}

#[tokio::test(start_paused = true)]
async fn test_batch_dispatched_within_batch_time() {
    let harness = Harness::new();
    let processor = harness.processor(engine_config(64)).await;
    harness
        .client
        .append("request", &[(BODY_FIELD, "{\"v\":1}")])
        .await
        .unwrap();

    let started = Instant::now();
    let report = processor.run_once(increment().as_ref()).await.unwrap();
    assert_eq!(report.collected, 1);
    // Window of 100ms plus at most one claim-retry sleep
    assert!(started.elapsed() <= Duration::from_millis(102));
}

#[tokio::test(start_paused = true)]
async fn test_unread_result_expires() {
    let harness = Harness::new();
    let processor = harness
        .processor(engine_config(1).with_response_ttl(Duration::from_secs(1)))
        .await;
    let id = harness
        .client
        .append("request", &[(BODY_FIELD, "{\"v\":1}")])
        .await
        .unwrap();

    processor.run_once(increment().as_ref()).await.unwrap();
    let store = CorrelationStore::new(Arc::clone(&harness.provider));
    assert!(store.is_ready(&id).await.unwrap());

    tokio::time::advance(Duration::from_secs(2)).await;
    assert!(store.take(&id).await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_second_read_of_a_result_is_empty() {
    let harness = Harness::new();
    let processor = harness.processor(engine_config(1)).await;
    let batcher = harness.batcher(Duration::from_secs(1)).await;
    let id = harness
        .client
        .append("request", &[(BODY_FIELD, "{\"v\":4}")])
        .await
        .unwrap();
    processor.run_once(increment().as_ref()).await.unwrap();

    let first = batcher.wait_for_finish(&id).await.unwrap();
    assert_eq!(first.body, json!({"v": 5}));

    let second = batcher.wait_for_finish(&id).await.unwrap_err();
    assert!(matches!(
        second,
        BatcherError::DeadlineExceeded {
            phase: WaitPhase::Completion,
            ..
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_no_engine_means_absence_after_timeout() {
    let harness = Harness::new();
    let batcher = harness.batcher(Duration::from_secs(3)).await;

    let started = Instant::now();
    let result: Option<Value> = batcher.asend(&json!({"v": 1})).await;
    assert_eq!(result, None);
    assert!(started.elapsed() >= Duration::from_secs(3));
}

#[tokio::test]
async fn test_broker_outage_means_absence() {
    let harness = Harness::new();
    let batcher = harness.batcher(Duration::from_secs(3)).await;
    harness.client.set_available(false);

    let result: Option<Value> = batcher.asend(&json!({"v": 1})).await;
    assert_eq!(result, None);
}

#[tokio::test(start_paused = true)]
async fn test_result_of_wrong_shape_is_absence() {
    let harness = Harness::new();
    let engine = spawn_engine(harness.processor(engine_config(1)).await, increment());
    let batcher = harness.batcher(Duration::from_secs(5)).await;

    let err = batcher
        .try_send::<_, String>(&json!({"v": 1}))
        .await
        .unwrap_err();
    assert!(matches!(err, BatcherError::Deserialization { .. }));
    engine.abort();
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_engines_never_share_an_item() {
    let harness = Harness::new();
    let (first_handler, first_seen) = recording();
    let (second_handler, second_seen) = recording();
    let first = spawn_engine(
        harness.processor_named("engine-a", engine_config(4)).await,
        first_handler,
    );
    let second = spawn_engine(
        harness.processor_named("engine-b", engine_config(4)).await,
        second_handler,
    );
    let batcher = harness.batcher(Duration::from_secs(30)).await;

    let callers: Vec<_> = (0..20)
        .map(|v| {
            let batcher = batcher.clone();
            tokio::spawn(async move { batcher.asend::<_, Value>(&json!({"v": v})).await })
        })
        .collect();
    for caller in callers {
        assert!(caller.await.unwrap().is_some());
    }

    let mut delivered = HashSet::new();
    for batch in first_seen.lock().iter().chain(second_seen.lock().iter()) {
        for item in batch {
            assert!(delivered.insert(item["v"].as_i64().unwrap()), "{item} delivered twice");
        }
    }
    assert_eq!(delivered.len(), 20);
    first.abort();
    second.abort();
}

#[tokio::test(start_paused = true)]
async fn test_items_of_a_crashed_engine_are_reclaimed() {
    let harness = Harness::new();
    let batcher = harness.batcher(Duration::from_secs(60)).await;
    let caller = {
        let batcher = batcher.clone();
        tokio::spawn(async move { batcher.asend::<_, Value>(&json!({"v": 41})).await })
    };

    // A consumer that claims the request and then disappears
    loop {
        let claimed = harness
            .client
            .claim("request", "processor", "crashed", 1, false)
            .await
            .unwrap();
        if !claimed.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    let survivor = harness
        .processor_named(
            "survivor",
            engine_config(4).with_reclaim_idle(Duration::from_secs(5)),
        )
        .await;
    let engine = spawn_engine(survivor, increment());

    assert_eq!(caller.await.unwrap(), Some(json!({"v": 42})));
    assert_eq!(harness.client.pending_count("request", "processor"), 0);
    engine.abort();
}
