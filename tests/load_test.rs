//! Concurrency tests for the gateway.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use reqwest::StatusCode;
use serde_json::{json, Value};

mod common;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_detections_succeed() {
    let backend = common::start_programmable_backend(|_| async {
        tokio::time::sleep(Duration::from_millis(5)).await;
        (200, common::SPAM_BODY.to_string())
    })
    .await;
    let (gateway, shutdown) = common::start_gateway(common::config_for(backend)).await;

    let concurrency = 20;
    let requests_per_task = 10;
    let total_requests = concurrency * requests_per_task;

    let client = common::client();
    let start = Instant::now();

    let mut tasks = Vec::new();
    for _ in 0..concurrency {
        let client = client.clone();
        let url = format!("http://{}/api/detect", gateway);
        tasks.push(tokio::spawn(async move {
            let mut latencies = Vec::new();
            for _ in 0..requests_per_task {
                let req_start = Instant::now();
                if let Ok(res) = client
                    .post(&url)
                    .bearer_auth("load")
                    .json(&json!({ "text": "cheap meds" }))
                    .send()
                    .await
                {
                    if res.status().is_success() {
                        latencies.push(req_start.elapsed());
                    }
                }
            }
            latencies
        }));
    }

    let mut all_latencies = Vec::new();
    for task in tasks {
        all_latencies.extend(task.await.unwrap());
    }
    let duration = start.elapsed();

    assert_eq!(all_latencies.len(), total_requests, "every detection should succeed");

    all_latencies.sort();
    let p50 = all_latencies[all_latencies.len() / 2];
    let p99 = all_latencies[(all_latencies.len() as f64 * 0.99) as usize];
    println!("\n--- Load Test Results ---");
    println!("Total Requests: {}", total_requests);
    println!("Requests/sec:   {:.2}", total_requests as f64 / duration.as_secs_f64());
    println!("P50 Latency:    {:?}", p50);
    println!("P99 Latency:    {:?}", p99);
    println!("-------------------------\n");

    let stats: Value = client
        .get(format!("http://{}/api/stats", gateway))
        .bearer_auth("load")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["totalProcessed"], total_requests as u64);

    shutdown.trigger();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_failures_leave_breaker_open() {
    let calls = Arc::new(AtomicU32::new(0));
    let cc = calls.clone();
    let backend = common::start_programmable_backend(move |_| {
        let cc = cc.clone();
        async move {
            cc.fetch_add(1, Ordering::SeqCst);
            (503, r#"{"error":"model loading"}"#.to_string())
        }
    })
    .await;

    let mut config = common::config_for(backend);
    config.circuit_breaker.failure_threshold = 5;
    let (gateway, shutdown) = common::start_gateway(config).await;
    let client = common::client();

    let mut tasks = Vec::new();
    for _ in 0..40 {
        let client = client.clone();
        let url = format!("http://{}/api/detect", gateway);
        tasks.push(tokio::spawn(async move {
            client
                .post(&url)
                .bearer_auth("t")
                .json(&json!({ "text": "hi" }))
                .send()
                .await
                .map(|res| res.status())
        }));
    }
    for task in tasks {
        let status = task.await.unwrap().unwrap();
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    // Calls admitted before the threshold was crossed may all land; later ones are short-circuited.
    assert!(calls.load(Ordering::SeqCst) >= 5);

    let before = calls.load(Ordering::SeqCst);
    let res = client
        .post(format!("http://{}/api/detect", gateway))
        .bearer_auth("t")
        .json(&json!({ "text": "hi" }))
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["circuitBreaker"], "OPEN");
    assert_eq!(calls.load(Ordering::SeqCst), before);

    let status: Value = client
        .get(format!("http://{}/api/circuit/status", gateway))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["status"], "OPEN");

    shutdown.trigger();
}
