//! End-to-end throughput benchmark for sockroute.
//!
//! Each client sends `sayHello` requests over a real WebSocket and waits for
//! the matching response before sending the next one.

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Barrier;
use tokio_tungstenite::{connect_async, tungstenite::Message};

const SERVER_URL: &str = "ws://127.0.0.1:8080/ws";
const WARMUP_SECS: u64 = 2;
const BENCH_SECS: u64 = 10;

#[derive(Default)]
struct Counters {
    responses: AtomicU64,
    latency_micros: AtomicU64,
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();
    let num_clients = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(16);

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║        sockroute End-to-End Throughput Benchmark             ║");
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!("║  Make sure the server is running: cargo run --release        ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    run_request_benchmark(num_clients).await;
}

async fn run_request_benchmark(num_clients: usize) {
    println!("📊 Request/Response Benchmark: {} clients", num_clients);
    println!("   Warmup: {}s, Measurement: {}s", WARMUP_SECS, BENCH_SECS);
    println!();

    let counters = Arc::new(Counters::default());
    let barrier = Arc::new(Barrier::new(num_clients + 1));

    let mut handles = Vec::new();

    for client_id in 0..num_clients {
        let counters = Arc::clone(&counters);
        let barrier = Arc::clone(&barrier);

        let handle = tokio::spawn(async move {
            if let Err(e) = run_client(counters, barrier).await {
                eprintln!("Client {} error: {}", client_id, e);
            }
        });
        handles.push(handle);
    }

    barrier.wait().await;
    println!("✓ All {} clients connected", num_clients);

    println!("⏳ Warming up for {}s...", WARMUP_SECS);
    tokio::time::sleep(Duration::from_secs(WARMUP_SECS)).await;

    counters.responses.store(0, Ordering::SeqCst);
    counters.latency_micros.store(0, Ordering::SeqCst);
    let start = Instant::now();

    println!("📈 Measuring for {}s...", BENCH_SECS);
    tokio::time::sleep(Duration::from_secs(BENCH_SECS)).await;

    let elapsed = start.elapsed();
    let total = counters.responses.load(Ordering::SeqCst);
    let latency_micros = counters.latency_micros.load(Ordering::SeqCst);

    let reqs_per_sec = total as f64 / elapsed.as_secs_f64();
    let avg_latency_ms = if total == 0 {
        0.0
    } else {
        latency_micros as f64 / total as f64 / 1000.0
    };

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                         RESULTS                              ║");
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!(
        "║  Clients:              {:>10}                           ║",
        num_clients
    );
    println!(
        "║  Duration:             {:>10.2}s                          ║",
        elapsed.as_secs_f64()
    );
    println!(
        "║  Responses:            {:>10}                           ║",
        total
    );
    println!(
        "║  Throughput:           {:>10.0} req/s                    ║",
        reqs_per_sec
    );
    println!(
        "║  Avg Latency:          {:>10.3} ms                       ║",
        avg_latency_ms
    );
    println!("╚══════════════════════════════════════════════════════════════╝");

    for handle in handles {
        handle.abort();
    }
}

async fn run_client(
    counters: Arc<Counters>,
    barrier: Arc<Barrier>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let (ws, _) = connect_async(SERVER_URL).await?;
    let (mut sender, mut receiver) = ws.split();

    barrier.wait().await;

    let mut uuid: u64 = 0;
    loop {
        uuid += 1;
        let request = json!({"uuid": uuid, "route": "sayHello", "headers": null, "payload": null});
        let sent_at = Instant::now();
        sender.send(Message::Text(request.to_string())).await?;

        // Skip transport-level frames until the response arrives.
        loop {
            match receiver.next().await {
                Some(Ok(Message::Text(text))) => {
                    let response: Value = serde_json::from_str(&text)?;
                    if response["uuid"] != uuid {
                        return Err(format!("out of order response {}", response["uuid"]).into());
                    }
                    break;
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(()),
            }
        }

        counters.responses.fetch_add(1, Ordering::Relaxed);
        counters
            .latency_micros
            .fetch_add(sent_at.elapsed().as_micros() as u64, Ordering::Relaxed);
    }
}
