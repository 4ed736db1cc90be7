//! Loopback benchmarks for connsock
//!
//! Measures, against an in-process echo server:
//! - Connection setup (resolution-free literal connect)
//! - Request/response round trips at several payload sizes
//! - The oneshot helper end to end
//!
//! Run with: cargo bench --bench loopback_benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use connsock::{Connection, ConnectionConfig};
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::runtime::Runtime;

/// Spawn an echo server that serves every accepted connection until EOF
fn start_echo_server(rt: &Runtime) -> SocketAddr {
    rt.block_on(async {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    break;
                };
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 64 * 1024];
                    loop {
                        match stream.read(&mut buf).await {
                            Ok(0) | Err(_) => break,
                            Ok(n) => {
                                if stream.write_all(&buf[..n]).await.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                });
            }
        });
        addr
    })
}

// ============================================================================
// Connection Setup Benchmarks
// ============================================================================

fn connect_benchmarks(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let addr = start_echo_server(&rt);
    let config = ConnectionConfig::default();

    c.bench_function("connect_literal", |b| {
        b.to_async(&rt).iter(|| async {
            let mut conn = Connection::connect_literal(addr.ip(), addr.port(), &config)
                .await
                .unwrap();
            conn.close();
            black_box(conn.is_closed())
        })
    });
}

// ============================================================================
// Round Trip Benchmarks
// ============================================================================

fn round_trip_benchmarks(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let addr = start_echo_server(&rt);
    let config = ConnectionConfig::builder().nodelay(true).build();

    let mut group = c.benchmark_group("round_trip");
    for size in [16usize, 1024, 16 * 1024] {
        let payload = vec![0xa5u8; size];
        let conn = rt.block_on(async {
            Connection::connect_literal(addr.ip(), addr.port(), &config)
                .await
                .unwrap()
        });
        let conn = tokio::sync::Mutex::new(conn);

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &payload, |b, payload| {
            b.to_async(&rt).iter(|| async {
                let mut conn = conn.lock().await;
                let mut sent = 0;
                while sent < payload.len() {
                    sent += conn.write(&payload[sent..]).await.unwrap();
                }
                let mut received = 0;
                while received < payload.len() {
                    let chunk = conn.read_bytes(payload.len() - received).await.unwrap();
                    received += chunk.map(|c| c.len()).unwrap_or(0);
                }
                black_box(received)
            })
        });
    }
    group.finish();
}

// ============================================================================
// Oneshot Benchmarks
// ============================================================================

fn oneshot_benchmarks(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let addr = start_echo_server(&rt);
    let host = addr.ip().to_string();

    c.bench_function("oneshot_64b", |b| {
        b.to_async(&rt).iter(|| async {
            let mut len = 0;
            connsock::oneshot(false, &host, addr.port(), &[7u8; 64], 64, |reply| {
                len = reply.map(|r| r.len()).unwrap_or(0);
            })
            .await
            .unwrap();
            black_box(len)
        })
    });
}

criterion_group!(
    benches,
    connect_benchmarks,
    round_trip_benchmarks,
    oneshot_benchmarks
);
criterion_main!(benches);
