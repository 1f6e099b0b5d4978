//! End-to-end client-server benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use dfadev_client::{Client, ConnectionConfig};
use dfadev_core::EngineConfig;
use dfadev_exchange::{initialize, InitKind, MemoryExchange};
use dfadev_server::{Dispatcher, Server, ServerConfig};
use std::sync::Arc;
use tokio::runtime::Runtime;

struct TestSetup {
    _server_handle: tokio::task::JoinHandle<()>,
    client: Client,
}

fn setup_server_and_client(rt: &Runtime) -> TestSetup {
    rt.block_on(async {
        let exchange = Arc::new(MemoryExchange::new());
        let startup = initialize(InitKind::Fresh, EngineConfig::default(), exchange.as_ref());
        let (dispatcher, handle) = Dispatcher::new(startup, exchange);
        dispatcher.spawn();

        let server = Server::new(ServerConfig::new("127.0.0.1:0".parse().unwrap()), handle);
        let listener = server.bind().await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server_handle = tokio::spawn(async move {
            let _ = server.serve(listener).await;
        });

        let client = Client::new(ConnectionConfig::new(addr));
        client.connect().await.unwrap();

        // Even-length runs of 'a' are accepted.
        client.add_transition(0, b'a', 1).await.unwrap();
        client.add_transition(1, b'a', 0).await.unwrap();
        client.mark_accepting(0).await.unwrap();

        TestSetup {
            _server_handle: server_handle,
            client,
        }
    })
}

fn bench_ping_latency(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let setup = setup_server_and_client(&rt);

    let mut group = c.benchmark_group("e2e_ping");
    group.throughput(Throughput::Elements(1));

    group.bench_function("ping", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(setup.client.ping().await.unwrap()) });
    });

    group.finish();
}

fn bench_feed_e2e(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let setup = setup_server_and_client(&rt);

    let mut group = c.benchmark_group("e2e_feed");

    for size in [16, 4096, 65536] {
        let data = vec![b'a'; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &data, |b, data| {
            b.to_async(&rt)
                .iter(|| async { black_box(setup.client.feed(data).await.unwrap()) });
        });
    }

    group.finish();
}

fn bench_poll_e2e(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let setup = setup_server_and_client(&rt);

    let mut group = c.benchmark_group("e2e_poll");
    group.throughput(Throughput::Elements(1));

    group.bench_function("poll_1", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(setup.client.poll(1).await.unwrap()) });
    });

    group.finish();
}

criterion_group!(benches, bench_ping_latency, bench_feed_e2e, bench_poll_e2e);
criterion_main!(benches);
