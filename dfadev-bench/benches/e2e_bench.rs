//! End-to-end client-server benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use dfadev_client::{Client, ConnectionConfig};
use dfadev_core::Automaton;
use dfadev_server::{spawn_device_actor, CommandHandler, Device, Server, ServerConfig};
use std::sync::Arc;
use tokio::runtime::Runtime;

struct TestSetup {
    _server: Arc<Server>,
    client: Client,
}

fn setup_server_and_client(rt: &Runtime) -> TestSetup {
    rt.block_on(async {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let mut automaton = Automaton::new();
        automaton.set_transition(0, b'1', 1);
        automaton.set_transition(1, b'1', 0);
        automaton.mark_accepting(0);

        let (device, _actor) = spawn_device_actor(Device::new(automaton, 4096), 1024);
        let server = Arc::new(Server::new(
            ServerConfig::new(addr),
            CommandHandler::new(device),
        ));

        let serving = server.clone();
        tokio::spawn(async move {
            let _ = serving.serve(listener).await;
        });

        let client = Client::new(ConnectionConfig::new(addr).with_client_name("bench"));
        client.connect().await.unwrap();

        let conn = client.connection();
        tokio::spawn(async move {
            let _ = conn.read_loop().await;
        });
        tokio::task::yield_now().await;

        TestSetup {
            _server: server,
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

fn bench_query(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let setup = setup_server_and_client(&rt);

    let mut group = c.benchmark_group("e2e_query");
    group.throughput(Throughput::Elements(1));

    group.bench_function("query", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(setup.client.query().await.unwrap()) });
    });

    group.finish();
}

fn bench_feed(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let setup = setup_server_and_client(&rt);

    let mut group = c.benchmark_group("e2e_feed");

    for size in [16, 1024, 4096] {
        let input = vec![b'1'; size];

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &input, |b, input| {
            b.to_async(&rt)
                .iter(|| async { black_box(setup.client.feed(input).await.unwrap()) });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_ping_latency, bench_query, bench_feed);

criterion_main!(benches);
