use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use routenet::modules::{builtin, ModuleRegistry};
use routenet::proto::{Command, CommandDestination, ContextDescriptor, HandlerType};
use routenet::Network;
use tokio::runtime::Runtime;

// Commands travel root -> process -> thread -> leaf through live domains, so
// these numbers include actor hops and link reuse, not just dispatch.

fn network(rt: &Runtime) -> Network {
    rt.block_on(async {
        let mut modules = ModuleRegistry::new();
        builtin::register(&mut modules);
        let network = Network::new(modules);
        for p in ["p1", "p2"] {
            network.add_process(p).unwrap();
            let thread = network.add_thread(p, "main").unwrap();
            for i in 0..4 {
                network.add_leaf(&thread.id, &format!("{p}-leaf-{i}")).unwrap();
            }
        }
        network
    })
}

fn routing_benchmark(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let network = network(&rt);

    let mut group = c.benchmark_group("routing");
    group.throughput(Throughput::Elements(1));

    for (name, destination) in [
        ("root", CommandDestination::context(HandlerType::Root, "root")),
        ("leaf", CommandDestination::context(HandlerType::Leaf, "p1-leaf-0")),
    ] {
        let command = Command::new("diagnostics", "ping", destination);
        group.bench_function(name, |b| {
            b.to_async(&rt)
                .iter(|| async { network.handle_command("bench", &command).await.unwrap() })
        });
    }

    group.finish();
}

fn broadcast_benchmark(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let network = network(&rt);

    let mut group = c.benchmark_group("broadcast");
    group.throughput(Throughput::Elements(8));

    let command = Command::new(
        "diagnostics",
        "ping",
        CommandDestination::broadcast(HandlerType::Leaf, ContextDescriptor::All),
    );
    group.bench_function("all_leaves", |b| {
        b.to_async(&rt)
            .iter(|| async { network.handle_command("bench", &command).await.unwrap() })
    });

    group.finish();
}

criterion_group!(benches, routing_benchmark, broadcast_benchmark);
criterion_main!(benches);
