use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::{json, Value};
use xgraph::{Attributes, BasicNode, DirectedGraph, EdgeKind};
use xgraph_flow::{Awaitable, Executor, FlowContext, Options};

const DEPS: EdgeKind = EdgeKind(1);

/// `width` inputs feeding one summing node per layer, `depth` layers deep.
fn layered_graph(width: usize, depth: usize, inline: bool) -> DirectedGraph {
    let mut g = DirectedGraph::new();
    for i in 0..width {
        g.add(BasicNode::new(format!("in{}", i)).into_ref()).unwrap();
    }
    let mut previous: Vec<String> = (0..width).map(|i| format!("in{}", i)).collect();
    for layer in 0..depth {
        let key = format!("sum{}", layer);
        g.add(
            BasicNode::new(key.clone())
                .with_operator(|args| Ok(json!(args.iter().filter_map(Value::as_i64).sum::<i64>())))
                .with_attribute("inline", json!(inline))
                .into_ref(),
        )
        .unwrap();
        for from in &previous {
            g.associate(from, DEPS, &key, Attributes::new()).unwrap();
        }
        previous = vec![key];
    }
    g
}

fn inputs(width: usize) -> Vec<(String, Value)> {
    (0..width).map(|i| (format!("in{}", i), json!(i))).collect()
}

fn compile_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let g = layered_graph(8, 8, false);

    c.bench_function("compile and close", |b| {
        b.to_async(&runtime).iter(|| async {
            let executor = Executor::new("bench", black_box(&g), DEPS, Options::default())
                .await
                .unwrap();
            executor.close().await.unwrap();
        });
    });
}

fn exec_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("exec");

    for inline in [false, true] {
        let g = layered_graph(8, 8, inline);
        let executor = runtime
            .block_on(Executor::new("bench", &g, DEPS, Options::default()))
            .unwrap();
        let label = if inline { "inline" } else { "async" };

        group.bench_with_input(BenchmarkId::new("values", label), &executor, |b, executor| {
            b.to_async(&runtime).iter(|| async {
                let (_, result) = executor
                    .exec(FlowContext::background(), inputs(8))
                    .await
                    .unwrap();
                let outputs = result.await.unwrap();
                black_box(outputs["sum7"].result().await.unwrap());
            });
        });

        group.bench_with_input(BenchmarkId::new("awaitables", label), &executor, |b, executor| {
            b.to_async(&runtime).iter(|| async {
                let args = inputs(8)
                    .into_iter()
                    .map(|(k, v)| (k, Awaitable::ready(v)));
                let (_, result) = executor
                    .exec_awaitables(FlowContext::background(), args)
                    .await
                    .unwrap();
                let outputs = result.await.unwrap();
                black_box(outputs["sum7"].result().await.unwrap());
            });
        });

        runtime.block_on(executor.close()).unwrap();
    }
    group.finish();
}

criterion_group!(benches, compile_benchmark, exec_benchmark);
criterion_main!(benches);
