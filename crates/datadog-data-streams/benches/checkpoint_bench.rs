use criterion::{black_box, criterion_group, criterion_main, Criterion};
use datadog_data_streams::checkpoint::{advance, produce_edge_tags};
use datadog_data_streams::hash::PathwayIdentity;
use datadog_data_streams::PathwayContext;

const T0: i64 = 1_700_000_000_000_000_000;

fn bench_advance(c: &mut Criterion) {
    let identity = PathwayIdentity::new(Some("orders-api"), Some("prod"));
    let ctx = PathwayContext::new(T0);

    let mut group = c.benchmark_group("advance");
    for (name, extra) in [
        ("canonical", Vec::new()),
        (
            "extra_tags",
            (0..8).map(|i| format!("tag{i}:value{i}")).collect::<Vec<_>>(),
        ),
    ] {
        let tags = produce_edge_tags("kafka", "orders", true, &extra);
        group.bench_function(name, |b| {
            b.iter(|| advance(&identity, black_box(&ctx), tags.clone(), T0 + 1_000, 0));
        });
    }
    group.finish();
}

fn bench_codec(c: &mut Criterion) {
    let ctx = PathwayContext::from_wire(17_849_784_363_418_675_169, T0, T0 + 250_000_000);
    let encoded = ctx.encode_b64();

    c.bench_function("encode_b64", |b| b.iter(|| black_box(&ctx).encode_b64()));
    c.bench_function("decode_b64", |b| {
        b.iter(|| PathwayContext::decode_b64(black_box(&encoded)))
    });
}

criterion_group!(benches, bench_advance, bench_codec);
criterion_main!(benches);
