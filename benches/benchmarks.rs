//! Benchmarks for histoflow containers
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use histoflow::prelude::*;
use histoflow::wire;

fn data(n: usize) -> Vec<f64> {
    // deterministic spread over roughly [-10, 10)
    (0..n)
        .map(|i| ((i as f64) * 0.618_033_988_75).fract() * 20.0 - 10.0)
        .collect()
}

fn histogram() -> Bin<Count<f64>> {
    Bin::new(
        100,
        -10.0,
        10.0,
        Quantity::named("x", |x: &f64| *x),
        Count::new(),
        Count::new(),
    )
    .unwrap()
}

// ============================================================================
// Leaf Benchmarks
// ============================================================================

fn bench_leaves(c: &mut Criterion) {
    let mut group = c.benchmark_group("leaf");
    group.throughput(Throughput::Elements(1));

    group.bench_function("count_fill", |b| {
        let mut count = Count::<f64>::new();
        b.iter(|| count.add(black_box(&1.0)).unwrap());
    });

    group.bench_function("deviate_fill", |b| {
        let mut dev = Deviate::new(Quantity::<f64>::identity());
        let mut i = 0u64;
        b.iter(|| {
            dev.add(black_box(&(i as f64))).unwrap();
            i = i.wrapping_add(1);
        });
    });

    group.bench_function("bag_fill", |b| {
        let mut bag = Bag::new(Quantity::new(|x: &f64| x.round()), BagRange::Number);
        let mut i = 0u64;
        b.iter(|| {
            bag.add(black_box(&((i % 64) as f64))).unwrap();
            i = i.wrapping_add(1);
        });
    });

    group.finish();
}

// ============================================================================
// Binning Benchmarks
// ============================================================================

fn bench_binning(c: &mut Criterion) {
    let mut group = c.benchmark_group("binning");
    group.throughput(Throughput::Elements(1));
    let values = data(4096);

    group.bench_function("bin_fill", |b| {
        let mut hist = histogram();
        let mut i = 0usize;
        b.iter(|| {
            hist.add(black_box(&values[i % values.len()])).unwrap();
            i += 1;
        });
    });

    for width in [0.1, 1.0] {
        group.bench_function(format!("sparse_fill_w{}", width), |b| {
            let mut hist =
                SparselyBin::new(width, Quantity::<f64>::identity(), Count::new(), Count::new())
                    .unwrap();
            let mut i = 0usize;
            b.iter(|| {
                hist.add(black_box(&values[i % values.len()])).unwrap();
                i += 1;
            });
        });
    }

    group.bench_function("categorize_fill", |b| {
        let mut cat = Categorize::new(
            Quantity::new(|x: &f64| format!("{}", x.floor() as i64)),
            Count::new(),
        );
        let mut i = 0usize;
        b.iter(|| {
            cat.add(black_box(&values[i % values.len()])).unwrap();
            i += 1;
        });
    });

    group.finish();
}

// ============================================================================
// Collection Benchmarks
// ============================================================================

fn bench_collections(c: &mut Criterion) {
    let mut group = c.benchmark_group("collection");
    group.throughput(Throughput::Elements(1));
    let values = data(4096);

    group.bench_function("label_fill", |b| {
        let mut label = Label::new([
            ("x", histogram()),
            (
                "x2",
                Bin::new(
                    100,
                    0.0,
                    100.0,
                    Quantity::new(|x: &f64| x * x),
                    Count::new(),
                    Count::new(),
                )
                .unwrap(),
            ),
        ])
        .unwrap();
        let mut i = 0usize;
        b.iter(|| {
            label.add(black_box(&values[i % values.len()])).unwrap();
            i += 1;
        });
    });

    group.bench_function("stack_fill", |b| {
        let mut stack = Stack::new(
            &[-5.0, 0.0, 5.0],
            Quantity::<f64>::identity(),
            Count::new(),
            Count::new(),
        )
        .unwrap();
        let mut i = 0usize;
        b.iter(|| {
            stack.add(black_box(&values[i % values.len()])).unwrap();
            i += 1;
        });
    });

    group.bench_function("aggregator_fill", |b| {
        let mut agg: Aggregator<f64> = Bin::new(
            100,
            -10.0,
            10.0,
            Quantity::<f64>::identity(),
            Aggregator::from(Average::new(Quantity::identity())),
            Aggregator::from(Count::new()),
        )
        .unwrap()
        .into();
        let mut i = 0usize;
        b.iter(|| {
            agg.add(black_box(&values[i % values.len()])).unwrap();
            i += 1;
        });
    });

    group.finish();
}

// ============================================================================
// Merge Benchmarks
// ============================================================================

fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge");
    let values = data(10_000);

    group.bench_function("bin", |b| {
        let mut h1 = histogram();
        let mut h2 = histogram();
        for (i, x) in values.iter().enumerate() {
            if i % 2 == 0 {
                h1.add(x).unwrap();
            } else {
                h2.add(x).unwrap();
            }
        }
        b.iter(|| black_box(h1.merge(black_box(&h2)).unwrap()));
    });

    group.bench_function("sparse", |b| {
        let template =
            SparselyBin::new(0.1, Quantity::<f64>::identity(), Count::new(), Count::new()).unwrap();
        let mut s1 = template.zero();
        let mut s2 = template.zero();
        for x in &values {
            s1.add(x).unwrap();
            s2.add(&(x + 5.0)).unwrap();
        }
        b.iter(|| black_box(s1.merge(black_box(&s2)).unwrap()));
    });

    group.finish();
}

// ============================================================================
// Wire Benchmarks
// ============================================================================

fn bench_wire(c: &mut Criterion) {
    let mut group = c.benchmark_group("wire");
    let mut hist = histogram();
    for x in data(10_000) {
        hist.add(&x).unwrap();
    }
    let text = wire::to_wire_string(&hist).unwrap();
    group.throughput(Throughput::Bytes(text.len() as u64));

    group.bench_function("encode_bin", |b| {
        b.iter(|| black_box(wire::to_wire_string(black_box(&hist)).unwrap()));
    });

    group.bench_function("decode_bin", |b| {
        b.iter(|| {
            let back: Aggregator<f64> = wire::from_wire_str(black_box(&text)).unwrap();
            black_box(back)
        });
    });

    group.finish();
}

// ============================================================================
// Main
// ============================================================================

criterion_group!(
    benches,
    bench_leaves,
    bench_binning,
    bench_collections,
    bench_merge,
    bench_wire,
);

criterion_main!(benches);
