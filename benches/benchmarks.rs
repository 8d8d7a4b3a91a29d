use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use pskip::{DominanceIndex, Point, SkipList, SkipListConfig};
use rand::SeedableRng;
use rand::{Rng, rngs::StdRng};

fn seeded_rng(alter: u64) -> impl Rng {
    StdRng::seed_from_u64(0xEA3C47920F94A980 ^ alter)
}

fn seeded_list(seed: u64) -> SkipList<u64> {
    SkipList::with_config(SkipListConfig::default().with_seed(seed)).unwrap()
}

// One version per insert, so every insert pays for path copying
fn versioned_list(n: usize) -> SkipList<u64> {
    let mut rng = seeded_rng(n as u64);
    let mut list = seeded_list(42);
    while list.inserted() < n {
        if list.insert(rng.gen_range(0..u64::MAX)).is_ok() {
            list.advance_time();
        }
    }
    list
}

pub fn insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");

    for size in [1_000usize, 10_000, 100_000].iter() {
        group.throughput(Throughput::Elements(*size as u64));

        group.bench_with_input(BenchmarkId::new("single_version", size), size, |b, &size| {
            b.iter(|| {
                let mut list = seeded_list(1);
                let mut rng = seeded_rng(0x1234);
                for _ in 0..size {
                    let _ = black_box(list.insert(rng.gen_range(0..u64::MAX)));
                }
                list
            })
        });

        group.bench_with_input(BenchmarkId::new("version_per_insert", size), size, |b, &size| {
            b.iter(|| {
                let mut list = seeded_list(1);
                let mut rng = seeded_rng(0x1234);
                for _ in 0..size {
                    let _ = black_box(list.insert(rng.gen_range(0..u64::MAX)));
                    list.advance_time();
                }
                list
            })
        });
    }

    group.finish();
}

pub fn historical_queries(c: &mut Criterion) {
    let mut group = c.benchmark_group("historical_queries");
    group.throughput(Throughput::Elements(1));

    let n = 50_000;
    let list = versioned_list(n);
    let present = list.present();
    let values: Vec<u64> = list.iter().copied().collect();

    group.bench_function("find_at_present", |b| {
        let mut rng = seeded_rng(0x987654321FEDCBA0);
        b.iter(|| {
            let v = &values[rng.gen_range(0..values.len())];
            black_box(list.contains_at(v, present))
        })
    });

    group.bench_function("find_at_random_version", |b| {
        let mut rng = seeded_rng(0x123456789ABCDEF0);
        b.iter(|| {
            let v = &values[rng.gen_range(0..values.len())];
            let t = rng.gen_range(0..=present);
            black_box(list.contains_at(v, t))
        })
    });

    group.bench_function("lower_bound_at_random_version", |b| {
        let mut rng = seeded_rng(0x0F0F0F0F0F0F0F0F);
        b.iter(|| {
            let probe = rng.gen_range(0..u64::MAX);
            let t = rng.gen_range(0..=present);
            black_box(list.lower_bound_at(&probe, t).map(|cursor| *cursor.get()))
        })
    });

    group.finish();
}

pub fn scans(c: &mut Criterion) {
    let mut group = c.benchmark_group("scans");

    let n = 20_000;
    let list = versioned_list(n);

    for t in [n as u64 / 10, n as u64 / 2, n as u64 - 1].iter() {
        group.throughput(Throughput::Elements(*t + 1));
        group.bench_with_input(BenchmarkId::new("iter_at", t), t, |b, &t| {
            b.iter(|| black_box(list.iter_at(t).count()))
        });
    }

    group.finish();
}

pub fn dominance(c: &mut Criterion) {
    let mut group = c.benchmark_group("dominance");

    for size in [1_000usize, 10_000].iter() {
        let mut rng = seeded_rng(*size as u64);
        let points: Vec<Point<i32>> = (0..*size)
            .map(|_| Point::new(rng.gen_range(0..100_000), rng.gen_range(0..100_000)))
            .collect();

        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::new("build", size), &points, |b, points| {
            b.iter(|| DominanceIndex::build(points.iter().copied()))
        });

        let index = DominanceIndex::build(points.iter().copied());
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("north_east", size), &index, |b, index| {
            let mut rng = seeded_rng(0xABCDEF);
            b.iter(|| {
                // queries near the top right corner keep the answer small
                let qx = rng.gen_range(90_000..100_000);
                let qy = rng.gen_range(90_000..100_000);
                black_box(index.north_east(qx, qy))
            })
        });
        group.bench_with_input(BenchmarkId::new("count_north_east", size), &index, |b, index| {
            let mut rng = seeded_rng(0xFEDCBA);
            b.iter(|| {
                let qx = rng.gen_range(0..100_000);
                let qy = rng.gen_range(0..100_000);
                black_box(index.count_north_east(qx, qy))
            })
        });
    }

    group.finish();
}

criterion_group!(benches, insert, historical_queries, scans, dominance);
criterion_main!(benches);
