use criterion::{BenchmarkId, Criterion, Throughput};
use private_lift::{
    policy::LiftParams,
    role::Role,
    row::{Conversion, InputData, Row},
    session::simulate_lift,
};
use tokio::runtime::Runtime;

const OPPORTUNITY: i64 = 1_546_301_800;

pub fn lift_benchmarks(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    bench_input_processor(c, &rt);
}

fn inputs(rows: usize) -> (InputData, InputData) {
    let publisher = (0..rows)
        .map(|i| Row::publisher(i % 2 == 0, if i % 3 == 0 { 0 } else { OPPORTUNITY }))
        .collect();
    let partner = (0..rows)
        .map(|i| {
            let convs = (0..i % 5)
                .map(|j| Conversion::new(10 * j as i64, OPPORTUNITY + 100 * j as i64 - 50))
                .collect();
            Row::partner(convs)
        })
        .collect();
    (
        InputData::new(publisher).expect("rows > 0"),
        InputData::new(partner).expect("rows > 0"),
    )
}

/// Benchmark the complete input protocol, including revealing the features.
fn bench_input_processor(c: &mut Criterion, rt: &Runtime) {
    let mut g = c.benchmark_group("input processor");
    for rows in [100, 1_000, 10_000] {
        let (publisher, partner) = inputs(rows);
        let params = LiftParams::new(4);
        g.throughput(Throughput::Elements(rows as u64));
        g.bench_with_input(BenchmarkId::from_parameter(rows), &rows, |b, _| {
            b.to_async(rt).iter(|| {
                let (publisher, partner) = (publisher.clone(), partner.clone());
                async move {
                    let revealed = simulate_lift(publisher, partner, params, Role::Publisher)
                        .await
                        .expect("lift failed");
                    assert_eq!(revealed.num_rows, rows);
                }
            })
        });
    }
    g.finish();
}
