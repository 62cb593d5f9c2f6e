//! FlightSurety consensus benchmarks
//!
//! - Response tallying
//! - Oracle index assignment
//! - Full request round: three matching responses plus settlement

use criterion::{
    black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput,
};
use flightsurety_common::{Address, FlightStatus};
use flightsurety_ledger::consensus::{IndexGenerator, ResponseTally};
use flightsurety_ledger::FlightSurety;
use rust_decimal_macros::dec;
use std::time::Duration;

const T: u64 = 1_700_000_000;

fn bench_tally(c: &mut Criterion) {
    let mut group = c.benchmark_group("tally");

    for responders in [3usize, 10, 50].iter() {
        group.throughput(Throughput::Elements(*responders as u64));
        let oracles: Vec<Address> = (0..*responders)
            .map(|i| Address::derive(&format!("oracle-{i}")))
            .collect();

        group.bench_with_input(BenchmarkId::new("record", responders), &oracles, |b, oracles| {
            b.iter(|| {
                let mut tally = ResponseTally::new(oracles.len() + 1);
                for (i, oracle) in oracles.iter().enumerate() {
                    let status = if i % 2 == 0 {
                        FlightStatus::OnTime
                    } else {
                        FlightStatus::LateAirline
                    };
                    black_box(tally.record(*oracle, status));
                }
            });
        });
    }

    group.finish();
}

fn bench_index_assignment(c: &mut Criterion) {
    let generator = IndexGenerator::new(10);
    let account = Address::derive("oracle");
    let mut height = 0u64;

    c.bench_function("index_assign", |b| {
        b.iter(|| {
            height += 1;
            black_box(generator.assign(black_box(height), &account))
        });
    });
}

/// Service with an open ND1309 request and three oracles holding its index
fn prepared_round(rt: &tokio::runtime::Runtime) -> (FlightSurety, u8, Vec<Address>) {
    let service =
        FlightSurety::standalone(Address::derive("owner"), Address::derive("airline-a")).unwrap();
    let airline = Address::derive("airline-a");
    let passenger = Address::derive("passenger");
    service.fund_airline(airline, dec!(10)).unwrap();
    service.register_flight(airline, "ND1309", T).unwrap();
    service
        .buy(passenger, "ND1309", T, airline, dec!(1))
        .unwrap();

    let handle = rt
        .block_on(service.fetch_flight_status(passenger, "ND1309", airline, T))
        .unwrap();
    let index = handle.key.index;

    let mut oracles = Vec::new();
    for i in 0.. {
        let oracle = Address::derive(&format!("oracle-{i}"));
        if service.register_oracle(oracle, dec!(1)).unwrap().contains(&index) {
            oracles.push(oracle);
            if oracles.len() == 3 {
                break;
            }
        }
    }
    (service, index, oracles)
}

fn bench_consensus_round(c: &mut Criterion) {
    let mut group = c.benchmark_group("consensus");
    group.measurement_time(Duration::from_secs(10));
    let rt = tokio::runtime::Runtime::new().unwrap();
    let airline = Address::derive("airline-a");

    group.bench_function("three_responses_and_settle", |b| {
        b.iter_batched(
            || prepared_round(&rt),
            |(service, index, oracles)| {
                for oracle in &oracles {
                    black_box(
                        service
                            .submit_oracle_response(*oracle, index, airline, "ND1309", T, 20)
                            .unwrap(),
                    );
                }
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_tally,
    bench_index_assignment,
    bench_consensus_round
);
criterion_main!(benches);
