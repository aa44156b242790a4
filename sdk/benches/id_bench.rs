// Identity and signing benchmarks for the Meridian SDK.
//
// Covers transaction id generation (uncontended and under a frozen clock,
// which forces the nanosecond bump path), canonical string round-trips, and
// building plus signing a submission body.

use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use meridian_sdk::crypto::{Ed25519Signer, Signer};
use meridian_sdk::identity::{EntityId, FixedClock, IdGenerator, Timestamp, TransactionId};
use meridian_sdk::transaction::{DomainRequest, SignedTransaction, TransactionBody, TransactionData};

fn bench_generate(c: &mut Criterion) {
    let payer = EntityId::from_num(23847);

    let system = IdGenerator::default();
    c.bench_function("id/generate_system_clock", |b| {
        b.iter(|| system.generate(payer));
    });

    let frozen = IdGenerator::new(Arc::new(FixedClock::new(Timestamp::new(1_700_000_000, 0))));
    c.bench_function("id/generate_fixed_clock", |b| {
        b.iter(|| frozen.generate(payer));
    });
}

fn bench_parse_display(c: &mut Criterion) {
    let id = TransactionId::with_valid_start(EntityId::from_num(23847), Timestamp::new(1_700_000_000, 123_456_789))
        .with_nonce(Some(4));
    let text = id.to_string();

    c.bench_function("id/display", |b| {
        b.iter(|| id.to_string());
    });
    c.bench_function("id/parse", |b| {
        b.iter(|| text.parse::<TransactionId>().unwrap());
    });
}

fn bench_sign_body(c: &mut Criterion) {
    let signer: Arc<dyn Signer> = Arc::new(Ed25519Signer::generate());
    let id = TransactionId::with_valid_start(EntityId::from_num(1001), Timestamp::new(1_700_000_000, 0));

    let mut group = c.benchmark_group("transaction/sign");
    for size in [0usize, 1024, 4096] {
        let body = TransactionBody {
            transaction_id: id,
            node_account_id: EntityId::from_num(3),
            max_fee: 100_000_000,
            valid_duration_secs: 120,
            memo: String::new(),
            data: TransactionData::Domain(DomainRequest::inline("contract_call", vec![0u8; size])),
        };
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &body, |b, body| {
            b.iter(|| SignedTransaction::sign(body.clone(), std::slice::from_ref(&signer)).unwrap());
        });
    }
    group.finish();
}

criterion_group!(benches, bench_generate, bench_parse_display, bench_sign_body);
criterion_main!(benches);
