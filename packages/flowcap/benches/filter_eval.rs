//! Filter evaluation throughput.
//!
//! Evaluates definitions of increasing shape against a batch of synthetic v5
//! records: a single exact table, an OR of AND groups, and a prefix trie.
//!
//! Run: cargo bench --bench filter_eval

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use flowcap::filter::{Evaluator, FilterSet, LoadContext};
use flowcap::record::layout::V5;
use flowcap::record::{Field, FieldOffsets};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const FILTERS: &str = "\
filter-primitive web
  type ip-port
  permit 80,443,8080-8090
filter-primitive tcp
  type ip-protocol
  permit 6
filter-primitive big
  type counter
  permit gt 1000
filter-primitive nets
  type ip-address-prefix
  permit 10/8
  deny 10.1/16
  permit 10.1.2/24
  permit 192.168/16

filter-definition port
  match dst-ip-port web

filter-definition groups
  match ip-protocol tcp
  match dst-ip-port web
  or
  match octets big

filter-definition prefix
  match src-ip-addr nets
";

fn make_records(fo: &FieldOffsets, count: usize) -> Vec<Vec<u8>> {
    (0..count)
        .map(|i| {
            let mut rec = vec![0u8; fo.layout().size()];
            fo.set(&mut rec, Field::Srcaddr, 0x0A00_0000 | ((i as u32).wrapping_mul(2_654_435_761) >> 8));
            fo.set(&mut rec, Field::Dstport, (i % 9000) as u32);
            fo.set(&mut rec, Field::Prot, if i % 3 == 0 { 17 } else { 6 });
            fo.set(&mut rec, Field::DOctets, (i * 37 % 5000) as u32);
            rec
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_definitions(c: &mut Criterion) {
    let set = FilterSet::parse_str("bench", FILTERS, &LoadContext::default()).unwrap();
    let fo = FieldOffsets::resolve(&V5);
    let records = make_records(&fo, 10_000);

    let mut group = c.benchmark_group("filter_eval");
    group.throughput(Throughput::Elements(records.len() as u64));

    for name in ["port", "groups", "prefix"] {
        let def = set.definition(name).unwrap();
        group.bench_with_input(BenchmarkId::new("definition", name), def, |b, def| {
            let mut ev = Evaluator::seeded(1);
            b.iter(|| {
                let mut permitted = 0usize;
                for rec in &records {
                    if ev.evaluate(&set, def, black_box(rec), &fo).is_permit() {
                        permitted += 1;
                    }
                }
                black_box(permitted)
            })
        });
    }
    group.finish();
}

fn bench_parse(c: &mut Criterion) {
    c.bench_function("parse_filter_file", |b| {
        b.iter(|| FilterSet::parse_str("bench", black_box(FILTERS), &LoadContext::default()).unwrap())
    });
}

criterion_group!(benches, bench_definitions, bench_parse);
criterion_main!(benches);
