use {
    beancode::{decode_from_slice, encode, encode_to_vec, Externalizable},
    chrono::{TimeZone, Utc},
    criterion::{criterion_group, criterion_main, Criterion, Throughput},
    std::hint::black_box,
};

#[derive(Externalizable, Default, Debug, PartialEq, Clone)]
struct LineItem {
    #[externalize(index = 0)]
    sku: Option<String>,
    #[externalize(index = 1)]
    quantity: i32,
    #[externalize(index = 2)]
    price_cents: i64,
}

#[derive(Externalizable, Default, Debug, PartialEq, Clone)]
struct Order {
    #[externalize(index = 0)]
    id: i64,
    #[externalize(index = 1)]
    customer: Option<String>,
    #[externalize(index = 2)]
    created: Option<chrono::DateTime<Utc>>,
    #[externalize(index = 3)]
    discounts: Option<Vec<f64>>,
    #[externalize(index = 4)]
    first_item: Option<LineItem>,
    #[externalize(index = 5)]
    items: Option<Vec<Option<LineItem>>>,
    #[externalize(index = 6)]
    notes: Option<Vec<Option<String>>>,
}

fn sample_order() -> Order {
    Order {
        id: 981_234,
        customer: Some("benchmark-customer".into()),
        created: Some(Utc.timestamp_millis_opt(1_700_000_000_000).unwrap()),
        discounts: Some(vec![0.05, 0.10, 0.0]),
        first_item: Some(LineItem {
            sku: Some("SKU-0001".into()),
            quantity: 2,
            price_cents: 1999,
        }),
        items: Some(
            (0..16)
                .map(|k| {
                    Some(LineItem {
                        sku: Some(format!("SKU-{k:04}")),
                        quantity: k,
                        price_cents: 100 * k as i64,
                    })
                })
                .collect(),
        ),
        notes: Some(vec![Some("leave at the door".into()), None]),
    }
}

fn bench_encode(c: &mut Criterion) {
    let order = sample_order();
    let serialized_len = encode_to_vec(&order).unwrap().len() as u64;

    let mut group = c.benchmark_group("encode");
    group.throughput(Throughput::Bytes(serialized_len));
    group.bench_function("order/to_vec", |b| {
        b.iter(|| encode_to_vec(black_box(&order)).unwrap())
    });
    group.bench_function("order/into_buffer", |b| {
        let mut buf = Vec::with_capacity(serialized_len as usize);
        b.iter(|| {
            buf.clear();
            encode(black_box(&order), &mut buf).unwrap();
            black_box(buf.len())
        })
    });
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let bytes = encode_to_vec(&sample_order()).unwrap();

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(bytes.len() as u64));
    group.bench_function("order/from_slice", |b| {
        b.iter(|| decode_from_slice::<Order>(black_box(&bytes)).unwrap())
    });
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
