use criterion::{criterion_group, criterion_main, Criterion};
use serial485::port::MockSerialPort;
use serial485::timeout::{normalize_timeout_ms, TimeoutGranularity};
use serial485::{OpenConfig, Rs485Config, Rs485Strategy, SerialLink};
use std::hint::black_box;
use std::time::Duration;

pub fn bench_timeout_normalization(c: &mut Criterion) {
    c.bench_function("normalize_timeout_ms", |b| {
        b.iter(|| {
            for ms in [0u64, 1, 50, 99, 100, 101, 1_000, 65_535] {
                black_box(normalize_timeout_ms(
                    black_box(ms),
                    TimeoutGranularity::Decisecond,
                ));
            }
        })
    });
}

pub fn bench_write_paths(c: &mut Criterion) {
    let frame = [0xA5u8; 64];

    let mut plain_port = MockSerialPort::new("plain");
    let mut plain = SerialLink::with_backend(plain_port.clone(), OpenConfig::new("plain"))
        .expect("mock opens");
    c.bench_function("write_plain_64", |b| {
        b.iter(|| {
            black_box(plain.write(black_box(&frame)).expect("write"));
            plain_port.clear_events();
        })
    });

    let rs485 = Rs485Config::enabled().with_strategy(Rs485Strategy::Manual);
    let mut manual_port = MockSerialPort::new("manual");
    let mut manual = SerialLink::with_backend(
        manual_port.clone(),
        OpenConfig::new("manual").with_rs485(rs485),
    )
    .expect("mock opens");
    c.bench_function("write_manual_rs485_64", |b| {
        b.iter(|| {
            black_box(manual.write(black_box(&frame)).expect("write"));
            manual_port.clear_events();
        })
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .warm_up_time(Duration::from_millis(300))
        .measurement_time(Duration::from_secs(2));
    targets = bench_timeout_normalization, bench_write_paths
}
criterion_main!(benches);
