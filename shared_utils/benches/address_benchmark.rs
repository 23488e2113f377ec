use criterion::{Criterion, black_box, criterion_group, criterion_main};
use shared_utils::dns::{ipv4_from_string, ipv4_to_string};
use shared_utils::stats::{DataCount, format_bytes};

fn address_benchmark(c: &mut Criterion) {
    c.bench_function("ipv4_to_string", |b| {
        b.iter(|| ipv4_to_string(black_box(0xC0A8_0101)))
    });

    c.bench_function("ipv4_from_string", |b| {
        b.iter(|| ipv4_from_string(black_box("192.168.1.1")))
    });

    c.bench_function("format_bytes", |b| {
        b.iter(|| format_bytes(black_box(1_572_864)))
    });

    let runtime_config = "rx_bytes=1048576\ntx_bytes=524288\nlast_handshake_time_sec=0\n";
    c.bench_function("wireguard_counters", |b| {
        b.iter(|| DataCount::from_wireguard_string(black_box(runtime_config)))
    });
}

criterion_group!(benches, address_benchmark);
criterion_main!(benches);
