//! Throughput of frame packet building
//!
//! Every channel compresses each frame on the render thread, so packet
//! building has to stay well inside a 45ms frame budget.

use codec::{container, CompressionLevel, PacketBuilder};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

/// A 144-pixel strip with a smooth gradient, typical of rendered output
fn gradient_frame(pixels: usize) -> Vec<u8> {
    (0..pixels)
        .flat_map(|i| {
            let v = (i * 255 / pixels.max(1)) as u8;
            [v, 255 - v, v / 2]
        })
        .collect()
}

fn bench_packet_builder(c: &mut Criterion) {
    let mut group = c.benchmark_group("packet_builder");

    for pixels in [144usize, 1_000, 8_000] {
        let frame = gradient_frame(pixels);
        group.throughput(Throughput::Bytes(frame.len() as u64));

        for level in [CompressionLevel::Fastest, CompressionLevel::Optimal] {
            let builder = PacketBuilder::new(level);
            group.bench_function(format!("{level:?}/{pixels}px"), |b| {
                b.iter(|| black_box(builder.build(black_box(&frame), true)))
            });
        }
    }

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let frame = gradient_frame(8_000);
    let encoded = container::encode(&frame, CompressionLevel::Optimal).unwrap();

    c.bench_function("container_decode/8000px", |b| {
        b.iter(|| black_box(container::decode(black_box(&encoded)).unwrap()))
    });
}

criterion_group!(benches, bench_packet_builder, bench_decode);
criterion_main!(benches);
