// Run with:  cargo bench --bench pack_rgb

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use embedded_graphics::Drawable;
use hub75_scanout::bitplane::Packer;
use hub75_scanout::config::{PanelConfig, PanelGeometry};
use hub75_scanout::pattern::TestPattern;
use hub75_scanout::pixel::PixelBuffer;
use std::hint::black_box;

const BITS: u8 = 8;

fn pack_rgb(c: &mut Criterion) {
    let geometry = PanelGeometry {
        panels_wide: 2,
        ..PanelGeometry::HUB75_32X32
    };
    let config = PanelConfig::hub75(geometry, BITS);
    let mut pixels = PixelBuffer::for_mode(&config.display_mode(), config.source_bit_order).unwrap();
    TestPattern::Gradient.draw(&mut pixels).unwrap();
    let packer = Packer::new(&config);
    let mut planes = packer.alloc_buffer().unwrap();

    let mut group = c.benchmark_group("pack_rgb");
    group.throughput(Throughput::Elements((geometry.width() * geometry.height()) as u64));

    group.bench_function("64x32_8bit", |b| {
        b.iter(|| {
            packer.pack(black_box(&pixels), black_box(&mut planes));
        });
    });

    group.finish();
}

criterion_group!(benches, pack_rgb);
criterion_main!(benches);
