// Run with:  cargo bench --bench scan_frame

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use hub75_scanout::bitplane::Packer;
use hub75_scanout::config::{PanelConfig, PanelGeometry};
use hub75_scanout::port::{OePolarity, SimPort};
use hub75_scanout::scheduler::BcmScheduler;
use hub75_scanout::timer::{SimDelay, SimTimer, TimerCompareSet};
use std::hint::black_box;

fn scan_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan_frame");

    for bits in [1u8, 4, 8] {
        let config = PanelConfig::hub75(PanelGeometry::HUB75_32X32, bits);
        let packer = Packer::new(&config);
        let mut planes = packer.alloc_buffer().unwrap();
        planes.fill(0x2A);
        let layout = planes.layout();

        let timer = SimTimer::unlogged(TimerCompareSet::default().with_planes(config.planes()));
        let port = SimPort::untraced(OePolarity::ActiveLow);
        let mut scan = BcmScheduler::new(port, timer, SimDelay::new(), planes, config.protocol);
        scan.start();

        group.throughput(Throughput::Bytes(layout.size() as u64));
        group.bench_function(format!("32x32_{bits}bit"), |b| {
            b.iter(|| {
                black_box(&mut scan).run_frame();
            });
        });
    }

    group.finish();
}

criterion_group!(benches, scan_frame);
criterion_main!(benches);
