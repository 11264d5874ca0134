//! Enqueue/dequeue throughput for both disciplines under a fixed
//! number of concurrent flows.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use fairq::packet::{Ipv4View, Packet, PacketId, Priority};
use fairq::scheduler::{Scheduler, SchedulerConfig};
use fairq::{FqCodelScheduler, SfqScheduler};

fn packet(id: u64, flow: u32) -> Packet {
    Packet::new_ip(
        PacketId::new(id),
        1500,
        Priority::Normal,
        Ipv4View {
            src: flow,
            dst: flow.wrapping_mul(2654435761),
            proto: 6,
        },
    )
}

fn bench_sfq(c: &mut Criterion) {
    let mut group = c.benchmark_group("sfq_enqueue_dequeue");
    for flows in [8usize, 64, 512] {
        group.throughput(Throughput::Elements(1000));
        group.bench_with_input(BenchmarkId::new("flows", flows), &flows, |b, &flows| {
            b.iter(|| {
                let mut cfg = SchedulerConfig::sfq_defaults();
                cfg.inner_capacity = 1000;
                let mut s = SfqScheduler::new(cfg);
                for i in 0..1000u64 {
                    s.enqueue(black_box(packet(i, (i as u32) % flows as u32)));
                }
                while s.dequeue().is_some() {}
            });
        });
    }
    group.finish();
}

fn bench_fq_codel(c: &mut Criterion) {
    let mut group = c.benchmark_group("fq_codel_enqueue_dequeue");
    for flows in [8usize, 64, 512] {
        group.throughput(Throughput::Elements(1000));
        group.bench_with_input(BenchmarkId::new("flows", flows), &flows, |b, &flows| {
            b.iter(|| {
                let mut cfg = SchedulerConfig::fq_codel_defaults();
                cfg.inner_capacity = 1000;
                let mut s = FqCodelScheduler::new(cfg);
                for i in 0..1000u64 {
                    s.enqueue(black_box(packet(i, (i as u32) % flows as u32)));
                }
                while s.dequeue().is_some() {}
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_sfq, bench_fq_codel);
criterion_main!(benches);
