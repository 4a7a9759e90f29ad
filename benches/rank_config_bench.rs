use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use multiapp_core::algs::rank_config::{SlotLayout, rank_config};
use multiapp_core::geometry::{Axis, CoordSystem, Point, Vector};
use multiapp_core::transform::{CoordTransform, MultiAppCoordTransform};

fn bench_rank_config(c: &mut Criterion) {
    let mut group = c.benchmark_group("rank_config");

    for &(nprocs, napps) in &[(64usize, 1000usize), (4096, 100_000)] {
        group.bench_with_input(
            BenchmarkId::new("every_rank", nprocs),
            &(nprocs, napps),
            |b, &(nprocs, napps)| {
                b.iter(|| {
                    for rank in 0..nprocs {
                        black_box(rank_config(rank, nprocs, napps, 1, 4, true).unwrap());
                    }
                })
            },
        );
        group.bench_with_input(
            BenchmarkId::new("shared_layout", nprocs),
            &(nprocs, napps),
            |b, &(nprocs, napps)| {
                b.iter(|| {
                    let layout = SlotLayout::new(nprocs, napps, 1, 4).unwrap();
                    for rank in 0..nprocs {
                        black_box(layout.config_for(rank, true).unwrap());
                    }
                })
            },
        );
    }
    group.finish();
}

fn bench_point_mapping(c: &mut Criterion) {
    let mut group = c.benchmark_group("point_mapping");
    let points: Vec<Point> = (0..10_000)
        .map(|i| {
            let t = i as f64 * 1e-3;
            Point::new(t.cos(), t.sin(), t)
        })
        .collect();

    let mut ours = CoordTransform::new();
    ours.set_rotation(30.0, 45.0, 60.0).unwrap();
    let reference = CoordTransform::new();
    let mut rz = CoordTransform::new();
    rz.set_coordinate_system(CoordSystem::Rz, Axis::Y).unwrap();

    let mut rotated = MultiAppCoordTransform::new(&ours);
    rotated.set_translation(Vector::new(1.0, 2.0, 3.0));
    rotated.set_destination_coord_transform(&reference).unwrap();
    group.bench_function("rotate_translate", |b| {
        b.iter(|| {
            for p in &points {
                black_box(rotated.map(p).unwrap());
            }
        })
    });

    let mut collapsing = MultiAppCoordTransform::new(&ours);
    collapsing.set_destination_coord_transform(&rz).unwrap();
    group.bench_function("collapse_rz", |b| {
        b.iter(|| {
            for p in &points {
                black_box(collapsing.map(p).unwrap());
            }
        })
    });
    group.finish();
}

criterion_group!(benches, bench_rank_config, bench_point_mapping);
criterion_main!(benches);
