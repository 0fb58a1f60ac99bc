//! Benchmarks for the per-frame CPU work of the particle fields.
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use shimmer::prelude::*;

fn setup(count: usize, mode: FieldMode, shape: Option<&PointCloud>) -> (RecordingContext, ProgramCache, AnyField) {
    let mut gfx = RecordingContext::new();
    let mut programs = ProgramCache::new(ShaderLibrary::builtin());
    let config = FieldConfig {
        mode,
        count,
        ..FieldConfig::default()
    };
    let field = AnyField::new(&mut gfx, &mut programs, &config, 42, shape).expect("field");
    (gfx, programs, field)
}

fn bench_instanced_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("instanced_update");
    let shape = PointCloud::builtin().expect("built-in shape");

    for count in [1_000, 10_000, 50_000] {
        group.bench_with_input(BenchmarkId::new("steer", count), &count, |b, &count| {
            let (_gfx, _programs, mut field) = setup(count, FieldMode::Instanced, Some(&shape));
            b.iter(|| field.update(black_box(0.016)))
        });

        group.bench_with_input(BenchmarkId::new("tumble", count), &count, |b, &count| {
            let (_gfx, _programs, mut field) = setup(count, FieldMode::Instanced, None);
            b.iter(|| field.update(black_box(0.016)))
        });
    }

    group.finish();
}

fn bench_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame");
    let shape = PointCloud::builtin().expect("built-in shape");
    let mut camera = OrbitCamera::with_surface_size(1280, 720);
    camera.distance = 2.5;
    camera.render();

    group.bench_function("instanced_10000", |b| {
        let (mut gfx, _programs, mut field) = setup(10_000, FieldMode::Instanced, Some(&shape));
        b.iter(|| {
            field.animate(&mut gfx, camera.camera(), black_box(0.016)).expect("frame");
            gfx.clear_commands();
        })
    });

    group.bench_function("pooled_1000", |b| {
        let (mut gfx, _programs, mut field) = setup(1_000, FieldMode::Pooled, None);
        b.iter(|| {
            field.animate(&mut gfx, camera.camera(), black_box(0.016)).expect("frame");
            gfx.clear_commands();
        })
    });

    group.finish();
}

criterion_group!(benches, bench_instanced_update, bench_frame);
criterion_main!(benches);
