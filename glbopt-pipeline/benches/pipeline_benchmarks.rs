//! Benchmarks for the per-primitive pipeline stages

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use glbopt_core::{
    AttributeData, ElementType, OptimizeOptions, OptimizeReport, PrimitiveData, SimplifyParams,
    VertexAttribute,
};
use glbopt_pipeline::{finish_primitive, prepare_primitive, qem, MeshBackend};

fn generate_wavy_grid(size: usize) -> PrimitiveData {
    let mut positions = Vec::with_capacity(size * size * 3);
    for y in 0..size {
        for x in 0..size {
            let fx = x as f32 / (size - 1) as f32 * std::f32::consts::PI;
            let fy = y as f32 / (size - 1) as f32 * std::f32::consts::PI;
            positions.extend_from_slice(&[x as f32, y as f32, (fx.sin() * fy.sin()) * 2.0]);
        }
    }
    let mut indices = Vec::with_capacity((size - 1) * (size - 1) * 6);
    for y in 0..(size - 1) {
        for x in 0..(size - 1) {
            let tl = (y * size + x) as u32;
            let tr = tl + 1;
            let bl = tl + size as u32;
            let br = bl + 1;
            indices.extend_from_slice(&[tl, bl, tr, tr, bl, br]);
        }
    }
    PrimitiveData {
        mesh_index: 0,
        primitive_index: 0,
        attributes: vec![VertexAttribute::new(
            "POSITION",
            ElementType::Vec3,
            AttributeData::F32(positions),
        )],
        indices,
        material: None,
        mode: 4,
    }
}

fn bench_simplify(c: &mut Criterion) {
    let sizes = [20, 40, 80];
    let mut group = c.benchmark_group("qem_simplify");

    for &size in &sizes {
        let prim = generate_wavy_grid(size);
        let triangles = prim.indices.len() / 3;
        group.bench_with_input(
            BenchmarkId::new("half", format!("{triangles}t")),
            &prim,
            |b, prim| {
                b.iter(|| {
                    let params = SimplifyParams {
                        indices: &prim.indices,
                        positions: prim.positions().unwrap(),
                        uvs: None,
                        uv_weight: 1.0,
                        vertex_lock: None,
                        target_index_count: prim.indices.len() / 2,
                        error_threshold: 1.0,
                        lock_border: true,
                    };
                    black_box(qem::simplify(black_box(&params)));
                });
            },
        );
    }
    group.finish();
}

fn bench_full_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    let backend = MeshBackend::new();
    let options = OptimizeOptions {
        lod_error_threshold: 1.0,
        ..Default::default()
    };

    for &size in &[20usize, 40] {
        let prim = generate_wavy_grid(size);
        let triangles = prim.indices.len() / 3;
        group.bench_with_input(
            BenchmarkId::new("prepare_and_finish", format!("{triangles}t")),
            &prim,
            |b, prim| {
                b.iter(|| {
                    let mut working = prim.clone();
                    prepare_primitive(&mut working, &backend, &options);
                    let mut report = OptimizeReport::default();
                    let out =
                        finish_primitive(&working, 0.5, None, &backend, &options, &mut report);
                    black_box(out);
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_simplify, bench_full_pipeline);
criterion_main!(benches);
