//! Criterion benchmarks for hierarchy construction and coloring.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nalgebra::Vector3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use strata_core::AdjacencyStore;
use strata_hierarchy::{
    generate_graph_coloring, generate_graph_coloring_deterministic, HierarchyConfig,
    MultiResolutionHierarchy,
};

type LevelZero = (
    Vec<Vector3<f32>>,
    Vec<Vector3<f32>>,
    Vec<f32>,
    AdjacencyStore,
);

/// Random sphere sample with brute-force 6-NN adjacency.
fn sphere_input(count: usize) -> LevelZero {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let mut positions = Vec::with_capacity(count);
    for _ in 0..count {
        let z: f32 = rng.gen::<f32>() * 2.0 - 1.0;
        let phi: f32 = rng.gen::<f32>() * 2.0 * std::f32::consts::PI;
        let r = (1.0 - z * z).sqrt();
        positions.push(Vector3::new(r * phi.cos(), r * phi.sin(), z));
    }
    let normals = positions.clone();
    let areas = vec![1.0f32; count];

    let mut edges = Vec::new();
    for i in 0..count {
        let mut dist: Vec<(f32, usize)> = (0..count)
            .filter(|&j| j != i)
            .map(|j| ((positions[i] - positions[j]).norm_squared(), j))
            .collect();
        dist.sort_by(|a, b| a.0.total_cmp(&b.0));
        for &(_, j) in dist.iter().take(6) {
            let (u, v) = (i.min(j) as u32, i.max(j) as u32);
            edges.push((u, v, 1.0));
        }
    }
    let adjacency = AdjacencyStore::from_edges(count, &edges).expect("knn edges");
    (positions, normals, areas, adjacency)
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");
    for &count in &[1000usize, 5000] {
        let input = sphere_input(count);
        for &deterministic in &[true, false] {
            let label = if deterministic { "deterministic" } else { "fast" };
            group.bench_with_input(
                BenchmarkId::new(label, count),
                &input,
                |b, (v, n, a, adj)| {
                    b.iter(|| {
                        let mut h =
                            MultiResolutionHierarchy::new(HierarchyConfig::default()).unwrap();
                        h.set_input(v.clone(), n.clone(), a.clone(), adj.clone())
                            .unwrap();
                        h.build(deterministic, None).unwrap();
                        black_box(h.levels())
                    });
                },
            );
        }
    }
    group.finish();
}

fn bench_coloring(c: &mut Criterion) {
    let (_, _, _, adj) = sphere_input(5000);
    c.bench_function("coloring/deterministic", |b| {
        b.iter(|| generate_graph_coloring_deterministic(black_box(&adj), None).unwrap())
    });
    c.bench_function("coloring/parallel", |b| {
        b.iter(|| generate_graph_coloring(black_box(&adj), 256, None).unwrap())
    });
}

criterion_group!(benches, bench_build, bench_coloring);
criterion_main!(benches);
