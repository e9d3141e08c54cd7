//! Shared input builders for the integration suites.
#![allow(dead_code)]

use nalgebra::Vector3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use strata_core::AdjacencyStore;

/// Level-0 input: positions, normals, areas, adjacency.
pub type LevelZero = (
    Vec<Vector3<f32>>,
    Vec<Vector3<f32>>,
    Vec<f32>,
    AdjacencyStore,
);

/// Uniformly samples `count` points on the unit sphere and connects each to
/// its `k` nearest neighbors (brute force). Normals point outward; every
/// vertex carries unit area.
pub fn sphere_knn_input(count: usize, k: usize, seed: u64) -> LevelZero {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
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
        for &(_, j) in dist.iter().take(k) {
            let (u, v) = (i.min(j) as u32, i.max(j) as u32);
            edges.push((u, v, 1.0));
        }
    }
    let adjacency = AdjacencyStore::from_edges(count, &edges).expect("valid knn edges");
    (positions, normals, areas, adjacency)
}

/// `count` colinear vertices joined in a chain.
pub fn line_input(count: usize) -> LevelZero {
    let positions = (0..count)
        .map(|i| Vector3::new(i as f32, 0.0, 0.0))
        .collect::<Vec<_>>();
    let normals = vec![Vector3::new(0.0, 0.0, 1.0); count];
    let areas = vec![1.0; count];
    let edges: Vec<(u32, u32, f32)> = (0..count as u32 - 1).map(|i| (i, i + 1, 1.0)).collect();
    let adjacency = AdjacencyStore::from_edges(count, &edges).expect("valid chain edges");
    (positions, normals, areas, adjacency)
}

/// The triangle scenario: three vertices, complete adjacency, flat normals.
pub fn triangle_input() -> LevelZero {
    let positions = vec![
        Vector3::new(0.0, 0.0, 0.0),
        Vector3::new(1.0, 0.0, 0.0),
        Vector3::new(0.0, 1.0, 0.0),
    ];
    let normals = vec![Vector3::new(0.0, 0.0, 1.0); 3];
    let areas = vec![1.0; 3];
    let adjacency =
        AdjacencyStore::from_edges(3, &[(0, 1, 1.0), (1, 2, 1.0), (0, 2, 1.0)]).expect("triangle");
    (positions, normals, areas, adjacency)
}

/// Asserts that `phases` is a valid coloring of `adj`: a partition of the
/// vertex set with no monochromatic edge.
pub fn assert_valid_phases(adj: &AdjacencyStore, phases: &[Vec<u32>]) {
    let size = adj.vertex_count();
    let mut color = vec![usize::MAX; size];
    let mut seen = 0usize;
    for (c, phase) in phases.iter().enumerate() {
        for &i in phase {
            assert_eq!(color[i as usize], usize::MAX, "vertex {i} appears twice");
            color[i as usize] = c;
            seen += 1;
        }
    }
    assert_eq!(seen, size, "phases do not partition the vertex set");
    for i in 0..size as u32 {
        for link in adj.neighbors(i) {
            assert_ne!(
                color[i as usize], color[link.id as usize],
                "edge ({i}, {}) joins two vertices of color {}",
                link.id, color[i as usize]
            );
        }
    }
}
